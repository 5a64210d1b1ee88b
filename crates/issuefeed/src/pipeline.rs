use crate::body::normalize_issue;
use crate::enrich::{EnrichOptions, FeedFetcher, SiteProber, enrich_records};
use crate::forge::{ForgeClient, IssueQuery, fetch_all_issues};
use crate::group::{GroupView, group_records};
use crate::output::{OUTPUT_VERSION, OutputDocument};
use crate::{GeneratorConfig, IssueFeedError, IssueFeedResult, RawIssue, RawLabel, Record};
use std::collections::BTreeSet;

/// Result of one generator run: the canonical record list plus the group
/// views that index into it.
#[derive(Clone, Debug)]
pub struct GeneratorOutput {
    pub config: GeneratorConfig,
    pub records: Vec<Record>,
    pub groups: Vec<GroupView>,
    pub skipped_issues: Vec<u64>,
}

impl GeneratorOutput {
    pub fn documents(&self) -> Vec<OutputDocument<'_>> {
        self.groups
            .iter()
            .map(|group| OutputDocument {
                version: OUTPUT_VERSION,
                config: &self.config,
                label: &group.name,
                content: group.records(&self.records).collect(),
            })
            .collect()
    }

    pub fn group(&self, name: &str) -> Option<Vec<&Record>> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.records(&self.records).collect())
    }
}

pub struct Generator<C, P, F> {
    forge: C,
    prober: P,
    fetcher: F,
}

impl<C, P, F> Generator<C, P, F>
where
    C: ForgeClient,
    P: SiteProber,
    F: FeedFetcher,
{
    pub fn new(forge: C, prober: P, fetcher: F) -> Self {
        Self {
            forge,
            prober,
            fetcher,
        }
    }

    pub async fn run(&self, config: &GeneratorConfig) -> IssueFeedResult<GeneratorOutput> {
        let repo = config.issues.repo.as_str();
        let labels = self.forge.list_labels(repo).await?;
        warn_unknown_group_labels(config, &labels);

        let issues = fetch_all_issues(&self.forge, &IssueQuery::from_config(config)).await?;
        let (records, skipped_issues) = normalize_issues(issues, config.issues.isolate_malformed)?;

        let options = EnrichOptions::from(&config.enrich);
        let mut records = enrich_records(records, &self.prober, &self.fetcher, &options).await;

        let groups = group_records(&records, &config.issues.groups);
        if !config.issues.keep_raw {
            strip_raw(&mut records);
        }

        Ok(GeneratorOutput {
            config: config.clone(),
            records,
            groups,
            skipped_issues,
        })
    }
}

/// Normalizes issues in fetch order. A malformed payload aborts the run unless
/// `isolate_malformed` is set, in which case the issue is skipped and reported.
pub fn normalize_issues(
    issues: Vec<RawIssue>,
    isolate_malformed: bool,
) -> IssueFeedResult<(Vec<Record>, Vec<u64>)> {
    let mut records = Vec::with_capacity(issues.len());
    let mut skipped = Vec::new();
    for issue in issues {
        match normalize_issue(issue) {
            Ok(record) => records.push(record),
            Err(IssueFeedError::MalformedPayload { issue, message }) if isolate_malformed => {
                tracing::warn!(issue, %message, "skipping issue with malformed payload");
                skipped.push(issue);
            }
            Err(error) => return Err(error),
        }
    }
    Ok((records, skipped))
}

/// Drops the raw back-reference from every record in the canonical list.
pub fn strip_raw(records: &mut [Record]) {
    for record in records {
        record.raw = None;
    }
}

fn warn_unknown_group_labels(config: &GeneratorConfig, labels: &[RawLabel]) {
    let known: BTreeSet<&str> = labels.iter().map(|label| label.name.as_str()).collect();
    for group in &config.issues.groups {
        for label in &group.labels {
            if !known.contains(label.as_str()) {
                tracing::warn!(
                    group = %group.name,
                    label = %label,
                    repo = %config.issues.repo,
                    "group requires a label the repository does not define"
                );
            }
        }
    }
}

pub mod feed;
pub mod probe;

pub use feed::{
    DEFAULT_FEED_ENTRIES, FeedFetcher, FeedOutcome, HttpFeedFetcher, get_feed_content,
    parse_feed, parse_feed_date, sort_and_truncate,
};
pub use probe::{HttpSiteProber, SiteProber};

use crate::{EnrichConfig, Record};
use futures::StreamExt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichOptions {
    pub probe_sites: bool,
    pub fetch_feeds: bool,
    pub feed_entries: usize,
    pub concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self::from(&EnrichConfig::default())
    }
}

impl From<&EnrichConfig> for EnrichOptions {
    fn from(config: &EnrichConfig) -> Self {
        Self {
            probe_sites: config.probe_sites,
            fetch_feeds: config.fetch_feeds,
            feed_entries: config.feed_entries,
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Attaches `status` and `rss` to a form record that declares a site or feed URL.
/// Structured records pass through untouched.
pub async fn enrich_record<P, F>(
    mut record: Record,
    prober: &P,
    fetcher: &F,
    options: &EnrichOptions,
) -> Record
where
    P: SiteProber + ?Sized,
    F: FeedFetcher + ?Sized,
{
    let urls = record
        .fields
        .as_form()
        .map(|fields| (fields.url.trim().to_string(), fields.url_feed.trim().to_string()));
    let Some((site_url, feed_url)) = urls else {
        return record;
    };

    if options.probe_sites && !site_url.is_empty() {
        record.status = Some(prober.probe(&site_url).await);
    }
    if options.fetch_feeds && !feed_url.is_empty() {
        record.rss = Some(get_feed_content(fetcher, &feed_url, options.feed_entries).await);
    }
    record
}

/// Enriches up to `options.concurrency` records at a time; output order
/// always equals input order.
pub async fn enrich_records<P, F>(
    records: Vec<Record>,
    prober: &P,
    fetcher: &F,
    options: &EnrichOptions,
) -> Vec<Record>
where
    P: SiteProber + ?Sized,
    F: FeedFetcher + ?Sized,
{
    let total = records.len();
    let enriched: Vec<Record> = futures::stream::iter(
        records
            .into_iter()
            .map(|record| enrich_record(record, prober, fetcher, options)),
    )
    .buffered(options.concurrency.max(1))
    .collect()
    .await;

    let unreachable = enriched
        .iter()
        .filter(|record| record.status == Some(crate::SiteStatus::Unreachable))
        .count();
    tracing::info!(total, unreachable, "enriched records");
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFeedFetcher, MockSiteProber};
    use crate::{FormFields, JsonMap, NormalizedRecord, RawIssue, SiteStatus};

    fn form_record(number: u64, url: &str, url_feed: &str) -> Record {
        Record::new(
            NormalizedRecord::Form(FormFields {
                title: format!("blog-{number}"),
                url: url.to_string(),
                url_feed: url_feed.to_string(),
                ..FormFields::default()
            }),
            RawIssue::new(number, "open", ""),
        )
    }

    const FEED: &str = "<rss><channel><item><title>t</title>\
                        <link>https://a.test/1</link></item></channel></rss>";

    #[tokio::test(flavor = "current_thread")]
    async fn enrich_record_only_declared_urls_get_augmentations() {
        let prober = MockSiteProber::default().with_active("https://a.test");
        let fetcher = MockFeedFetcher::default().with_feed("https://a.test/rss", FEED);
        let options = EnrichOptions::default();

        let both = enrich_record(
            form_record(1, "https://a.test", "https://a.test/rss"),
            &prober,
            &fetcher,
            &options,
        )
        .await;
        assert_eq!(both.status, Some(SiteStatus::Active));
        assert_eq!(both.rss.as_ref().map(Vec::len), Some(1));

        let neither = enrich_record(form_record(2, "", "  "), &prober, &fetcher, &options).await;
        assert_eq!(neither.status, None);
        assert_eq!(neither.rss, None);

        let down = enrich_record(
            form_record(3, "https://down.test", "https://down.test/rss"),
            &prober,
            &fetcher,
            &options,
        )
        .await;
        assert_eq!(down.status, Some(SiteStatus::Unreachable));
        assert_eq!(down.rss, Some(Vec::new()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn enrich_record_structured_records_untouched() {
        let prober = MockSiteProber::default();
        let fetcher = MockFeedFetcher::default();
        let mut payload = JsonMap::new();
        payload.insert("url".to_string(), serde_json::json!("https://a.test"));
        let record = Record::new(
            NormalizedRecord::Structured(payload),
            RawIssue::new(1, "open", ""),
        );

        let enriched =
            enrich_record(record.clone(), &prober, &fetcher, &EnrichOptions::default()).await;
        assert_eq!(enriched, record);
        assert!(prober.probed().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn enrich_records_concurrent_expected_input_order() {
        let prober = MockSiteProber::default().with_active("https://b.test");
        let fetcher = MockFeedFetcher::default();
        let records: Vec<Record> = (1..=6)
            .map(|n| form_record(n, if n % 2 == 0 { "https://b.test" } else { "" }, ""))
            .collect();
        let options = EnrichOptions {
            concurrency: 3,
            ..EnrichOptions::default()
        };

        let enriched = enrich_records(records, &prober, &fetcher, &options).await;
        let numbers: Vec<Option<u64>> = enriched.iter().map(Record::issue_number).collect();
        assert_eq!(numbers, (1..=6u64).map(Some).collect::<Vec<_>>());
        assert_eq!(enriched[1].status, Some(SiteStatus::Active));
        assert_eq!(enriched[0].status, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn enrich_record_disabled_options_skip_network() {
        let prober = MockSiteProber::default();
        let fetcher = MockFeedFetcher::default();
        let options = EnrichOptions {
            probe_sites: false,
            fetch_feeds: false,
            ..EnrichOptions::default()
        };
        let record = enrich_record(
            form_record(1, "https://a.test", "https://a.test/rss"),
            &prober,
            &fetcher,
            &options,
        )
        .await;
        assert_eq!(record.status, None);
        assert_eq!(record.rss, None);
        assert!(prober.probed().is_empty());
        assert!(fetcher.fetched().is_empty());
    }
}

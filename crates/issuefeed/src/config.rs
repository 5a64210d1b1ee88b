use crate::{IssueFeedError, IssueFeedResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
pub const STATE_ALL: &str = "all";
pub const ALL_GROUP: &str = "all";

/// Top-level generator configuration, loaded once and passed explicitly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub issues: IssuesConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuesConfig {
    pub repo: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub keep_raw: bool,
    #[serde(default)]
    pub isolate_malformed: bool,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>, state: Option<&str>, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            state: state.map(ToOwned::to_owned),
            labels: labels.iter().map(|label| label.to_string()).collect(),
        }
    }

    /// `None` when the group accepts every state.
    pub fn target_state(&self) -> Option<&str> {
        match self.state.as_deref().map(str::trim) {
            None | Some("") | Some(STATE_ALL) => None,
            Some(state) => Some(state),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub probe_sites: bool,
    pub fetch_feeds: bool,
    pub feed_entries: usize,
    pub concurrency: usize,
    pub probe_timeout_secs: u64,
    pub feed_timeout_secs: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            probe_sites: true,
            fetch_feeds: true,
            feed_entries: 10,
            concurrency: 4,
            probe_timeout_secs: 5,
            feed_timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub per_page: u32,
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            timeout_secs: 10,
            per_page: 100,
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

fn default_sort() -> String {
    "created".to_string()
}

impl GeneratorConfig {
    pub fn for_repo(repo: impl Into<String>) -> Self {
        Self {
            issues: IssuesConfig {
                repo: repo.into(),
                state: Some(STATE_ALL.to_string()),
                sort: default_sort(),
                labels: Vec::new(),
                keep_raw: false,
                isolate_malformed: false,
                groups: Vec::new(),
            },
            enrich: EnrichConfig::default(),
            api: ApiConfig::default(),
        }
    }

    pub fn from_yaml_str(source: &str) -> IssueFeedResult<Self> {
        let mut config: Self = serde_yaml::from_str(source)
            .map_err(|error| IssueFeedError::Config(format!("invalid yaml: {error}")))?;
        config.normalize()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> IssueFeedResult<Self> {
        let source = fs::read_to_string(path).map_err(|error| {
            IssueFeedError::Config(format!(
                "failed reading config file '{}': {}",
                path.display(),
                error
            ))
        })?;
        Self::from_yaml_str(&source)
    }

    /// Fills derived defaults and rejects configurations the pipeline cannot honor.
    pub fn normalize(&mut self) -> IssueFeedResult<()> {
        self.issues.repo = self.issues.repo.trim().to_string();
        if self.issues.repo.is_empty() {
            return Err(IssueFeedError::Config("issues.repo is required".to_string()));
        }

        let state_unset = self
            .issues
            .state
            .as_deref()
            .is_none_or(|state| state.trim().is_empty());
        if state_unset {
            self.issues.state = Some(STATE_ALL.to_string());
        }

        self.api.per_page = self.api.per_page.clamp(1, 100);
        self.enrich.concurrency = self.enrich.concurrency.max(1);

        let mut seen = BTreeSet::new();
        for group in &self.issues.groups {
            let name = group.name.as_str();
            if name.trim().is_empty() {
                return Err(IssueFeedError::Config("group name must not be empty".to_string()));
            }
            if name == ALL_GROUP {
                return Err(IssueFeedError::Config(
                    "group name 'all' is reserved".to_string(),
                ));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(IssueFeedError::Config(format!(
                    "group name '{name}' is not a valid file name"
                )));
            }
            if !seen.insert(name) {
                return Err(IssueFeedError::Config(format!(
                    "duplicate group name '{name}'"
                )));
            }
        }
        Ok(())
    }

    pub fn state(&self) -> &str {
        self.issues.state.as_deref().unwrap_or(STATE_ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_yaml_minimal_expected_defaults() {
        let config = GeneratorConfig::from_yaml_str("issues:\n  repo: owner/friends\n")
            .expect("config should parse");

        assert_eq!(config.issues.repo, "owner/friends");
        assert_eq!(config.state(), "all");
        assert_eq!(config.issues.sort, "created");
        assert!(!config.issues.keep_raw);
        assert_eq!(config.enrich.feed_entries, 10);
        assert_eq!(config.api.per_page, 100);
        assert_eq!(config.api.base_url, "https://api.github.com");
    }

    #[test]
    fn from_yaml_null_state_expected_all() {
        let config = GeneratorConfig::from_yaml_str(
            "issues:\n  repo: owner/friends\n  state:\n  sort: updated\n",
        )
        .expect("config should parse");
        assert_eq!(config.issues.state.as_deref(), Some("all"));
        assert_eq!(config.issues.sort, "updated");
    }

    #[test]
    fn from_yaml_groups_expected_target_states() {
        let config = GeneratorConfig::from_yaml_str(
            r#"
issues:
  repo: owner/friends
  groups:
    - name: open-friends
      state: open
      labels: [friend-link]
    - name: everything
"#,
        )
        .expect("config should parse");

        assert_eq!(config.issues.groups.len(), 2);
        assert_eq!(config.issues.groups[0].target_state(), Some("open"));
        assert_eq!(config.issues.groups[0].labels, vec!["friend-link"]);
        assert_eq!(config.issues.groups[1].target_state(), None);
        assert!(config.issues.groups[1].labels.is_empty());
    }

    #[test]
    fn from_yaml_missing_repo_expected_config_error() {
        let error = GeneratorConfig::from_yaml_str("issues:\n  state: open\n")
            .expect_err("missing repo should fail");
        assert!(matches!(error, IssueFeedError::Config(_)));
    }

    #[test]
    fn normalize_reserved_and_duplicate_group_names_rejected() {
        let mut config = GeneratorConfig::for_repo("owner/friends");
        config.issues.groups = vec![GroupConfig::new("all", None, &[])];
        assert!(config.normalize().is_err());

        config.issues.groups = vec![
            GroupConfig::new("friends", None, &[]),
            GroupConfig::new("friends", Some("open"), &[]),
        ];
        assert!(config.normalize().is_err());

        config.issues.groups = vec![GroupConfig::new("../escape", None, &[])];
        assert!(config.normalize().is_err());
    }

    #[test]
    fn normalize_per_page_clamped_to_forge_limit() {
        let mut config = GeneratorConfig::for_repo("owner/friends");
        config.api.per_page = 500;
        config.enrich.concurrency = 0;
        config.normalize().expect("config should normalize");
        assert_eq!(config.api.per_page, 100);
        assert_eq!(config.enrich.concurrency, 1);
    }
}

//! Issue-tracker to JSON generator.
//!
//! Pipeline: fetch issues from a forge repository -> normalize each body
//! (fenced JSON payload or issue-form sections) -> enrich form records with a
//! site liveness probe and recent feed entries -> group by state and label
//! subsets -> write one versioned JSON document per group.

pub mod body;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod forge;
pub mod group;
pub mod output;
pub mod pipeline;
pub mod testing;
pub mod types;

pub use body::{
    BodyKind, FormField, NO_RESPONSE_PLACEHOLDER, classify_body, extract_form_fields,
    extract_payload, normalize_body, normalize_issue,
};
pub use config::{ApiConfig, EnrichConfig, GeneratorConfig, GroupConfig, IssuesConfig};
pub use enrich::{
    EnrichOptions, FeedFetcher, FeedOutcome, HttpFeedFetcher, HttpSiteProber, SiteProber,
    enrich_record, enrich_records, get_feed_content, parse_feed,
};
pub use errors::{IssueFeedError, IssueFeedResult};
pub use forge::{ForgeClient, IssueQuery, ReqwestForgeClient, fetch_all_issues};
pub use group::{GroupView, group_records, record_matches};
pub use output::{DEFAULT_OUTPUT_DIR, OUTPUT_VERSION, OutputDocument, write_documents};
pub use pipeline::{Generator, GeneratorOutput, normalize_issues, strip_raw};
pub use types::{
    FeedEntry, FormFields, JsonMap, NormalizedRecord, RawIssue, RawLabel, Record, SiteStatus,
};

use issuefeed::testing::{MockFeedFetcher, MockForge, MockSiteProber};
use issuefeed::{
    Generator, GeneratorConfig, GroupConfig, IssueFeedError, RawIssue, SiteStatus,
    write_documents,
};
use serde_json::Value;

const FRIEND_BODY: &str = "### 博客名称\n\nMyBlog\n\n\
                           ### 博客地址\n\nhttps://my.test\n\n\
                           ### 博客头像\n\n_No response_\n\n### 订阅地址\n\nhttps://my.test/rss.xml";

fn feed_with_items(count: u32) -> String {
    let items: String = (1..=count)
        .map(|n| {
            format!(
                "<item><title>post-{n}</title><link>https://my.test/{n}</link>\
                 <pubDate>2024-01-{n:02}T00:00:00Z</pubDate></item>"
            )
        })
        .collect();
    format!("<rss version=\"2.0\"><channel>{items}</channel></rss>")
}

fn sample_issues() -> Vec<RawIssue> {
    vec![
        RawIssue::new(1, "open", FRIEND_BODY).with_labels(&["friend-link", "approved"]),
        RawIssue::new(
            2,
            "open",
            "```json\n{\"name\": \"Payload\", \"url\": \"https://p.test\"}\n```",
        )
        .with_labels(&["other"]),
        RawIssue::new(3, "closed", "### 博客名称\n\nGone").with_labels(&["friend-link"]),
    ]
}

fn config(keep_raw: bool) -> GeneratorConfig {
    let mut config = GeneratorConfig::for_repo("owner/friends");
    config.issues.keep_raw = keep_raw;
    config.issues.groups = vec![
        GroupConfig::new("open-friends", Some("open"), &["friend-link"]),
        GroupConfig::new("closed", Some("closed"), &[]),
    ];
    config
}

fn generator() -> Generator<MockForge, MockSiteProber, MockFeedFetcher> {
    Generator::new(
        MockForge::default()
            .with_labels(&["friend-link", "approved", "other"])
            .with_issues(sample_issues()),
        MockSiteProber::default().with_active("https://my.test"),
        MockFeedFetcher::default().with_feed("https://my.test/rss.xml", feed_with_items(15)),
    )
}

#[tokio::test(flavor = "current_thread")]
async fn run_groups_and_enriches_in_fetch_order() {
    let output = generator()
        .run(&config(false))
        .await
        .expect("pipeline should succeed");

    let names: Vec<&str> = output.groups.iter().map(|group| group.name.as_str()).collect();
    assert_eq!(names, vec!["all", "open-friends", "closed"]);
    assert_eq!(output.records.len(), 3);

    let first = output.records[0].to_json();
    assert_eq!(first["title"], "MyBlog");
    assert_eq!(first["avatar"], "");
    assert_eq!(first["status"], "active");
    let rss = first["rss"].as_array().expect("rss should be an array");
    assert_eq!(rss.len(), 10);
    assert_eq!(rss[0]["title"], "post-15");

    let payload = output.records[1].to_json();
    assert_eq!(payload["name"], "Payload");
    assert!(payload.get("status").is_none());

    let closed = output.records[2].to_json();
    assert_eq!(closed["title"], "Gone");
    assert!(closed.get("status").is_none());
    assert!(closed.get("rss").is_none());

    let open_friends = output.group("open-friends").expect("group should exist");
    assert_eq!(open_friends.len(), 1);
    assert_eq!(open_friends[0].to_json()["title"], "MyBlog");
}

#[tokio::test(flavor = "current_thread")]
async fn run_without_keep_raw_strips_raw_from_every_group() {
    let output = generator()
        .run(&config(false))
        .await
        .expect("pipeline should succeed");

    for document in output.documents() {
        let value = serde_json::to_value(&document).expect("document should serialize");
        for record in value["content"].as_array().expect("content should be an array") {
            assert!(record.get("raw").is_none(), "group {} leaked raw", document.label);
        }
    }
    assert_eq!(output.group("closed").map(|records| records.len()), Some(1));
}

#[tokio::test(flavor = "current_thread")]
async fn run_with_keep_raw_retains_raw_everywhere() {
    let output = generator()
        .run(&config(true))
        .await
        .expect("pipeline should succeed");

    for document in output.documents() {
        let value = serde_json::to_value(&document).expect("document should serialize");
        for record in value["content"].as_array().expect("content should be an array") {
            assert!(record["raw"]["number"].is_u64());
        }
    }
}

#[tokio::test(flavor = "current_thread")]
async fn run_without_keep_raw_drops_payload_raw_key() {
    let generator = Generator::new(
        MockForge::default().with_issues(vec![RawIssue::new(
            7,
            "open",
            "```json\n{\"name\": \"S\", \"raw\": {\"secret\": 1}}\n```",
        )]),
        MockSiteProber::default(),
        MockFeedFetcher::default(),
    );
    let output = generator
        .run(&config(false))
        .await
        .expect("pipeline should succeed");

    let document = output
        .documents()
        .into_iter()
        .find(|document| document.label == "all")
        .expect("all group should exist");
    let value = serde_json::to_value(&document).expect("document should serialize");
    assert_eq!(value["content"], serde_json::json!([{"name": "S"}]));
}

#[tokio::test(flavor = "current_thread")]
async fn run_malformed_payload_aborts_unless_isolated() {
    let mut issues = sample_issues();
    issues.push(RawIssue::new(4, "open", "```json\n{\"name\": \n```"));
    let build = |issues: Vec<RawIssue>| {
        Generator::new(
            MockForge::default().with_issues(issues),
            MockSiteProber::default(),
            MockFeedFetcher::default(),
        )
    };

    let error = build(issues.clone())
        .run(&config(false))
        .await
        .expect_err("malformed payload should abort");
    assert!(matches!(error, IssueFeedError::MalformedPayload { issue: 4, .. }));

    let mut isolated = config(false);
    isolated.issues.isolate_malformed = true;
    let output = build(issues)
        .run(&isolated)
        .await
        .expect("isolated run should succeed");
    assert_eq!(output.skipped_issues, vec![4]);
    assert_eq!(output.records.len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn run_forge_failure_is_fatal() {
    let generator = Generator::new(
        MockForge::default()
            .with_issues(sample_issues())
            .failing_on_page(1),
        MockSiteProber::default(),
        MockFeedFetcher::default(),
    );
    let error = generator
        .run(&config(false))
        .await
        .expect_err("page failure should abort");
    assert!(matches!(error, IssueFeedError::Http { status: 502, .. }));
}

#[tokio::test(flavor = "current_thread")]
async fn run_unreachable_site_and_missing_feed_degrade_locally() {
    let generator = Generator::new(
        MockForge::default().with_issues(sample_issues()),
        MockSiteProber::default(),
        MockFeedFetcher::default(),
    );
    let output = generator
        .run(&config(false))
        .await
        .expect("degraded enrichment should not fail the run");
    assert_eq!(output.records[0].status, Some(SiteStatus::Unreachable));
    assert_eq!(output.records[0].rss, Some(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn run_passes_state_and_sort_to_forge() {
    let forge = MockForge::default().with_issues(sample_issues());
    let mut config = config(false);
    config.issues.state = Some("open".to_string());
    config.issues.sort = "updated".to_string();
    config.issues.labels = vec!["friend-link".to_string()];

    let output = Generator::new(
        forge.clone(),
        MockSiteProber::default(),
        MockFeedFetcher::default(),
    )
    .run(&config)
        .await
        .expect("pipeline should succeed");

    let queries = forge.queries();
    assert_eq!(queries[0].state, "open");
    assert_eq!(queries[0].sort, "updated");
    assert_eq!(queries[0].labels, vec!["friend-link"]);
    assert_eq!(output.records.len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn written_documents_follow_group_names() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let output = generator()
        .run(&config(false))
        .await
        .expect("pipeline should succeed");

    let written = write_documents(tmp.path(), &output.documents()).expect("write should succeed");
    assert_eq!(written.len(), 3);

    let text = std::fs::read_to_string(tmp.path().join("open-friends.json"))
        .expect("group file should exist");
    let value: Value = serde_json::from_str(&text).expect("group file should be json");
    assert_eq!(value["label"], "open-friends");
    assert_eq!(value["version"], issuefeed::OUTPUT_VERSION);
    assert_eq!(value["config"]["issues"]["groups"][0]["name"], "open-friends");
    assert_eq!(value["content"].as_array().map(Vec::len), Some(1));
}

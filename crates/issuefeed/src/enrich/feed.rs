//! Syndication feed retrieval and parsing (RSS 2.0, RSS 1.0/RDF, Atom).

use crate::{FeedEntry, IssueFeedError, IssueFeedResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_FEED_ENTRIES: usize = 10;

const FEED_ROOTS: [&str; 3] = ["rss", "feed", "RDF"];
const ENTRY_ELEMENTS: [&str; 2] = ["item", "entry"];
const PUBLISHED_KEYS: [&str; 6] = ["pubDate", "published", "date", "issued", "updated", "modified"];
const AUTHOR_KEYS: [&str; 2] = ["author", "creator"];
const SUMMARY_KEYS: [&str; 4] = ["description", "summary", "content", "encoded"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedOutcome {
    Fetched(String),
    Degraded,
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FeedOutcome;
}

#[async_trait]
impl<T> FeedFetcher for std::sync::Arc<T>
where
    T: FeedFetcher + ?Sized,
{
    async fn fetch(&self, url: &str) -> FeedOutcome {
        (**self).fetch(url).await
    }
}

#[derive(Clone, Debug)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> IssueFeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(crate::forge::FORGE_USER_AGENT)
            .build()
            .map_err(|err| IssueFeedError::Transport(format!("feed client build failed: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> FeedOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url, error = %err, "feed request failed");
                return FeedOutcome::Degraded;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(url, status = response.status().as_u16(), "feed returned non-success");
            return FeedOutcome::Degraded;
        }
        match response.text().await {
            Ok(body) => FeedOutcome::Fetched(body),
            Err(err) => {
                tracing::debug!(url, error = %err, "feed body unreadable");
                FeedOutcome::Degraded
            }
        }
    }
}

/// Fetches, parses, sorts newest-first and keeps at most `num` entries.
/// Any failure yields an empty list.
pub async fn get_feed_content<F>(fetcher: &F, url: &str, num: usize) -> Vec<FeedEntry>
where
    F: FeedFetcher + ?Sized,
{
    let FeedOutcome::Fetched(body) = fetcher.fetch(url).await else {
        return Vec::new();
    };
    let Some(mut entries) = parse_feed(&body) else {
        tracing::debug!(url, "feed body is not a recognised feed document");
        return Vec::new();
    };
    sort_and_truncate(&mut entries, num);
    entries
}

/// Stable sort by parsed publication time, newest first; undated entries sort last.
pub fn sort_and_truncate(entries: &mut Vec<FeedEntry>, num: usize) {
    entries.sort_by(|a, b| b.published_parsed.cmp(&a.published_parsed));
    entries.truncate(num);
}

/// Parses an RSS or Atom document. `None` when the input is not XML or its
/// root element is not a known feed root.
pub fn parse_feed(xml: &str) -> Option<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    let mut text = String::new();
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = local_name(&start);
                if stack.is_empty() {
                    if !FEED_ROOTS.contains(&name.as_str()) {
                        return None;
                    }
                    root_seen = true;
                }
                match current.as_mut() {
                    Some(entry) if name == "link" => entry.observe_link(&start),
                    Some(_) => {}
                    None if ENTRY_ELEMENTS.contains(&name.as_str()) => {
                        current = Some(EntryBuilder::new(stack.len()));
                    }
                    None => {}
                }
                text.clear();
                stack.push(name);
            }
            Ok(Event::Empty(start)) => {
                if stack.is_empty() {
                    return FEED_ROOTS
                        .contains(&local_name(&start).as_str())
                        .then(Vec::new);
                }
                if let Some(entry) = current.as_mut() {
                    if local_name(&start) == "link" {
                        entry.observe_link(&start);
                    }
                }
            }
            Ok(Event::Text(chunk)) => {
                if current.is_some() {
                    text.push_str(&chunk.unescape().ok()?);
                }
            }
            Ok(Event::CData(chunk)) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&chunk));
                }
            }
            Ok(Event::End(_)) => {
                let name = stack.pop()?;
                let closes_entry = current
                    .as_ref()
                    .is_some_and(|entry| entry.depth == stack.len());
                if closes_entry {
                    if let Some(entry) = current.take() {
                        entries.push(entry.finish());
                    }
                } else if let Some(entry) = current.as_mut() {
                    let direct_child = stack.len() == entry.depth + 1;
                    let parent = stack.last().map(String::as_str);
                    entry.record(&name, parent, direct_child, &text);
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    root_seen.then_some(entries)
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

#[derive(Debug, Default)]
struct EntryBuilder {
    depth: usize,
    values: HashMap<String, String>,
    alternate_href: Option<String>,
    any_href: Option<String>,
}

impl EntryBuilder {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    fn observe_link(&mut self, start: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        for attr in start.attributes().flatten() {
            let value = attr.unescape_value().map(|value| value.into_owned());
            match attr.key.local_name().as_ref() {
                b"href" => href = value.ok(),
                b"rel" => rel = value.ok(),
                _ => {}
            }
        }
        let Some(href) = href.filter(|href| !href.trim().is_empty()) else {
            return;
        };
        if matches!(rel.as_deref(), None | Some("alternate")) && self.alternate_href.is_none() {
            self.alternate_href = Some(href.clone());
        }
        self.any_href.get_or_insert(href);
    }

    fn record(&mut self, name: &str, parent: Option<&str>, direct_child: bool, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let key = if name == "name" && parent == Some("author") {
            "author"
        } else if direct_child {
            name
        } else {
            return;
        };
        self.values
            .entry(key.to_string())
            .or_insert_with(|| text.to_string());
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.values.get(*key).cloned())
    }

    fn finish(self) -> FeedEntry {
        let published = self.first_of(&PUBLISHED_KEYS);
        let published_parsed = published.as_deref().and_then(parse_feed_date);
        let link = self
            .alternate_href
            .clone()
            .or_else(|| self.values.get("link").cloned())
            .or_else(|| self.any_href.clone())
            .unwrap_or_default();

        FeedEntry {
            title: self.values.get("title").cloned().unwrap_or_default(),
            link,
            published,
            published_parsed,
            author: self.first_of(&AUTHOR_KEYS),
            summary: self.first_of(&SUMMARY_KEYS),
        }
    }
}

/// Accepts RFC 2822 (RSS), RFC 3339 (Atom) and a few common relaxed forms.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

//! Issue body parsing.
//!
//! A body either carries a fenced ```` ```json ```` payload, which is passed
//! through as an open mapping, or follows the issue-form convention of
//! `### <title>` sections whose first paragraph after the heading is the value.

use crate::{
    FormFields, IssueFeedError, IssueFeedResult, JsonMap, NormalizedRecord, RawIssue, Record,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Literal the forge's issue forms emit for optional fields left blank.
pub const NO_RESPONSE_PLACEHOLDER: &str = "_No response_";

/// Section titles of the issue form, in canonical field order.
pub const FORM_SECTION_TITLES: [(&str, FormField); 6] = [
    ("博客名称", FormField::Title),
    ("博客地址", FormField::Url),
    ("博客头像", FormField::Avatar),
    ("博客描述", FormField::Description),
    ("友链页面", FormField::UrlFriends),
    ("订阅地址", FormField::UrlFeed),
];

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json(.+?)```").expect("json fence pattern should compile")
});
static SECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###[ \t]+").expect("heading pattern should compile"));
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern should compile"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Title,
    Url,
    Avatar,
    Description,
    UrlFriends,
    UrlFeed,
}

impl FormField {
    pub fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Url => "url",
            Self::Avatar => "avatar",
            Self::Description => "description",
            Self::UrlFriends => "url-friends",
            Self::UrlFeed => "url-feed",
        }
    }

    fn slot(self, fields: &mut FormFields) -> &mut String {
        match self {
            Self::Title => &mut fields.title,
            Self::Url => &mut fields.url,
            Self::Avatar => &mut fields.avatar,
            Self::Description => &mut fields.description,
            Self::UrlFriends => &mut fields.url_friends,
            Self::UrlFeed => &mut fields.url_feed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    StructuredPayload,
    Form,
}

/// Presence check only; a fence that fails to parse is still `StructuredPayload`.
pub fn classify_body(body: &str) -> BodyKind {
    if json_fence_interior(body).is_some() {
        BodyKind::StructuredPayload
    } else {
        BodyKind::Form
    }
}

fn json_fence_interior(body: &str) -> Option<&str> {
    JSON_FENCE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|interior| interior.as_str())
}

/// Parses the first fenced JSON block of `body` into a mapping.
pub fn extract_payload(issue_number: u64, body: &str) -> IssueFeedResult<JsonMap> {
    let interior = json_fence_interior(body).ok_or_else(|| IssueFeedError::MalformedPayload {
        issue: issue_number,
        message: "no fenced json block".to_string(),
    })?;

    match serde_json::from_str::<Value>(interior) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(IssueFeedError::MalformedPayload {
            issue: issue_number,
            message: format!("expected a json object, found {}", json_kind(&other)),
        }),
        Err(error) => Err(IssueFeedError::MalformedPayload {
            issue: issue_number,
            message: error.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Splits a heading-delimited body into `(title, value)` pairs in body order.
/// Sections without a value paragraph are dropped.
pub fn split_form_sections(body: &str) -> Vec<(String, String)> {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");

    SECTION_HEADING
        .split(&normalized)
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(|chunk| {
            let mut paragraphs = PARAGRAPH_BREAK
                .split(chunk)
                .map(str::trim)
                .filter(|paragraph| !paragraph.is_empty());
            let title = paragraphs.next()?;
            let value = paragraphs.next()?;
            Some((title.to_string(), value.to_string()))
        })
        .collect()
}

/// Extracts the six canonical form fields; unknown sections are ignored and
/// the no-response placeholder becomes an empty string.
pub fn extract_form_fields(body: &str) -> FormFields {
    let sections: HashMap<String, String> = split_form_sections(body).into_iter().collect();

    let mut fields = FormFields::default();
    for (title, field) in FORM_SECTION_TITLES {
        if let Some(value) = sections.get(title) {
            if value != NO_RESPONSE_PLACEHOLDER {
                *field.slot(&mut fields) = value.clone();
            }
        }
    }
    fields
}

pub fn normalize_body(issue_number: u64, body: &str) -> IssueFeedResult<NormalizedRecord> {
    match classify_body(body) {
        BodyKind::StructuredPayload => {
            extract_payload(issue_number, body).map(NormalizedRecord::Structured)
        }
        BodyKind::Form => Ok(NormalizedRecord::Form(extract_form_fields(body))),
    }
}

/// Builds the record for one issue, keeping the issue as the `raw` back-reference.
pub fn normalize_issue(issue: RawIssue) -> IssueFeedResult<Record> {
    let fields = normalize_body(issue.number, issue.body_text())?;
    Ok(Record::new(fields, issue))
}

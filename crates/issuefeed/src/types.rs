use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub type JsonMap = Map<String, Value>;

const RAW_KEY: &str = "raw";

/// A label as embedded in a forge issue object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLabel {
    pub name: String,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl RawLabel {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: JsonMap::new(),
        }
    }
}

/// An issue exactly as the forge returned it. Unmodelled fields are kept in
/// `extra` so the issue serialises back to the original object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl RawIssue {
    pub fn new(number: u64, state: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            number,
            title: String::new(),
            body: Some(body.into()),
            state: state.into(),
            labels: Vec::new(),
            created_at: None,
            updated_at: None,
            extra: JsonMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|name| RawLabel::named(*name)).collect();
        self
    }

    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.name.as_str())
    }
}

/// The six canonical fields of a heading-delimited issue form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFields {
    pub title: String,
    pub url: String,
    pub avatar: String,
    pub description: String,
    #[serde(rename = "url-friends")]
    pub url_friends: String,
    #[serde(rename = "url-feed")]
    pub url_feed: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NormalizedRecord {
    /// Keys from a fenced JSON payload, passed through unchanged.
    Structured(JsonMap),
    Form(FormFields),
}

impl NormalizedRecord {
    pub fn as_form(&self) -> Option<&FormFields> {
        match self {
            Self::Form(fields) => Some(fields),
            Self::Structured(_) => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Active,
    Unreachable,
}

impl SiteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Unreachable => "unreachable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_parsed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One output unit: normalized fields plus enrichment and the optional
/// back-reference to the originating issue.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub fields: NormalizedRecord,
    pub status: Option<SiteStatus>,
    pub rss: Option<Vec<FeedEntry>>,
    pub raw: Option<RawIssue>,
}

impl Record {
    pub fn new(fields: NormalizedRecord, raw: RawIssue) -> Self {
        Self {
            fields,
            status: None,
            rss: None,
            raw: Some(raw),
        }
    }

    pub fn issue_number(&self) -> Option<u64> {
        self.raw.as_ref().map(|raw| raw.number)
    }

    /// Flat JSON shape: record fields, then `status`/`rss`, then `raw`.
    /// Later keys win when a structured payload already uses one of them.
    /// `raw` is reserved for the issue back-reference; a payload key of that
    /// name never reaches the output.
    pub fn to_json(&self) -> Value {
        let mut object = match &self.fields {
            NormalizedRecord::Structured(map) => map.clone(),
            NormalizedRecord::Form(fields) => match serde_json::to_value(fields) {
                Ok(Value::Object(map)) => map,
                _ => JsonMap::new(),
            },
        };
        object.remove(RAW_KEY);

        if let Some(status) = self.status {
            object.insert(
                "status".to_string(),
                Value::String(status.as_str().to_string()),
            );
        }
        if let Some(rss) = &self.rss {
            object.insert(
                "rss".to_string(),
                serde_json::to_value(rss).unwrap_or_else(|_| Value::Array(Vec::new())),
            );
        }
        if let Some(raw) = &self.raw {
            if let Ok(value) = serde_json::to_value(raw) {
                object.insert(RAW_KEY.to_string(), value);
            }
        }
        Value::Object(object)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

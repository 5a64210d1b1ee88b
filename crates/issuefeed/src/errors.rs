use thiserror::Error;

#[derive(Debug, Error)]
pub enum IssueFeedError {
    #[error("config error: {0}")]
    Config(String),
    #[error("forge api returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("forge api transport failure: {0}")]
    Transport(String),
    #[error("forge api decode failure: {0}")]
    Decode(String),
    #[error("malformed json payload in issue #{issue}: {message}")]
    MalformedPayload { issue: u64, message: String },
    #[error("output error: {0}")]
    Output(String),
}

pub type IssueFeedResult<T> = Result<T, IssueFeedError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API Error: {0}")]
    Gemini(String),

    #[error("Notion API Error ({status}): {message}")]
    Notion { status: u16, message: String },

    #[error("No content found to summarize")]
    EmptyContent,

    #[error("No {0} generated")]
    EmptyResponse(&'static str),

    #[error("no pages saved in the past week")]
    NoRecentPages,

    #[error("missing {0}; set it in the config file or the environment")]
    MissingCredential(&'static str),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

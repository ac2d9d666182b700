use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("ocr timed out after {0}s")]
    OcrTimeout(u64),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("download failed after {attempts} attempts: {details}")]
    DownloadExhausted { attempts: u32, details: String },

    #[error("record conflict: {0}")]
    Conflict(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("watch setup failed: {0}")]
    Watch(String),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed date token: {0}")]
    MalformedDateToken(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("unparsable model output")]
    UnparsableModelOutput,
}

pub type Result<T, E = IntakeError> = std::result::Result<T, E>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NagareError {
    #[error("Cannot derive a range span from less than two known values")]
    InsufficientInputs,

    #[error("Invalid range span: start={start:?}, end={end:?}, length={length:?}")]
    InvalidRange {
        start: Option<u64>,
        end: Option<u64>,
        length: Option<u64>,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Expected a response starting at byte {expected}, got {actual}")]
    UnexpectedContentRange { expected: u64, actual: u64 },

    #[error("Error loading meta {message} for {url}")]
    ParseError { url: String, message: String },

    #[error("Encoding not supported \"{mime}\" for {url}")]
    UnsupportedCodec { mime: String, url: String },

    #[error("Error loading data: {url} using mime codec: {mime} ({message})")]
    SinkError {
        url: String,
        mime: String,
        message: String,
    },

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    Mp4Error(#[from] mp4::Error),

    #[error(transparent)]
    TomlError(#[from] toml::de::Error),
}

impl NagareError {
    /// Whether the error is a programming mistake rather than a runtime failure.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientInputs | Self::InvalidRange { .. } | Self::InvalidConfig(_)
        )
    }
}

pub type NagareResult<T> = Result<T, NagareError>;

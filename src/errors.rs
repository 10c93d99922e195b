use thiserror::Error;

pub type BanterResult<T> = Result<T, BanterError>;

#[derive(Debug, Error)]
pub enum BanterError {
    #[error("API error: {0}")]
    Api(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl BanterError {
    pub fn api_error(msg: impl Into<String>) -> Self {
        BanterError::Api(msg.into())
    }

    pub fn stream_error(msg: impl Into<String>) -> Self {
        BanterError::Stream(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        BanterError::Config(msg.into())
    }
}

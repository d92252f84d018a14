use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("trace store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("trace store returned status {0}")]
    Status(u16),

    #[error("trace store unavailable: {0}")]
    Unavailable(String),
}

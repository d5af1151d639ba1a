use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("no match")]
    NoMatch,
    #[error("invalid response: {0}")]
    Decode(String),
    /// The query lacks what this provider needs (e.g. no usable callsign).
    #[error("not applicable: {0}")]
    NotApplicable(&'static str),
}

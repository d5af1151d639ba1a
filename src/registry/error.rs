use thiserror::Error;

/// A curated list that could not be applied. The previous list stays in
/// effect.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("allowlist reload rejected: {0}")]
    Rejected(String),
    #[error("failed to read allowlist file: {0}")]
    Io(#[from] std::io::Error),
}

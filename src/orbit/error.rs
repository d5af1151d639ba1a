use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropagationError {
    #[error("invalid tle: {0}")]
    InvalidTle(#[from] sgp4::TleError),
    #[error("elements error: {0}")]
    Elements(#[from] sgp4::ElementsError),
    #[error("norad {norad_id}: {message}")]
    Propagation { norad_id: u32, message: String },
}

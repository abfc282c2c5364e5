use std::time::Duration;

use thiserror::Error;

/// Why a page contributed no records.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page unavailable: {0}")]
    Unavailable(String),
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not capture page text: {0}")]
    Evaluation(String),
}

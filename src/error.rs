use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Cannot process this file: {0}")]
    Undecodable(String),

    #[error("Recompression failed: {0}")]
    Recompression(String),

    #[error("Result for asset {0} discarded: a newer image was loaded")]
    Superseded(u64),

    #[error("A deep scan is already running for this image")]
    ElaInProgress,

    #[error("Operation not allowed in state {0:?}")]
    InvalidState(SessionState),

    #[error("Image pixels are not decoded yet")]
    NotDecoded,

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl ForensicsError {
    /// Failures that leave the assessment intact; the deep scan may be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ForensicsError::Recompression(_)
                | ForensicsError::ImageLoad(_)
                | ForensicsError::ElaInProgress
                | ForensicsError::NotDecoded
        )
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, ForensicsError::Superseded(_))
    }
}

impl From<tokio::task::JoinError> for ForensicsError {
    fn from(err: tokio::task::JoinError) -> Self {
        ForensicsError::TaskFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForensicsError>;

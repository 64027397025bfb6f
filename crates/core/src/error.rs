use thiserror::Error;

use crate::model::{SessionActivityError, SessionError};

/// Umbrella for every domain validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    SessionActivity(#[from] SessionActivityError),
}

use thiserror::Error;

/// The host could not hand us something to draw on.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SurfaceError {
    #[error("drawing surface unavailable ({width}x{height})")]
    Unavailable { width: u32, height: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum BirthdayError {
    #[error("birthday must look like MM-DD, got {0:?}")]
    Malformed(String),
}

use thiserror::Error;

use bus_schema::{CatalogError, CodecError};

/// Failure creating, attaching to, or operating on a [`crate::ring::Ring`].
#[derive(Debug, Error)]
pub enum RingError {
    #[error("shared memory backing error: {0}")]
    Backing(String),
    #[error("frame of {len} bytes exceeds the slot's maximum of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },
    #[error("ring is full, no empty slot available")]
    RingFull,
}

/// Failure creating or releasing per-endpoint shared memory.
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error("no endpoint registered for key {0:?}")]
    UnknownKey(String),
    #[error("could not find an unused endpoint id after {0} attempts")]
    IdSpaceExhausted(u32),
}

/// Failure on the public [`crate::endpoint::Bus`] surface.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("callback for event {event:?} has a signature mismatch: {reason}")]
    SignatureMismatch { event: String, reason: String },
}

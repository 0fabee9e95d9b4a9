use thiserror::Error;

use bus_codec::{FrameError, ValueError};

/// Failure building or deriving from the event [`crate::Catalog`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("failed to read catalog file {path:?}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse catalog TOML: {0}")]
    Parse(String),
    #[error("event {0:?} has id 0, which is reserved")]
    ZeroId(String),
    #[error("event {0:?} has id {1:#x}, which exceeds the maximum 0xFFFF")]
    IdOutOfRange(String, u32),
    #[error("event id {0:#x} is used by both {1:?} and {2:?}")]
    DuplicateId(u32, String, String),
    #[error("event name {0:?} is declared more than once")]
    DuplicateName(String),
    #[error("event {event:?} has two arguments with id {arg_id}")]
    DuplicateArgId { event: String, arg_id: u8 },
    #[error("event {event:?} argument {arg:?} has unsupported type {type_name:?}")]
    UnsupportedType {
        event: String,
        arg: String,
        type_name: String,
    },
    #[error("event {0} not found")]
    UnknownId(u32),
    #[error("event {0:?} not found")]
    UnknownName(String),
    #[error("event {0:?} is already a response event")]
    AlreadyResponseEvent(String),
    #[error("event {0:?} has no return type to derive a response event from")]
    NoReturnType(String),
}

/// Failure encoding or decoding a full event payload (event id + arg
/// block) against the catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("event {event:?} is missing required argument {arg:?}")]
    MissingArgument { event: String, arg: String },
    #[error("event {event:?} was given unknown argument {arg:?}")]
    ExtraArgument { event: String, arg: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("payload references unknown argument id {arg_id:#04x} for event {event:?}")]
    UnknownArgId { event: String, arg_id: u8 },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

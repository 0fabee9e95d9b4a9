//! Wire framing primitives for the event bus: separator bytes, the
//! routing prefix, the arg-block, fragmentation/reassembly, typed
//! value (de)serialization, and type-designator equality.
//!
//! This crate knows nothing about the event catalog itself (event
//! names, ids, or argument schemas) — that lives in `bus-schema`,
//! which is built on top of these primitives.

pub mod argblock;
pub mod error;
pub mod fragment;
pub mod prefix;
pub mod separators;
pub mod types;
pub mod value;

pub use argblock::{decode_arg_block, encode_arg_block};
pub use error::{FrameError, ValueError};
pub use fragment::{fragment, Reassembler};
pub use prefix::RoutingPrefix;
pub use types::{is_supported_type, split_with_nested, types_equal};
pub use value::{decode_value, encode_value, guess_type, Value};

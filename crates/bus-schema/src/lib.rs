//! The event catalog: schema types ([`Event`], [`EventArg`]), TOML
//! loading with validation, lookup by id/name, and full-payload
//! encode/decode built on `bus-codec`'s framing primitives.

pub mod catalog;
pub mod codec;
pub mod error;
pub mod event;

pub use catalog::Catalog;
pub use codec::{decode_event, encode_event};
pub use error::{CatalogError, CodecError};
pub use event::{Event, EventArg, NO_RETURN, RESPONSE_BIT};

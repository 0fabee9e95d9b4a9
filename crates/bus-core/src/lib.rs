//! The transport half of the event bus: a process-shared ring buffer
//! ([`ring`]), a star-topology [`dispatcher`] that forwards frames
//! between registered endpoints, and the local [`endpoint`] API
//! (`Bus`) that applications actually call.

pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod meta;
pub mod naming;
pub mod ring;

pub use config::BusConfig;
pub use dispatcher::{BusData, Dispatcher};
pub use endpoint::{Bus, Callback, CallbackDescriptor};
pub use error::{BusError, DispatcherError, RingError};
pub use meta::IdCell;
pub use ring::Ring;

//! Consumes Keycloak admin events from an ordered message stream and fans each
//! decoded event out to a chain of handlers, with a cap on how many events are
//! handled at once.

pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod source;

pub use dispatcher::{DispatchError, Dispatcher, DispatcherConfig};
pub use event::{Event, decode_event};
pub use handler::{Handler, HandlerChain, HandlerError};
pub use source::{MessageSource, SourceError};

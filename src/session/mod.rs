//! Live device sessions.
//!
//! [`SessionDispatcher`] connects to a device over SSH or telnet and
//! returns a [`Session`]. A dedicated pump thread per session moves bytes
//! between the transport and the session, so callers only ever queue
//! input and read [`OutputFeed`]s.

pub mod dialect;
mod dispatcher;
mod handle;
mod id;
pub mod mock;
mod pump;
mod state;
pub mod transport;

pub use dialect::Dialect;
pub use dispatcher::{SessionDispatcher, SessionSettings};
pub use handle::{OutputFeed, Session};
pub use id::SessionId;
pub use state::{CloseReason, SessionState};
pub use transport::{ConnectOptions, Connector, SshConnector, TelnetConnector, Transport};

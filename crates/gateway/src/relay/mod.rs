//! The session relay: the connector seam and the per-session driver that
//! owns a session's lifetime from bind to teardown.

pub mod connector;
pub mod driver;

pub use connector::{ConnectorError, HostTarget, ShellChannel, ShellConnector};
pub use driver::{RelayDriver, RelayError, RelaySettings};

pub mod connection;
pub mod counter;
pub mod discovery;
pub mod dispatch;
pub mod driver;

pub use connection::{ConnectionSession, ConnectionState, SessionStatus};
pub use discovery::{DiscoveryDiagnostic, DiscoveryRequest, DiscoveryWalker};
pub use dispatch::{OperationDispatcher, PendingWrite, WriteRequest};
pub use driver::{SessionCommand, SessionHandle, spawn_session};

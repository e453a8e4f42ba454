//! Central-side session with a single BLE peripheral: connection lifecycle,
//! a full attribute discovery walk, and read/write/notify dispatch over the
//! discovered tree.

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod uuid;

pub use config::SessionConfig;
pub use error::{Error, ErrorType};
pub use session::{ConnectionSession, ConnectionState, SessionHandle, SessionStatus, spawn_session};

pub type Result<T> = std::result::Result<T, Error>;

//! probe-dap — Debug Adapter Protocol client for probe.
//!
//! This crate implements the DAP client side used by the debugger engine.
//! It handles protocol types, message framing, request/response
//! correlation, the ordered adapter event stream, and adapter descriptors.

pub mod adapter;
pub mod capabilities;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export key types for convenience.
pub use adapter::{AdapterDescriptor, AdapterKind, LaunchAction};
pub use capabilities::AdapterCapabilities;
pub use error::DapError;
pub use protocol::*;
pub use session::{Requester, Session};

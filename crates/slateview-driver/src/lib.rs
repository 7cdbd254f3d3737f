//! Session driver: the protocol bridge between the embedded document engine
//! and a remote view host.
//!
//! The driver owns one session at a time, runs the frame-update loop,
//! maintains the outbound sequence counter and pending-action registry,
//! dispatches inbound protocol messages, and serializes dirty-state diffs.
//! Transport is out of scope: frames travel over a pair of in-process
//! channels the host wires to whatever carries them.

mod bridge;
mod dispatch;
mod driver;
mod frame;
pub mod host;
mod inflate;
mod pending;
mod roundtrip;
pub mod runtime;

pub use driver::{ExtensionRequest, SessionDriver};
pub use host::{NullViewHost, ViewHost};
pub use runtime::SessionRuntime;

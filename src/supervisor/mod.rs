//! Connection supervisor
//!
//! Owns the connection state machine for the configured repository:
//!
//! ```text
//! Disconnected ──reconnect──▶ Connecting ──usable──▶ Connected
//!                                 │
//!                                 └──failure──▶ Error ──backoff──▶ Connecting
//! ```
//!
//! Retries back off exponentially (1s, 2s, 4s, ... capped at 30s) and the
//! attempt counter resets on success or `force_reconnect`. While connected a
//! heartbeat records liveness independently of the sync cadence.

mod backoff;
mod connection;
mod heartbeat;

pub use backoff::{delay_for_attempt, BackoffPolicy};
pub use connection::{ConnectionState, ConnectionStatus, ConnectionSupervisor};
pub use heartbeat::{Heartbeat, DEFAULT_FRESHNESS_WINDOW, DEFAULT_HEARTBEAT_INTERVAL};

//! Concurrent tick dispatch and the P&L ledger.
//!
//! Ticks enter through a bounded ingress queue, are routed to worker shards
//! by coin, and every resulting action is applied to a single
//! mutex-guarded [`Ledger`]. Readers receive copies through [`EngineHandle`].

mod dispatch;
pub mod ledger;
pub mod lifecycle;
mod worker;

pub use ledger::{DrawdownTracker, Ledger};
pub use lifecycle::{Engine, EngineHandle, RegisteredStrategy};

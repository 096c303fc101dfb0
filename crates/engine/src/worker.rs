//! Worker shards.
//!
//! Each shard task owns a disjoint set of strategies and receives ticks for
//! them on its own FIFO channel, so one strategy is never evaluated twice at
//! once and always sees its coin's ticks in submission order. Shards run
//! concurrently with each other.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use common::{Fill, Tick};
use strategy::Strategy;

use crate::ledger::Ledger;

pub(crate) enum WorkerMessage {
    Tick(Arc<Tick>),
    Add(Box<dyn Strategy>),
    Remove {
        strategy_id: String,
        ack: oneshot::Sender<()>,
    },
    Flush(oneshot::Sender<()>),
}

struct Slot {
    id: String,
    strategy: Box<dyn Strategy>,
}

pub(crate) struct Worker {
    index: usize,
    rx: mpsc::Receiver<WorkerMessage>,
    ledger: Arc<Mutex<Ledger>>,
    slots: Vec<Slot>,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        rx: mpsc::Receiver<WorkerMessage>,
        ledger: Arc<Mutex<Ledger>>,
    ) -> Self {
        Self {
            index,
            rx,
            ledger,
            slots: Vec::new(),
        }
    }

    /// Run until the dispatcher drops the sender. Call from `tokio::spawn`.
    pub(crate) async fn run(mut self) {
        debug!(worker = self.index, "Worker started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WorkerMessage::Tick(tick) => self.on_tick(&tick).await,

                WorkerMessage::Add(strategy) => {
                    let id = strategy.id();
                    debug!(worker = self.index, strategy_id = %id, "Strategy assigned");
                    self.slots.push(Slot { id, strategy });
                }

                WorkerMessage::Remove { strategy_id, ack } => {
                    self.slots.retain(|s| s.id != strategy_id);
                    self.ledger.lock().await.close(&strategy_id);
                    info!(strategy_id = %strategy_id, "Strategy unregistered");
                    let _ = ack.send(());
                }

                WorkerMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        debug!(worker = self.index, "Worker drained");
    }

    async fn on_tick(&mut self, tick: &Tick) {
        for slot in self.slots.iter_mut().filter(|s| s.strategy.coin() == tick.coin) {
            // The ledger lock is never held across evaluate.
            let outcome = catch_unwind(AssertUnwindSafe(|| slot.strategy.evaluate(tick)));

            match outcome {
                Ok(Some(signal)) => {
                    let fill = Fill {
                        strategy_id: slot.id.clone(),
                        coin: tick.coin.clone(),
                        strategy_name: slot.strategy.name().to_string(),
                        side: signal.side,
                        price: tick.price,
                        quantity: signal.quantity,
                        timestamp: tick.timestamp,
                    };
                    self.ledger.lock().await.record_trade(&fill);
                }
                Ok(None) => {}
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(
                        strategy_id = %slot.id,
                        coin = %tick.coin,
                        timestamp = tick.timestamp,
                        reason = %reason,
                        "Strategy evaluation failed, tick skipped"
                    );
                    self.ledger.lock().await.record_failure(&slot.id);
                }
            }
        }
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::{pin_mut, Stream, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tracing::{info, warn};

use common::{
    BackpressurePolicy, EngineConfig, EngineState, Error, GlobalMetrics, PnlEntry, Result,
    StrategyMetrics, Tick, Trade,
};
use strategy::{Strategy, StrategyConfig};

use crate::dispatch::Dispatcher;
use crate::ledger::Ledger;

/// Everything that enters the engine goes through one ordered queue, so a
/// registration is visible to every tick submitted after it returns.
pub(crate) enum Ingress {
    Tick(Tick),
    Register(Box<dyn Strategy>),
    Unregister {
        strategy_id: String,
        ack: oneshot::Sender<()>,
    },
    Flush(oneshot::Sender<()>),
}

/// A live registration, as reported by [`EngineHandle::strategies`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredStrategy {
    pub strategy_id: String,
    pub kind: String,
    pub coin: String,
    pub config: BTreeMap<String, f64>,
}

/// Cloneable handle used by producers and readers.
#[derive(Clone)]
pub struct EngineHandle {
    config: EngineConfig,
    ingress: Arc<RwLock<Option<mpsc::Sender<Ingress>>>>,
    ledger: Arc<Mutex<Ledger>>,
    registrations: Arc<RwLock<BTreeMap<String, RegisteredStrategy>>>,
    state: Arc<RwLock<EngineState>>,
    done: watch::Receiver<bool>,
}

impl EngineHandle {
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    // ─── Registration ─────────────────────────────────────────────────────────

    /// Build a strategy through the catalog and register it.
    pub async fn register(&self, config: &StrategyConfig) -> Result<String> {
        let strategy = config.build()?;
        self.register_strategy(strategy).await
    }

    /// Register an already constructed strategy under its `coin_kind` id.
    pub async fn register_strategy(&self, strategy: Box<dyn Strategy>) -> Result<String> {
        let id = strategy.id();
        let entry = RegisteredStrategy {
            strategy_id: id.clone(),
            kind: strategy.name().to_string(),
            coin: strategy.coin().to_string(),
            config: strategy.config(),
        };

        // Held until the registration is queued, so register/unregister of
        // the same id cannot interleave.
        let mut registrations = self.registrations.write().await;
        if registrations.contains_key(&id) {
            return Err(Error::DuplicateStrategy(id));
        }

        let sender = self.sender().await?;
        self.ledger.lock().await.open(&id, &entry.coin, &entry.kind);

        if sender.send(Ingress::Register(strategy)).await.is_err() {
            self.ledger.lock().await.close(&id);
            return Err(Error::EngineStopped);
        }

        info!(strategy_id = %id, kind = %entry.kind, coin = %entry.coin, "Strategy registered");
        registrations.insert(id.clone(), entry);
        Ok(id)
    }

    /// Remove a strategy and its metrics row. Unknown ids are ignored.
    pub async fn unregister(&self, strategy_id: &str) {
        let mut registrations = self.registrations.write().await;
        if registrations.remove(strategy_id).is_none() {
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let queued = match self.sender().await {
            Ok(sender) => sender
                .send(Ingress::Unregister {
                    strategy_id: strategy_id.to_string(),
                    ack: ack_tx,
                })
                .await
                .is_ok(),
            Err(_) => false,
        };

        if !queued || ack_rx.await.is_err() {
            // Engine already stopped: nothing will evaluate it again.
            self.ledger.lock().await.close(strategy_id);
            info!(strategy_id, "Strategy unregistered");
        }
    }

    pub async fn strategies(&self) -> Vec<RegisteredStrategy> {
        self.registrations.read().await.values().cloned().collect()
    }

    // ─── Ticks ────────────────────────────────────────────────────────────────

    /// Enqueue one tick. With [`BackpressurePolicy::Block`] this waits for
    /// queue space; with `Reject` a full queue is `Error::QueueFull`.
    pub async fn submit_tick(&self, tick: Tick) -> Result<()> {
        tick.validate()?;
        let sender = self.sender().await?;

        match self.config.backpressure {
            BackpressurePolicy::Block => sender
                .send(Ingress::Tick(tick))
                .await
                .map_err(|_| Error::EngineStopped),
            BackpressurePolicy::Reject => {
                sender.try_send(Ingress::Tick(tick)).map_err(|e| match e {
                    TrySendError::Full(_) => {
                        let capacity = self.config.queue_capacity;
                        warn!(capacity, "Ingress queue full, tick rejected");
                        Error::QueueFull { capacity }
                    }
                    TrySendError::Closed(_) => Error::EngineStopped,
                })
            }
        }
    }

    /// Submit every tick of `ticks` in order. Stops at the first error.
    /// Returns the number of ticks accepted.
    pub async fn submit_stream<S>(&self, ticks: S) -> Result<usize>
    where
        S: Stream<Item = Tick>,
    {
        pin_mut!(ticks);
        let mut submitted = 0;
        while let Some(tick) = ticks.next().await {
            self.submit_tick(tick).await?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Wait until everything submitted before this call is in the ledger.
    pub async fn flush(&self) -> Result<()> {
        let sender = self.sender().await?;
        let (ack_tx, ack_rx) = oneshot::channel();
        sender
            .send(Ingress::Flush(ack_tx))
            .await
            .map_err(|_| Error::EngineStopped)?;
        ack_rx.await.map_err(|_| Error::EngineStopped)
    }

    /// Stop accepting input, apply everything already queued, and wait for
    /// the engine task to finish. Safe to call more than once. The engine
    /// loop must have been spawned (see [`Engine::start`]).
    pub async fn shutdown(&self) {
        let sender = self.ingress.write().await.take();
        if sender.is_some() {
            *self.state.write().await = EngineState::Draining;
            info!("Engine draining");
        }
        drop(sender);

        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }

    // ─── Ledger snapshots ─────────────────────────────────────────────────────

    pub async fn metrics(&self) -> GlobalMetrics {
        self.ledger.lock().await.global()
    }

    /// One strategy's row, or every row when `strategy_id` is `None`.
    pub async fn strategy_metrics(&self, strategy_id: Option<&str>) -> Vec<StrategyMetrics> {
        self.ledger.lock().await.strategy_metrics(strategy_id)
    }

    /// The newest `limit` trades, oldest first.
    pub async fn trades(&self, strategy_id: Option<&str>, limit: usize) -> Vec<Trade> {
        self.ledger.lock().await.trades(strategy_id, limit)
    }

    pub async fn pnl_history(&self, strategy_id: Option<&str>) -> Vec<PnlEntry> {
        self.ledger.lock().await.pnl_history(strategy_id)
    }

    async fn sender(&self) -> Result<mpsc::Sender<Ingress>> {
        self.ingress
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(Error::EngineStopped)
    }
}

/// The dispatch loop: owns the ingress receiver and the worker shards.
pub struct Engine {
    config: EngineConfig,
    ingress_rx: mpsc::Receiver<Ingress>,
    ledger: Arc<Mutex<Ledger>>,
    state: Arc<RwLock<EngineState>>,
    done_tx: watch::Sender<bool>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> (Self, EngineHandle) {
        let (ingress_tx, ingress_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (done_tx, done_rx) = watch::channel(false);
        let ledger = Arc::new(Mutex::new(Ledger::new()));
        let state = Arc::new(RwLock::new(EngineState::Idle));

        let handle = EngineHandle {
            config: config.clone(),
            ingress: Arc::new(RwLock::new(Some(ingress_tx))),
            ledger: ledger.clone(),
            registrations: Arc::new(RwLock::new(BTreeMap::new())),
            state: state.clone(),
            done: done_rx,
        };

        let engine = Engine {
            config,
            ingress_rx,
            ledger,
            state,
            done_tx,
        };

        (engine, handle)
    }

    /// Construct an engine and spawn its loop on the current runtime.
    pub fn start(config: EngineConfig) -> EngineHandle {
        let (engine, handle) = Engine::new(config);
        tokio::spawn(engine.run());
        handle
    }

    /// Run the dispatch loop until every ingress sender is gone, then drain
    /// the shards. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        {
            let mut state = self.state.write().await;
            if *state == EngineState::Idle {
                *state = EngineState::Running;
            }
        }
        info!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            backpressure = ?self.config.backpressure,
            "Engine running"
        );

        let mut dispatcher = Dispatcher::spawn(self.config.workers, self.ledger.clone());

        while let Some(msg) = self.ingress_rx.recv().await {
            match msg {
                Ingress::Tick(tick) => dispatcher.tick(tick).await,
                Ingress::Register(strategy) => dispatcher.add(strategy).await,
                Ingress::Unregister { strategy_id, ack } => {
                    dispatcher.remove(strategy_id, ack).await
                }
                Ingress::Flush(ack) => {
                    dispatcher.flush().await;
                    let _ = ack.send(());
                }
            }
        }

        dispatcher.drain().await;

        *self.state.write().await = EngineState::Stopped;
        let metrics = self.ledger.lock().await.global();
        info!(
            total_trades = metrics.total_trades,
            net_pnl = metrics.net_pnl,
            failed_evaluations = metrics.failed_evaluations,
            "Engine stopped"
        );
        let _ = self.done_tx.send(true);
    }
}

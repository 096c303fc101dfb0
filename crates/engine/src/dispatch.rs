//! Routing from the ingress queue to worker shards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use common::Tick;
use strategy::Strategy;

use crate::ledger::Ledger;
use crate::worker::{Worker, WorkerMessage};

/// Per-shard channel depth. Backpressure from a slow shard reaches the
/// ingress queue and, from there, the producer.
const WORKER_QUEUE_CAPACITY: usize = 1024;

pub(crate) struct Dispatcher {
    shards: Vec<mpsc::Sender<WorkerMessage>>,
    handles: Vec<JoinHandle<()>>,
    /// strategy id → (coin, shard)
    placements: HashMap<String, (String, usize)>,
    /// coin → shard → number of strategies for that coin on the shard
    coin_shards: HashMap<String, BTreeMap<usize, usize>>,
    next_shard: usize,
}

impl Dispatcher {
    /// Spawn `workers` shard tasks sharing one ledger.
    pub(crate) fn spawn(workers: usize, ledger: Arc<Mutex<Ledger>>) -> Self {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
            handles.push(tokio::spawn(Worker::new(index, rx, ledger.clone()).run()));
            shards.push(tx);
        }

        Self {
            shards,
            handles,
            placements: HashMap::new(),
            coin_shards: HashMap::new(),
            next_shard: 0,
        }
    }

    /// Fan one tick out to every shard holding a strategy for its coin.
    pub(crate) async fn tick(&self, tick: Tick) {
        let Some(targets) = self.coin_shards.get(&tick.coin) else {
            return;
        };
        let tick = Arc::new(tick);
        for &shard in targets.keys() {
            self.send(shard, WorkerMessage::Tick(tick.clone())).await;
        }
    }

    /// Place a strategy on the next shard, round-robin.
    pub(crate) async fn add(&mut self, strategy: Box<dyn Strategy>) {
        let id = strategy.id();
        let coin = strategy.coin().to_string();
        let shard = self.next_shard;
        self.next_shard = (self.next_shard + 1) % self.shards.len();

        *self
            .coin_shards
            .entry(coin.clone())
            .or_default()
            .entry(shard)
            .or_default() += 1;
        self.placements.insert(id.clone(), (coin, shard));

        debug!(strategy_id = %id, shard, "Strategy placed");
        self.send(shard, WorkerMessage::Add(strategy)).await;
    }

    /// Remove a strategy from its shard. `ack` fires once the shard has
    /// dropped it and closed its ledger row.
    pub(crate) async fn remove(&mut self, strategy_id: String, ack: oneshot::Sender<()>) {
        let Some((coin, shard)) = self.placements.remove(&strategy_id) else {
            let _ = ack.send(());
            return;
        };

        if let Some(shards) = self.coin_shards.get_mut(&coin) {
            if let Some(count) = shards.get_mut(&shard) {
                *count -= 1;
                if *count == 0 {
                    shards.remove(&shard);
                }
            }
            if shards.is_empty() {
                self.coin_shards.remove(&coin);
            }
        }

        self.send(shard, WorkerMessage::Remove { strategy_id, ack }).await;
    }

    /// Resolves once every shard has applied everything sent before it.
    pub(crate) async fn flush(&self) {
        let mut pending = Vec::with_capacity(self.shards.len());
        for shard in 0..self.shards.len() {
            let (tx, rx) = oneshot::channel();
            self.send(shard, WorkerMessage::Flush(tx)).await;
            pending.push(rx);
        }
        for rx in pending {
            let _ = rx.await;
        }
    }

    /// Close every shard channel and wait for the shards to finish their
    /// queued work.
    pub(crate) async fn drain(self) {
        drop(self.shards);
        for (index, handle) in self.handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker = index, error = %e, "Worker task failed");
            }
        }
    }

    async fn send(&self, shard: usize, msg: WorkerMessage) {
        if self.shards[shard].send(msg).await.is_err() {
            error!(worker = shard, "Worker channel closed, message dropped");
        }
    }
}

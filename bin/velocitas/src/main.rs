use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use backtest::{BacktestRunner, RankMetric};
use common::{Config, Error, RunMode};
use engine::{Engine, EngineHandle};
use feed::SyntheticFeed;
use strategy::{catalog, StrategyFileConfig};

/// How often live mode logs a metrics snapshot.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(
        mode = %cfg.run_mode,
        workers = cfg.engine.workers,
        queue_capacity = cfg.engine.queue_capacity,
        "Velocitas starting"
    );

    for entry in catalog::describe() {
        debug!(
            kind = %entry.name,
            description = entry.description,
            defaults = ?entry.defaults,
            "Catalog entry"
        );
    }

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    info!(
        path = %cfg.strategy_config_path,
        strategies = strategy_file.strategies.len(),
        "Strategy config loaded"
    );

    match cfg.run_mode {
        RunMode::Live => run_live(&cfg, &strategy_file).await,
        RunMode::Backtest => run_backtest(&cfg, &strategy_file).await,
    }
}

// ─── Live (synthetic feed) ────────────────────────────────────────────────────

async fn run_live(cfg: &Config, strategy_file: &StrategyFileConfig) -> anyhow::Result<()> {
    let handle = Engine::start(cfg.engine.clone());
    for strategy_cfg in &strategy_file.strategies {
        handle
            .register(strategy_cfg)
            .await
            .with_context(|| format!("registering {} on {}", strategy_cfg.kind, strategy_cfg.coin))?;
    }

    let start = chrono::Utc::now().timestamp() as f64;
    let step_secs = cfg.synthetic_interval_ms as f64 / 1_000.0;
    let mut feed = SyntheticFeed::new(cfg.synthetic_seed, cfg.synthetic_coins.clone())
        .with_clock(start, step_secs);
    // 0 runs until Ctrl-C.
    let limit = match cfg.synthetic_ticks {
        0 => usize::MAX,
        n => n,
    };

    let mut pace = tokio::time::interval(Duration::from_millis(cfg.synthetic_interval_ms.max(1)));
    let mut report = tokio::time::interval(REPORT_INTERVAL);
    let mut submitted = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(seed = cfg.synthetic_seed, coins = ?cfg.synthetic_coins, "Synthetic feed started");

    while submitted < limit {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            _ = report.tick() => log_snapshot(&handle).await,
            _ = pace.tick() => {
                let Some(tick) = feed.next() else { break };
                match handle.submit_tick(tick).await {
                    Ok(()) => submitted += 1,
                    Err(Error::QueueFull { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    handle.shutdown().await;
    info!(submitted, "Feed stopped");
    log_snapshot(&handle).await;

    let rows = handle.strategy_metrics(None).await;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

async fn log_snapshot(handle: &EngineHandle) {
    let m = handle.metrics().await;
    info!(
        state = %handle.state().await,
        trades = m.total_trades,
        net_pnl = m.net_pnl,
        win_rate = m.win_rate,
        strategies = m.active_strategies,
        coins = m.active_coins,
        failed = m.failed_evaluations,
        "Engine metrics"
    );
}

// ─── Backtest (CSV history) ───────────────────────────────────────────────────

async fn run_backtest(cfg: &Config, strategy_file: &StrategyFileConfig) -> anyhow::Result<()> {
    let path = cfg
        .backtest_csv_path
        .as_deref()
        .context("BACKTEST_CSV_PATH must be set in backtest mode")?;
    let metric: RankMetric = cfg.rank_metric.parse()?;
    let ticks = feed::load_ticks(path)?;

    let mut runner = BacktestRunner::new(cfg.engine.clone());
    if let Some(coins) = &cfg.backtest_coins {
        runner = runner.with_coins(coins.iter().cloned());
    }
    runner.run(ticks, &strategy_file.strategies).await?;

    for result in runner.results() {
        debug!(
            strategy_id = %result.strategy_id(),
            trades = result.trades.len(),
            max_drawdown = result.metrics.max_drawdown,
            profit_factor = result.profit_factor,
            "Backtest result"
        );
    }

    for (position, (strategy_id, value)) in runner.rank(metric).into_iter().enumerate() {
        info!(rank = position + 1, strategy_id = %strategy_id, metric = %metric, value, "Ranking");
    }
    match runner.best_combo() {
        Some(best) => info!(
            strategy_id = %best.strategy_id,
            coin = %best.coin,
            net_pnl = best.net_pnl,
            "Best combination"
        ),
        None => warn!("No strategies produced results"),
    }

    println!("{}", serde_json::to_string_pretty(&runner.report())?);
    Ok(())
}

//! Historical ticks from CSV.
//!
//! Expected header: `coin,price,volume[,timestamp][,bid][,ask]`. Rows
//! without a timestamp are stamped with their zero-based row index.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use common::{Error, Result, Tick};

#[derive(Debug, Deserialize)]
struct TickRow {
    coin: String,
    price: f64,
    volume: f64,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
}

/// Parse ticks from any reader, in file order.
pub fn read_ticks<R: Read>(reader: R) -> Result<Vec<Tick>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ticks = Vec::new();

    for (index, row) in rdr.deserialize::<TickRow>().enumerate() {
        // +2: one-based, after the header line
        let line = index + 2;
        let row = row.map_err(|e| Error::Feed(format!("line {line}: {e}")))?;
        let tick = Tick {
            coin: row.coin,
            price: row.price,
            volume: row.volume,
            timestamp: row.timestamp.unwrap_or(index as f64),
            bid: row.bid,
            ask: row.ask,
        };
        tick.validate()
            .map_err(|e| Error::Feed(format!("line {line}: {e}")))?;
        ticks.push(tick);
    }

    Ok(ticks)
}

/// Load ticks from a CSV file.
pub fn load_ticks(path: impl AsRef<Path>) -> Result<Vec<Tick>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Feed(format!("failed to open {}: {e}", path.display())))?;
    let ticks = read_ticks(std::io::BufReader::new(file))?;
    info!(path = %path.display(), ticks = ticks.len(), "Loaded historical ticks");
    Ok(ticks)
}

//! Tick sources: historical CSV files and a seeded synthetic generator.

pub mod csv_loader;
pub mod synthetic;

pub use csv_loader::{load_ticks, read_ticks};
pub use synthetic::SyntheticFeed;

//! Headless battle runner for bots and CI verification.
//!
//! This crate drives the simulation without any UI. It provides:
//!
//! - **Bot play**: A controller plays over JSON lines on stdin/stdout
//! - **Balance batches**: Scripted strategies play many seeds in parallel
//! - **Determinism checks**: Same seed, same hash, every run
//! - **Replay verification**: Recorded games reproduce their final hash
//! - **Catalog validation**: Balance files are checked before use
//! - **File-backed progress**: Coins and abilities persist between runs
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Requests from the controller (move, ability, end_turn, ...)
//! - **stdout**: Responses and state (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See the [`protocol`] module for every request and response.
//!
//! # Example
//!
//! ```bash
//! # Play interactively
//! echo '{"cmd":"query"}' | cargo run -p dragon_headless -- play --seed 7
//!
//! # Balance batch
//! cargo run -p dragon_headless -- batch --difficulty legend --count 1000 --strategy cautious
//!
//! # Verify a recorded game
//! cargo run -p dragon_headless -- replay --file game.replay
//! ```

pub mod batch;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod store;
pub mod strategies;
pub mod validate;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, VerifyReport};
pub use error::HeadlessError;
pub use metrics::{BatchSummary, GameMetrics};
pub use protocol::{Request, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use store::JsonFileStore;
pub use strategies::Strategy;
pub use validate::{validate_catalog_file, CatalogReport};

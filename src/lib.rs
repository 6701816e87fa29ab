//! Minimum-box packing plans for four fixed item sizes.
//!
//! A plan ships every unit of an inventory in as few boxes as possible,
//! choosing from a fixed catalog of box templates and packing whatever
//! remains into single-size partial boxes.

pub mod api;
pub mod catalog;
pub mod config;
pub mod export;
pub mod ingest;
pub mod model;
pub mod optimizer;
pub mod stack;
pub mod types;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "box_planner=info";

/// Installs the global tracing subscriber.
///
/// Safe to call multiple times. Honors `RUST_LOG`, e.g.
/// `RUST_LOG=box_planner=debug` to see catalog generation and search statistics.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    });
}

//! In-process crowd reading generator.
//!
//! Produces plausible counts for a random configured zone at a jittered
//! interval and feeds them through the ingestion gateway, exactly like an
//! external camera pipeline would.

use crate::config::SimulatorConfig;
use crate::gateway::IngestionGateway;
use chrono::{Local, Timelike};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, Duration};

const JITTER: i64 = 30;

/// Base count range for an hour of the day.
fn base_range(hour: u32) -> (i64, i64) {
    match hour {
        6..=10 => (80, 200),
        11..=14 => (120, 280),
        15..=18 => (100, 250),
        19..=22 => (60, 180),
        _ => (10, 50),
    }
}

/// Draws a count for `hour`: the hour's base band plus jitter, never negative.
pub fn plausible_count<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> i64 {
    let (low, high) = base_range(hour);
    let base = rng.gen_range(low..=high);
    (base + rng.gen_range(-JITTER..=JITTER)).max(0)
}

/// Runs the generator until the process exits.
///
/// Returns immediately if no zones are configured.
pub async fn start_simulator(gateway: IngestionGateway, config: SimulatorConfig) {
    if config.zones.is_empty() {
        tracing::warn!("simulator disabled (no zones configured)");
        return;
    }

    let min_ms = config.min_interval_ms.max(1);
    let max_ms = config.max_interval_ms.max(min_ms);
    let mut rng = StdRng::from_entropy();

    tracing::info!(
        zones = config.zones.len(),
        min_interval_ms = min_ms,
        max_interval_ms = max_ms,
        "starting crowd simulator"
    );

    loop {
        let Some(zone) = config.zones.choose(&mut rng) else {
            return;
        };
        let count = plausible_count(Local::now().hour(), &mut rng);

        match gateway.ingest(zone, count).await {
            Ok(update) => {
                tracing::debug!(zone = %update.zone, count = update.count, "simulated reading ingested");
            }
            Err(e) => {
                tracing::error!(zone = %zone, "simulated reading rejected: {}", e);
            }
        }

        sleep(Duration::from_millis(rng.gen_range(min_ms..=max_ms))).await;
    }
}

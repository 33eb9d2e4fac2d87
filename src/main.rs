/*!
 * Tiered Heap - Demo Entry Point
 *
 * Bootstraps a heap from a JSON configuration file (first argument) or the
 * embedded board preset, runs a mixed small/large workload and prints the
 * resulting snapshot as JSON.
 */

use anyhow::{Context, Result};
use tracing::{info, warn};

use tiered_heap::{
    init_tracing, span_operation, AllocFlags, HeapConfig, HeapInfo, SharedHeap, TieredHeap,
};

fn main() -> Result<()> {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => HeapConfig::from_file(&path)
            .with_context(|| format!("loading heap configuration from {}", path))?,
        None => HeapConfig::embedded(),
    }
    .with_env_overrides()
    .context("applying environment overrides")?;

    info!(
        regions = config.regions.len(),
        large_object_threshold = config.policy.large_object_threshold,
        "Bootstrapping tiered heap"
    );
    let heap = SharedHeap::new(TieredHeap::from_config(&config)?);

    let large = config.policy.large_object_threshold;
    let mut live = Vec::new();
    for round in 0..32usize {
        let size = if round % 4 == 0 { large + round * 512 } else { 24 + round * 8 };
        let span = span_operation("allocate");
        let _entered = span.enter();
        span.record_size(size);
        match heap.allocate(size, AllocFlags::NONE) {
            Ok(address) => {
                span.record_address(address);
                span.record_result(true);
                heap.write_bytes(address, &round.to_le_bytes())?;
                live.push(address);
            }
            Err(e) => {
                span.record_error(&e);
                warn!(size, error = %e, "Allocation failed");
            }
        }
    }

    // Release every other allocation to leave fragmentation behind
    for address in live.iter().step_by(2) {
        let span = span_operation("free");
        span.record_address(*address);
        heap.free(*address)?;
        span.record_result(true);
    }

    if let Some(&address) = live.get(1) {
        let span = span_operation("realloc");
        let moved = heap.realloc(address, large * 2, true)?;
        span.record_address(moved);
        span.record_result(true);
    }

    heap.validate().context("heap validation after workload")?;
    info!(pressure = ?heap.pressure(), "Workload finished");
    let snapshot = heap.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

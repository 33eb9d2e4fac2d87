/*!
 * Heap Tracing
 * Structured tracing for heap operations using the tracing crate
 *
 * Features:
 * - Compact human-readable or JSON-formatted output
 * - Per-operation spans with sequence ids for correlation
 * - Slow-operation warnings with durations embedded in traces
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable switching output to JSON
pub const ENV_TRACE_JSON: &str = "HEAP_TRACE_JSON";

/// Operations slower than this are reported at warn level
const SLOW_OPERATION_US: u128 = 1_000;

static NEXT_SPAN_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - HEAP_TRACE_JSON: Enable JSON output (default: false)
///
/// Installing a second subscriber is a no-op, so tests may call this freely.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Heap tracing initialized");
    }
}

/// Span covering one heap operation
pub struct HeapSpan {
    span: Span,
    start: Instant,
    id: u64,
    operation: &'static str,
}

impl HeapSpan {
    pub fn new(operation: &'static str) -> Self {
        let id = NEXT_SPAN_ID.fetch_add(1, Ordering::Relaxed);
        let span = span!(
            Level::DEBUG,
            "heap_op",
            span_id = id,
            operation = operation,
            size = tracing::field::Empty,
            address = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            id,
            operation,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn record_size(&self, size: usize) {
        self.span.record("size", size);
    }

    pub fn record_address(&self, address: usize) {
        self.span
            .record("address", tracing::field::display(format_args!("0x{:x}", address)));
    }

    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    pub fn record_error(&self, error: &dyn std::fmt::Display) {
        self.span.record("error", tracing::field::display(error));
        self.span.record("result", "error");
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for HeapSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_micros();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration);

        if duration > SLOW_OPERATION_US {
            warn!(
                span_id = self.id,
                operation = self.operation,
                duration_us = duration,
                slow = true,
                "slow heap operation"
            );
        } else {
            debug!(
                span_id = self.id,
                operation = self.operation,
                duration_us = duration,
                "heap operation completed"
            );
        }
    }
}

/// Helper to create a heap operation span
#[inline]
pub fn span_operation(operation: &'static str) -> HeapSpan {
    HeapSpan::new(operation)
}

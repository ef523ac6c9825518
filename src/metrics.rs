// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Loop --------
pub static PASSES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("passes_total", "completed round-robin passes").unwrap());

pub static TICKS_BY_INSTRUMENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticks_total_by_instrument", "worker ticks per instrument"),
        &["instrument"],
    )
    .unwrap()
});

pub static TICK_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tick_errors_total",
            "failed ticks (labels: instrument, class = settlement|other)",
        ),
        &["instrument", "class"],
    )
    .unwrap()
});

// -------- Orders --------
pub static ORDERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_posted_total", "limit orders posted"),
        &["instrument", "side"],
    )
    .unwrap()
});

pub static CANCELS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_canceled_total", "orders canceled on price drift"),
        &["instrument"],
    )
    .unwrap()
});

// -------- State & PnL --------
pub static PHASE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("worker_phase", "0 = idle, 1 = buying, 2 = selling"),
        &["instrument"],
    )
    .unwrap()
});

pub static INVENTORY: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("inventory_qty", "executed qty of the tracked order"),
        &["instrument"],
    )
    .unwrap()
});

pub static PNL_REALIZED: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("pnl_realized", "aggregate realized profit").unwrap());

pub static CYCLES_REALIZED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("cycles_realized_total", "completed buy -> sell cycles").unwrap());

// ---- Config visibility ----
pub static CONFIG_VENUE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_venue_mode", "venue mode (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_INSTRUMENT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_instrument", "configured instruments (label: instrument)"),
        &["instrument"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(PASSES.clone())),
        REGISTRY.register(Box::new(TICKS_BY_INSTRUMENT.clone())),
        REGISTRY.register(Box::new(TICK_ERRORS.clone())),
        REGISTRY.register(Box::new(ORDERS.clone())),
        REGISTRY.register(Box::new(CANCELS.clone())),
        REGISTRY.register(Box::new(PHASE.clone())),
        REGISTRY.register(Box::new(INVENTORY.clone())),
        REGISTRY.register(Box::new(PNL_REALIZED.clone())),
        REGISTRY.register(Box::new(CYCLES_REALIZED.clone())),
        REGISTRY.register(Box::new(CONFIG_VENUE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_INSTRUMENT.clone())),
    ] {
        if let Err(e) = m {
            error!(?e, "metric registration failed");
        }
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                error!(%addr, ?e, "metrics bind failed, metrics disabled");
                return;
            }
        };
        info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => error!(?e, "metrics accept error"),
            }
        }
    });
}

// ===============================
// src/main.rs
// ===============================
/*
 # paper venue, 3 pass lalu berhenti
 INSTRUMENTS=BTCUSDT,ETHUSDT ORDER_SIZES=0.001,0.01 cargo run -- --max-passes 3

 # metrics
 curl -s localhost:9898/metrics | egrep '^(worker_phase|pnl_realized|orders_posted_total)'
*/
/*
=============================================================================
Project : pingpong_bot_rust — single-sided buy/sell quoting loop in Rust
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Per instrument rests a GTC buy at best bid, flips to a GTC sell at
          best ask once filled, re-quotes on top-of-book drift and sums
          realized profit per completed cycle. Paper or Binance Spot venue,
          Prometheus metrics, JSONL event recording.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod domain;
mod config;
mod metrics;
mod recorder;
mod venue;
mod binance;          // helper (signer/models) for Binance REST
mod gateway;          // paper venue (simulated book + fills)
mod gateway_binance;  // real Binance Spot (REST, polled)
mod worker;
mod orchestrator;
mod dashboard;

use clap::Parser;
use std::sync::Arc;
use tokio::{select, sync::mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::VenueMode;
use crate::domain::Event;
use crate::orchestrator::Orchestrator;
use crate::venue::VenueClient;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Load config ----
    let cli = config::Cli::parse();
    let args = match config::load(&cli) {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    info!(
        venue_mode = args.venue_mode.as_str(),
        instruments = ?args.instruments.iter().map(|i| i.instrument_id.as_str()).collect::<Vec<_>>(),
        poll_ms = args.loop_cfg.poll_interval.as_millis() as u64,
        tick_delay_ms = args.loop_cfg.tick_delay.as_millis() as u64,
        max_passes = args.max_passes,
        "startup config"
    );

    // ---- Metrics ----
    metrics::init();
    if args.metrics_port != 0 {
        metrics::serve_metrics(args.metrics_port);
    }
    crate::metrics::CONFIG_VENUE_MODE
        .with_label_values(&[args.venue_mode.as_str()])
        .set(1);
    for ic in &args.instruments {
        crate::metrics::CONFIG_INSTRUMENT.with_label_values(&[&ic.instrument_id]).set(1);
    }

    // ---- Venue ----
    let venue: Arc<dyn VenueClient> = match args.venue_mode {
        VenueMode::Paper => {
            let seed = chrono::Utc::now().timestamp_millis() as u64;
            Arc::new(gateway::PaperVenue::new(gateway::PaperCfg::default(), seed))
        }
        VenueMode::BinanceTestnet | VenueMode::BinanceMainnet => {
            match gateway_binance::BinanceVenue::new(
                &args.binance_rest_url,
                args.api_key.clone(),
                args.api_secret.clone(),
                args.recv_window,
                args.depth_limit,
            ) {
                Ok(v) => Arc::new(v),
                Err(e) => {
                    error!(error = %e, "binance venue init failed");
                    std::process::exit(2);
                }
            }
        }
    };
    info!(venue = venue.name(), rest = %args.binance_rest_url, "venue ready");

    // ---- Orchestrator (+ recorder optional) ----
    let mut orch = Orchestrator::new(args.loop_cfg.clone(), args.instruments.clone(), venue);
    if let Some(path) = args.record_file.clone() {
        let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);
        tokio::spawn(recorder::run(rec_rx, path));
        orch = orch.with_recorder(rec_tx);
    }

    // ---- Main loop sampai Ctrl-C / max passes ----
    select! {
        _ = orch.run(args.max_passes) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, open orders are left on the venue");
        }
    }
    info!(
        passes = orch.passes(),
        realized_profit = orch.realized_profit(),
        "stopped"
    );
}

// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : pingpong_bot_rust — single-sided buy/sell quoting loop in Rust
Module  : config.rs
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
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::domain::InstrumentConfig;
use crate::orchestrator::LoopConfig;

/// Flag CLI (override ENV / .env)
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pingpong_bot_rust", version, about = "Single-sided buy -> sell quoting loop")]
pub struct Cli {
    /// Path .env alternatif (default: ./.env kalau ada)
    #[arg(long)]
    pub env_file: Option<PathBuf>,
    /// Berhenti setelah N pass (0 = jalan terus)
    #[arg(long, default_value_t = 0)]
    pub max_passes: u64,
    /// Override VENUE_MODE
    #[arg(long, value_enum)]
    pub venue: Option<VenueMode>,
}

/// Venue tempat order dikirim
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VenueMode {
    #[value(name = "paper", alias = "mock")]
    Paper,
    #[value(name = "binance_testnet", alias = "binance_sandbox")]
    BinanceTestnet,
    #[value(name = "binance_mainnet", alias = "binance")]
    BinanceMainnet,
}

impl VenueMode {
    /// VENUE_MODE dari env, nama & alias sama dengan flag `--venue`.
    pub fn parse(s: &str) -> Option<Self> {
        <VenueMode as ValueEnum>::from_str(s.trim(), true).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueMode::Paper => "paper",
            VenueMode::BinanceTestnet => "binance_testnet",
            VenueMode::BinanceMainnet => "binance_mainnet",
        }
    }

    pub fn default_rest_url(&self) -> &'static str {
        match self {
            VenueMode::Paper          => "https://testnet.binance.vision", // tidak dipakai saat paper
            VenueMode::BinanceTestnet => "https://testnet.binance.vision",
            VenueMode::BinanceMainnet => "https://api.binance.com",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("INSTRUMENTS is empty")]
    NoInstruments,
    #[error("{key}: cannot parse {value:?}")]
    Invalid { key: String, value: String },
    #[error("order size for {instrument} must be finite and > 0 (got {size})")]
    BadOrderSize { instrument: String, size: f64 },
    #[error("unknown venue mode {0:?}")]
    UnknownVenue(String),
    #[error("BINANCE_API_KEY / BINANCE_API_SECRET required for {0}")]
    MissingCredentials(&'static str),
}

#[derive(Clone, Debug)]
pub struct Args {
    pub instruments: Vec<InstrumentConfig>,
    pub loop_cfg: LoopConfig,
    pub max_passes: u64,

    // venue
    pub venue_mode: VenueMode,
    pub binance_rest_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub recv_window: u64,
    pub depth_limit: u32,

    // files/metrics
    pub record_file: Option<String>,
    pub metrics_port: u16,
}

/// Baca .env + ENV proses sekali di startup.
pub fn load(cli: &Cli) -> Result<Args, ConfigError> {
    match &cli.env_file {
        Some(p) => { let _ = dotenvy::from_path(p); }
        None => { let _ = dotenvy::dotenv(); }
    }
    load_from(cli, |k| env::var(k).ok())
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| s.split(',').map(|x| x.trim().to_string()).collect())
        .unwrap_or_default()
}

fn parse_or<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key: key.to_string(), value: v }),
        None => Ok(default),
    }
}

pub fn load_from(cli: &Cli, get: impl Fn(&str) -> Option<String>) -> Result<Args, ConfigError> {
    // ===== Instruments =====
    // INSTRUMENTS=BTCUSDT,ETHUSDT ; DISPLAY_SYMBOLS=BTC,ETH ; ORDER_SIZES=0.001,0.01
    let mut ids: Vec<String> = Vec::new();
    for id in split_list(get("INSTRUMENTS")) {
        let id = id.to_ascii_uppercase();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ConfigError::NoInstruments);
    }
    let symbols = split_list(get("DISPLAY_SYMBOLS"));
    let sizes = split_list(get("ORDER_SIZES"));
    let default_size: f64 = parse_or(&get, "ORDER_SIZE", 10.0)?;

    let mut instruments = Vec::with_capacity(ids.len());
    for (i, id) in ids.into_iter().enumerate() {
        let order_size = match sizes.get(i).filter(|s| !s.is_empty()) {
            Some(s) => s.parse::<f64>().map_err(|_| ConfigError::Invalid { key: "ORDER_SIZES".into(), value: s.clone() })?,
            None => default_size,
        };
        if !order_size.is_finite() || order_size <= 0.0 {
            return Err(ConfigError::BadOrderSize { instrument: id, size: order_size });
        }
        let symbol = symbols.get(i).filter(|s| !s.is_empty()).cloned();
        instruments.push(InstrumentConfig { instrument_id: id, order_size, symbol });
    }

    // ===== Loop timing =====
    let loop_cfg = LoopConfig {
        poll_interval: Duration::from_millis(parse_or(&get, "POLL_INTERVAL_MS", 5_000)?),
        tick_delay: Duration::from_millis(parse_or(&get, "TICK_DELAY_MS", 250)?),
    };

    // ===== Venue =====
    let venue_mode = match cli.venue {
        Some(m) => m,
        None => {
            let raw = get("VENUE_MODE").unwrap_or_else(|| "paper".into());
            VenueMode::parse(&raw).ok_or(ConfigError::UnknownVenue(raw))?
        }
    };
    let binance_rest_url = get("BINANCE_REST_URL").unwrap_or_else(|| venue_mode.default_rest_url().to_string());
    let api_key = get("BINANCE_API_KEY").unwrap_or_default();
    let api_secret = get("BINANCE_API_SECRET").unwrap_or_default();
    if venue_mode != VenueMode::Paper && (api_key.is_empty() || api_secret.is_empty()) {
        return Err(ConfigError::MissingCredentials(venue_mode.as_str()));
    }

    Ok(Args {
        instruments,
        loop_cfg,
        max_passes: cli.max_passes,
        venue_mode,
        binance_rest_url,
        api_key,
        api_secret,
        recv_window: parse_or(&get, "BINANCE_RECV_WINDOW", 5_000)?,
        depth_limit: parse_or(&get, "DEPTH_LIMIT", 5)?,
        record_file: get("RECORD_FILE").filter(|s| !s.trim().is_empty()),
        metrics_port: parse_or(&get, "METRICS_PORT", 9898)?,
    })
}

// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side {
    pub fn as_str(&self) -> &'static str { match self { Side::Buy => "BUY", Side::Sell => "SELL" } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
}
impl TimeInForce {
    pub fn as_str(&self) -> &'static str { match self { TimeInForce::Gtc => "GTC" } }
}

/// Phase of the per-instrument state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Buying,
    Selling,
}
impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self { Phase::Idle => "IDLE", Phase::Buying => "BUYING", Phase::Selling => "SELLING" }
    }
    /// Numeric value for the phase gauge.
    pub fn code(&self) -> i64 { match self { Phase::Idle => 0, Phase::Buying => 1, Phase::Selling => 2 } }
}

/// Remote order status (Binance naming). Unknown values map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    PendingCancel,
    Canceled,
    Rejected,
    Expired,
    #[serde(other)]
    Other,
}
impl OrderStatus {
    pub fn is_filled(&self) -> bool { matches!(self, OrderStatus::Filled) }
    /// Closed on the venue without being fully filled.
    pub fn is_closed_unfilled(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired)
    }
}

// ---- Order book ----
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel { pub price: String, #[serde(default)] pub size: String }
impl PriceLevel {
    pub fn new(price: impl Into<String>) -> Self { Self { price: price.into(), size: String::new() } }

    /// Parsed price, only if finite and strictly positive.
    fn valid_price(&self) -> Option<f64> {
        self.price.trim().parse::<f64>().ok().filter(|p| p.is_finite() && *p > 0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot { pub bids: Vec<PriceLevel>, pub asks: Vec<PriceLevel> }
impl OrderBookSnapshot {
    /// Highest valid bid, 0 when none.
    pub fn best_bid(&self) -> f64 {
        self.bids.iter().filter_map(PriceLevel::valid_price).fold(0.0, f64::max)
    }
    /// Lowest valid ask, 0 when none.
    pub fn best_ask(&self) -> f64 {
        self.asks
            .iter()
            .filter_map(PriceLevel::valid_price)
            .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.min(p))))
            .unwrap_or(0.0)
    }
}

// ---- Orders ----
/// Order descriptor produced by `create_limit_order`, submitted by `post_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_id: String,
    pub instrument_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub tif: TimeInForce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedOrder { pub order_id: String }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub order_id: String,
    pub side: Side,
    pub price: f64,
    pub orig_qty: f64,
    pub executed_qty: f64,
    pub status: OrderStatus,
}
impl RemoteOrder {
    pub fn remaining_qty(&self) -> f64 { (self.orig_qty - self.executed_qty).max(0.0) }
}

// ---- Instruments ----
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig { pub instrument_id: String, pub order_size: f64, pub symbol: Option<String> }

/// Read-only view of one worker for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub instrument_id: String,
    pub symbol: Option<String>,
    pub phase: Phase,
    pub best_bid: f64,
    pub best_ask: f64,
    pub inventory: f64,
    pub active_order: Option<String>,
    pub note: String,
}
impl WorkerSnapshot {
    pub fn label(&self) -> &str { self.symbol.as_deref().unwrap_or(&self.instrument_id) }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// Best bid or ask indeterminate, nothing done.
    NoBook,
    /// Active order still resting at the target price (or no order tracked).
    Holding,
    Placed { side: Side, order_id: String, price: f64, size: f64 },
    /// Sell size worked out to zero, back to IDLE without an order.
    Flat,
    /// Sell fully filled; `profit` is None when no acquisition price was known.
    Closed { profit: Option<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Tick { ts_ms: i64, instrument_id: String, outcome: TickOutcome },
    Error { ts_ms: i64, instrument_id: String, message: String, settlement_pending: bool },
    Pass { ts_ms: i64, pass: u64, realized_profit: f64 },
}

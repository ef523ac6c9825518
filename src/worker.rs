// ===============================
// src/worker.rs (per-instrument buy -> sell state machine)
// ===============================
//
// Satu worker per instrument. Siklus:
//   IDLE    -> pasang BUY di best bid (size dari config)
//   BUYING  -> pantau order: FILLED -> SELL di best ask, drift -> cancel & requote
//   SELLING -> pantau order: FILLED -> realisasi profit -> IDLE, drift -> requote
//
// Retry policy: tick yang gagal tidak mengubah state selain yang sudah
// di-commit oleh venue. Kalau cancel sukses tapi order pengganti gagal,
// pengganti disimpan sebagai `pending` dan dicoba lagi di tick berikutnya
// (pakai harga terbaru) sebelum keputusan lain.
//
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    InstrumentConfig, OrderBookSnapshot, Phase, RemoteOrder, Side, TickOutcome, TimeInForce,
    WorkerSnapshot,
};
use crate::metrics::{CANCELS, INVENTORY, ORDERS, PHASE, TICKS_BY_INSTRUMENT};
use crate::venue::{VenueClient, VenueError};

const SETTLEMENT_NOTE: &str = "waiting for settlement";

/// Replacement order owed after a successful cancel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Requote {
    Buy { size: f64 },
    Sell { size: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeState {
    pub phase: Phase,
    pub active_order: Option<String>,
    /// Executed qty of the tracked order (mirror, not a ledger).
    pub inventory: f64,
    pub entry_price: Option<f64>,
    pub pending: Option<Requote>,
    pub note: String,
}

pub struct InstrumentWorker {
    cfg: InstrumentConfig,
    venue: Arc<dyn VenueClient>,
    state: RuntimeState,
    best_bid: f64,
    best_ask: f64,
}

impl InstrumentWorker {
    pub fn new(cfg: InstrumentConfig, venue: Arc<dyn VenueClient>) -> Self {
        Self { cfg, venue, state: RuntimeState::default(), best_bid: 0.0, best_ask: 0.0 }
    }

    pub fn instrument_id(&self) -> &str { &self.cfg.instrument_id }

    #[cfg(test)]
    pub fn state(&self) -> &RuntimeState { &self.state }

    pub async fn tick(&mut self) -> Result<TickOutcome, VenueError> {
        TICKS_BY_INSTRUMENT.with_label_values(&[&self.cfg.instrument_id]).inc();

        let book: OrderBookSnapshot = self.venue.get_order_book(&self.cfg.instrument_id).await?;
        self.best_bid = book.best_bid();
        self.best_ask = book.best_ask();
        if self.best_bid <= 0.0 || self.best_ask <= 0.0 {
            debug!(instrument = %self.cfg.instrument_id, bid = self.best_bid, ask = self.best_ask, "book indeterminate, skip");
            return Ok(TickOutcome::NoBook);
        }
        let (bid, ask) = (self.best_bid, self.best_ask);

        let outcome = if let Some(requote) = self.state.pending {
            self.requote(requote, bid, ask).await?
        } else {
            match self.state.phase {
                Phase::Idle => self.place_buy(bid, self.cfg.order_size).await?,
                Phase::Buying => self.monitor_order(bid, ask, Side::Buy).await?,
                Phase::Selling => self.monitor_order(bid, ask, Side::Sell).await?,
            }
        };
        self.publish_gauges();
        Ok(outcome)
    }

    async fn submit(&self, side: Side, price: f64, size: f64) -> Result<String, VenueError> {
        let id = self.cfg.instrument_id.as_str();
        let req = self.venue.create_limit_order(id, price, size, side, TimeInForce::Gtc).await?;
        let posted = self.venue.post_order(&req).await?;
        ORDERS.with_label_values(&[id, side.as_str()]).inc();
        info!(instrument = %id, order_id = %posted.order_id, side = side.as_str(), price, size, "order posted");
        Ok(posted.order_id)
    }

    async fn place_buy(&mut self, price: f64, size: f64) -> Result<TickOutcome, VenueError> {
        let order_id = self.submit(Side::Buy, price, size).await?;
        self.state.active_order = Some(order_id.clone());
        self.state.phase = Phase::Buying;
        self.state.pending = None;
        self.state.note = format!("buy {size} @ {price}");
        Ok(TickOutcome::Placed { side: Side::Buy, order_id, price, size })
    }

    /// `size = None` sells the whole inventory.
    async fn switch_to_selling(&mut self, price: f64, size: Option<f64>) -> Result<TickOutcome, VenueError> {
        let sell_size = size.unwrap_or(self.state.inventory);
        if sell_size.is_nan() || sell_size <= 0.0 {
            self.state.active_order = None;
            self.state.entry_price = None;
            self.state.phase = Phase::Idle;
            self.state.pending = None;
            self.state.note = "nothing to sell".to_string();
            return Ok(TickOutcome::Flat);
        }
        let order_id = self.submit(Side::Sell, price, sell_size).await?;
        self.state.active_order = Some(order_id.clone());
        self.state.phase = Phase::Selling;
        self.state.pending = None;
        self.state.note = format!("sell {sell_size} @ {price}");
        Ok(TickOutcome::Placed { side: Side::Sell, order_id, price, size: sell_size })
    }

    async fn requote(&mut self, requote: Requote, bid: f64, ask: f64) -> Result<TickOutcome, VenueError> {
        match requote {
            Requote::Buy { size } => self.place_buy(bid, size).await,
            Requote::Sell { size } => self.switch_to_selling(ask, Some(size)).await,
        }
    }

    async fn monitor_order(&mut self, bid: f64, ask: f64, side: Side) -> Result<TickOutcome, VenueError> {
        let Some(order_id) = self.state.active_order.clone() else {
            return Ok(TickOutcome::Holding);
        };
        let order: RemoteOrder = self.venue.get_order(&order_id, &self.cfg.instrument_id).await?;
        let target = match side { Side::Buy => bid, Side::Sell => ask };
        let executed = order.executed_qty;
        let remaining = order.remaining_qty();
        self.state.inventory = executed;

        if order.status.is_filled() {
            return match side {
                Side::Buy => {
                    self.state.entry_price = Some(order.price);
                    self.switch_to_selling(ask, None).await
                }
                Side::Sell => Ok(self.close_cycle(&order)),
            };
        }

        let closed = order.status.is_closed_unfilled();
        if !closed && !price_differs(order.price, target) {
            self.state.note = format!("resting {executed}/{} @ {}", order.orig_qty, order.price);
            return Ok(TickOutcome::Holding);
        }

        if !closed {
            self.venue.cancel_order(&order_id, &self.cfg.instrument_id).await?;
            CANCELS.with_label_values(&[&self.cfg.instrument_id]).inc();
        }
        info!(
            instrument = %self.cfg.instrument_id, order_id = %order_id, side = side.as_str(),
            resting = order.price, target, executed, status = ?order.status, "order replaced"
        );
        self.state.active_order = None;

        let requote = match side {
            Side::Buy if executed > 0.0 => {
                if self.state.entry_price.is_none() {
                    self.state.entry_price = Some(order.price);
                }
                Requote::Sell { size: self.state.inventory }
            }
            Side::Buy => Requote::Buy { size: self.cfg.order_size },
            // TODO: unwind `remaining` instead of re-entering the filled part as a buy once the flip policy is settled
            Side::Sell if executed > 0.0 => Requote::Buy { size: executed },
            Side::Sell => Requote::Sell { size: remaining },
        };
        self.state.pending = Some(requote);
        self.requote(requote, bid, ask).await
    }

    fn close_cycle(&mut self, order: &RemoteOrder) -> TickOutcome {
        let profit = self.state.entry_price.map(|entry| (order.price - entry) * order.executed_qty);
        match profit {
            Some(p) => info!(instrument = %self.cfg.instrument_id, order_id = %order.order_id, profit = p, "cycle closed"),
            None => warn!(instrument = %self.cfg.instrument_id, order_id = %order.order_id, "sell filled without entry price"),
        }
        self.state.inventory = 0.0;
        self.state.entry_price = None;
        self.state.active_order = None;
        self.state.pending = None;
        self.state.phase = Phase::Idle;
        self.state.note = match profit {
            Some(p) => format!("closed, pnl {p:.6}"),
            None => "closed".to_string(),
        };
        TickOutcome::Closed { profit }
    }

    /// Record a failed tick on the note. Phase, order and pending requote stay as they are.
    pub fn handle_error(&mut self, err: &VenueError) {
        if err.is_settlement_pending() {
            debug!(instrument = %self.cfg.instrument_id, error = %err, "settlement pending");
            self.state.note = SETTLEMENT_NOTE.to_string();
        } else {
            warn!(instrument = %self.cfg.instrument_id, error = %err, "tick failed");
            self.state.note = err.to_string();
        }
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            instrument_id: self.cfg.instrument_id.clone(),
            symbol: self.cfg.symbol.clone(),
            phase: self.state.phase,
            best_bid: self.best_bid,
            best_ask: self.best_ask,
            inventory: self.state.inventory,
            active_order: self.state.active_order.clone(),
            note: self.state.note.clone(),
        }
    }

    fn publish_gauges(&self) {
        PHASE.with_label_values(&[&self.cfg.instrument_id]).set(self.state.phase.code());
        INVENTORY.with_label_values(&[&self.cfg.instrument_id]).set(self.state.inventory);
    }
}

// Prices come from decimal strings, so equal quotes parse to the same f64.
fn price_differs(a: f64, b: f64) -> bool {
    (a - b).abs() > f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

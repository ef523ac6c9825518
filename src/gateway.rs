// ===============================
// src/gateway.rs (paper venue)
// ===============================
//
// Venue simulasi in-memory:
// - book: random walk dalam integer tick per instrument (spread tetap)
// - order: crossing terhadap sisi lawan -> FILLED langsung,
//          selain itu tiap query ada peluang partial fill acak (kelipatan lot)
// - order tertutup (FILLED/CANCELED) disimpan terbatas, yang paling lama dibuang
//
use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::{
    OrderBookSnapshot, OrderRequest, OrderStatus, PostedOrder, PriceLevel, RemoteOrder, Side, TimeInForce,
};
use crate::venue::{VenueClient, VenueError};

const LEVELS: i64 = 3;
/// Closed orders kept for re-query (a failed follow-up post re-reads the fill).
const RETAIN_CLOSED: usize = 256;

#[derive(Debug, Clone)]
pub struct PaperCfg {
    pub tick_size: f64,
    pub start_bid_ticks: i64,
    pub spread_ticks: i64,
    /// Max random step per book fetch, in ticks.
    pub max_step: i64,
    /// Chance that a resting order gets a (partial) fill on each query.
    pub fill_prob: f64,
    /// Partial fills are whole multiples of this quantity.
    pub lot_size: f64,
}

impl Default for PaperCfg {
    fn default() -> Self {
        Self { tick_size: 0.01, start_bid_ticks: 50, spread_ticks: 2, max_step: 1, fill_prob: 0.3, lot_size: 0.0001 }
    }
}

struct PaperState {
    rng: StdRng,
    bids: HashMap<String, i64>,
    orders: HashMap<String, (String, RemoteOrder)>,
    closed: VecDeque<String>,
    next_id: u64,
}

impl PaperState {
    fn retire(&mut self, order_id: &str) {
        self.closed.push_back(order_id.to_string());
        while self.closed.len() > RETAIN_CLOSED {
            if let Some(old) = self.closed.pop_front() {
                self.orders.remove(&old);
            }
        }
    }
}

pub struct PaperVenue {
    cfg: PaperCfg,
    state: Mutex<PaperState>,
}

impl PaperVenue {
    pub fn new(cfg: PaperCfg, seed: u64) -> Self {
        let state = PaperState {
            rng: StdRng::seed_from_u64(seed),
            bids: HashMap::new(),
            orders: HashMap::new(),
            closed: VecDeque::new(),
            next_id: 0,
        };
        Self { cfg, state: Mutex::new(state) }
    }

    fn px(&self, ticks: i64) -> f64 {
        // round-trip via string so book and order prices compare exactly
        format!("{:.8}", ticks as f64 * self.cfg.tick_size).parse().unwrap_or(0.0)
    }

    /// Next executed qty after a random partial fill: at least one lot, never past `orig_qty`.
    fn partial_fill(&self, executed: f64, orig_qty: f64, part: f64) -> f64 {
        let lot = self.cfg.lot_size;
        if !lot.is_finite() || lot <= 0.0 {
            return orig_qty;
        }
        let remaining_lots = ((orig_qty - executed) / lot - 1e-6).ceil().max(0.0) as i64;
        let fill_lots = ((remaining_lots as f64 * part).floor() as i64).max(1);
        if fill_lots >= remaining_lots {
            return orig_qty;
        }
        let done_lots = (executed / lot).round() as i64;
        format!("{:.8}", (done_lots + fill_lots) as f64 * lot).parse().unwrap_or(orig_qty).min(orig_qty)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, PaperState>, VenueError> {
        self.state.lock().map_err(|_| VenueError::InvalidResponse("paper venue poisoned".into()))
    }
}

#[async_trait]
impl VenueClient for PaperVenue {
    async fn get_order_book(&self, instrument_id: &str) -> Result<OrderBookSnapshot, VenueError> {
        let mut st = self.lock()?;
        let step = if self.cfg.max_step > 0 { st.rng.gen_range(-self.cfg.max_step..=self.cfg.max_step) } else { 0 };
        let bid = st.bids.entry(instrument_id.to_string()).or_insert(self.cfg.start_bid_ticks);
        *bid = (*bid + step).max(1);
        let bid = *bid;
        let ask = bid + self.cfg.spread_ticks.max(1);

        Ok(OrderBookSnapshot {
            bids: (0..LEVELS).filter(|i| bid - i > 0).map(|i| PriceLevel::new(self.px(bid - i).to_string())).collect(),
            asks: (0..LEVELS).map(|i| PriceLevel::new(self.px(ask + i).to_string())).collect(),
        })
    }

    async fn create_limit_order(
        &self,
        instrument_id: &str,
        price: f64,
        size: f64,
        side: Side,
        tif: TimeInForce,
    ) -> Result<OrderRequest, VenueError> {
        let n: u32 = self.lock()?.rng.gen();
        Ok(OrderRequest {
            client_id: format!("PAPER-{n:08x}"),
            instrument_id: instrument_id.to_string(),
            side,
            price,
            size,
            tif,
        })
    }

    async fn post_order(&self, order: &OrderRequest) -> Result<PostedOrder, VenueError> {
        let bad = |x: f64| x.is_nan() || x <= 0.0;
        if bad(order.price) || bad(order.size) {
            return Err(VenueError::Api { status: 400, code: -1013, msg: "Filter failure: LOT_SIZE".into() });
        }
        let mut st = self.lock()?;
        st.next_id += 1;
        let order_id = st.next_id.to_string();
        let remote = RemoteOrder {
            order_id: order_id.clone(),
            side: order.side,
            price: order.price,
            orig_qty: order.size,
            executed_qty: 0.0,
            status: OrderStatus::New,
        };
        st.orders.insert(order_id.clone(), (order.instrument_id.clone(), remote));
        Ok(PostedOrder { order_id })
    }

    async fn get_order(&self, order_id: &str, instrument_id: &str) -> Result<RemoteOrder, VenueError> {
        let mut st = self.lock()?;
        let bid_ticks = st.bids.get(instrument_id).copied().unwrap_or(self.cfg.start_bid_ticks);
        let (best_bid, best_ask) = (self.px(bid_ticks), self.px(bid_ticks + self.cfg.spread_ticks.max(1)));
        let roll: f64 = st.rng.gen();
        let part: f64 = st.rng.gen_range(0.2..=1.0);

        let (owner, o) = st.orders.get_mut(order_id).ok_or_else(|| VenueError::UnknownOrder(order_id.to_string()))?;
        if owner.as_str() != instrument_id {
            return Err(VenueError::UnknownOrder(order_id.to_string()));
        }
        let mut just_filled = false;
        if matches!(o.status, OrderStatus::New | OrderStatus::PartiallyFilled) {
            let crossed = match o.side { Side::Buy => o.price >= best_ask, Side::Sell => o.price <= best_bid };
            if crossed {
                o.executed_qty = o.orig_qty;
            } else if roll < self.cfg.fill_prob {
                o.executed_qty = self.partial_fill(o.executed_qty, o.orig_qty, part);
            }
            o.status = if o.executed_qty >= o.orig_qty {
                just_filled = true;
                OrderStatus::Filled
            } else if o.executed_qty > 0.0 {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::New
            };
        }
        let out = o.clone();
        if just_filled {
            st.retire(order_id);
        }
        Ok(out)
    }

    async fn cancel_order(&self, order_id: &str, instrument_id: &str) -> Result<(), VenueError> {
        let mut st = self.lock()?;
        match st.orders.get_mut(order_id) {
            Some((owner, o)) if owner.as_str() == instrument_id => {
                if o.status.is_filled() || o.status.is_closed_unfilled() {
                    return Err(VenueError::Api { status: 400, code: -2011, msg: "Unknown order sent.".into() });
                }
                o.status = OrderStatus::Canceled;
                st.retire(order_id);
                Ok(())
            }
            _ => Err(VenueError::UnknownOrder(order_id.to_string())),
        }
    }

    fn name(&self) -> &str { "paper" }
}

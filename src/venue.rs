// ===============================
// src/venue.rs
// ===============================
//
// Kapabilitas venue yang dipakai worker: order book + lifecycle order.
// Implementasi: gateway_binance (REST) dan gateway (paper / simulasi).
//
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{OrderBookSnapshot, OrderRequest, PostedOrder, RemoteOrder, Side, TimeInForce};

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error (status {status}, code {code}): {msg}")]
    Api { status: u16, code: i64, msg: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unknown order {0}")]
    UnknownOrder(String),
    #[error("auth error: {0}")]
    Auth(String),
}

/// Binance: "Account has insufficient balance for requested action."
const INSUFFICIENT_BALANCE_CODE: i64 = -2010;

const SETTLEMENT_PATTERNS: [&str; 5] = [
    "insufficient balance",
    "not enough balance",
    "balance is not enough",
    "allowance",
    "settlement",
];

impl VenueError {
    /// Balance from a just-filled leg not yet usable. Retried on the next poll.
    pub fn is_settlement_pending(&self) -> bool {
        if let VenueError::Api { code, .. } = self {
            if *code == INSUFFICIENT_BALANCE_CODE {
                return true;
            }
        }
        let msg = self.to_string().to_ascii_lowercase();
        SETTLEMENT_PATTERNS.iter().any(|p| msg.contains(p))
    }
}

#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn get_order_book(&self, instrument_id: &str) -> Result<OrderBookSnapshot, VenueError>;

    /// Build (and, where the venue needs it, sign) an order descriptor. Nothing is sent.
    async fn create_limit_order(
        &self,
        instrument_id: &str,
        price: f64,
        size: f64,
        side: Side,
        tif: TimeInForce,
    ) -> Result<OrderRequest, VenueError>;

    async fn post_order(&self, order: &OrderRequest) -> Result<PostedOrder, VenueError>;

    async fn get_order(&self, order_id: &str, instrument_id: &str) -> Result<RemoteOrder, VenueError>;

    async fn cancel_order(&self, order_id: &str, instrument_id: &str) -> Result<(), VenueError>;

    fn name(&self) -> &str;
}

/// Scripted in-memory venue for unit tests: every call is recorded, book and
/// remote order state are set by the test.
#[cfg(test)]
pub mod testkit {
    use super::*;
    use crate::domain::{OrderStatus, PriceLevel};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Book(String),
        Post { side: Side, price: f64, size: f64 },
        Get(String),
        Cancel(String),
    }

    #[derive(Default)]
    struct Script {
        books: HashMap<String, OrderBookSnapshot>,
        orders: HashMap<String, RemoteOrder>,
        calls: Vec<Call>,
        next_id: u64,
        fail_book: Option<String>,
        fail_post: Option<String>,
    }

    #[derive(Default)]
    pub struct ScriptedVenue {
        script: Mutex<Script>,
    }

    impl ScriptedVenue {
        pub fn new() -> Self { Self::default() }

        pub fn set_book(&self, instrument_id: &str, bids: &[&str], asks: &[&str]) {
            let book = OrderBookSnapshot {
                bids: bids.iter().map(|p| PriceLevel::new(*p)).collect(),
                asks: asks.iter().map(|p| PriceLevel::new(*p)).collect(),
            };
            self.script.lock().unwrap().books.insert(instrument_id.to_string(), book);
        }

        pub fn set_fill(&self, order_id: &str, executed: f64, status: OrderStatus) {
            let mut s = self.script.lock().unwrap();
            let o = s.orders.get_mut(order_id).expect("order exists");
            o.executed_qty = executed;
            o.status = status;
        }

        /// Fail the next `post_order` with an API error carrying `msg`.
        pub fn fail_next_post(&self, msg: &str) {
            self.script.lock().unwrap().fail_post = Some(msg.to_string());
        }

        /// Fail every `get_order_book` for `instrument_id`.
        pub fn fail_book(&self, instrument_id: &str) {
            self.script.lock().unwrap().fail_book = Some(instrument_id.to_string());
        }

        pub fn calls(&self) -> Vec<Call> { self.script.lock().unwrap().calls.clone() }

        /// Only the order-mutating calls.
        pub fn order_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Post { .. } | Call::Cancel(_)))
                .collect()
        }

        pub fn clear_calls(&self) { self.script.lock().unwrap().calls.clear(); }
    }

    #[async_trait]
    impl VenueClient for ScriptedVenue {
        async fn get_order_book(&self, instrument_id: &str) -> Result<OrderBookSnapshot, VenueError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Book(instrument_id.to_string()));
            if s.fail_book.as_deref() == Some(instrument_id) {
                return Err(VenueError::InvalidResponse("book unavailable".into()));
            }
            Ok(s.books.get(instrument_id).cloned().unwrap_or_default())
        }

        async fn create_limit_order(
            &self,
            instrument_id: &str,
            price: f64,
            size: f64,
            side: Side,
            tif: TimeInForce,
        ) -> Result<OrderRequest, VenueError> {
            Ok(OrderRequest {
                client_id: format!("cl-{instrument_id}"),
                instrument_id: instrument_id.to_string(),
                side,
                price,
                size,
                tif,
            })
        }

        async fn post_order(&self, order: &OrderRequest) -> Result<PostedOrder, VenueError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Post { side: order.side, price: order.price, size: order.size });
            if let Some(msg) = s.fail_post.take() {
                return Err(VenueError::Api { status: 400, code: -1, msg });
            }
            s.next_id += 1;
            let order_id = format!("ord-{}", s.next_id);
            s.orders.insert(
                order_id.clone(),
                RemoteOrder {
                    order_id: order_id.clone(),
                    side: order.side,
                    price: order.price,
                    orig_qty: order.size,
                    executed_qty: 0.0,
                    status: OrderStatus::New,
                },
            );
            Ok(PostedOrder { order_id })
        }

        async fn get_order(&self, order_id: &str, _instrument_id: &str) -> Result<RemoteOrder, VenueError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Get(order_id.to_string()));
            s.orders
                .get(order_id)
                .cloned()
                .ok_or_else(|| VenueError::UnknownOrder(order_id.to_string()))
        }

        async fn cancel_order(&self, order_id: &str, _instrument_id: &str) -> Result<(), VenueError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Cancel(order_id.to_string()));
            match s.orders.get_mut(order_id) {
                Some(o) => {
                    o.status = OrderStatus::Canceled;
                    Ok(())
                }
                None => Err(VenueError::UnknownOrder(order_id.to_string())),
            }
        }

        fn name(&self) -> &str { "scripted" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binance_insufficient_balance_code_is_settlement() {
        let e = VenueError::Api { status: 400, code: -2010, msg: "whatever".into() };
        assert!(e.is_settlement_pending());
    }

    #[test]
    fn balance_messages_are_settlement() {
        for msg in ["not enough balance / allowance", "Insufficient Balance", "settlement in progress"] {
            let e = VenueError::Api { status: 400, code: -1, msg: msg.into() };
            assert!(e.is_settlement_pending(), "{msg}");
        }
    }

    #[test]
    fn other_errors_are_not_settlement() {
        let e = VenueError::Api { status: 400, code: -1013, msg: "Filter failure: PRICE_FILTER".into() };
        assert!(!e.is_settlement_pending());
        assert!(!VenueError::UnknownOrder("42".into()).is_settlement_pending());
    }
}

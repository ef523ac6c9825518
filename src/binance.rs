// ===============================
// src/binance.rs
// ===============================
// helper signer + model REST minimal untuk Binance Spot
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::{OrderStatus, PriceLevel, RemoteOrder, Side};
use crate::venue::VenueError;

pub fn timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

pub fn sign_query(secret: &str, query: &str) -> Result<String, VenueError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| VenueError::Auth(e.to_string()))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `k1=v1&k2=v2` with url-encoded values, in the given order.
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// --- GET /api/v3/depth ---
#[derive(Debug, Deserialize)]
pub struct DepthResponse {
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

impl DepthResponse {
    pub fn levels(side: Vec<(String, String)>) -> Vec<PriceLevel> {
        side.into_iter().map(|(price, size)| PriceLevel { price, size }).collect()
    }
}

// --- POST /api/v3/order ---
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderAck {
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
}

// --- GET /api/v3/order ---
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOrderResponse {
    pub order_id: i64,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub status: OrderStatus,
    pub side: String,
}

impl QueryOrderResponse {
    pub fn into_remote(self) -> Result<RemoteOrder, VenueError> {
        let side = match self.side.as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => return Err(VenueError::InvalidResponse(format!("side {other}"))),
        };
        Ok(RemoteOrder {
            order_id: self.order_id.to_string(),
            side,
            price: parse_num("price", &self.price)?,
            orig_qty: parse_num("origQty", &self.orig_qty)?,
            executed_qty: parse_num("executedQty", &self.executed_qty)?,
            status: self.status,
        })
    }
}

// Error body: {"code":-2010,"msg":"Account has insufficient balance for requested action."}
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

fn parse_num(field: &str, s: &str) -> Result<f64, VenueError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| VenueError::InvalidResponse(format!("{field}={s:?}")))
}

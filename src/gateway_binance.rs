// ===============================
// src/gateway_binance.rs
// ===============================
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::binance::{
    encode_query, sign_query, timestamp_ms, ApiErrorBody, DepthResponse, NewOrderAck,
    QueryOrderResponse,
};
use crate::domain::{OrderBookSnapshot, OrderRequest, PostedOrder, RemoteOrder, Side, TimeInForce};
use crate::venue::{VenueClient, VenueError};

/// Binance Spot REST venue. LIMIT orders only; state is polled, no user stream.
pub struct BinanceVenue {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    api_secret: String,
    recv_window: u64,
    depth_limit: u32,
}

impl BinanceVenue {
    pub fn new(
        rest_base: &str,
        api_key: String,
        api_secret: String,
        recv_window: u64,
        depth_limit: u32,
    ) -> Result<Self, VenueError> {
        let base = Url::parse(rest_base).map_err(|e| VenueError::InvalidResponse(format!("bad rest url {rest_base}: {e}")))?;
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, base, api_key, api_secret, recv_window, depth_limit })
    }

    fn endpoint(&self, path: &str) -> Result<Url, VenueError> {
        self.base
            .join(path)
            .map_err(|e| VenueError::InvalidResponse(format!("bad path {path}: {e}")))
    }

    async fn public<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, VenueError> {
        let mut url = self.endpoint(path)?;
        url.set_query(Some(&encode_query(params)));
        let rsp = self.http.get(url).send().await?;
        decode(rsp).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, VenueError> {
        params.push(("recvWindow", self.recv_window.to_string()));
        params.push(("timestamp", timestamp_ms().to_string()));
        let query = encode_query(&params);
        let sig = sign_query(&self.api_secret, &query)?;

        let mut url = self.endpoint(path)?;
        url.set_query(Some(&format!("{query}&signature={sig}")));
        let rsp = self
            .http
            .request(method, url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        decode(rsp).await
    }
}

async fn decode<T: DeserializeOwned>(rsp: reqwest::Response) -> Result<T, VenueError> {
    let status: StatusCode = rsp.status();
    let body = rsp.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(e) => Err(VenueError::Api { status: status.as_u16(), code: e.code, msg: e.msg }),
        Err(_) => Err(VenueError::Api { status: status.as_u16(), code: 0, msg: body }),
    }
}

#[async_trait]
impl VenueClient for BinanceVenue {
    async fn get_order_book(&self, instrument_id: &str) -> Result<OrderBookSnapshot, VenueError> {
        let d: DepthResponse = self
            .public(
                "/api/v3/depth",
                &[("symbol", instrument_id.to_string()), ("limit", self.depth_limit.to_string())],
            )
            .await?;
        Ok(OrderBookSnapshot { bids: DepthResponse::levels(d.bids), asks: DepthResponse::levels(d.asks) })
    }

    async fn create_limit_order(
        &self,
        instrument_id: &str,
        price: f64,
        size: f64,
        side: Side,
        tif: TimeInForce,
    ) -> Result<OrderRequest, VenueError> {
        let client_id = format!("PP-{}-{}", timestamp_ms(), rand::thread_rng().gen::<u32>());
        Ok(OrderRequest { client_id, instrument_id: instrument_id.to_string(), side, price, size, tif })
    }

    async fn post_order(&self, order: &OrderRequest) -> Result<PostedOrder, VenueError> {
        let params = vec![
            ("symbol", order.instrument_id.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", order.tif.as_str().to_string()),
            ("quantity", format!("{}", order.size)),
            ("price", format!("{}", order.price)),
            ("newClientOrderId", order.client_id.clone()),
        ];
        let ack: NewOrderAck = self.signed(Method::POST, "/api/v3/order", params).await?;
        tracing::debug!(order_id = ack.order_id, client_id = %ack.client_order_id, "binance ack");
        Ok(PostedOrder { order_id: ack.order_id.to_string() })
    }

    async fn get_order(&self, order_id: &str, instrument_id: &str) -> Result<RemoteOrder, VenueError> {
        let params = vec![("symbol", instrument_id.to_string()), ("orderId", order_id.to_string())];
        let q: QueryOrderResponse = self.signed(Method::GET, "/api/v3/order", params).await?;
        q.into_remote()
    }

    async fn cancel_order(&self, order_id: &str, instrument_id: &str) -> Result<(), VenueError> {
        let params = vec![("symbol", instrument_id.to_string()), ("orderId", order_id.to_string())];
        let _: serde_json::Value = self.signed(Method::DELETE, "/api/v3/order", params).await?;
        Ok(())
    }

    fn name(&self) -> &str { "binance" }
}

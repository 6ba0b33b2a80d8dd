//! Kite Connect adapter implementing `BrokeragePort`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;

use super::api_types::{Form, OrderIdData, modify_form, order_form};
use super::config::KiteConfig;
use super::error::KiteError;
use super::http_client::KiteHttpClient;
use super::instruments::parse_instruments;
use crate::application::ports::{BrokerageError, BrokeragePort};
use crate::domain::account::{Holding, Margins, OrderRecord, Positions};
use crate::domain::instrument::Instrument;
use crate::domain::market_data::Quote;
use crate::domain::orders::{CancelRequest, ModifyRequest, OrderRequest};
use crate::domain::symbol::SymbolKey;

/// Kite Connect v3 brokerage adapter.
#[derive(Debug, Clone)]
pub struct KiteBrokerageAdapter {
    client: KiteHttpClient,
}

impl KiteBrokerageAdapter {
    /// Create a new adapter.
    ///
    /// # Errors
    ///
    /// Returns `KiteError` when the HTTP client cannot be built.
    pub fn new(config: &KiteConfig) -> Result<Self, KiteError> {
        Ok(Self {
            client: KiteHttpClient::new(config)?,
        })
    }

    fn order_path(variety: &str, order_id: Option<&str>) -> String {
        let variety = if variety.trim().is_empty() {
            "regular"
        } else {
            variety.trim()
        };
        match order_id {
            Some(id) => format!("/orders/{variety}/{id}"),
            None => format!("/orders/{variety}"),
        }
    }
}

#[async_trait]
impl BrokeragePort for KiteBrokerageAdapter {
    async fn positions(&self) -> Result<Positions, BrokerageError> {
        Ok(self.client.get("/portfolio/positions", &[]).await?)
    }

    async fn holdings(&self) -> Result<Vec<Holding>, BrokerageError> {
        Ok(self.client.get("/portfolio/holdings", &[]).await?)
    }

    async fn orders(&self) -> Result<Vec<OrderRecord>, BrokerageError> {
        Ok(self.client.get("/orders", &[]).await?)
    }

    async fn order_history(&self, order_id: &str) -> Result<Vec<OrderRecord>, BrokerageError> {
        Ok(self
            .client
            .get(&format!("/orders/{}", order_id.trim()), &[])
            .await?)
    }

    async fn margins(&self) -> Result<Margins, BrokerageError> {
        Ok(self.client.get("/user/margins", &[]).await?)
    }

    async fn quotes(
        &self,
        symbols: &[SymbolKey],
    ) -> Result<HashMap<SymbolKey, Quote>, BrokerageError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let query: Vec<(&str, &str)> = symbols.iter().map(|s| ("i", s.as_str())).collect();
        let raw: HashMap<String, Quote> = self.client.get("/quote", &query).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(key, quote)| SymbolKey::parse(&key).map(|symbol| (symbol, quote)))
            .collect())
    }

    async fn instruments(&self, exchange: &str) -> Result<Vec<Instrument>, BrokerageError> {
        let path = format!("/instruments/{}", exchange.trim().to_uppercase());
        let csv = self.client.get_text(&path).await?;
        Ok(parse_instruments(&csv)?)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<String, BrokerageError> {
        tracing::info!(
            exchange = %request.exchange,
            symbol = %request.tradingsymbol,
            side = request.transaction_type.as_str(),
            order_type = request.order_type.as_str(),
            quantity = request.quantity,
            price = ?request.price,
            "Placing order"
        );
        let data: OrderIdData = self
            .client
            .send_form(
                Method::POST,
                &Self::order_path(&request.variety, None),
                &order_form(request),
            )
            .await?;
        tracing::info!(order_id = %data.order_id, "Order placed");
        Ok(data.order_id)
    }

    async fn modify_order(&self, request: &ModifyRequest) -> Result<String, BrokerageError> {
        tracing::info!(order_id = %request.order_id, "Modifying order");
        let data: OrderIdData = self
            .client
            .send_form(
                Method::PUT,
                &Self::order_path(&request.variety, Some(&request.order_id)),
                &modify_form(request),
            )
            .await?;
        Ok(data.order_id)
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<String, BrokerageError> {
        tracing::info!(order_id = %request.order_id, "Cancelling order");
        let form: Form = request
            .parent_order_id
            .iter()
            .map(|parent| ("parent_order_id", parent.clone()))
            .collect();
        let data: OrderIdData = self
            .client
            .send_form(
                Method::DELETE,
                &Self::order_path(&request.variety, Some(&request.order_id)),
                &form,
            )
            .await?;
        Ok(data.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_paths() {
        assert_eq!(KiteBrokerageAdapter::order_path("amo", None), "/orders/amo");
        assert_eq!(
            KiteBrokerageAdapter::order_path("", Some("123")),
            "/orders/regular/123"
        );
    }
}

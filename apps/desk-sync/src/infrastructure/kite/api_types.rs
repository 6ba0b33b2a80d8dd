//! Kite Connect wire types: the response envelope and form encoders for
//! order requests.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::KiteError;
use crate::domain::orders::{ModifyRequest, OrderRequest};

/// `{status, data | message, error_type}` wrapper on every JSON response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// `success` or `error`.
    pub status: String,
    /// Payload on success.
    pub data: Option<T>,
    /// Message on error.
    pub message: Option<String>,
    /// Exception class on error.
    pub error_type: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload or map the error.
    ///
    /// # Errors
    ///
    /// Returns the typed error for an error envelope, or
    /// `KiteError::Decode` for a success envelope without data.
    pub fn into_result(self, http_status: u16) -> Result<T, KiteError> {
        if self.status == "success"
            && let Some(data) = self.data
        {
            return Ok(data);
        }
        if self.status == "success" {
            return Err(KiteError::Decode("success envelope without data".to_string()));
        }
        Err(KiteError::from_envelope(
            http_status,
            self.error_type.as_deref(),
            self.message.unwrap_or_else(|| format!("HTTP {http_status}")),
        ))
    }
}

/// Payload of place/modify/cancel responses.
#[derive(Debug, Deserialize)]
pub struct OrderIdData {
    /// Affected order id.
    pub order_id: String,
}

/// Form field list sent as `application/x-www-form-urlencoded`.
pub type Form = Vec<(&'static str, String)>;

fn price_text(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Form for `POST /orders/{variety}`.
#[must_use]
pub fn order_form(request: &OrderRequest) -> Form {
    let mut form: Form = vec![
        ("exchange", request.exchange.clone()),
        ("tradingsymbol", request.tradingsymbol.clone()),
        ("transaction_type", request.transaction_type.as_str().to_string()),
        ("quantity", request.quantity.to_string()),
        ("order_type", request.order_type.as_str().to_string()),
        ("product", request.product.clone()),
        ("validity", request.validity.clone()),
    ];
    if let Some(price) = request.price {
        form.push(("price", price_text(price)));
    }
    if let Some(trigger) = request.trigger_price {
        form.push(("trigger_price", price_text(trigger)));
    }
    if let Some(ttl) = request.validity_ttl {
        form.push(("validity_ttl", ttl.to_string()));
    }
    form
}

/// Form for `PUT /orders/{variety}/{order_id}`. Only set fields are sent.
#[must_use]
pub fn modify_form(request: &ModifyRequest) -> Form {
    let mut form = Form::new();
    if let Some(parent) = &request.parent_order_id {
        form.push(("parent_order_id", parent.clone()));
    }
    if let Some(quantity) = request.quantity {
        form.push(("quantity", quantity.to_string()));
    }
    if let Some(price) = request.price {
        form.push(("price", price_text(price)));
    }
    if let Some(order_type) = &request.order_type {
        form.push(("order_type", order_type.clone()));
    }
    if let Some(trigger) = request.trigger_price {
        form.push(("trigger_price", price_text(trigger)));
    }
    if let Some(validity) = &request.validity {
        form.push(("validity", validity.clone()));
    }
    if let Some(disclosed) = request.disclosed_quantity {
        form.push(("disclosed_quantity", disclosed.to_string()));
    }
    form
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::orders::{OrderType, TransactionType};

    fn field<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn success_envelope_unwraps() {
        let envelope: Envelope<OrderIdData> =
            serde_json::from_str(r#"{"status":"success","data":{"order_id":"151220000000000"}}"#)
                .unwrap();
        assert_eq!(envelope.into_result(200).unwrap().order_id, "151220000000000");
    }

    #[test]
    fn error_envelope_maps_exception() {
        let envelope: Envelope<OrderIdData> = serde_json::from_str(
            r#"{"status":"error","message":"Invalid `api_key` or `access_token`.","error_type":"TokenException"}"#,
        )
        .unwrap();
        assert!(matches!(envelope.into_result(403), Err(KiteError::Token(_))));
    }

    #[test]
    fn limit_order_form_carries_price_only() {
        let request = OrderRequest {
            variety: "regular".to_string(),
            exchange: "NSE".to_string(),
            tradingsymbol: "INFY".to_string(),
            transaction_type: TransactionType::Buy,
            quantity: 10,
            order_type: OrderType::Limit,
            product: "CNC".to_string(),
            validity: "DAY".to_string(),
            price: Some(dec!(1500.50)),
            trigger_price: None,
            validity_ttl: None,
        };
        let form = order_form(&request);
        assert_eq!(field(&form, "transaction_type"), Some("BUY"));
        assert_eq!(field(&form, "order_type"), Some("LIMIT"));
        assert_eq!(field(&form, "price"), Some("1500.5"));
        assert_eq!(field(&form, "trigger_price"), None);
        assert_eq!(field(&form, "validity_ttl"), None);
    }

    #[test]
    fn modify_form_omits_unset_fields() {
        let request = ModifyRequest {
            variety: "regular".to_string(),
            order_id: "1".to_string(),
            quantity: Some(5),
            ..ModifyRequest::default()
        };
        let form = modify_form(&request);
        assert_eq!(form, vec![("quantity", "5".to_string())]);
    }
}

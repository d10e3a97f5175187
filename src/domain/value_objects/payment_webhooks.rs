use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::errors::PaymentError;

pub const SIGNATURE_FIELD: &str = "signature";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookStatus {
    Success,
    Failed,
    Expired,
    Other(String),
}

impl WebhookStatus {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "paid" | "completed" => WebhookStatus::Success,
            "failed" | "failure" => WebhookStatus::Failed,
            "expired" => WebhookStatus::Expired,
            other => WebhookStatus::Other(other.to_string()),
        }
    }
}

/// A verified inbound status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub payment_id: String,
    /// Our transaction id.
    pub reference_id: String,
    pub status: WebhookStatus,
    pub amount: Option<String>,
    pub paid_at: Option<String>,
    pub failure_reason: Option<String>,
}

/// The body's fields and the claimed signature, before verification.
#[derive(Debug, Clone)]
pub struct SignedWebhook {
    fields: Map<String, Value>,
    signature: String,
}

impl SignedWebhook {
    /// `header_signature` wins over a `signature` field in the body.
    pub fn parse(body: &[u8], header_signature: Option<&str>) -> Result<Self, PaymentError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| PaymentError::MalformedWebhook(err.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(PaymentError::MalformedWebhook(
                "body must be a JSON object".to_string(),
            ));
        };

        let body_signature = fields.remove(SIGNATURE_FIELD).and_then(|value| match value {
            Value::String(signature) => Some(signature),
            _ => None,
        });

        let signature = header_signature
            .map(str::to_string)
            .or(body_signature)
            .filter(|signature| !signature.trim().is_empty())
            .ok_or(PaymentError::InvalidSignature)?;

        Ok(Self { fields, signature })
    }

    pub fn verify(self, secret: &str) -> Result<PaymentNotification, PaymentError> {
        if secret.is_empty() {
            return Err(PaymentError::InvalidSignature);
        }
        let expected = compute_signature(&self.fields, secret);
        if !constant_time_eq(expected.as_bytes(), self.signature.trim().to_ascii_lowercase().as_bytes()) {
            return Err(PaymentError::InvalidSignature);
        }
        notification_from_fields(&self.fields)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Fields sorted by name, joined as `key=value` with `&`.
pub fn canonical_string(fields: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&String, &Value)> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != SIGNATURE_FIELD)
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value_text(value)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn compute_signature(fields: &Map<String, Value>, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(fields).as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn required_text(fields: &Map<String, Value>, key: &str) -> Result<String, PaymentError> {
    fields
        .get(key)
        .map(value_text)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| PaymentError::MalformedWebhook(format!("`{}` is required", key)))
}

fn optional_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(value_text)
        .filter(|text| !text.is_empty())
}

fn notification_from_fields(fields: &Map<String, Value>) -> Result<PaymentNotification, PaymentError> {
    Ok(PaymentNotification {
        payment_id: required_text(fields, "payment_id")?,
        reference_id: required_text(fields, "reference_id")?,
        status: WebhookStatus::from_str(&required_text(fields, "status")?),
        amount: optional_text(fields, "amount"),
        paid_at: optional_text(fields, "paid_at"),
        failure_reason: optional_text(fields, "failure_reason"),
    })
}

#[cfg(test)]
pub(crate) fn sign_body(body: &Value, secret: &str) -> String {
    match body {
        Value::Object(fields) => compute_signature(fields, secret),
        _ => panic!("webhook body must be an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn body() -> Value {
        json!({
            "status": "success",
            "reference_id": "TXN-1",
            "payment_id": "pay_1",
            "paid_at": "2026-10-18T10:00:00Z",
            "amount": "1500.00",
        })
    }

    #[test]
    fn canonical_form_sorts_fields() {
        let Value::Object(fields) = body() else {
            unreachable!()
        };
        assert_eq!(
            canonical_string(&fields),
            "amount=1500.00&paid_at=2026-10-18T10:00:00Z&payment_id=pay_1&reference_id=TXN-1&status=success"
        );
    }

    #[test]
    fn matches_known_signature() {
        assert_eq!(
            sign_body(&body(), SECRET),
            "8af81120665ec7b8801174a968a7a291914c104aadd1020c11f515e2f6e6a13b"
        );
    }

    #[test]
    fn verifies_header_signature() {
        let signature = sign_body(&body(), SECRET);
        let raw = serde_json::to_vec(&body()).unwrap();
        let notification = SignedWebhook::parse(&raw, Some(&signature))
            .unwrap()
            .verify(SECRET)
            .unwrap();
        assert_eq!(notification.reference_id, "TXN-1");
        assert_eq!(notification.status, WebhookStatus::Success);
        assert_eq!(notification.amount.as_deref(), Some("1500.00"));
    }

    #[test]
    fn signature_field_in_body_is_excluded_from_canonical_form() {
        let signature = sign_body(&body(), SECRET);
        let mut with_signature = body();
        with_signature["signature"] = json!(signature);
        let raw = serde_json::to_vec(&with_signature).unwrap();
        assert!(SignedWebhook::parse(&raw, None).unwrap().verify(SECRET).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let signature = sign_body(&body(), SECRET);
        let mut tampered = body();
        tampered["amount"] = json!("1.00");
        let raw = serde_json::to_vec(&tampered).unwrap();
        assert!(matches!(
            SignedWebhook::parse(&raw, Some(&signature)).unwrap().verify(SECRET),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_missing_signature_and_empty_secret() {
        let raw = serde_json::to_vec(&body()).unwrap();
        assert!(matches!(
            SignedWebhook::parse(&raw, None),
            Err(PaymentError::InvalidSignature)
        ));

        let signature = sign_body(&body(), "");
        assert!(SignedWebhook::parse(&raw, Some(&signature))
            .unwrap()
            .verify("")
            .is_err());
    }

    #[test]
    fn maps_status_aliases() {
        assert_eq!(WebhookStatus::from_str("PAID"), WebhookStatus::Success);
        assert_eq!(WebhookStatus::from_str("failed"), WebhookStatus::Failed);
        assert_eq!(WebhookStatus::from_str("expired"), WebhookStatus::Expired);
        assert_eq!(
            WebhookStatus::from_str("refunded"),
            WebhookStatus::Other("refunded".to_string())
        );
    }
}

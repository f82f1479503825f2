use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "LKR";
const MASK_PREFIX: &str = "**** **** **** ";

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("currency pattern"));
static CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12,19}$").expect("card pattern"));
static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}/[0-9]{2}$").expect("expiry pattern"));
static CVC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3,4}$").expect("cvc pattern"));

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Succeeded,
}

/// A captured payment as it is stored and returned. Raw card data never
/// reaches this type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub masked: String,
    pub status: PaymentStatus,
    #[serde(rename = "createdAt", with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be > 0")]
    Amount,
    #[error("Currency must be 3-letter code")]
    Currency,
    #[error("Card must be 12-19 digits")]
    Card,
    #[error("Expiry MM/YY required")]
    Expiry,
    #[error("CVC 3-4 digits required")]
    Cvc,
}

/// Body of `POST /pay`. Fields stay untyped so loosely typed clients
/// (numeric strings, numeric card numbers) are coerced the same way the
/// browser client sends them.
#[derive(Deserialize, Debug, Default)]
pub struct PaymentRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub currency: Option<Value>,
    #[serde(default)]
    pub card: Option<Value>,
    #[serde(default)]
    pub exp: Option<Value>,
    #[serde(default)]
    pub cvc: Option<Value>,
}

/// What survives validation: card, expiry and CVC are already gone.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub amount: f64,
    pub currency: String,
    pub masked: String,
}

impl PaymentRequest {
    /// Checks the fields in order; the first failing rule is reported.
    pub fn validate(self) -> Result<PaymentDraft, ValidationError> {
        let amount = coerce_amount(self.amount.as_ref());
        if !(amount.is_finite() && amount > 0.0) {
            return Err(ValidationError::Amount);
        }

        let currency = coerce_currency(self.currency.as_ref()).ok_or(ValidationError::Currency)?;
        if !CURRENCY_RE.is_match(&currency) {
            return Err(ValidationError::Currency);
        }

        let card = coerce_text(self.card.as_ref())
            .filter(|card| CARD_RE.is_match(card))
            .ok_or(ValidationError::Card)?;
        coerce_text(self.exp.as_ref())
            .filter(|exp| EXPIRY_RE.is_match(exp))
            .ok_or(ValidationError::Expiry)?;
        coerce_text(self.cvc.as_ref())
            .filter(|cvc| CVC_RE.is_match(cvc))
            .ok_or(ValidationError::Cvc)?;

        Ok(PaymentDraft {
            amount,
            currency,
            masked: mask_card(&card),
        })
    }
}

impl PaymentDraft {
    pub fn into_payment(self, id: Uuid, created_at: DateTime<Utc>) -> Payment {
        Payment {
            id,
            amount: self.amount,
            currency: self.currency,
            masked: self.masked,
            status: PaymentStatus::Succeeded,
            created_at,
        }
    }
}

pub fn mask_card(card: &str) -> String {
    let chars: Vec<char> = card.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{MASK_PREFIX}{tail}")
}

/// Current time truncated to the millisecond precision used on the wire.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn coerce_amount(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(_) | Value::Object(_)) => f64::NAN,
    }
}

fn coerce_currency(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Some(DEFAULT_CURRENCY.to_string()),
        Some(Value::String(s)) if s.is_empty() => Some(DEFAULT_CURRENCY.to_string()),
        Some(Value::String(s)) => Some(s.to_uppercase()),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Some(DEFAULT_CURRENCY.to_string()),
        Some(_) => None,
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => None,
    }
}

pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn request(body: Value) -> PaymentRequest {
        serde_json::from_value(body).expect("request body")
    }

    fn valid() -> Value {
        json!({
            "amount": 100,
            "currency": "lkr",
            "card": "4111111111111111",
            "exp": "09/27",
            "cvc": "123"
        })
    }

    fn with(field: &str, value: Value) -> PaymentRequest {
        let mut body = valid();
        body[field] = value;
        request(body)
    }

    fn without(field: &str) -> PaymentRequest {
        let mut body = valid();
        body.as_object_mut().expect("object").remove(field);
        request(body)
    }

    #[test]
    fn accepts_valid_payment_and_masks_card() {
        let draft = request(valid()).validate().expect("valid");
        assert_eq!(draft.amount, 100.0);
        assert_eq!(draft.currency, "LKR");
        assert_eq!(draft.masked, "**** **** **** 1111");
    }

    #[test]
    fn rejects_non_positive_or_non_numeric_amounts() {
        for amount in [json!(0), json!(-5), json!(-0.01), json!("abc"), json!(""), json!(null), json!([]), json!({})] {
            assert_eq!(with("amount", amount.clone()).validate(), Err(ValidationError::Amount), "{amount}");
        }
        assert_eq!(without("amount").validate(), Err(ValidationError::Amount));
    }

    #[test]
    fn coerces_numeric_amount_strings() {
        let draft = with("amount", json!(" 12.5 ")).validate().expect("valid");
        assert_eq!(draft.amount, 12.5);
        let draft = with("amount", json!(0.001)).validate().expect("valid");
        assert_eq!(draft.amount, 0.001);
    }

    #[test]
    fn currency_defaults_and_is_upper_cased() {
        assert_eq!(without("currency").validate().expect("valid").currency, "LKR");
        assert_eq!(with("currency", json!("")).validate().expect("valid").currency, "LKR");
        assert_eq!(with("currency", json!("usd")).validate().expect("valid").currency, "USD");
        assert_eq!(with("currency", json!("JPY")).validate().expect("valid").currency, "JPY");
    }

    #[test]
    fn rejects_malformed_currencies() {
        for currency in [json!("US"), json!("USDT"), json!("U5D"), json!(" usd"), json!(840)] {
            assert_eq!(with("currency", currency.clone()).validate(), Err(ValidationError::Currency), "{currency}");
        }
    }

    #[test]
    fn card_must_be_12_to_19_digits() {
        for card in [json!("41111111111"), json!("41111111111111111111"), json!("4111 1111 1111 1111"), json!("4111-1111-1111"), json!("")] {
            assert_eq!(with("card", card.clone()).validate(), Err(ValidationError::Card), "{card}");
        }
        assert_eq!(without("card").validate(), Err(ValidationError::Card));
        assert!(with("card", json!("411111111111")).validate().is_ok());
        assert!(with("card", json!("4111111111111111111")).validate().is_ok());
    }

    #[test]
    fn card_digits_are_ascii_only() {
        let arabic_indic = "٤١١١١١١١١١١١١١١١";
        assert_eq!(with("card", json!(arabic_indic)).validate(), Err(ValidationError::Card));
    }

    #[test]
    fn numeric_card_uses_its_decimal_text() {
        let draft = with("card", json!(4111111111114242u64)).validate().expect("valid");
        assert_eq!(draft.masked, "**** **** **** 4242");
    }

    #[test]
    fn expiry_shape_only() {
        assert!(with("exp", json!("99/00")).validate().is_ok());
        for exp in [json!("9/27"), json!("09-27"), json!("0927"), json!("09/2027")] {
            assert_eq!(with("exp", exp.clone()).validate(), Err(ValidationError::Expiry), "{exp}");
        }
    }

    #[test]
    fn cvc_three_or_four_digits() {
        assert!(with("cvc", json!("123")).validate().is_ok());
        assert!(with("cvc", json!("1234")).validate().is_ok());
        assert!(with("cvc", json!(123)).validate().is_ok());
        for cvc in [json!("12"), json!("12345"), json!("12a")] {
            assert_eq!(with("cvc", cvc.clone()).validate(), Err(ValidationError::Cvc), "{cvc}");
        }
    }

    #[test]
    fn first_failing_rule_wins() {
        let req = request(json!({"amount": 0, "currency": "x", "card": "1", "exp": "1", "cvc": "1"}));
        assert_eq!(req.validate(), Err(ValidationError::Amount));
        let req = request(json!({"amount": 1, "card": "1", "exp": "1", "cvc": "1"}));
        assert_eq!(req.validate(), Err(ValidationError::Card));
    }

    #[test]
    fn serializes_wire_shape() {
        let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 20, 30).single().expect("ts");
        let id = Uuid::nil();
        let payment = request(valid()).validate().expect("valid").into_payment(id, created_at);
        let wire = serde_json::to_value(&payment).expect("serialize");
        assert_eq!(
            wire,
            json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "amount": 100.0,
                "currency": "LKR",
                "masked": "**** **** **** 1111",
                "status": "succeeded",
                "createdAt": "2025-03-01T10:20:30.000Z"
            })
        );
        let back: Payment = serde_json::from_value(wire).expect("deserialize");
        assert_eq!(back, payment);
    }
}

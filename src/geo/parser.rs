//! Per-provider response parsing into canonical field slots.
//!
//! A missing or mistyped key only fails its own slot. Malformed JSON, or a
//! body in which the provider reports failure, fails the whole provider.

use super::providers::{Provider, StatusCheck};
use super::record::{ProviderSlots, Slot};
use super::types::{ErrorCode, FieldValue, ProviderError, ValueKind};
use serde_json::Value;

/// Result of parsing one provider's response.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub slots: ProviderSlots,
    pub error: ProviderError,
}

impl Parsed {
    fn failed(provider: &Provider, reason: String) -> Self {
        Self {
            slots: ProviderSlots::for_provider(provider, &reason),
            error: ProviderError::new(ErrorCode::Parse, reason),
        }
    }
}

pub fn parse_response(provider: &Provider, body: &[u8]) -> Parsed {
    let tree: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return Parsed::failed(provider, format!("malformed JSON: {}", e)),
    };

    if !tree.is_object() {
        return Parsed::failed(provider, "response is not a JSON object".to_string());
    }

    if let Some(reason) = reported_failure(provider, &tree) {
        return Parsed::failed(provider, reason);
    }

    let mut slots = ProviderSlots::for_provider(provider, "");
    for (field, key) in provider.fields {
        let slot = match tree.get(*key) {
            None => Slot::unparsed(format!("key '{}' missing from response", key)),
            Some(raw) => match coerce(field.kind(), raw) {
                Ok(value) => Slot::parsed(value),
                Err(reason) => Slot::unparsed(format!("key '{}' {}", key, reason)),
            },
        };
        slots.set(*field, slot);
    }

    Parsed {
        slots,
        error: ProviderError::none(),
    }
}

/// `Some(message)` when the body carries a status key that does not report
/// success. A body without the status key is taken as successful.
fn reported_failure(provider: &Provider, tree: &Value) -> Option<String> {
    let status = provider.status?;
    let raw = tree.get(status.key())?;

    let ok = match status {
        StatusCheck::Equals { ok, .. } => raw.as_str() == Some(ok),
        StatusCheck::Truthy { .. } => matches!(coerce(ValueKind::Flag, raw), Ok(FieldValue::Flag(true))),
    };
    if ok {
        return None;
    }

    let message = provider
        .message_key
        .and_then(|k| tree.get(k))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("no message");
    Some(format!("{} reported failure: {}", provider.name, message))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert a raw JSON value to the field's kind, accepting the encodings
/// providers actually send (numeric strings, "yes"/"no" flags).
fn coerce(kind: ValueKind, raw: &Value) -> Result<FieldValue, String> {
    let mismatch = || format!("has type {}, expected {}", type_name(raw), kind);

    match kind {
        ValueKind::Text => match raw {
            Value::String(s) if s.trim().is_empty() => Err("is empty".to_string()),
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            _ => Err(mismatch()),
        },
        ValueKind::Float => {
            let v = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => return Err(mismatch()),
            };
            match v {
                Some(v) if v.is_finite() => Ok(FieldValue::Float(v)),
                _ => Err(format!("value {} is not a number", raw)),
            }
        }
        ValueKind::Integer => {
            let v = match raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => return Err(mismatch()),
            };
            v.map(FieldValue::Integer)
                .ok_or_else(|| format!("value {} is not an integer", raw))
        }
        ValueKind::Flag => {
            let v = match raw {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(1) => Some(true),
                    Some(0) => Some(false),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "yes" | "true" | "1" => Some(true),
                    "no" | "false" | "0" => Some(false),
                    _ => None,
                },
                _ => return Err(mismatch()),
            };
            v.map(FieldValue::Flag)
                .ok_or_else(|| format!("value {} is not a yes/no flag", raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::providers::{IPWHOIS_APP, IP_API_COM};
    use crate::geo::testing::ip_api_body;
    use crate::geo::types::Field;
    use serde_json::json;

    fn parse(provider: &Provider, body: &Value) -> Parsed {
        parse_response(provider, body.to_string().as_bytes())
    }

    #[test]
    fn test_parse_full_ip_api_response() {
        let parsed = parse(&IP_API_COM, &ip_api_body());
        assert_eq!(parsed.error, ProviderError::none());
        assert_eq!(
            parsed.slots.get(Field::City).value,
            Some(FieldValue::Text("Ashburn".into()))
        );
        assert_eq!(parsed.slots.get(Field::Region).value, Some(FieldValue::Text("Virginia".into())));
        assert_eq!(parsed.slots.get(Field::RegionCode).value, Some(FieldValue::Text("VA".into())));
        assert_eq!(parsed.slots.get(Field::GmtOffset).value, Some(FieldValue::Integer(-14400)));
        assert_eq!(parsed.slots.get(Field::Hosting).value, Some(FieldValue::Flag(true)));
        // ip-api answers "" for unknown districts
        assert!(!parsed.slots.get(Field::District).is_parsed());
        assert!(!parsed.slots.get(Field::CountryCapital).is_parsed());
    }

    #[test]
    fn test_missing_city_fails_only_city() {
        let mut body = ip_api_body();
        body.as_object_mut().unwrap().remove("city");
        let parsed = parse(&IP_API_COM, &body);

        assert!(!parsed.error.is_error());
        let city = parsed.slots.get(Field::City);
        assert!(!city.is_parsed());
        assert_eq!(city.description, "key 'city' missing from response");
        for (field, _) in IP_API_COM.fields {
            if *field != Field::City && *field != Field::District {
                assert!(parsed.slots.get(*field).is_parsed(), "{} should parse", field);
            }
        }
    }

    #[test]
    fn test_latitude_keeps_full_precision() {
        let mut body = ip_api_body();
        body["lat"] = json!(37.42158);
        let parsed = parse(&IP_API_COM, &body);
        assert_eq!(parsed.slots.get(Field::Latitude).value, Some(FieldValue::Float(37.42158)));
    }

    #[test]
    fn test_type_mismatch_is_per_field() {
        let mut body = ip_api_body();
        body["lat"] = json!({"deg": 1});
        body["mobile"] = json!("maybe");
        let parsed = parse(&IP_API_COM, &body);
        assert_eq!(
            parsed.slots.get(Field::Latitude).description,
            "key 'lat' has type object, expected float"
        );
        assert!(!parsed.slots.get(Field::Mobile).is_parsed());
        assert!(parsed.slots.get(Field::Longitude).is_parsed());
        assert!(!parsed.error.is_error());
    }

    #[test]
    fn test_ipwhois_string_encodings() {
        let body = json!({
            "success": true,
            "ip": "1.1.1.1",
            "type": "IPv4",
            "city": "Sydney",
            "latitude": "-33.8688197",
            "longitude": "151.2092955",
            "timezone_gmtOffset": "36000",
            "currency_rates": "1.52"
        });
        let parsed = parse(&IPWHOIS_APP, &body);
        assert_eq!(parsed.slots.get(Field::Latitude).value, Some(FieldValue::Float(-33.8688197)));
        assert_eq!(parsed.slots.get(Field::GmtOffset).value, Some(FieldValue::Integer(36000)));
        assert_eq!(parsed.slots.get(Field::CurrencyRates).value, Some(FieldValue::Float(1.52)));
        assert!(!parsed.slots.get(Field::Org).is_parsed());
    }

    #[test]
    fn test_flag_encodings() {
        assert_eq!(coerce(ValueKind::Flag, &json!("yes")), Ok(FieldValue::Flag(true)));
        assert_eq!(coerce(ValueKind::Flag, &json!("No")), Ok(FieldValue::Flag(false)));
        assert_eq!(coerce(ValueKind::Flag, &json!(1)), Ok(FieldValue::Flag(true)));
        assert_eq!(coerce(ValueKind::Flag, &json!(false)), Ok(FieldValue::Flag(false)));
        assert!(coerce(ValueKind::Flag, &json!(2)).is_err());
        assert!(coerce(ValueKind::Flag, &Value::Null).is_err());
    }

    #[test]
    fn test_integer_accepts_whole_floats_only() {
        assert_eq!(coerce(ValueKind::Integer, &json!(3600.0)), Ok(FieldValue::Integer(3600)));
        assert!(coerce(ValueKind::Integer, &json!(1.5)).is_err());
    }

    #[test]
    fn test_reported_failure_fails_provider() {
        let body = json!({"status": "fail", "message": "private range", "query": "10.0.0.1"});
        let parsed = parse(&IP_API_COM, &body);
        assert_eq!(parsed.error.code, ErrorCode::Parse);
        assert_eq!(parsed.error.description, "ip-api.com reported failure: private range");
        assert_eq!(parsed.slots.parsed_count(), 0);
        assert_eq!(parsed.slots.get(Field::Ip).description, parsed.error.description);

        let body = json!({"success": false, "message": "invalid IP address"});
        let parsed = parse(&IPWHOIS_APP, &body);
        assert_eq!(parsed.error.code, ErrorCode::Parse);
    }

    #[test]
    fn test_malformed_json() {
        let parsed = parse_response(&IP_API_COM, b"<html>rate limited</html>");
        assert_eq!(parsed.error.code, ErrorCode::Parse);
        assert!(parsed.error.description.starts_with("malformed JSON"));

        let parsed = parse_response(&IP_API_COM, b"[1, 2]");
        assert_eq!(parsed.error.description, "response is not a JSON object");
    }

}

use crate::models::Vitals;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Auto-provisioned devices are named after their id, so it shares the
/// patient name limit.
pub const MAX_DEVICE_ID_LEN: usize = 120;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PayloadError {
    #[error("Invalid JSON")]
    Malformed,
    #[error("Invalid JSON: body must be an object")]
    NotAnObject,
    #[error("Invalid value for '{field}': expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// A device sample after field-type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestPayload {
    /// Only consulted when the device authenticates with the shared API key.
    pub device_id: Option<String>,
    pub vitals: Vitals,
}

impl IngestPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        let value = serde_json::from_slice::<Value>(body).map_err(|_| PayloadError::Malformed)?;
        match value {
            Value::Object(object) => Self::from_object(&object),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    pub fn from_object(object: &Map<String, Value>) -> Result<Self, PayloadError> {
        let device_id = match object.get("device_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(it)) if it.trim().chars().count() > MAX_DEVICE_ID_LEN => {
                return Err(PayloadError::InvalidField {
                    field: "device_id",
                    expected: "a string of at most 120 characters",
                });
            }
            Some(Value::String(it)) => Some(it.trim().to_string()).filter(|it| !it.is_empty()),
            Some(Value::Number(it)) => Some(it.to_string()),
            Some(_) => {
                return Err(PayloadError::InvalidField {
                    field: "device_id",
                    expected: "a string",
                });
            }
        };
        Ok(Self {
            device_id,
            vitals: Vitals {
                ir: integer(object, "ir")?,
                red: integer(object, "red")?,
                finger: object.get("finger").map(truthy).unwrap_or(false),
                bpm: integer(object, "bpm")?,
                spo2: float(object, "spo2")?,
                pi: float(object, "pi")?,
                rr: float(object, "rr")?,
                sbp: integer(object, "sbp")?,
                dbp: integer(object, "dbp")?,
                temp: float(object, "temp")?,
            },
        })
    }
}

fn integer(object: &Map<String, Value>, field: &'static str) -> Result<Option<i64>, PayloadError> {
    let invalid = || PayloadError::InvalidField {
        field,
        expected: "an integer",
    };
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number_to_i64(number).map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
                .map(Some)
                .ok_or_else(invalid)
        }
        Some(_) => Err(invalid()),
    }
}

fn number_to_i64(number: &Number) -> Option<i64> {
    match number.as_i64() {
        Some(it) => Some(it),
        None => truncate(number.as_f64()?),
    }
}

/// Fractional readings are truncated toward zero. `i64::MAX as f64` rounds
/// up to 2^63, hence the strict upper bound.
fn truncate(value: f64) -> Option<i64> {
    let value = value.trunc();
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn float(object: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, PayloadError> {
    let invalid = || PayloadError::InvalidField {
        field,
        expected: "a number",
    };
    let value = match object.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    value.filter(|it| it.is_finite()).map(Some).ok_or_else(invalid)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(it) => *it,
        Value::Number(it) => it.as_f64().map(|it| it != 0.0).unwrap_or(false),
        Value::String(it) => matches!(
            it.trim().to_lowercase().as_str(),
            "1" | "true" | "t" | "yes" | "y" | "on"
        ),
        _ => false,
    }
}

#[derive(Debug, Serialize)]
pub struct IngestAckDto {
    pub ok: bool,
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<IngestPayload, PayloadError> {
        IngestPayload::from_slice(value.to_string().as_bytes())
    }

    #[test]
    fn accepts_a_full_sample() {
        let payload = parse(json!({
            "ir": 120034, "red": 98012, "finger": true,
            "bpm": 72, "spo2": 98.5, "pi": 2.1, "rr": 16,
            "sbp": 120, "dbp": 80, "temp": 36.6
        }))
        .unwrap();
        assert_eq!(
            payload.vitals,
            Vitals {
                ir: Some(120034),
                red: Some(98012),
                finger: true,
                bpm: Some(72),
                spo2: Some(98.5),
                pi: Some(2.1),
                rr: Some(16.0),
                sbp: Some(120),
                dbp: Some(80),
                temp: Some(36.6),
            }
        );
        assert_eq!(payload.device_id, None);
    }

    #[test]
    fn empty_object_is_a_valid_sample() {
        assert_eq!(parse(json!({})).unwrap(), IngestPayload::default());
    }

    #[test]
    fn coerces_strings_and_fractions() {
        let payload = parse(json!({
            "bpm": "71", "sbp": 119.9, "dbp": -0.5, "spo2": " 97.25 ", "temp": null
        }))
        .unwrap();
        assert_eq!(payload.vitals.bpm, Some(71));
        assert_eq!(payload.vitals.sbp, Some(119));
        assert_eq!(payload.vitals.dbp, Some(0));
        assert_eq!(payload.vitals.spo2, Some(97.25));
        assert_eq!(payload.vitals.temp, None);

        let payload = parse(json!({ "bpm": "72.5", "sbp": "1e2", "dbp": "-3.9", "ir": 72.5 })).unwrap();
        assert_eq!(payload.vitals.bpm, Some(72));
        assert_eq!(payload.vitals.sbp, Some(100));
        assert_eq!(payload.vitals.dbp, Some(-3));
        assert_eq!(payload.vitals.ir, Some(72));
    }

    #[test]
    fn integer_channels_reject_out_of_range_values() {
        let out_of_range = Err(PayloadError::InvalidField {
            field: "ir",
            expected: "an integer",
        });
        // 2^63 does not fit, whether sent as a number or a string
        assert_eq!(parse(json!({ "ir": 9.223372036854775808e18 })), out_of_range);
        assert_eq!(parse(json!({ "ir": "9223372036854775808" })), out_of_range);
        assert_eq!(parse(json!({ "ir": "inf" })), out_of_range);
        assert_eq!(
            parse(json!({ "ir": "-9223372036854775808" })).unwrap().vitals.ir,
            Some(i64::MIN)
        );
    }

    #[test]
    fn finger_flag_follows_truthiness() {
        for (value, expected) in [
            (json!(true), true),
            (json!(false), false),
            (json!(1), true),
            (json!(0), false),
            (json!(0.5), true),
            (json!("YES"), true),
            (json!(" on "), true),
            (json!("t"), true),
            (json!("nope"), false),
            (json!(""), false),
            (json!(null), false),
            (json!([1]), false),
        ] {
            let payload = parse(json!({ "finger": value.clone() })).unwrap();
            assert_eq!(payload.vitals.finger, expected, "finger = {value}");
        }
    }

    #[test]
    fn rejects_wrong_types() {
        assert_eq!(
            parse(json!({ "bpm": true })),
            Err(PayloadError::InvalidField {
                field: "bpm",
                expected: "an integer"
            })
        );
        assert_eq!(
            parse(json!({ "bpm": "seventy" })),
            Err(PayloadError::InvalidField {
                field: "bpm",
                expected: "an integer"
            })
        );
        assert_eq!(
            parse(json!({ "temp": { "c": 36.6 } })),
            Err(PayloadError::InvalidField {
                field: "temp",
                expected: "a number"
            })
        );
        assert_eq!(
            parse(json!({ "spo2": "NaN" })),
            Err(PayloadError::InvalidField {
                field: "spo2",
                expected: "a number"
            })
        );
        assert!(parse(json!({ "device_id": ["a"] })).is_err());
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(parse(json!([1, 2])), Err(PayloadError::NotAnObject));
        assert_eq!(parse(json!("bpm")), Err(PayloadError::NotAnObject));
        assert_eq!(
            IngestPayload::from_slice(b"{\"bpm\": 7"),
            Err(PayloadError::Malformed)
        );
        assert_eq!(IngestPayload::from_slice(b""), Err(PayloadError::Malformed));
    }

    #[test]
    fn keeps_device_id_and_ignores_unknown_fields() {
        let payload = parse(json!({ "device_id": " esp32-a1 ", "firmware": "1.2" })).unwrap();
        assert_eq!(payload.device_id.as_deref(), Some("esp32-a1"));
        let payload = parse(json!({ "device_id": 42 })).unwrap();
        assert_eq!(payload.device_id.as_deref(), Some("42"));
        let payload = parse(json!({ "device_id": "  " })).unwrap();
        assert_eq!(payload.device_id, None);
    }

    #[test]
    fn device_id_is_bounded() {
        let longest = "d".repeat(MAX_DEVICE_ID_LEN);
        let payload = parse(json!({ "device_id": format!(" {longest} ") })).unwrap();
        assert_eq!(payload.device_id.as_deref(), Some(longest.as_str()));
        assert_eq!(
            parse(json!({ "device_id": "d".repeat(MAX_DEVICE_ID_LEN + 1) })),
            Err(PayloadError::InvalidField {
                field: "device_id",
                expected: "a string of at most 120 characters",
            })
        );
    }
}

use crate::models::{ReadingEntity, Timestamp, Vitals};
use serde::Serialize;

pub const MACHINE_UNAVAILABLE: &str = "Machine unavailable";

/// Latest-reading response: either the full vitals of a fresh sample or the
/// "unavailable" sentinel when there is none inside the freshness window.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LatestReadingDto {
    Available {
        created_at: Timestamp,
        #[serde(flatten)]
        vitals: Vitals,
    },
    Unavailable {
        detail: &'static str,
    },
}

impl LatestReadingDto {
    pub fn unavailable() -> Self {
        Self::Unavailable {
            detail: MACHINE_UNAVAILABLE,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl From<ReadingEntity> for LatestReadingDto {
    fn from(value: ReadingEntity) -> Self {
        Self::Available {
            created_at: value.created_at,
            vitals: value.vitals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_both_shapes() {
        assert_eq!(
            serde_json::to_value(LatestReadingDto::unavailable()).unwrap(),
            json!({ "detail": "Machine unavailable" })
        );
        let reading = ReadingEntity {
            id: 3,
            created_at: Timestamp::from(0),
            vitals: Vitals {
                bpm: Some(64),
                finger: true,
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(LatestReadingDto::from(reading)).unwrap(),
            json!({
                "created_at": "1970-01-01T00:00:00.000+00:00",
                "ir": null, "red": null, "finger": true,
                "bpm": 64, "spo2": null, "pi": null, "rr": null,
                "sbp": null, "dbp": null, "temp": null
            })
        );
    }
}

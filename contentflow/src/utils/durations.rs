//! Serde helpers for `std::time::Duration` fields.
//!
//! Policies are written in milliseconds, job timings in fractional seconds.

/// Serializes a `Duration` as integer milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes as milliseconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserializes from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serializes an optional `Duration` as integer milliseconds.
pub mod option_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes as optional milliseconds.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes from optional milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}

/// Serializes an optional `Duration` as fractional seconds.
pub mod option_secs_f64 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes as optional seconds.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes from optional seconds, rejecting negative values.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timings {
        #[serde(with = "super::millis")]
        delay: Duration,
        #[serde(default, with = "super::option_millis")]
        timeout: Option<Duration>,
        #[serde(default, with = "super::option_secs_f64")]
        elapsed: Option<Duration>,
    }

    #[test]
    fn test_duration_formats() {
        let timings = Timings {
            delay: Duration::from_millis(250),
            timeout: None,
            elapsed: Some(Duration::from_millis(1500)),
        };
        let json = serde_json::to_value(&timings).unwrap();
        assert_eq!(json, serde_json::json!({"delay": 250, "timeout": null, "elapsed": 1.5}));

        let back: Timings = serde_json::from_value(json).unwrap();
        assert_eq!(back, timings);
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let result: Result<Timings, _> =
            serde_json::from_value(serde_json::json!({"delay": 1, "elapsed": -1.0}));
        assert!(result.is_err());
    }
}

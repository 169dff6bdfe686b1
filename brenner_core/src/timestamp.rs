//! Lenient timestamp (de)serialization
//!
//! Persisted sessions may carry dates either as RFC 3339 strings or as epoch
//! milliseconds (the native date encoding of some writers). Both decode to
//! `DateTime<Utc>`; encoding always produces RFC 3339.
//!
//! Use with `#[serde(with = "crate::timestamp")]` or, for optional fields,
//! `#[serde(default, with = "crate::timestamp::option")]`.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(TimestampVisitor)
}

/// Parse a timestamp string or millisecond count outside of serde
pub fn parse_str(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Check whether a JSON value decodes as a timestamp
pub fn is_timestamp_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => parse_str(s).is_some(),
        serde_json::Value::Number(n) => n.as_i64().and_then(from_millis).is_some(),
        _ => false,
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("an RFC 3339 timestamp string or epoch milliseconds")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        parse_str(value).ok_or_else(|| E::custom(format!("invalid timestamp: {:?}", value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        from_millis(value).ok_or_else(|| E::custom(format!("timestamp out of range: {}", value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        let millis = i64::try_from(value)
            .map_err(|_| E::custom(format!("timestamp out of range: {}", value)))?;
        self.visit_i64(millis)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if !value.is_finite() {
            return Err(E::custom("timestamp must be finite"));
        }
        self.visit_i64(value.trunc() as i64)
    }
}

pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => super::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super")] DateTime<Utc>);

        let wrapped = Option::<Wrapper>::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapper(dt)| dt))
    }
}

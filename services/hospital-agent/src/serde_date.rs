//! Lenient calendar-date (de)serialization.
//!
//! The world model sends dates either as `YYYY-MM-DD` or as a full ISO-8601
//! timestamp. Only the calendar date is kept.

use chrono::NaiveDate;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%Y-%m-%d";

pub fn serialize<S>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&value.format(FORMAT))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(D::Error::custom)
}

fn parse(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, FORMAT).map_err(|e| format!("invalid date {raw:?}: {e}"))
}

/// Same rules for optional fields; `null` and a missing field both map to `None`.
pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => super::serialize(date, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(&raw).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super")]
        born: NaiveDate,
        #[serde(default, with = "super::option")]
        died: Option<NaiveDate>,
    }

    #[test]
    fn test_accepts_plain_date() {
        let parsed: Wrapper = serde_json::from_str(r#"{"born":"1990-04-22"}"#).unwrap();
        assert_eq!(parsed.born, NaiveDate::from_ymd_opt(1990, 4, 22).unwrap());
        assert_eq!(parsed.died, None);
    }

    #[test]
    fn test_accepts_timestamp() {
        let parsed: Wrapper = serde_json::from_str(
            r#"{"born":"1985-06-15T00:00:00","died":"2024-01-02T10:11:12Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.born, NaiveDate::from_ymd_opt(1985, 6, 15).unwrap());
        assert_eq!(parsed.died, NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"born":"yesterday"}"#).is_err());
    }

    #[test]
    fn test_serializes_plain_date() {
        let value = Wrapper {
            born: NaiveDate::from_ymd_opt(1980, 7, 1).unwrap(),
            died: None,
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"born":"1980-07-01","died":null}"#);
    }
}

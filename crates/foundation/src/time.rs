use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Creation time reported by the map service.
///
/// Service timestamps arrive as free-form strings. Anything that cannot be
/// parsed becomes an unknown timestamp, which orders before every real one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Option<DateTime<Utc>>);

impl Timestamp {
    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(Some(at))
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::unknown();
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Self::from_utc(at.with_timezone(&Utc));
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Self::from_utc(naive.and_utc());
            }
        }
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Self(date.and_hms_opt(0, 0, 0).map(|n| n.and_utc())),
            Err(_) => Self::unknown(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    /// UTC calendar day, dropping the time of day.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.0.map(|at| at.date_naive())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_str(""),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Timestamp::parse).unwrap_or_default())
    }
}

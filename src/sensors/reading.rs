//! The timestamped metric set produced by one sample.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Serialized timestamp layout, e.g. `Mon Jan 01 00:15:00 2024`.
pub const TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Metric keys as they appear in the snapshot and in daily logs.
pub mod keys {
    pub const TIME: &str = "time";
    pub const TEMPERATURE: &str = "temp";
    pub const HUMIDITY: &str = "humi";
    pub const PRESSURE: &str = "pres";
    pub const LIGHT: &str = "lux";
    pub const NOISE_LOW: &str = "low";
    pub const NOISE_MID: &str = "mid";
    pub const NOISE_HIGH: &str = "high";
    pub const NOISE_AMP: &str = "amp";
    pub const WIND_DIRECTION: &str = "windDir";
    pub const WIND_SPEED: &str = "windSp";
    pub const OXIDISING: &str = "oxi";
    pub const REDUCING: &str = "red";
    pub const NH3: &str = "nh3";
    pub const PM1: &str = "pm1";
    pub const PM25: &str = "pm25";
    pub const PM10: &str = "pm10";
}

/// Format a local wall-clock instant the way readings are stored.
pub fn format_time(time: &NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// Also accepts the space-padded day that C `asctime` produces
/// (`Mon Jan  1 00:00:00 2024`).
pub fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, TIME_FORMAT).ok()
}

/// One timestamped set of sensor values.
///
/// Values keep their insertion order, which is also their on-disk key order.
/// `None` is the explicit absence marker and serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    time: NaiveDateTime,
    values: Vec<(String, Option<f64>)>,
}

impl Reading {
    pub fn new(time: NaiveDateTime) -> Self {
        Self {
            time,
            values: Vec::new(),
        }
    }

    /// Start a reading stamped with the current local time, truncated to seconds.
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Self::new(now.with_nanosecond(0).unwrap_or(now))
    }

    /// Append a metric, replacing the value if the key is already present.
    pub fn set(&mut self, key: impl Into<String>, value: Option<f64>) {
        let key = key.into();
        match self.values.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Option<f64>) -> Self {
        self.set(key, value);
        self
    }

    /// Merge a partial reading's values in order.
    pub fn extend(&mut self, values: impl IntoIterator<Item = (&'static str, Option<f64>)>) {
        for (key, value) in values {
            self.set(key, value);
        }
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn formatted_time(&self) -> String {
        format_time(&self.time)
    }

    /// `None` if the key is not part of this reading, `Some(None)` if it is
    /// present but absent-valued.
    pub fn get(&self, key: &str) -> Option<Option<f64>> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry(keys::TIME, &self.formatted_time())?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Number(f64),
    Other(IgnoredAny),
}

struct ReadingVisitor;

impl<'de> Visitor<'de> for ReadingVisitor {
    type Value = Reading;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a reading object with a `time` field")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Reading, A::Error> {
        let mut time = None;
        let mut values = Vec::new();

        while let Some(key) = access.next_key::<String>()? {
            if key == keys::TIME {
                let raw: String = access.next_value()?;
                let parsed = parse_time(&raw).ok_or_else(|| {
                    de::Error::invalid_value(de::Unexpected::Str(&raw), &"an asctime timestamp")
                })?;
                time = Some(parsed);
                continue;
            }
            // Non-numeric fields from newer writers are ignored.
            match access.next_value::<Option<StoredValue>>()? {
                Some(StoredValue::Number(n)) => values.push((key, Some(n))),
                None => values.push((key, None)),
                Some(StoredValue::Other(_)) => {}
            }
        }

        let time = time.ok_or_else(|| de::Error::missing_field(keys::TIME))?;
        Ok(Reading { time, values })
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ReadingVisitor)
    }
}

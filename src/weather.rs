//! Time-bounded cache in front of the external weather API.
//!
//! The cache owns a single [`WeatherCacheEntry`]. A fetch happens on the first
//! call and whenever the entry is at least `interval` old; failures are cached
//! the same way as payloads so a failing endpoint is not hammered.

use crate::config::WeatherConfig;
use crate::error::{EnviroError, Result, WeatherFetchError};
use crate::sensors::reading::keys;
use crate::units::UnitSystem;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// Upstream request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherResponse {
    Data(Value),
    Failed(WeatherFetchError),
}

impl WeatherResponse {
    pub fn is_failed(&self) -> bool {
        matches!(self, WeatherResponse::Failed(_))
    }
}

/// Performs one request against the weather upstream.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch(&self) -> WeatherResponse;
}

/// OpenWeather current-conditions client.
pub struct OpenWeatherClient {
    client: reqwest::Client,
    url: String,
    params: Vec<(&'static str, String)>,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig, units: UnitSystem) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| EnviroError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.api_url.clone(),
            params: vec![
                ("lat", config.latitude.clone()),
                ("lon", config.longitude.clone()),
                ("appid", config.api_key.clone()),
                ("units", units.as_query_value().to_string()),
            ],
        })
    }
}

fn classify(err: &reqwest::Error) -> WeatherFetchError {
    if err.is_timeout() {
        WeatherFetchError::Timeout
    } else if err.is_connect() {
        WeatherFetchError::Connection
    } else {
        WeatherFetchError::Transport(err.to_string())
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherClient {
    async fn fetch(&self) -> WeatherResponse {
        let response = match self.client.get(&self.url).query(&self.params).send().await {
            Ok(response) => response,
            Err(e) => return WeatherResponse::Failed(classify(&e)),
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return WeatherResponse::Failed(WeatherFetchError::Status(status.as_u16()));
        }

        match response.json::<Value>().await {
            Ok(body) => WeatherResponse::Data(body),
            Err(e) => WeatherResponse::Failed(classify(&e)),
        }
    }
}

/// Last fetched payload and when it was fetched.
#[derive(Debug, Clone)]
pub struct WeatherCacheEntry {
    pub payload: Arc<WeatherResponse>,
    pub fetched_at: Instant,
}

impl WeatherCacheEntry {
    fn is_fresh(&self, interval: Duration) -> bool {
        self.fetched_at.elapsed() < interval
    }
}

pub struct WeatherCache {
    fetcher: Box<dyn WeatherFetcher>,
    interval: Duration,
    entry: Mutex<Option<WeatherCacheEntry>>,
}

impl WeatherCache {
    pub fn new(fetcher: Box<dyn WeatherFetcher>, interval: Duration) -> Self {
        Self {
            fetcher,
            interval,
            entry: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current payload, fetching a new one when the cached entry is stale.
    ///
    /// Two concurrent callers that both see a stale entry may both fetch.
    pub async fn get(&self) -> Arc<WeatherResponse> {
        if let Some(payload) = self.cached() {
            return payload;
        }

        debug!("Weather cache stale, fetching");
        let payload = Arc::new(self.fetcher.fetch().await);
        if let WeatherResponse::Failed(cause) = payload.as_ref() {
            error!("Error fetching weather API data: {}", cause);
        }

        *self.lock_entry() = Some(WeatherCacheEntry {
            payload: Arc::clone(&payload),
            fetched_at: Instant::now(),
        });
        payload
    }

    /// Cached payload if it is still within the interval.
    pub fn cached(&self) -> Option<Arc<WeatherResponse>> {
        self.lock_entry()
            .as_ref()
            .filter(|entry| entry.is_fresh(self.interval))
            .map(|entry| Arc::clone(&entry.payload))
    }

    fn lock_entry(&self) -> std::sync::MutexGuard<'_, Option<WeatherCacheEntry>> {
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wind direction and speed from a weather payload.
///
/// A cached failure, or a payload missing either field, yields no wind data.
pub fn wind_readings(
    payload: &WeatherResponse,
    units: UnitSystem,
) -> [(&'static str, Option<f64>); 2] {
    let wind = match payload {
        WeatherResponse::Data(body) => body.get("wind"),
        WeatherResponse::Failed(_) => None,
    };
    let direction = wind.and_then(|w| w.get("deg")).and_then(Value::as_f64);
    let speed = wind.and_then(|w| w.get("speed")).and_then(Value::as_f64);

    match (direction, speed) {
        (Some(direction), Some(speed)) => [
            (keys::WIND_DIRECTION, Some(direction)),
            (keys::WIND_SPEED, Some(units.wind_speed(speed))),
        ],
        _ => [(keys::WIND_DIRECTION, None), (keys::WIND_SPEED, None)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        response: WeatherResponse,
    }

    #[async_trait]
    impl WeatherFetcher for CountingFetcher {
        async fn fetch(&self) -> WeatherResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn cache_with(response: WeatherResponse) -> (WeatherCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            calls: Arc::clone(&calls),
            response,
        };
        (
            WeatherCache::new(Box::new(fetcher), Duration::from_secs(600)),
            calls,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_within_interval_share_payload() {
        let (cache, calls) = cache_with(WeatherResponse::Data(json!({"wind": {}})));

        let first = cache.get().await;
        tokio::time::advance(Duration::from_secs(599)).await;
        let second = cache.get().await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_interval_fetches_once_more() {
        let (cache, calls) = cache_with(WeatherResponse::Data(json!({})));

        let first = cache.get().await;
        tokio::time::advance(Duration::from_secs(600)).await;
        let second = cache.get().await;
        let third = cache.get().await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_cached() {
        let (cache, calls) = cache_with(WeatherResponse::Failed(WeatherFetchError::Timeout));

        assert!(cache.get().await.is_failed());
        assert!(cache.get().await.is_failed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wind_from_payload_metric() {
        let payload = WeatherResponse::Data(json!({"wind": {"deg": 270, "speed": 5.0}}));
        let [(dir_key, dir), (sp_key, sp)] = wind_readings(&payload, UnitSystem::Metric);
        assert_eq!(dir_key, keys::WIND_DIRECTION);
        assert_eq!(dir, Some(270.0));
        assert_eq!(sp_key, keys::WIND_SPEED);
        assert_eq!(sp, Some(18.0));
    }

    #[test]
    fn test_wind_absent_on_error_or_missing_field() {
        let failed = WeatherResponse::Failed(WeatherFetchError::Status(500));
        assert_eq!(
            wind_readings(&failed, UnitSystem::Metric),
            [(keys::WIND_DIRECTION, None), (keys::WIND_SPEED, None)]
        );

        let partial = WeatherResponse::Data(json!({"wind": {"deg": 90}}));
        assert_eq!(
            wind_readings(&partial, UnitSystem::Imperial),
            [(keys::WIND_DIRECTION, None), (keys::WIND_SPEED, None)]
        );
    }
}

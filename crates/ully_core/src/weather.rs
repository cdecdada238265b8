//! crates/ully_core/src/weather.rs
//!
//! Best-effort location and weather lookup used to enrich the system prompt.
//! Every step returns a typed error internally; the public lookup degrades to `None`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{Accuracy, WeatherContext};
use crate::ports::{Clock, LocationService, PortError, WeatherService};

/// How long a successful lookup is reused.
pub const WEATHER_CACHE_TTL_MINUTES: i64 = 30;
const WEATHER_CACHE_KEY: &str = "weather_location";

//=========================================================================================
// TTL Cache
//=========================================================================================

struct CacheSlot<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// A keyed cache whose entries expire after a fixed age, measured by an injected clock.
pub struct TtlCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, CacheSlot<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value for `key` if it is younger than the TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        let slots = self.slots.lock().ok()?;
        let slot = slots.get(key)?;
        if self.clock.now() - slot.stored_at < self.ttl {
            Some(slot.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: &str, value: V) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(
                key.to_string(),
                CacheSlot {
                    value,
                    stored_at: self.clock.now(),
                },
            );
        }
    }
}

//=========================================================================================
// Weather Feed Parsing
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("location permission was not granted")]
    PermissionDenied,
    #[error("weather lookup failed: {0}")]
    Port(#[from] PortError),
    #[error("malformed weather response: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct WttrResponse {
    current_condition: Vec<CurrentCondition>,
    nearest_area: Vec<NearestArea>,
}

#[derive(Deserialize)]
struct CurrentCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "temp_F")]
    temp_f: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    #[serde(rename = "FeelsLikeF")]
    feels_like_f: String,
    #[serde(rename = "weatherDesc")]
    weather_desc: Vec<TextValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearestArea {
    area_name: Vec<TextValue>,
    region: Vec<TextValue>,
    country: Vec<TextValue>,
}

#[derive(Deserialize)]
struct TextValue {
    value: String,
}

fn first_value(values: Vec<TextValue>, field: &str) -> Result<String, WeatherError> {
    values
        .into_iter()
        .next()
        .map(|v| v.value)
        .ok_or_else(|| WeatherError::Malformed(format!("missing {field}")))
}

/// Parses a `format=j1` weather body into a fully populated context.
pub fn parse_weather_response(body: &str) -> Result<WeatherContext, WeatherError> {
    let response: WttrResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Malformed(e.to_string()))?;

    let current = response
        .current_condition
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::Malformed("missing current_condition".into()))?;
    let area = response
        .nearest_area
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::Malformed("missing nearest_area".into()))?;

    Ok(WeatherContext {
        city: first_value(area.area_name, "areaName")?,
        region: first_value(area.region, "region")?,
        country: first_value(area.country, "country")?,
        temp_c: current.temp_c,
        temp_f: current.temp_f,
        feels_like_c: current.feels_like_c,
        feels_like_f: current.feels_like_f,
        condition: first_value(current.weather_desc, "weatherDesc")?,
    })
}

//=========================================================================================
// Provider
//=========================================================================================

pub struct WeatherLocationProvider {
    location: Arc<dyn LocationService>,
    weather: Arc<dyn WeatherService>,
    cache: Arc<TtlCache<WeatherContext>>,
}

impl WeatherLocationProvider {
    pub fn new(
        location: Arc<dyn LocationService>,
        weather: Arc<dyn WeatherService>,
        cache: Arc<TtlCache<WeatherContext>>,
    ) -> Self {
        Self {
            location,
            weather,
            cache,
        }
    }

    /// Builds a provider with the standard 30 minute cache.
    pub fn with_default_cache(
        location: Arc<dyn LocationService>,
        weather: Arc<dyn WeatherService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = Duration::minutes(WEATHER_CACHE_TTL_MINUTES);
        Self::new(location, weather, Arc::new(TtlCache::new(ttl, clock)))
    }

    /// Returns the current location and weather, or `None` if any step fails.
    pub async fn get_weather_and_location(&self) -> Option<WeatherContext> {
        match self.lookup().await {
            Ok(context) => Some(context),
            Err(e) => {
                debug!("Weather context unavailable: {}", e);
                None
            }
        }
    }

    pub async fn lookup(&self) -> Result<WeatherContext, WeatherError> {
        if let Some(cached) = self.cache.get(WEATHER_CACHE_KEY) {
            return Ok(cached);
        }

        let status = self.location.request_foreground_permission().await?;
        if !status.is_granted() {
            return Err(WeatherError::PermissionDenied);
        }

        let position = self.location.current_position(Accuracy::Low).await?;
        let body = self.weather.fetch_by_coordinates(position).await?;
        let context = parse_weather_response(&body)?;

        info!(
            "Weather context refreshed for {}, {}: {}",
            context.city, context.region, context.condition
        );
        self.cache.insert(WEATHER_CACHE_KEY, context.clone());
        Ok(context)
    }
}

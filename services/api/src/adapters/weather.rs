//! services/api/src/adapters/weather.rs
//!
//! Adapters behind the weather context: the wttr.in feed and a location
//! service backed by the configured home coordinates.

use async_trait::async_trait;
use reqwest::Client;
use ully_core::domain::{Accuracy, Coordinates, PermissionStatus};
use ully_core::ports::{LocationService, PortError, PortResult, WeatherService};

//=========================================================================================
// Weather Feed
//=========================================================================================

/// Fetches `format=j1` weather reports by coordinates.
#[derive(Clone)]
pub struct WttrWeatherAdapter {
    client: Client,
    base_url: String,
}

impl WttrWeatherAdapter {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url_for(&self, coordinates: Coordinates) -> String {
        format!(
            "{}/{:.4},{:.4}?format=j1",
            self.base_url.trim_end_matches('/'),
            coordinates.latitude,
            coordinates.longitude
        )
    }
}

#[async_trait]
impl WeatherService for WttrWeatherAdapter {
    async fn fetch_by_coordinates(&self, coordinates: Coordinates) -> PortResult<String> {
        let response = self
            .client
            .get(self.url_for(coordinates))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "weather feed returned HTTP {}",
                response.status().as_u16()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// Location
//=========================================================================================

/// A location service for a stationary device: permission is granted only when
/// home coordinates are configured.
#[derive(Clone, Debug)]
pub struct FixedLocationAdapter {
    home: Option<Coordinates>,
}

impl FixedLocationAdapter {
    pub fn new(home: Option<Coordinates>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl LocationService for FixedLocationAdapter {
    async fn request_foreground_permission(&self) -> PortResult<PermissionStatus> {
        Ok(match self.home {
            Some(_) => PermissionStatus::Granted,
            None => PermissionStatus::Denied,
        })
    }

    async fn current_position(&self, _accuracy: Accuracy) -> PortResult<Coordinates> {
        self.home
            .ok_or_else(|| PortError::PermissionDenied("no location configured".to_string()))
    }
}

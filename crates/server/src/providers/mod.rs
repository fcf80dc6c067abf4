//! HTTP clients for the third-party lookups scripts invoke.

pub mod openweather;
pub mod yelp;

use std::sync::Arc;
use std::time::Duration;

use hearsay_core::adapters::{PlaceSearch, Unconfigured, WeatherLookup};
use hearsay_core::config::{WeatherConfig, YelpConfig};
use hearsay_core::errors::AdapterError;

pub use openweather::OpenWeatherClient;
pub use yelp::YelpClient;

fn http_client(provider: &'static str, timeout_secs: u64) -> Result<reqwest::Client, AdapterError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static("hearsay-bot"),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| AdapterError::Transport { provider, reason: error.to_string() })
}

/// Maps a reqwest failure to an adapter error. The request URL is dropped first since
/// some providers take their API key as a query parameter.
fn request_error(provider: &'static str, error: reqwest::Error) -> AdapterError {
    let error = error.without_url();
    if error.is_timeout() {
        AdapterError::Timeout { provider }
    } else if error.is_decode() {
        AdapterError::Decode { provider, reason: error.to_string() }
    } else {
        AdapterError::Transport { provider, reason: error.to_string() }
    }
}

/// The Yelp client when an API key is configured, otherwise a stand-in that reports
/// the provider as not configured.
pub fn place_search(config: &YelpConfig) -> Result<Arc<dyn PlaceSearch>, AdapterError> {
    let adapter: Arc<dyn PlaceSearch> = match YelpClient::new(config)? {
        Some(client) => Arc::new(client),
        None => Arc::new(Unconfigured { provider: yelp::PROVIDER }),
    };
    Ok(adapter)
}

pub fn weather_lookup(config: &WeatherConfig) -> Result<Arc<dyn WeatherLookup>, AdapterError> {
    let adapter: Arc<dyn WeatherLookup> = match OpenWeatherClient::new(config)? {
        Some(client) => Arc::new(client),
        None => Arc::new(Unconfigured { provider: openweather::PROVIDER }),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use hearsay_core::adapters::{PlaceSearch, PostalCode, WeatherLookup};
    use hearsay_core::config::AppConfig;
    use hearsay_core::errors::AdapterError;

    use super::{place_search, weather_lookup};

    #[tokio::test]
    async fn missing_keys_yield_not_configured_adapters() {
        let config = AppConfig::default();

        let places = place_search(&config.yelp).expect("adapter");
        let weather = weather_lookup(&config.weather).expect("adapter");

        assert_eq!(
            places.search_places("pizza", "Hanover").await,
            Err(AdapterError::NotConfigured { provider: "yelp" })
        );
        let zip = PostalCode::parse("03755").expect("zip");
        assert_eq!(
            weather.current_weather(&zip).await,
            Err(AdapterError::NotConfigured { provider: "openweathermap" })
        );
    }
}

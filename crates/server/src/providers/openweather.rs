use async_trait::async_trait;
use hearsay_core::adapters::{PostalCode, TemperatureUnits, WeatherLookup, WeatherReport};
use hearsay_core::config::WeatherConfig;
use hearsay_core::errors::AdapterError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{http_client, request_error};

pub const PROVIDER: &str = "openweathermap";

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    name: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

/// OpenWeatherMap current conditions by zip code.
#[derive(Clone)]
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    units: TemperatureUnits,
    country_code: String,
}

impl OpenWeatherClient {
    /// `None` when no API key is configured.
    pub fn new(config: &WeatherConfig) -> Result<Option<Self>, AdapterError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            http: http_client(PROVIDER, config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            units: config.units,
            country_code: config.country_code.to_ascii_lowercase(),
        }))
    }

    fn report(&self, body: CurrentWeather, postal_code: &PostalCode) -> WeatherReport {
        let condition = body.weather.into_iter().next();
        let (description, icon) = match condition {
            Some(condition) => (condition.description, condition.icon),
            None => (String::new(), None),
        };
        let location_name = if body.name.trim().is_empty() {
            postal_code.five_digit().to_owned()
        } else {
            body.name
        };

        WeatherReport {
            location_name,
            current_temp: body.main.temp,
            high_temp: body.main.temp_max,
            low_temp: body.main.temp_min,
            description: if description.is_empty() {
                "no description".to_owned()
            } else {
                description
            },
            icon_url: icon
                .filter(|icon| !icon.is_empty())
                .map(|icon| format!("{ICON_BASE_URL}/{icon}@2x.png")),
            units: self.units,
        }
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    async fn current_weather(
        &self,
        postal_code: &PostalCode,
    ) -> Result<WeatherReport, AdapterError> {
        let zip = format!("{},{}", postal_code.five_digit(), self.country_code);
        let response = self
            .http
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("zip", zip.as_str()),
                ("units", self.units.as_str()),
                ("appid", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|error| request_error(PROVIDER, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status { provider: PROVIDER, status: status.as_u16() });
        }

        let body: CurrentWeather =
            response.json().await.map_err(|error| request_error(PROVIDER, error))?;
        debug!(
            event_name = "adapter.weather.response_decoded",
            postal_code = %postal_code,
            location = %body.name,
            "decoded current weather response"
        );

        Ok(self.report(body, postal_code))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use hearsay_core::adapters::{PostalCode, TemperatureUnits, WeatherLookup, WeatherReport};
    use hearsay_core::config::WeatherConfig;
    use hearsay_core::errors::AdapterError;
    use serde_json::{json, Value};

    use super::OpenWeatherClient;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{address}/data/2.5")
    }

    fn config(base_url: String) -> WeatherConfig {
        WeatherConfig {
            api_key: Some("owm-test-key".to_string().into()),
            base_url,
            units: TemperatureUnits::Metric,
            country_code: "US".to_owned(),
            timeout_secs: 5,
        }
    }

    async fn current(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if params.get("appid").map(String::as_str) != Some("owm-test-key") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"cod": 401, "message": "Invalid API key"})));
        }
        if params.get("zip").map(String::as_str) != Some("03755,us") {
            return (StatusCode::NOT_FOUND, Json(json!({"cod": "404", "message": "city not found"})));
        }
        if params.get("units").map(String::as_str) != Some("metric") {
            return (StatusCode::BAD_REQUEST, Json(json!({"cod": "400"})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "name": "Hanover",
                "main": {"temp": 5.2, "temp_min": 3.1, "temp_max": 7.8, "humidity": 80},
                "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
                "cod": 200
            })),
        )
    }

    #[tokio::test]
    async fn lookup_uses_five_digit_zip_and_builds_report() {
        let base = serve(Router::new().route("/data/2.5/weather", get(current))).await;
        let client = OpenWeatherClient::new(&config(base)).expect("client").expect("configured");
        let zip = PostalCode::parse("03755-1234").expect("zip");

        let report = client.current_weather(&zip).await.expect("report");

        assert_eq!(
            report,
            WeatherReport {
                location_name: "Hanover".to_owned(),
                current_temp: 5.2,
                high_temp: 7.8,
                low_temp: 3.1,
                description: "light rain".to_owned(),
                icon_url: Some("https://openweathermap.org/img/wn/10d@2x.png".to_owned()),
                units: TemperatureUnits::Metric,
            }
        );
    }

    #[tokio::test]
    async fn unknown_zip_surfaces_provider_status() {
        let base = serve(Router::new().route("/data/2.5/weather", get(current))).await;
        let client = OpenWeatherClient::new(&config(base)).expect("client").expect("configured");
        let zip = PostalCode::parse("99999").expect("zip");

        let result = client.current_weather(&zip).await;

        assert_eq!(result, Err(AdapterError::Status { provider: "openweathermap", status: 404 }));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("address");
        drop(listener);
        let client = OpenWeatherClient::new(&config(format!("http://{address}")))
            .expect("client")
            .expect("configured");
        let zip = PostalCode::parse("03755").expect("zip");

        let error = client.current_weather(&zip).await.expect_err("unreachable");

        assert!(
            matches!(error, AdapterError::Transport { provider: "openweathermap", .. }),
            "{error:?}"
        );
        assert!(!error.to_string().contains("owm-test-key"), "{error}");
        assert!(!format!("{error:?}").contains("appid"), "{error:?}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error_without_the_key() {
        let base = serve(Router::new().route(
            "/data/2.5/weather",
            get(|| async { Json(json!({"name": "Hanover", "main": "not an object"})) }),
        ))
        .await;
        let client = OpenWeatherClient::new(&config(base)).expect("client").expect("configured");
        let zip = PostalCode::parse("03755").expect("zip");

        let error = client.current_weather(&zip).await.expect_err("malformed");

        assert!(
            matches!(error, AdapterError::Decode { provider: "openweathermap", .. }),
            "{error:?}"
        );
        assert!(!format!("{error:?}").contains("owm-test-key"), "{error:?}");
    }
}

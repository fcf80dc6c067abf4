use async_trait::async_trait;
use hearsay_core::adapters::{PlaceRecord, PlaceSearch};
use hearsay_core::config::YelpConfig;
use hearsay_core::errors::AdapterError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{http_client, request_error};

pub const PROVIDER: &str = "yelp";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<Business>,
}

#[derive(Debug, Deserialize)]
struct Business {
    name: String,
    #[serde(default)]
    rating: Option<f32>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    title: String,
}

impl From<Business> for PlaceRecord {
    fn from(business: Business) -> Self {
        let snippet = business
            .categories
            .iter()
            .map(|category| category.title.trim())
            .filter(|title| !title.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            name: business.name,
            rating: business.rating,
            url: business.url.filter(|url| !url.is_empty()),
            snippet: (!snippet.is_empty()).then_some(snippet),
            image_url: business.image_url.filter(|url| !url.is_empty()),
        }
    }
}

/// Yelp Fusion business search.
#[derive(Clone)]
pub struct YelpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    result_limit: u32,
}

impl YelpClient {
    /// `None` when no API key is configured.
    pub fn new(config: &YelpConfig) -> Result<Option<Self>, AdapterError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            http: http_client(PROVIDER, config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            result_limit: config.result_limit,
        }))
    }
}

#[async_trait]
impl PlaceSearch for YelpClient {
    async fn search_places(
        &self,
        term: &str,
        location: &str,
    ) -> Result<Vec<PlaceRecord>, AdapterError> {
        let limit = self.result_limit.to_string();
        let response = self
            .http
            .get(format!("{}/businesses/search", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .query(&[("term", term), ("location", location), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|error| request_error(PROVIDER, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status { provider: PROVIDER, status: status.as_u16() });
        }

        let body: SearchResponse =
            response.json().await.map_err(|error| request_error(PROVIDER, error))?;
        debug!(
            event_name = "adapter.yelp.response_decoded",
            businesses = body.businesses.len(),
            "decoded yelp search response"
        );

        Ok(body.businesses.into_iter().map(PlaceRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use hearsay_core::adapters::{PlaceRecord, PlaceSearch};
    use hearsay_core::config::YelpConfig;
    use hearsay_core::errors::AdapterError;
    use serde_json::{json, Value};

    use super::YelpClient;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{address}/v3")
    }

    fn config(base_url: String) -> YelpConfig {
        YelpConfig {
            api_key: Some("yelp-test-key".to_string().into()),
            base_url,
            result_limit: 2,
            timeout_secs: 5,
        }
    }

    async fn search(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == "Bearer yelp-test-key");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"code": "TOKEN_INVALID"}})));
        }
        if params.get("term").map(String::as_str) != Some("pizza")
            || params.get("location").map(String::as_str) != Some("Hanover, NH")
            || params.get("limit").map(String::as_str) != Some("2")
        {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": {"code": "VALIDATION_ERROR"}})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "businesses": [
                    {
                        "name": "Ramunto's",
                        "rating": 4.5,
                        "url": "https://www.yelp.com/biz/ramuntos",
                        "image_url": "https://s3-media.fl.yelpcdn.com/ramuntos.jpg",
                        "categories": [{"alias": "pizza", "title": "Pizza"}, {"alias": "bars", "title": "Bars"}]
                    },
                    {
                        "name": "Everything But Anchovies",
                        "image_url": "",
                        "categories": []
                    }
                ],
                "total": 2
            })),
        )
    }

    #[tokio::test]
    async fn search_maps_businesses_to_place_records() {
        let base = serve(Router::new().route("/v3/businesses/search", get(search))).await;
        let client = YelpClient::new(&config(base)).expect("client").expect("configured");

        let places = client.search_places("pizza", "Hanover, NH").await.expect("places");

        assert_eq!(
            places,
            vec![
                PlaceRecord {
                    name: "Ramunto's".to_owned(),
                    rating: Some(4.5),
                    url: Some("https://www.yelp.com/biz/ramuntos".to_owned()),
                    snippet: Some("Pizza, Bars".to_owned()),
                    image_url: Some("https://s3-media.fl.yelpcdn.com/ramuntos.jpg".to_owned()),
                },
                PlaceRecord {
                    name: "Everything But Anchovies".to_owned(),
                    rating: None,
                    url: None,
                    snippet: None,
                    image_url: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn error_status_surfaces_as_status_error() {
        let base = serve(Router::new().route("/v3/businesses/search", get(search))).await;
        let mut config = config(base);
        config.api_key = Some("wrong-key".to_string().into());
        let client = YelpClient::new(&config).expect("client").expect("configured");

        let result = client.search_places("pizza", "Hanover, NH").await;

        assert_eq!(result, Err(AdapterError::Status { provider: "yelp", status: 401 }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let base = serve(Router::new().route(
            "/v3/businesses/search",
            get(|| async { Json(json!({"businesses": [{"rating": 3.0}]})) }),
        ))
        .await;
        let client = YelpClient::new(&config(base)).expect("client").expect("configured");

        let result = client.search_places("pizza", "Hanover, NH").await;

        assert!(matches!(result, Err(AdapterError::Decode { provider: "yelp", .. })), "{result:?}");
    }

    #[test]
    fn no_api_key_means_no_client() {
        let mut config = config("http://127.0.0.1:9".to_owned());
        config.api_key = None;

        assert!(YelpClient::new(&config).expect("client").is_none());
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use hearsay_core::adapters::{
    places_reply, weather_reply, PlaceSearch, PostalCode, WeatherLookup,
};
use hearsay_core::dialogue::{ActionError, ActionHandler, ActionOutcome, ActionRequest};
use hearsay_core::reply::ReplyPayload;
use tracing::{info, warn};

pub const SEARCH_PLACES: &str = "search_places";
pub const CURRENT_WEATHER: &str = "current_weather";

/// Runs the adapter calls scripts invoke by name.
///
/// A failed lookup is not a dialogue failure: the user gets the fallback message and the
/// conversation ends.
pub struct BotActions {
    places: Arc<dyn PlaceSearch>,
    weather: Arc<dyn WeatherLookup>,
}

impl BotActions {
    pub fn new(places: Arc<dyn PlaceSearch>, weather: Arc<dyn WeatherLookup>) -> Self {
        Self { places, weather }
    }

    pub fn names(&self) -> BTreeSet<&'static str> {
        BTreeSet::from([SEARCH_PLACES, CURRENT_WEATHER])
    }

    async fn search_places(
        &self,
        request: ActionRequest<'_>,
    ) -> Result<ActionOutcome, ActionError> {
        let term = request.captured("type")?;
        let location = request.captured("location")?;

        let result = self.places.search_places(term, location).await;
        let replies = places_reply(term, location, &result);
        match &result {
            Ok(places) => {
                info!(
                    event_name = "adapter.yelp.search_completed",
                    term,
                    location,
                    results = places.len(),
                    "place search completed"
                );
                Ok(ActionOutcome::proceed(replies))
            }
            Err(error) => {
                warn!(
                    event_name = "adapter.yelp.request_failed",
                    term,
                    location,
                    error = %error,
                    "place search failed"
                );
                Ok(ActionOutcome::stop(replies))
            }
        }
    }

    async fn current_weather(
        &self,
        request: ActionRequest<'_>,
    ) -> Result<ActionOutcome, ActionError> {
        let answer = request.captured(request.step)?;
        let postal_code = match PostalCode::parse(answer) {
            Ok(postal_code) => postal_code,
            Err(error) => {
                warn!(event_name = "adapter.weather.invalid_input", error = %error, "rejected zip");
                return Ok(ActionOutcome::stop(vec![ReplyPayload::text(format!(
                    "{error}. Ask me about the weather again when you have one."
                ))]));
            }
        };

        let result = self.weather.current_weather(&postal_code).await;
        let replies = weather_reply(&result);
        match &result {
            Ok(report) => {
                info!(
                    event_name = "adapter.weather.lookup_completed",
                    postal_code = %postal_code,
                    location = %report.location_name,
                    "weather lookup completed"
                );
                Ok(ActionOutcome::proceed(replies))
            }
            Err(error) => {
                warn!(
                    event_name = "adapter.weather.request_failed",
                    postal_code = %postal_code,
                    error = %error,
                    "weather lookup failed"
                );
                Ok(ActionOutcome::stop(replies))
            }
        }
    }
}

#[async_trait]
impl ActionHandler for BotActions {
    async fn invoke(&self, request: ActionRequest<'_>) -> Result<ActionOutcome, ActionError> {
        match request.name {
            SEARCH_PLACES => self.search_places(request).await,
            CURRENT_WEATHER => self.current_weather(request).await,
            other => Err(ActionError::Unknown(other.to_owned())),
        }
    }
}

//! Contracts for the external data sources the bot talks to, and the mapping from
//! their results into replies.
//!
//! The concrete HTTP clients live in `hearsay-server`; everything here is plain data
//! plus async traits so scripts can be exercised with in-memory fakes.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AdapterError, ValidationError};
use crate::reply::{Card, ReplyPayload};

/// Matches the same inputs as [`PostalCode::parse`]; used as a dialogue branch pattern.
pub const POSTAL_CODE_PATTERN: &str = r"^\s*[0-9]{5}(-[0-9]{4})?\s*$";

const PLACE_ACCENT: &str = "#7CD197";
const WEATHER_ACCENT: &str = "#3AA3E3";

/// A US postal code: five digits with an optional `-dddd` suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostalCode(String);

impl PostalCode {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let candidate = input.trim();
        let bytes = candidate.as_bytes();
        let five = bytes.len() == 5 && bytes.iter().all(u8::is_ascii_digit);
        let plus_four = bytes.len() == 10
            && bytes[..5].iter().all(u8::is_ascii_digit)
            && bytes[5] == b'-'
            && bytes[6..].iter().all(u8::is_ascii_digit);

        if five || plus_four {
            Ok(Self(candidate.to_owned()))
        } else {
            Err(ValidationError::PostalCode { input: input.to_owned() })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading five digits, which is all most weather providers accept.
    pub fn five_digit(&self) -> &str {
        self.0.get(..5).unwrap_or(&self.0)
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub name: String,
    pub rating: Option<f32>,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnits {
    Imperial,
    Metric,
    Standard,
}

impl TemperatureUnits {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imperial => "imperial",
            Self::Metric => "metric",
            Self::Standard => "standard",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Imperial => "°F",
            Self::Metric => "°C",
            Self::Standard => "K",
        }
    }
}

impl std::str::FromStr for TemperatureUnits {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "imperial" => Ok(Self::Imperial),
            "metric" => Ok(Self::Metric),
            "standard" => Ok(Self::Standard),
            other => Err(format!("unsupported units `{other}` (expected imperial|metric|standard)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location_name: String,
    pub current_temp: f64,
    pub high_temp: f64,
    pub low_temp: f64,
    pub description: String,
    pub icon_url: Option<String>,
    pub units: TemperatureUnits,
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search_places(
        &self,
        term: &str,
        location: &str,
    ) -> Result<Vec<PlaceRecord>, AdapterError>;
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn current_weather(&self, postal_code: &PostalCode)
        -> Result<WeatherReport, AdapterError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, AdapterError>;
}

/// Stands in for a provider whose credentials were not supplied.
#[derive(Clone, Copy, Debug)]
pub struct Unconfigured {
    pub provider: &'static str,
}

#[async_trait]
impl PlaceSearch for Unconfigured {
    async fn search_places(
        &self,
        _term: &str,
        _location: &str,
    ) -> Result<Vec<PlaceRecord>, AdapterError> {
        Err(AdapterError::NotConfigured { provider: self.provider })
    }
}

#[async_trait]
impl WeatherLookup for Unconfigured {
    async fn current_weather(
        &self,
        _postal_code: &PostalCode,
    ) -> Result<WeatherReport, AdapterError> {
        Err(AdapterError::NotConfigured { provider: self.provider })
    }
}

#[async_trait]
impl UserDirectory for Unconfigured {
    async fn display_name(&self, _user_id: &str) -> Result<Option<String>, AdapterError> {
        Err(AdapterError::NotConfigured { provider: self.provider })
    }
}

pub fn places_reply(
    term: &str,
    location: &str,
    result: &Result<Vec<PlaceRecord>, AdapterError>,
) -> Vec<ReplyPayload> {
    match result {
        Ok(places) if places.is_empty() => vec![ReplyPayload::text(format!(
            "I couldn't find any {term} near {location}. Maybe try something else?"
        ))],
        Ok(places) => {
            let mut replies = vec![ReplyPayload::text(format!(
                "Here's what I found for {term} near {location}:"
            ))];
            replies.extend(places.iter().map(|place| ReplyPayload::Card(place_card(place))));
            replies
        }
        Err(_) => vec![ReplyPayload::text(format!(
            "Sorry, I couldn't look up {term} right now. Let's try again later."
        ))],
    }
}

fn place_card(place: &PlaceRecord) -> Card {
    let summary = match place.rating {
        Some(rating) => format!("{}: rated {rating:.1}", place.name),
        None => place.name.clone(),
    };
    let body = match (place.rating, &place.snippet) {
        (Some(rating), Some(snippet)) => Some(format!("Rating: {rating:.1}/5\n{snippet}")),
        (Some(rating), None) => Some(format!("Rating: {rating:.1}/5")),
        (None, Some(snippet)) => Some(snippet.clone()),
        (None, None) => None,
    };

    let mut card = Card::new().summary(summary).title(place.name.clone()).accent(PLACE_ACCENT);
    card.title_link = place.url.clone();
    card.body_text = body;
    card.image_url = place.image_url.clone();
    card
}

pub fn weather_reply(result: &Result<WeatherReport, AdapterError>) -> Vec<ReplyPayload> {
    match result {
        Ok(report) => {
            let unit = report.units.symbol();
            let mut card = Card::new()
                .summary(format!(
                    "{}: {:.0}{unit}, {}",
                    report.location_name, report.current_temp, report.description
                ))
                .title(format!("Weather in {}", report.location_name))
                .body(format!(
                    "Currently {:.0}{unit} with {}. High {:.0}{unit} / low {:.0}{unit}.",
                    report.current_temp, report.description, report.high_temp, report.low_temp
                ))
                .accent(WEATHER_ACCENT);
            card.image_url = report.icon_url.clone();
            vec![ReplyPayload::Card(card)]
        }
        Err(_) => vec![ReplyPayload::text("Sorry, I can't find weather for that zip code.")],
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::{
        places_reply, weather_reply, PlaceRecord, PostalCode, TemperatureUnits, WeatherReport,
        POSTAL_CODE_PATTERN,
    };
    use crate::errors::{AdapterError, ValidationError};
    use crate::reply::ReplyPayload;

    #[test]
    fn postal_code_accepts_five_digits_and_zip_plus_four() {
        assert_eq!(PostalCode::parse("03755").expect("zip").as_str(), "03755");
        let plus_four = PostalCode::parse(" 03755-1234 ").expect("zip+4");
        assert_eq!(plus_four.as_str(), "03755-1234");
        assert_eq!(plus_four.five_digit(), "03755");
    }

    #[test]
    fn postal_code_rejects_everything_else() {
        for input in ["abc", "0375", "037555", "03755-12", "03755 1234", "", "０３７５５"] {
            assert_eq!(
                PostalCode::parse(input),
                Err(ValidationError::PostalCode { input: input.to_owned() }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn branch_pattern_agrees_with_parser() {
        let pattern = Regex::new(POSTAL_CODE_PATTERN).expect("pattern");
        for input in ["03755", "03755-1234", " 00000 ", "abc", "1234", "12345-", "12345x"] {
            assert_eq!(
                pattern.is_match(input),
                PostalCode::parse(input).is_ok(),
                "pattern and parser disagree on {input:?}"
            );
        }
    }

    #[test]
    fn empty_search_and_failed_search_render_differently() {
        let empty = places_reply("pizza", "Hanover", &Ok(Vec::new()));
        let failed = places_reply(
            "pizza",
            "Hanover",
            &Err(AdapterError::Transport {
                provider: "yelp",
                reason: "network timeout".to_owned(),
            }),
        );

        assert_ne!(empty, failed);
        assert_eq!(
            empty,
            vec![ReplyPayload::text(
                "I couldn't find any pizza near Hanover. Maybe try something else?"
            )]
        );
    }

    #[test]
    fn search_results_render_one_card_per_place() {
        let replies = places_reply(
            "pizza",
            "Hanover",
            &Ok(vec![
                PlaceRecord {
                    name: "Ramunto's".to_owned(),
                    rating: Some(4.0),
                    url: Some("https://www.yelp.com/biz/ramuntos".to_owned()),
                    snippet: Some("Pizza".to_owned()),
                    image_url: None,
                },
                PlaceRecord {
                    name: "Everything But Anchovies".to_owned(),
                    rating: None,
                    url: None,
                    snippet: None,
                    image_url: None,
                },
            ]),
        );

        assert_eq!(replies.len(), 3);
        let ReplyPayload::Card(first) = &replies[1] else {
            panic!("expected a card");
        };
        assert_eq!(first.body_text.as_deref(), Some("Rating: 4.0/5\nPizza"));
        let ReplyPayload::Card(second) = &replies[2] else {
            panic!("expected a card");
        };
        assert_eq!(second.body_text, None);
        assert_eq!(second.title_link, None);
    }

    #[test]
    fn weather_failure_says_it_cannot_find_the_zip() {
        let replies = weather_reply(&Err(AdapterError::Status { provider: "openweathermap", status: 404 }));

        assert_eq!(
            replies,
            vec![ReplyPayload::text("Sorry, I can't find weather for that zip code.")]
        );
    }

    #[test]
    fn weather_report_renders_as_card() {
        let replies = weather_reply(&Ok(WeatherReport {
            location_name: "Hanover".to_owned(),
            current_temp: 41.2,
            high_temp: 44.0,
            low_temp: 37.6,
            description: "light rain".to_owned(),
            icon_url: Some("https://openweathermap.org/img/wn/10d@2x.png".to_owned()),
            units: TemperatureUnits::Imperial,
        }));

        let [ReplyPayload::Card(card)] = replies.as_slice() else {
            panic!("expected a single card");
        };
        assert_eq!(card.summary_text.as_deref(), Some("Hanover: 41°F, light rain"));
        assert_eq!(
            card.body_text.as_deref(),
            Some("Currently 41°F with light rain. High 44°F / low 38°F.")
        );
    }

    #[test]
    fn units_parse_case_insensitively() {
        assert_eq!("Metric".parse::<TemperatureUnits>(), Ok(TemperatureUnits::Metric));
        assert!("kelvin".parse::<TemperatureUnits>().is_err());
    }
}

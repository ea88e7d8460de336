//! Current conditions from OpenWeather (geocoding, then current weather).

use crate::collaborators::{WeatherConditions, WeatherSource};
use crate::config::{secret_from_env, WeatherConfig};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GeoMatch {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    weather: Vec<WeatherSummary>,
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct WeatherSummary {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

pub struct OpenWeatherClient {
    http: Client,
    geo_url: String,
    weather_url: String,
    units: String,
    api_key: Option<SecretString>,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig, api_key: Option<SecretString>) -> Self {
        Self {
            http: Client::new(),
            geo_url: config.geo_url.clone(),
            weather_url: config.weather_url.clone(),
            units: config.units.clone(),
            api_key,
        }
    }

    pub fn from_config(config: &WeatherConfig) -> Self {
        Self::new(config, secret_from_env(&config.api_key_env))
    }

    fn geocode(&self, location: &str, api_key: &str) -> Result<Option<GeoMatch>> {
        let body = self
            .http
            .get(&self.geo_url)
            .query(&[("q", location), ("limit", "1"), ("appid", api_key)])
            .send()?
            .text()?;
        parse_geocode(&body)
    }

    fn current(&self, place: &GeoMatch, api_key: &str) -> Result<CurrentWeather> {
        let (lat, lon) = (place.lat.to_string(), place.lon.to_string());
        let body = self
            .http
            .get(&self.weather_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", api_key),
                ("units", self.units.as_str()),
            ])
            .send()?
            .text()?;
        serde_json::from_str(&body).context("Unexpected weather response")
    }
}

impl WeatherSource for OpenWeatherClient {
    fn conditions_for(
        &self,
        location: &str,
        timezone: Option<&str>,
    ) -> Result<Option<WeatherConditions>> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("no weather API key configured");
            return Ok(None);
        };
        if location.trim().is_empty() {
            return Ok(None);
        }

        let Some(place) = self.geocode(location, api_key.expose_secret())? else {
            tracing::debug!(location, "location did not geocode");
            return Ok(None);
        };
        let current = self.current(&place, api_key.expose_secret())?;
        let local_time = timezone.and_then(|tz| local_time(tz, Utc::now()));
        conditions_from(current, local_time).map(Some)
    }
}

fn parse_geocode(body: &str) -> Result<Option<GeoMatch>> {
    let matches: Vec<GeoMatch> =
        serde_json::from_str(body).context("Unexpected geocoding response")?;
    Ok(matches.into_iter().next())
}

fn conditions_from(current: CurrentWeather, local_time: Option<String>) -> Result<WeatherConditions> {
    let summary = current
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Weather response had no conditions"))?;
    Ok(WeatherConditions {
        condition: summary.main,
        description: summary.description,
        temp: current.main.temp,
        feels_like: current.main.feels_like,
        humidity: current.main.humidity,
        local_time,
    })
}

/// `HH:MM` at `now` in the named IANA zone; `None` for unknown zones
fn local_time(timezone: &str, now: DateTime<Utc>) -> Option<String> {
    let tz: Tz = timezone.trim().parse().ok()?;
    Some(now.with_timezone(&tz).format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_time_in_zone() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 15, 30, 0).unwrap();
        assert_eq!(local_time("America/Chicago", now).as_deref(), Some("10:30"));
        assert_eq!(local_time("Asia/Kolkata", now).as_deref(), Some("21:00"));
    }

    #[test]
    fn test_unknown_zone_has_no_local_time() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 15, 30, 0).unwrap();
        assert!(local_time("Central Time", now).is_none());
    }

    #[test]
    fn test_geocode_first_match() {
        let body = r#"[{"name":"Austin","lat":30.27,"lon":-97.74,"country":"US","state":"Texas"}]"#;
        let place = parse_geocode(body).unwrap().unwrap();
        assert_eq!(place.lat, 30.27);
        assert!(parse_geocode("[]").unwrap().is_none());
        assert!(parse_geocode(r#"{"cod":401}"#).is_err());
    }

    #[test]
    fn test_conditions_from_current() {
        let current: CurrentWeather = serde_json::from_str(
            r#"{
                "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
                "main": {"temp": 31.2, "feels_like": 33.0, "temp_min": 29.0, "humidity": 40}
            }"#,
        )
        .unwrap();
        let conditions = conditions_from(current, Some("10:30".into())).unwrap();
        assert_eq!(conditions.condition, "Clear");
        assert_eq!(conditions.description, "clear sky");
        assert_eq!(conditions.humidity, 40.0);
        assert_eq!(conditions.local_time.as_deref(), Some("10:30"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let client = OpenWeatherClient::new(&WeatherConfig::default(), None);
        assert!(client.conditions_for("Austin, Texas", None).unwrap().is_none());
    }
}

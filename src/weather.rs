//! OpenWeatherMap client: geocode the city, then current conditions and the
//! 3-hourly forecast for the next two days.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::WeatherOptions;

const FORECAST_HORIZON_HOURS: i64 = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub temp: i32,
    pub wind: i32,
    pub icon: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourForecast {
    pub time: DateTime<Local>,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub current: Conditions,
    pub hours: Vec<HourForecast>,
}

#[derive(Debug, Deserialize)]
struct GeoHit {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Main {
    #[serde(default)]
    temp: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct Description {
    icon: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    dt: i64,
    #[serde(default)]
    main: Main,
    #[serde(default)]
    wind: Wind,
    #[serde(default)]
    weather: Vec<Description>,
}

impl Observation {
    fn conditions(&self) -> Conditions {
        let first = self.weather.first();
        Conditions {
            temp: self.main.temp.round() as i32,
            wind: self.wind.speed.round() as i32,
            icon: first.and_then(|w| w.icon.clone()),
            description: first.map(|w| w.description.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    list: Vec<Observation>,
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    options: WeatherOptions,
}

impl WeatherClient {
    pub fn new(options: WeatherOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { client, options })
    }

    pub async fn report(&self, city: &str, now: DateTime<Utc>) -> Result<WeatherReport> {
        if self.options.api_key.trim().is_empty() {
            return Err(eyre!("No weather API key configured"));
        }

        let (lat, lon) = self.coordinates(city).await?;
        let position = [("lat", lat.to_string()), ("lon", lon.to_string())];

        let current: Observation = self.get("/data/2.5/weather", &position, "Current").await?;
        let forecast: Forecast = self.get("/data/2.5/forecast", &position, "Forecast").await?;

        let horizon = now + chrono::Duration::hours(FORECAST_HORIZON_HOURS);
        let hours = forecast
            .list
            .iter()
            .filter_map(|row| {
                let time = Utc.timestamp_opt(row.dt, 0).single()?;
                (time >= now && time <= horizon).then(|| HourForecast {
                    time: time.with_timezone(&Local),
                    conditions: row.conditions(),
                })
            })
            .collect();

        Ok(WeatherReport {
            current: current.conditions(),
            hours,
        })
    }

    async fn coordinates(&self, city: &str) -> Result<(f64, f64)> {
        let query = [("q", city.to_string()), ("limit", "1".to_string())];
        let hits: Vec<GeoHit> = self.get("/geo/1.0/direct", &query, "Geocoding").await?;
        hits.first()
            .map(|hit| (hit.lat, hit.lon))
            .ok_or_else(|| eyre!("City '{city}' not found"))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let url = format!("{}{path}", self.options.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[
                ("units", "metric"),
                ("lang", self.options.language.as_str()),
                ("appid", self.options.api_key.as_str()),
            ])
            .send()
            .await
            .wrap_err_with(|| format!("{what} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(eyre!("{what} {}", status.as_u16()));
        }

        response
            .json()
            .await
            .wrap_err_with(|| format!("{what} response was not understood"))
    }
}

/// A terminal-friendly symbol for an OpenWeatherMap icon code.
pub fn icon_glyph(icon: Option<&str>) -> &'static str {
    let Some(icon) = icon else {
        return " ";
    };
    match icon.get(..2).unwrap_or_default() {
        "01" => "☀",
        "02" => "⛅",
        "03" | "04" => "☁",
        "09" | "10" => "☂",
        "11" => "⚡",
        "13" => "❄",
        "50" => "≋",
        _ => "?",
    }
}

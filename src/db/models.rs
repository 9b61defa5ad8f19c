use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::config::CityConfig;
use crate::helpers::dec_to_f64;

/// A city row from the `cities` table.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow
pub struct City {
    pub id: Uuid,
    pub name: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub elevation_m: Decimal,
    pub is_active: bool,
}

impl City {
    /// Fetch parameters for a city that exists only in the datastore.
    pub fn fetch_target(&self) -> FetchTarget {
        FetchTarget {
            name: self.name.clone(),
            latitude: dec_to_f64(self.latitude),
            longitude: dec_to_f64(self.longitude),
            elevation_m: dec_to_f64(self.elevation_m),
        }
    }
}

/// Coordinates handed to the API client. Built either from the static
/// default-city list or from a `cities` row.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
}

impl From<&CityConfig> for FetchTarget {
    fn from(cfg: &CityConfig) -> Self {
        Self {
            name: cfg.name.to_string(),
            latitude: cfg.latitude,
            longitude: cfg.longitude,
            elevation_m: cfg.elevation_m,
        }
    }
}

/// One hourly weather observation or forecast for a city.
///
/// Conflict key: (city_id, recorded_at, is_forecast). `recorded_at` is the
/// zone-local wall-clock time exactly as the API reports it, without an
/// offset.
#[derive(Debug, Clone)]
pub struct HourlyWeatherRecord {
    pub city_id: Uuid,
    pub recorded_at: NaiveDateTime,
    pub is_forecast: bool,
    pub temperature_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub dewpoint_2m: Option<f64>,
    pub precipitation: f64,
    pub precipitation_probability: Option<f64>,
    pub rain: f64,
    pub wind_speed_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
    pub weather_code: Option<i32>,
    pub cloud_cover: Option<f64>,
    pub visibility: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub uv_index: Option<f64>,
}

/// One hourly air-quality sample for a city.
///
/// Conflict key: (city_id, recorded_at). All metrics are nullable; a missing
/// pollutant stays NULL rather than defaulting to zero.
#[derive(Debug, Clone)]
pub struct AirQualityRecord {
    pub city_id: Uuid,
    pub recorded_at: NaiveDateTime,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub dust: Option<f64>,
    pub carbon_monoxide: Option<f64>,
    pub nitrogen_dioxide: Option<f64>,
    pub sulphur_dioxide: Option<f64>,
    pub ozone: Option<f64>,
    pub us_aqi: Option<f64>,
    pub european_aqi: Option<f64>,
    pub us_aqi_pm2_5: Option<f64>,
    pub us_aqi_pm10: Option<f64>,
}

/// Daily extremes joined with same-day AQI statistics and hazard flags.
///
/// Conflict key: (city_id, date). Recomputed from scratch every run; an
/// upsert fully replaces the previous row for the key.
#[derive(Debug, Clone)]
pub struct DailyAggregateRecord {
    pub city_id: Uuid,
    pub date: NaiveDate,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub apparent_temp_max: Option<f64>,
    pub apparent_temp_min: Option<f64>,
    pub precipitation_sum: f64,
    pub precipitation_hours: f64,
    pub precipitation_probability_max: Option<f64>,
    pub rain_sum: f64,
    pub wind_speed_max: Option<f64>,
    pub wind_gusts_max: Option<f64>,
    pub wind_direction_dominant: Option<f64>,
    pub weather_code: Option<i32>,
    pub sunrise: Option<NaiveDateTime>,
    pub sunset: Option<NaiveDateTime>,
    pub uv_index_max: Option<f64>,
    pub aqi_mean: Option<f64>,
    pub aqi_max: Option<f64>,
    pub pm2_5_mean: Option<f64>,
    pub pm10_mean: Option<f64>,
    pub dust_mean: Option<f64>,
    pub is_heatwave: bool,
    pub is_dust_storm_risk: bool,
    pub is_heavy_rain: bool,
}

/// Hazard category of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    Heatwave,
    DustStorm,
    HeavyRain,
    HazardousAqi,
    VeryPoorAqi,
    PoorAqi,
    HighUv,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Heatwave => "heatwave",
            AlertType::DustStorm => "dust_storm",
            AlertType::HeavyRain => "heavy_rain",
            AlertType::HazardousAqi => "hazardous_aqi",
            AlertType::VeryPoorAqi => "very_poor_aqi",
            AlertType::PoorAqi => "poor_aqi",
            AlertType::HighUv => "high_uv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Moderate,
    High,
    Extreme,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Moderate => "moderate",
            AlertSeverity::High => "high",
            AlertSeverity::Extreme => "extreme",
        }
    }
}

/// A generated hazard alert. Insert-only; the id is assigned at insert time.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub city_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub value: f64,
    pub threshold: f64,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

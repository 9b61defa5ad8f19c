//! Raw payload → flat record transformation.
//!
//! Open-Meteo responses carry one array per requested variable, positionally
//! aligned against a shared `time` array of zone-local wall-clock strings.
//! Each transformer emits one record per `time` entry, in input order; a
//! variable array that is absent or shorter than `time` yields the declared
//! default at out-of-range indices. Deduplication is left entirely to the
//! upsert conflict keys.

use chrono::NaiveDateTime;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{AirQualityRecord, HourlyWeatherRecord};

#[derive(Debug, Default, Deserialize)]
struct HourlyWeatherSeries {
    #[serde(default)]
    time: Vec<String>,
    temperature_2m: Option<Vec<Option<f64>>>,
    apparent_temperature: Option<Vec<Option<f64>>>,
    relative_humidity_2m: Option<Vec<Option<f64>>>,
    dewpoint_2m: Option<Vec<Option<f64>>>,
    precipitation: Option<Vec<Option<f64>>>,
    precipitation_probability: Option<Vec<Option<f64>>>,
    rain: Option<Vec<Option<f64>>>,
    wind_speed_10m: Option<Vec<Option<f64>>>,
    wind_direction_10m: Option<Vec<Option<f64>>>,
    wind_gusts_10m: Option<Vec<Option<f64>>>,
    weather_code: Option<Vec<Option<f64>>>,
    cloud_cover: Option<Vec<Option<f64>>>,
    visibility: Option<Vec<Option<f64>>>,
    surface_pressure: Option<Vec<Option<f64>>>,
    uv_index: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyAqiSeries {
    #[serde(default)]
    time: Vec<String>,
    pm2_5: Option<Vec<Option<f64>>>,
    pm10: Option<Vec<Option<f64>>>,
    dust: Option<Vec<Option<f64>>>,
    carbon_monoxide: Option<Vec<Option<f64>>>,
    nitrogen_dioxide: Option<Vec<Option<f64>>>,
    sulphur_dioxide: Option<Vec<Option<f64>>>,
    ozone: Option<Vec<Option<f64>>>,
    us_aqi: Option<Vec<Option<f64>>>,
    european_aqi: Option<Vec<Option<f64>>>,
    us_aqi_pm2_5: Option<Vec<Option<f64>>>,
    us_aqi_pm10: Option<Vec<Option<f64>>>,
}

/// The daily block of a weather response. Consumed by the daily aggregator.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DailyWeatherSeries {
    #[serde(default)]
    pub time: Vec<String>,
    pub temperature_2m_max: Option<Vec<Option<f64>>>,
    pub temperature_2m_min: Option<Vec<Option<f64>>>,
    pub apparent_temperature_max: Option<Vec<Option<f64>>>,
    pub apparent_temperature_min: Option<Vec<Option<f64>>>,
    pub precipitation_sum: Option<Vec<Option<f64>>>,
    pub precipitation_hours: Option<Vec<Option<f64>>>,
    pub precipitation_probability_max: Option<Vec<Option<f64>>>,
    pub rain_sum: Option<Vec<Option<f64>>>,
    pub wind_speed_10m_max: Option<Vec<Option<f64>>>,
    pub wind_gusts_10m_max: Option<Vec<Option<f64>>>,
    pub wind_direction_10m_dominant: Option<Vec<Option<f64>>>,
    pub weather_code: Option<Vec<Option<f64>>>,
    pub sunrise: Option<Vec<Option<String>>>,
    pub sunset: Option<Vec<Option<String>>>,
    pub uv_index_max: Option<Vec<Option<f64>>>,
}

/// Positional lookup into a variable series; absent series and out-of-range
/// indices both map to None.
pub(crate) fn series_value(series: Option<&Vec<Option<f64>>>, idx: usize) -> Option<f64> {
    series.and_then(|v| v.get(idx)).copied().flatten()
}

/// Same lookup for string-valued series (sunrise/sunset).
pub(crate) fn series_string(series: Option<&Vec<Option<String>>>, idx: usize) -> Option<String> {
    series.and_then(|v| v.get(idx)).cloned().flatten()
}

/// Parse a zone-local Open-Meteo timestamp ("2024-05-01T06:00" or with
/// seconds). No offset is attached; the value stays naive.
pub(crate) fn parse_local_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Deserialize one block (`hourly`/`daily`) of a raw payload, tolerating its
/// absence. A present-but-malformed block logs a warning and yields the
/// default, which transforms to zero records.
pub(crate) fn parse_block<T: Default + serde::de::DeserializeOwned>(
    raw: &serde_json::Value,
    key: &str,
) -> T {
    match raw.get(key) {
        Some(block) => match serde_json::from_value(block.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Malformed '{}' block in payload, ignoring: {}", key, e);
                T::default()
            }
        },
        None => T::default(),
    }
}

/// Transform a raw weather payload into hourly records for one city.
///
/// `now` is the naive reference time used to derive `is_forecast`; a record
/// is a forecast iff its timestamp is strictly after `now`. Both sides of
/// the comparison are naive wall-clock values and the caller owns the choice
/// of reference clock.
pub fn hourly_weather_records(
    raw: &serde_json::Value,
    city_id: Uuid,
    now: NaiveDateTime,
) -> Vec<HourlyWeatherRecord> {
    let hourly: HourlyWeatherSeries = parse_block(raw, "hourly");

    let mut records = Vec::with_capacity(hourly.time.len());
    for (i, time_str) in hourly.time.iter().enumerate() {
        let Some(recorded_at) = parse_local_timestamp(time_str) else {
            tracing::warn!("Skipping hourly weather entry with bad timestamp '{}'", time_str);
            continue;
        };

        records.push(HourlyWeatherRecord {
            city_id,
            recorded_at,
            is_forecast: recorded_at > now,
            temperature_2m: series_value(hourly.temperature_2m.as_ref(), i),
            apparent_temperature: series_value(hourly.apparent_temperature.as_ref(), i),
            relative_humidity_2m: series_value(hourly.relative_humidity_2m.as_ref(), i),
            dewpoint_2m: series_value(hourly.dewpoint_2m.as_ref(), i),
            precipitation: series_value(hourly.precipitation.as_ref(), i).unwrap_or(0.0),
            precipitation_probability: series_value(hourly.precipitation_probability.as_ref(), i),
            rain: series_value(hourly.rain.as_ref(), i).unwrap_or(0.0),
            wind_speed_10m: series_value(hourly.wind_speed_10m.as_ref(), i),
            wind_direction_10m: series_value(hourly.wind_direction_10m.as_ref(), i),
            wind_gusts_10m: series_value(hourly.wind_gusts_10m.as_ref(), i),
            weather_code: series_value(hourly.weather_code.as_ref(), i).map(|v| v as i32),
            cloud_cover: series_value(hourly.cloud_cover.as_ref(), i),
            visibility: series_value(hourly.visibility.as_ref(), i),
            surface_pressure: series_value(hourly.surface_pressure.as_ref(), i),
            uv_index: series_value(hourly.uv_index.as_ref(), i),
        });
    }

    tracing::debug!("Transformed {} hourly weather records", records.len());
    records
}

/// Transform a raw air-quality payload into hourly records for one city.
pub fn air_quality_records(raw: &serde_json::Value, city_id: Uuid) -> Vec<AirQualityRecord> {
    let hourly: HourlyAqiSeries = parse_block(raw, "hourly");

    let mut records = Vec::with_capacity(hourly.time.len());
    for (i, time_str) in hourly.time.iter().enumerate() {
        let Some(recorded_at) = parse_local_timestamp(time_str) else {
            tracing::warn!("Skipping air-quality entry with bad timestamp '{}'", time_str);
            continue;
        };

        records.push(AirQualityRecord {
            city_id,
            recorded_at,
            pm2_5: series_value(hourly.pm2_5.as_ref(), i),
            pm10: series_value(hourly.pm10.as_ref(), i),
            dust: series_value(hourly.dust.as_ref(), i),
            carbon_monoxide: series_value(hourly.carbon_monoxide.as_ref(), i),
            nitrogen_dioxide: series_value(hourly.nitrogen_dioxide.as_ref(), i),
            sulphur_dioxide: series_value(hourly.sulphur_dioxide.as_ref(), i),
            ozone: series_value(hourly.ozone.as_ref(), i),
            us_aqi: series_value(hourly.us_aqi.as_ref(), i),
            european_aqi: series_value(hourly.european_aqi.as_ref(), i),
            us_aqi_pm2_5: series_value(hourly.us_aqi_pm2_5.as_ref(), i),
            us_aqi_pm10: series_value(hourly.us_aqi_pm10.as_ref(), i),
        });
    }

    tracing::debug!("Transformed {} air-quality records", records.len());
    records
}

//! Daily aggregation: weather daily extremes joined with same-day AQI
//! statistics, plus hazard flags.
//!
//! Hourly air-quality records are grouped by the calendar date of their
//! timestamp; each group contributes mean/max statistics to the matching
//! entry of the weather payload's daily time array. A date with no AQI group
//! simply has absent statistics, which is not an error.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::config::THRESHOLDS;
use crate::db::models::{AirQualityRecord, DailyAggregateRecord};
use crate::services::transform::{
    parse_block, parse_local_timestamp, series_string, series_value, DailyWeatherSeries,
};

/// Per-date summary statistics over one day's hourly AQI records.
#[derive(Debug, Clone, Default)]
struct DailyAqiStats {
    aqi_mean: Option<f64>,
    aqi_max: Option<f64>,
    pm2_5_mean: Option<f64>,
    pm10_mean: Option<f64>,
    dust_mean: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Group hourly AQI records by calendar date and compute summary statistics.
/// Null samples are excluded from each statistic rather than zeroed.
fn daily_aqi_stats(records: &[AirQualityRecord]) -> HashMap<NaiveDate, DailyAqiStats> {
    let mut groups: HashMap<NaiveDate, Vec<&AirQualityRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.recorded_at.date()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(date, group)| {
            let aqi: Vec<f64> = group.iter().filter_map(|r| r.us_aqi).collect();
            let pm2_5: Vec<f64> = group.iter().filter_map(|r| r.pm2_5).collect();
            let pm10: Vec<f64> = group.iter().filter_map(|r| r.pm10).collect();
            let dust: Vec<f64> = group.iter().filter_map(|r| r.dust).collect();
            let stats = DailyAqiStats {
                aqi_mean: mean(&aqi),
                aqi_max: max(&aqi),
                pm2_5_mean: mean(&pm2_5),
                pm10_mean: mean(&pm10),
                dust_mean: mean(&dust),
            };
            (date, stats)
        })
        .collect()
}

fn parse_daily_timestamp(value: Option<String>) -> Option<NaiveDateTime> {
    value.as_deref().and_then(parse_local_timestamp)
}

/// Build daily aggregate records for one city from the weather payload's
/// daily block and that city's just-transformed hourly AQI records.
pub fn daily_aggregates(
    weather_raw: &serde_json::Value,
    aqi_records: &[AirQualityRecord],
    city_id: Uuid,
) -> Vec<DailyAggregateRecord> {
    let daily: DailyWeatherSeries = parse_block(weather_raw, "daily");
    let aqi_by_date = daily_aqi_stats(aqi_records);

    let mut records = Vec::with_capacity(daily.time.len());
    for (i, date_str) in daily.time.iter().enumerate() {
        let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            tracing::warn!("Skipping daily entry with bad date '{}'", date_str);
            continue;
        };

        let temp_max = series_value(daily.temperature_2m_max.as_ref(), i);
        let precipitation_sum = series_value(daily.precipitation_sum.as_ref(), i).unwrap_or(0.0);
        let wind_speed_max = series_value(daily.wind_speed_10m_max.as_ref(), i);
        let stats = aqi_by_date.get(&date).cloned().unwrap_or_default();

        let is_heatwave = temp_max.is_some_and(|t| t > THRESHOLDS.heatwave_temp);
        // Conjunctive rule: both operands must be present and above threshold.
        let is_dust_storm_risk = stats.dust_mean.is_some_and(|d| d > THRESHOLDS.dust_storm_dust)
            && wind_speed_max.is_some_and(|w| w > THRESHOLDS.dust_storm_wind);
        let is_heavy_rain = precipitation_sum > THRESHOLDS.heavy_rain_mm;

        records.push(DailyAggregateRecord {
            city_id,
            date,
            temp_max,
            temp_min: series_value(daily.temperature_2m_min.as_ref(), i),
            apparent_temp_max: series_value(daily.apparent_temperature_max.as_ref(), i),
            apparent_temp_min: series_value(daily.apparent_temperature_min.as_ref(), i),
            precipitation_sum,
            precipitation_hours: series_value(daily.precipitation_hours.as_ref(), i)
                .unwrap_or(0.0),
            precipitation_probability_max: series_value(
                daily.precipitation_probability_max.as_ref(),
                i,
            ),
            rain_sum: series_value(daily.rain_sum.as_ref(), i).unwrap_or(0.0),
            wind_speed_max,
            wind_gusts_max: series_value(daily.wind_gusts_10m_max.as_ref(), i),
            wind_direction_dominant: series_value(daily.wind_direction_10m_dominant.as_ref(), i),
            weather_code: series_value(daily.weather_code.as_ref(), i).map(|v| v as i32),
            sunrise: parse_daily_timestamp(series_string(daily.sunrise.as_ref(), i)),
            sunset: parse_daily_timestamp(series_string(daily.sunset.as_ref(), i)),
            uv_index_max: series_value(daily.uv_index_max.as_ref(), i),
            aqi_mean: stats.aqi_mean,
            aqi_max: stats.aqi_max,
            pm2_5_mean: stats.pm2_5_mean,
            pm10_mean: stats.pm10_mean,
            dust_mean: stats.dust_mean,
            is_heatwave,
            is_dust_storm_risk,
            is_heavy_rain,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> Uuid {
        Uuid::new_v4()
    }

    fn aqi_record(time: &str, us_aqi: Option<f64>, dust: Option<f64>) -> AirQualityRecord {
        AirQualityRecord {
            city_id: Uuid::nil(),
            recorded_at: parse_local_timestamp(time).unwrap(),
            pm2_5: Some(20.0),
            pm10: Some(60.0),
            dust,
            carbon_monoxide: None,
            nitrogen_dioxide: None,
            sulphur_dioxide: None,
            ozone: None,
            us_aqi,
            european_aqi: None,
            us_aqi_pm2_5: None,
            us_aqi_pm10: None,
        }
    }

    #[test]
    fn test_aqi_stats_grouped_by_date() {
        let records = vec![
            aqi_record("2024-05-01T06:00", Some(100.0), Some(50.0)),
            aqi_record("2024-05-01T07:00", Some(200.0), Some(70.0)),
            aqi_record("2024-05-02T06:00", Some(80.0), None),
        ];
        let raw = serde_json::json!({
            "daily": { "time": ["2024-05-01", "2024-05-02"] }
        });
        let out = daily_aggregates(&raw, &records, city());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].aqi_mean, Some(150.0));
        assert_eq!(out[0].aqi_max, Some(200.0));
        assert_eq!(out[0].dust_mean, Some(60.0));
        assert_eq!(out[1].aqi_max, Some(80.0));
        // Every dust sample on day two was null, so the statistic is absent.
        assert_eq!(out[1].dust_mean, None);
    }

    #[test]
    fn test_date_without_aqi_group_has_absent_stats() {
        let raw = serde_json::json!({
            "daily": { "time": ["2024-05-03"], "temperature_2m_max": [39.0] }
        });
        let out = daily_aggregates(&raw, &[], city());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].aqi_mean, None);
        assert_eq!(out[0].aqi_max, None);
        assert!(!out[0].is_dust_storm_risk);
    }

    #[test]
    fn test_heatwave_flag_is_strict() {
        let raw = serde_json::json!({
            "daily": {
                "time": ["2024-05-01", "2024-05-02"],
                "temperature_2m_max": [42.0, 42.01]
            }
        });
        let out = daily_aggregates(&raw, &[], city());
        assert!(!out[0].is_heatwave, "42.0 exactly is below the strict threshold");
        assert!(out[1].is_heatwave);
    }

    #[test]
    fn test_dust_storm_flag_requires_both_operands() {
        let records = vec![aqi_record("2024-05-01T06:00", None, Some(200.0))];
        // Dust well above threshold but wind below it.
        let raw = serde_json::json!({
            "daily": { "time": ["2024-05-01"], "wind_speed_10m_max": [10.0] }
        });
        let out = daily_aggregates(&raw, &records, city());
        assert!(!out[0].is_dust_storm_risk);

        // Wind above threshold but wind data null on another payload.
        let raw = serde_json::json!({
            "daily": { "time": ["2024-05-01"] }
        });
        let out = daily_aggregates(&raw, &records, city());
        assert!(!out[0].is_dust_storm_risk, "null wind must not satisfy the conjunction");

        // Both above threshold.
        let raw = serde_json::json!({
            "daily": { "time": ["2024-05-01"], "wind_speed_10m_max": [45.0] }
        });
        let out = daily_aggregates(&raw, &records, city());
        assert!(out[0].is_dust_storm_risk);
    }

    #[test]
    fn test_heavy_rain_flag_from_precipitation_sum() {
        let raw = serde_json::json!({
            "daily": {
                "time": ["2024-05-01", "2024-05-02"],
                "precipitation_sum": [50.0, 50.5]
            }
        });
        let out = daily_aggregates(&raw, &[], city());
        assert!(!out[0].is_heavy_rain);
        assert!(out[1].is_heavy_rain);
    }

    #[test]
    fn test_sunrise_sunset_parsed() {
        let raw = serde_json::json!({
            "daily": {
                "time": ["2024-05-01"],
                "sunrise": ["2024-05-01T05:58"],
                "sunset": ["2024-05-01T19:07"]
            }
        });
        let out = daily_aggregates(&raw, &[], city());
        assert_eq!(
            out[0].sunrise,
            Some(parse_local_timestamp("2024-05-01T05:58").unwrap())
        );
        assert!(out[0].sunset.is_some());
    }

    #[test]
    fn test_missing_daily_block_yields_no_records() {
        let raw = serde_json::json!({ "hourly": { "time": [] } });
        assert!(daily_aggregates(&raw, &[], city()).is_empty());
    }
}

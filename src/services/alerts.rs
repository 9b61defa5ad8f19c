//! Rule-based hazard alert generation.
//!
//! Every daily aggregate record is evaluated independently against the static
//! thresholds; one day can yield several alerts of different categories. The
//! AQI tiers form a priority chain, so only the highest exceeded tier fires.
//! All comparisons are strict.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::config::THRESHOLDS;
use crate::db::models::{AlertRecord, AlertSeverity, AlertType, DailyAggregateRecord};

/// The validity window of an alert spans the full calendar day of the
/// triggering record, in UTC.
fn validity_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let starts_at = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let expires_at = starts_at + Duration::days(1) - Duration::seconds(1);
    (starts_at, expires_at)
}

#[allow(clippy::too_many_arguments)]
fn alert(
    city_id: Uuid,
    date: NaiveDate,
    alert_type: AlertType,
    severity: AlertSeverity,
    title: String,
    description: String,
    value: f64,
    threshold: f64,
) -> AlertRecord {
    let (starts_at, expires_at) = validity_window(date);
    AlertRecord {
        city_id,
        alert_type,
        severity,
        title,
        description,
        value,
        threshold,
        starts_at,
        expires_at,
        is_active: true,
    }
}

/// Evaluate one city's daily aggregates against the hazard rule table.
pub fn generate_alerts(
    daily_records: &[DailyAggregateRecord],
    city_id: Uuid,
    city_name: &str,
) -> Vec<AlertRecord> {
    let mut alerts = Vec::new();

    for record in daily_records {
        let date = record.date;

        if let Some(temp_max) = record.temp_max {
            if temp_max > THRESHOLDS.heatwave_temp {
                let severity = if temp_max > THRESHOLDS.extreme_heat_temp {
                    AlertSeverity::Extreme
                } else {
                    AlertSeverity::High
                };
                let qualifier = if severity == AlertSeverity::Extreme { "Severe heatwave" } else { "Heatwave" };
                alerts.push(alert(
                    city_id,
                    date,
                    AlertType::Heatwave,
                    severity,
                    format!("{} alert for {}", qualifier, city_name),
                    format!(
                        "Temperature expected to reach {:.1} C on {}. \
                         Stay hydrated and avoid outdoor exposure between 11 AM and 4 PM.",
                        temp_max, date
                    ),
                    temp_max,
                    THRESHOLDS.heatwave_temp,
                ));
            }
        }

        if record.is_dust_storm_risk {
            let dust_mean = record.dust_mean.unwrap_or(0.0);
            let wind_max = record.wind_speed_max.unwrap_or(0.0);
            alerts.push(alert(
                city_id,
                date,
                AlertType::DustStorm,
                AlertSeverity::High,
                format!("Dust storm risk for {}", city_name),
                format!(
                    "High dust concentration ({:.0} ug/m3) with strong winds ({:.0} km/h). \
                     Thar Desert dust advisory in effect.",
                    dust_mean, wind_max
                ),
                dust_mean,
                THRESHOLDS.dust_storm_dust,
            ));
        }

        if record.precipitation_sum > THRESHOLDS.heavy_rain_mm {
            let precip = record.precipitation_sum;
            let severity = if precip > THRESHOLDS.very_heavy_rain_mm {
                AlertSeverity::Extreme
            } else {
                AlertSeverity::High
            };
            let qualifier = if severity == AlertSeverity::Extreme { "Very heavy" } else { "Heavy" };
            alerts.push(alert(
                city_id,
                date,
                AlertType::HeavyRain,
                severity,
                format!("{} rain expected in {}", qualifier, city_name),
                format!(
                    "Expected rainfall of {:.1} mm on {}. \
                     Waterlogging and flash floods possible.",
                    precip, date
                ),
                precip,
                THRESHOLDS.heavy_rain_mm,
            ));
        }

        // Priority chain: only the highest exceeded AQI tier fires.
        if let Some(aqi) = record.aqi_max {
            if aqi > THRESHOLDS.hazardous_aqi {
                alerts.push(alert(
                    city_id,
                    date,
                    AlertType::HazardousAqi,
                    AlertSeverity::Extreme,
                    format!("Hazardous air quality in {}", city_name),
                    format!(
                        "US AQI of {:.0}. Health emergency conditions: avoid all outdoor \
                         activity and wear an N95 mask if going outside.",
                        aqi
                    ),
                    aqi,
                    THRESHOLDS.hazardous_aqi,
                ));
            } else if aqi > THRESHOLDS.very_poor_aqi {
                alerts.push(alert(
                    city_id,
                    date,
                    AlertType::VeryPoorAqi,
                    AlertSeverity::High,
                    format!("Very poor air quality in {}", city_name),
                    format!(
                        "US AQI of {:.0}. Unhealthy for everyone; reduce outdoor activities.",
                        aqi
                    ),
                    aqi,
                    THRESHOLDS.very_poor_aqi,
                ));
            } else if aqi > THRESHOLDS.poor_aqi {
                alerts.push(alert(
                    city_id,
                    date,
                    AlertType::PoorAqi,
                    AlertSeverity::Moderate,
                    format!("Poor air quality in {}", city_name),
                    format!(
                        "US AQI of {:.0}. Sensitive groups should reduce outdoor exertion.",
                        aqi
                    ),
                    aqi,
                    THRESHOLDS.poor_aqi,
                ));
            }
        }

        if let Some(uv) = record.uv_index_max {
            if uv > THRESHOLDS.high_uv {
                alerts.push(alert(
                    city_id,
                    date,
                    AlertType::HighUv,
                    AlertSeverity::Moderate,
                    format!("Very high UV index in {}", city_name),
                    format!(
                        "UV index of {:.1}. Apply SPF 30+ sunscreen and wear protective clothing.",
                        uv
                    ),
                    uv,
                    THRESHOLDS.high_uv,
                ));
            }
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_record(date: &str) -> DailyAggregateRecord {
        DailyAggregateRecord {
            city_id: Uuid::nil(),
            date: date.parse().unwrap(),
            temp_max: None,
            temp_min: None,
            apparent_temp_max: None,
            apparent_temp_min: None,
            precipitation_sum: 0.0,
            precipitation_hours: 0.0,
            precipitation_probability_max: None,
            rain_sum: 0.0,
            wind_speed_max: None,
            wind_gusts_max: None,
            wind_direction_dominant: None,
            weather_code: None,
            sunrise: None,
            sunset: None,
            uv_index_max: None,
            aqi_mean: None,
            aqi_max: None,
            pm2_5_mean: None,
            pm10_mean: None,
            dust_mean: None,
            is_heatwave: false,
            is_dust_storm_risk: false,
            is_heavy_rain: false,
        }
    }

    fn generate(record: DailyAggregateRecord) -> Vec<AlertRecord> {
        generate_alerts(&[record], Uuid::nil(), "Jaipur")
    }

    #[test]
    fn test_heatwave_threshold_is_strict() {
        let mut record = base_record("2024-05-01");
        record.temp_max = Some(42.0);
        assert!(generate(record).is_empty());
    }

    #[test]
    fn test_heatwave_just_above_threshold_is_high() {
        let mut record = base_record("2024-05-01");
        record.temp_max = Some(42.01);
        let alerts = generate(record);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Heatwave);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_heatwave_above_extreme_threshold() {
        let mut record = base_record("2024-05-01");
        record.temp_max = Some(45.01);
        let alerts = generate(record);
        assert_eq!(alerts[0].severity, AlertSeverity::Extreme);
        assert!(alerts[0].title.contains("Severe heatwave"));
    }

    #[test]
    fn test_aqi_tiers_are_exclusive() {
        let mut record = base_record("2024-05-01");
        record.aqi_max = Some(250.0);
        let alerts = generate(record);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::VeryPoorAqi);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_aqi_hazardous_tier() {
        let mut record = base_record("2024-05-01");
        record.aqi_max = Some(320.0);
        let alerts = generate(record);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HazardousAqi);
        assert_eq!(alerts[0].severity, AlertSeverity::Extreme);
    }

    #[test]
    fn test_aqi_poor_tier() {
        let mut record = base_record("2024-05-01");
        record.aqi_max = Some(120.0);
        let alerts = generate(record);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::PoorAqi);
        assert_eq!(alerts[0].severity, AlertSeverity::Moderate);
    }

    #[test]
    fn test_dust_alone_does_not_trigger_dust_storm() {
        // The aggregator's conjunctive rule left the flag unset even though
        // dust alone exceeds its threshold.
        let mut record = base_record("2024-05-01");
        record.dust_mean = Some(200.0);
        record.wind_speed_max = Some(10.0);
        record.is_dust_storm_risk = false;
        assert!(generate(record).is_empty());
    }

    #[test]
    fn test_dust_storm_alert_carries_dust_value() {
        let mut record = base_record("2024-05-01");
        record.dust_mean = Some(200.0);
        record.wind_speed_max = Some(45.0);
        record.is_dust_storm_risk = true;
        let alerts = generate(record);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::DustStorm);
        assert_eq!(alerts[0].value, 200.0);
        assert_eq!(alerts[0].threshold, 150.0);
    }

    #[test]
    fn test_heavy_rain_severities() {
        let mut record = base_record("2024-05-01");
        record.precipitation_sum = 60.0;
        let alerts = generate(record);
        assert_eq!(alerts[0].alert_type, AlertType::HeavyRain);
        assert_eq!(alerts[0].severity, AlertSeverity::High);

        let mut record = base_record("2024-05-01");
        record.precipitation_sum = 100.01;
        let alerts = generate(record);
        assert_eq!(alerts[0].severity, AlertSeverity::Extreme);
    }

    #[test]
    fn test_high_uv_is_strict() {
        let mut record = base_record("2024-05-01");
        record.uv_index_max = Some(8.0);
        assert!(generate(record).is_empty());

        let mut record = base_record("2024-05-01");
        record.uv_index_max = Some(8.5);
        let alerts = generate(record);
        assert_eq!(alerts[0].alert_type, AlertType::HighUv);
        assert_eq!(alerts[0].severity, AlertSeverity::Moderate);
    }

    #[test]
    fn test_one_day_can_yield_multiple_categories() {
        let mut record = base_record("2024-05-01");
        record.temp_max = Some(46.0);
        record.aqi_max = Some(320.0);
        record.uv_index_max = Some(9.0);
        let alerts = generate(record);
        let types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(
            types,
            vec![AlertType::Heatwave, AlertType::HazardousAqi, AlertType::HighUv]
        );
    }

    #[test]
    fn test_validity_window_spans_full_day() {
        let mut record = base_record("2024-05-01");
        record.temp_max = Some(43.0);
        let alerts = generate(record);
        assert_eq!(alerts[0].starts_at.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert_eq!(alerts[0].expires_at.to_rfc3339(), "2024-05-01T23:59:59+00:00");
        assert!(alerts[0].is_active);
    }

    #[test]
    fn test_each_day_evaluated_independently() {
        let mut hot = base_record("2024-05-01");
        hot.temp_max = Some(43.0);
        let calm = base_record("2024-05-02");
        let mut humid = base_record("2024-05-03");
        humid.aqi_max = Some(180.0);

        let alerts = generate_alerts(&[hot, calm, humid], Uuid::nil(), "Kota");
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].alert_type, AlertType::Heatwave);
        assert_eq!(alerts[1].alert_type, AlertType::VeryPoorAqi);
    }
}

//! Pipeline orchestration.
//!
//! One run: resolve the active city map, then for each city fetch weather and
//! air-quality payloads concurrently, transform, aggregate, generate alerts,
//! and persist. Cities are processed strictly sequentially and every failure
//! is contained to the city (and endpoint) it occurred in; only an unusable
//! city map aborts the run. Cities present in the datastore but missing from
//! the default list are processed identically afterwards, using coordinates
//! read from the `cities` table.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::DEFAULT_CITIES;
use crate::db::models::FetchTarget;
use crate::db::queries;
use crate::errors::PipelineError;
use crate::services::openmeteo::OpenMeteoClient;
use crate::services::{aggregate, alerts, persistence, transform};

/// Per-category record counts accumulated over a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunTotals {
    pub weather: u64,
    pub air_quality: u64,
    pub daily: u64,
    pub alerts: u64,
}

/// Execute one full pipeline run.
pub async fn run(pool: &PgPool, client: &OpenMeteoClient) -> Result<RunTotals, PipelineError> {
    tracing::info!("Starting weather & air-quality pipeline run");

    let city_map = queries::active_city_map(pool).await?;
    if city_map.is_empty() {
        return Err(PipelineError::Config(
            "no active cities in the database, run schema setup first".to_string(),
        ));
    }

    let mut names: Vec<&str> = city_map.keys().map(String::as_str).collect();
    names.sort_unstable();
    tracing::info!("Processing {} cities: {}", city_map.len(), names.join(", "));

    let mut totals = RunTotals::default();

    for city_cfg in &DEFAULT_CITIES {
        let Some(&city_id) = city_map.get(city_cfg.name) else {
            tracing::warn!("City {} not in database, skipping", city_cfg.name);
            continue;
        };
        process_city(pool, client, &FetchTarget::from(city_cfg), city_id, &mut totals).await;
    }

    // Cities added to the datastore beyond the default list; their
    // coordinates live only in the cities table.
    let default_names: HashSet<&str> = DEFAULT_CITIES.iter().map(|c| c.name).collect();
    let mut custom: Vec<(&String, &Uuid)> = city_map
        .iter()
        .filter(|(name, _)| !default_names.contains(name.as_str()))
        .collect();
    custom.sort_by(|a, b| a.0.cmp(b.0));

    if !custom.is_empty() {
        tracing::info!("Processing {} custom cities", custom.len());
    }
    for (name, &city_id) in custom {
        match queries::get_city(pool, city_id).await {
            Ok(Some(city)) => {
                process_city(pool, client, &city.fetch_target(), city_id, &mut totals).await;
            }
            Ok(None) => {
                tracing::warn!("City {} disappeared from the database, skipping", name);
            }
            Err(e) => {
                tracing::error!("Failed to load coordinates for {}: {}", name, e);
            }
        }
    }

    tracing::info!("Pipeline run complete");
    tracing::info!("  weather records:   {}", totals.weather);
    tracing::info!("  AQI records:       {}", totals.air_quality);
    tracing::info!("  daily aggregates:  {}", totals.daily);
    tracing::info!("  alerts generated:  {}", totals.alerts);

    Ok(totals)
}

/// Process a single city: fetch both endpoints concurrently, then transform,
/// aggregate, alert, and persist. Never returns an error; every failure is
/// logged and the affected steps are skipped.
async fn process_city(
    pool: &PgPool,
    client: &OpenMeteoClient,
    target: &FetchTarget,
    city_id: Uuid,
    totals: &mut RunTotals,
) {
    tracing::info!(
        "Processing {} ({:.4}, {:.4}, {:.0} m)",
        target.name,
        target.latitude,
        target.longitude,
        target.elevation_m,
    );

    let (weather_result, aqi_result) =
        futures::join!(client.fetch_weather(target), client.fetch_air_quality(target));

    let weather_raw = match weather_result {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!("Failed to fetch weather for {}: {}", target.name, e);
            None
        }
    };
    let aqi_raw = match aqi_result {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!("Failed to fetch air quality for {}: {}", target.name, e);
            None
        }
    };

    let now = Utc::now().naive_utc();

    if let Some(raw) = &weather_raw {
        let records = transform::hourly_weather_records(raw, city_id, now);
        let count = persistence::store_hourly_weather(pool, &records).await;
        totals.weather += count;
        tracing::info!("Upserted {} hourly weather records for {}", count, target.name);
    }

    let mut aqi_records = Vec::new();
    if let Some(raw) = &aqi_raw {
        aqi_records = transform::air_quality_records(raw, city_id);
        let count = persistence::store_air_quality(pool, &aqi_records).await;
        totals.air_quality += count;
        tracing::info!("Upserted {} air-quality records for {}", count, target.name);
    }

    if let Some(raw) = &weather_raw {
        let daily = aggregate::daily_aggregates(raw, &aqi_records, city_id);
        let count = persistence::store_daily_aggregates(pool, &daily).await;
        totals.daily += count;
        tracing::info!("Upserted {} daily aggregates for {}", count, target.name);

        let city_alerts = alerts::generate_alerts(&daily, city_id, &target.name);
        // The expiry sweep runs inside store_alerts, so it only happens on
        // runs that generated at least one new alert for this city.
        if !city_alerts.is_empty() {
            let count = persistence::store_alerts(pool, &city_alerts).await;
            totals.alerts += count;
            tracing::info!("Created {} alerts for {}", count, target.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AlertSeverity, AlertType};

    // End-to-end over the pure stages (transform → aggregate → alert); the
    // persistence layer needs a live database and is not mocked.
    #[test]
    fn test_hot_hazardous_day_yields_exactly_two_alerts() {
        let city_id = Uuid::new_v4();
        let weather_raw = serde_json::json!({
            "daily": {
                "time": ["2024-05-01"],
                "temperature_2m_max": [46.0],
                "precipitation_sum": [0.0]
            }
        });
        let aqi_raw = serde_json::json!({
            "hourly": {
                "time": ["2024-05-01T06:00", "2024-05-01T07:00"],
                "us_aqi": [280.0, 320.0]
            }
        });

        let aqi_records = transform::air_quality_records(&aqi_raw, city_id);
        let daily = aggregate::daily_aggregates(&weather_raw, &aqi_records, city_id);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].aqi_max, Some(320.0));

        let generated = alerts::generate_alerts(&daily, city_id, "Jaipur");
        assert_eq!(generated.len(), 2);
        assert_eq!(generated[0].alert_type, AlertType::Heatwave);
        assert_eq!(generated[0].severity, AlertSeverity::Extreme);
        assert_eq!(generated[1].alert_type, AlertType::HazardousAqi);
        assert_eq!(generated[1].severity, AlertSeverity::Extreme);
    }

    #[test]
    fn test_totals_default_to_zero() {
        let totals = RunTotals::default();
        assert_eq!(totals.weather, 0);
        assert_eq!(totals.air_quality, 0);
        assert_eq!(totals.daily, 0);
        assert_eq!(totals.alerts, 0);
    }
}

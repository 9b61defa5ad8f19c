//! Soft-fail gateway over the raw datastore queries.
//!
//! Persistence problems must never cross a city boundary: every function
//! here logs backend errors and reports zero affected rows instead of
//! raising, so the orchestrator simply moves on.

use chrono::Utc;
use sqlx::PgPool;

use crate::db::models::{AirQualityRecord, AlertRecord, DailyAggregateRecord, HourlyWeatherRecord};
use crate::db::queries;

/// Upsert hourly weather records; returns the number of affected rows.
pub async fn store_hourly_weather(pool: &PgPool, records: &[HourlyWeatherRecord]) -> u64 {
    if records.is_empty() {
        return 0;
    }
    match queries::upsert_weather_data(pool, records).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to upsert weather_data: {}", e);
            0
        }
    }
}

/// Upsert air-quality records; returns the number of affected rows.
pub async fn store_air_quality(pool: &PgPool, records: &[AirQualityRecord]) -> u64 {
    if records.is_empty() {
        return 0;
    }
    match queries::upsert_air_quality(pool, records).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to upsert air_quality_data: {}", e);
            0
        }
    }
}

/// Upsert daily aggregates; returns the number of affected rows.
pub async fn store_daily_aggregates(pool: &PgPool, records: &[DailyAggregateRecord]) -> u64 {
    if records.is_empty() {
        return 0;
    }
    match queries::upsert_daily_aggregates(pool, records).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to upsert daily_aggregates: {}", e);
            0
        }
    }
}

/// Two-phase alert storage: first mark every alert whose validity window has
/// already closed as inactive, then insert the freshly generated batch.
/// Returns the number of inserted alerts.
pub async fn store_alerts(pool: &PgPool, alerts: &[AlertRecord]) -> u64 {
    if alerts.is_empty() {
        return 0;
    }

    if let Err(e) = queries::deactivate_expired_alerts(pool, Utc::now()).await {
        tracing::error!("Failed to deactivate expired alerts: {}", e);
        return 0;
    }

    match queries::insert_alerts(pool, alerts).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to insert alerts: {}", e);
            0
        }
    }
}

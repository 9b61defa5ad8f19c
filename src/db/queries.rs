use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    AirQualityRecord, AlertRecord, City, DailyAggregateRecord, HourlyWeatherRecord,
};

/// Map of active city name → id, used to resolve the configured city list.
pub async fn active_city_map(pool: &PgPool) -> Result<HashMap<String, Uuid>, sqlx::Error> {
    let rows: Vec<(String, Uuid)> =
        sqlx::query_as("SELECT name, id FROM cities WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

/// Fetch a single city row by id (coordinates for datastore-only cities).
pub async fn get_city(pool: &PgPool, id: Uuid) -> Result<Option<City>, sqlx::Error> {
    sqlx::query_as::<_, City>(
        "SELECT id, name, latitude, longitude, elevation_m, is_active
         FROM cities WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Upsert hourly weather records, keyed by (city_id, recorded_at, is_forecast).
/// Re-running with identical input is a no-op with respect to final state.
pub async fn upsert_weather_data(
    pool: &PgPool,
    records: &[HourlyWeatherRecord],
) -> Result<u64, sqlx::Error> {
    let mut affected = 0;
    for record in records {
        let result = sqlx::query(
            "INSERT INTO weather_data (
                city_id, recorded_at, is_forecast,
                temperature_2m, apparent_temperature, relative_humidity_2m, dewpoint_2m,
                precipitation, precipitation_probability, rain,
                wind_speed_10m, wind_direction_10m, wind_gusts_10m,
                weather_code, cloud_cover, visibility, surface_pressure, uv_index
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18
            )
            ON CONFLICT (city_id, recorded_at, is_forecast) DO UPDATE SET
                temperature_2m = EXCLUDED.temperature_2m,
                apparent_temperature = EXCLUDED.apparent_temperature,
                relative_humidity_2m = EXCLUDED.relative_humidity_2m,
                dewpoint_2m = EXCLUDED.dewpoint_2m,
                precipitation = EXCLUDED.precipitation,
                precipitation_probability = EXCLUDED.precipitation_probability,
                rain = EXCLUDED.rain,
                wind_speed_10m = EXCLUDED.wind_speed_10m,
                wind_direction_10m = EXCLUDED.wind_direction_10m,
                wind_gusts_10m = EXCLUDED.wind_gusts_10m,
                weather_code = EXCLUDED.weather_code,
                cloud_cover = EXCLUDED.cloud_cover,
                visibility = EXCLUDED.visibility,
                surface_pressure = EXCLUDED.surface_pressure,
                uv_index = EXCLUDED.uv_index,
                updated_at = NOW()",
        )
        .bind(record.city_id)
        .bind(record.recorded_at)
        .bind(record.is_forecast)
        .bind(record.temperature_2m)
        .bind(record.apparent_temperature)
        .bind(record.relative_humidity_2m)
        .bind(record.dewpoint_2m)
        .bind(record.precipitation)
        .bind(record.precipitation_probability)
        .bind(record.rain)
        .bind(record.wind_speed_10m)
        .bind(record.wind_direction_10m)
        .bind(record.wind_gusts_10m)
        .bind(record.weather_code)
        .bind(record.cloud_cover)
        .bind(record.visibility)
        .bind(record.surface_pressure)
        .bind(record.uv_index)
        .execute(pool)
        .await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

/// Upsert air-quality records, keyed by (city_id, recorded_at).
pub async fn upsert_air_quality(
    pool: &PgPool,
    records: &[AirQualityRecord],
) -> Result<u64, sqlx::Error> {
    let mut affected = 0;
    for record in records {
        let result = sqlx::query(
            "INSERT INTO air_quality_data (
                city_id, recorded_at,
                pm2_5, pm10, dust, carbon_monoxide, nitrogen_dioxide,
                sulphur_dioxide, ozone, us_aqi, european_aqi,
                us_aqi_pm2_5, us_aqi_pm10
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            )
            ON CONFLICT (city_id, recorded_at) DO UPDATE SET
                pm2_5 = EXCLUDED.pm2_5,
                pm10 = EXCLUDED.pm10,
                dust = EXCLUDED.dust,
                carbon_monoxide = EXCLUDED.carbon_monoxide,
                nitrogen_dioxide = EXCLUDED.nitrogen_dioxide,
                sulphur_dioxide = EXCLUDED.sulphur_dioxide,
                ozone = EXCLUDED.ozone,
                us_aqi = EXCLUDED.us_aqi,
                european_aqi = EXCLUDED.european_aqi,
                us_aqi_pm2_5 = EXCLUDED.us_aqi_pm2_5,
                us_aqi_pm10 = EXCLUDED.us_aqi_pm10,
                updated_at = NOW()",
        )
        .bind(record.city_id)
        .bind(record.recorded_at)
        .bind(record.pm2_5)
        .bind(record.pm10)
        .bind(record.dust)
        .bind(record.carbon_monoxide)
        .bind(record.nitrogen_dioxide)
        .bind(record.sulphur_dioxide)
        .bind(record.ozone)
        .bind(record.us_aqi)
        .bind(record.european_aqi)
        .bind(record.us_aqi_pm2_5)
        .bind(record.us_aqi_pm10)
        .execute(pool)
        .await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

/// Upsert daily aggregates, keyed by (city_id, date). The new row fully
/// replaces the previous value for the key.
pub async fn upsert_daily_aggregates(
    pool: &PgPool,
    records: &[DailyAggregateRecord],
) -> Result<u64, sqlx::Error> {
    let mut affected = 0;
    for record in records {
        let result = sqlx::query(
            "INSERT INTO daily_aggregates (
                city_id, date,
                temp_max, temp_min, apparent_temp_max, apparent_temp_min,
                precipitation_sum, precipitation_hours, precipitation_probability_max,
                rain_sum, wind_speed_max, wind_gusts_max, wind_direction_dominant,
                weather_code, sunrise, sunset, uv_index_max,
                aqi_mean, aqi_max, pm2_5_mean, pm10_mean, dust_mean,
                is_heatwave, is_dust_storm_risk, is_heavy_rain
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25
            )
            ON CONFLICT (city_id, date) DO UPDATE SET
                temp_max = EXCLUDED.temp_max,
                temp_min = EXCLUDED.temp_min,
                apparent_temp_max = EXCLUDED.apparent_temp_max,
                apparent_temp_min = EXCLUDED.apparent_temp_min,
                precipitation_sum = EXCLUDED.precipitation_sum,
                precipitation_hours = EXCLUDED.precipitation_hours,
                precipitation_probability_max = EXCLUDED.precipitation_probability_max,
                rain_sum = EXCLUDED.rain_sum,
                wind_speed_max = EXCLUDED.wind_speed_max,
                wind_gusts_max = EXCLUDED.wind_gusts_max,
                wind_direction_dominant = EXCLUDED.wind_direction_dominant,
                weather_code = EXCLUDED.weather_code,
                sunrise = EXCLUDED.sunrise,
                sunset = EXCLUDED.sunset,
                uv_index_max = EXCLUDED.uv_index_max,
                aqi_mean = EXCLUDED.aqi_mean,
                aqi_max = EXCLUDED.aqi_max,
                pm2_5_mean = EXCLUDED.pm2_5_mean,
                pm10_mean = EXCLUDED.pm10_mean,
                dust_mean = EXCLUDED.dust_mean,
                is_heatwave = EXCLUDED.is_heatwave,
                is_dust_storm_risk = EXCLUDED.is_dust_storm_risk,
                is_heavy_rain = EXCLUDED.is_heavy_rain,
                updated_at = NOW()",
        )
        .bind(record.city_id)
        .bind(record.date)
        .bind(record.temp_max)
        .bind(record.temp_min)
        .bind(record.apparent_temp_max)
        .bind(record.apparent_temp_min)
        .bind(record.precipitation_sum)
        .bind(record.precipitation_hours)
        .bind(record.precipitation_probability_max)
        .bind(record.rain_sum)
        .bind(record.wind_speed_max)
        .bind(record.wind_gusts_max)
        .bind(record.wind_direction_dominant)
        .bind(record.weather_code)
        .bind(record.sunrise)
        .bind(record.sunset)
        .bind(record.uv_index_max)
        .bind(record.aqi_mean)
        .bind(record.aqi_max)
        .bind(record.pm2_5_mean)
        .bind(record.pm10_mean)
        .bind(record.dust_mean)
        .bind(record.is_heatwave)
        .bind(record.is_dust_storm_risk)
        .bind(record.is_heavy_rain)
        .execute(pool)
        .await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

/// Mark every alert whose validity window has already closed as inactive.
pub async fn deactivate_expired_alerts(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE alerts SET is_active = FALSE WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Insert freshly generated alerts (append-only, never upserted).
pub async fn insert_alerts(pool: &PgPool, alerts: &[AlertRecord]) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for alert in alerts {
        let result = sqlx::query(
            "INSERT INTO alerts (
                id, city_id, alert_type, severity, title, description,
                value, threshold, starts_at, expires_at, is_active, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW()
            )",
        )
        .bind(Uuid::new_v4())
        .bind(alert.city_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.title)
        .bind(&alert.description)
        .bind(alert.value)
        .bind(alert.threshold)
        .bind(alert.starts_at)
        .bind(alert.expires_at)
        .bind(alert.is_active)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

//! Open-Meteo forecast client.
//!
//! Fetches weather and air-quality forecasts for one set of coordinates.
//! See: https://open-meteo.com/en/docs
//!
//! Transport-level failures (timeouts, connection errors) are retried with
//! exponential backoff; application-level failures (non-2xx responses,
//! malformed bodies) are never retried. After retries are exhausted the error
//! propagates to the caller, which treats the endpoint as having produced no
//! data for that city.

use std::time::Duration;

use crate::config::{
    AIR_QUALITY_API_URL, DAILY_WEATHER_VARS, FORECAST_DAYS, HOURLY_AQI_VARS, HOURLY_WEATHER_VARS,
    MAX_FETCH_ATTEMPTS, REQUEST_TIMEOUT, RETRY_MAX_DELAY, RETRY_MIN_DELAY, TIMEZONE,
    WEATHER_API_URL,
};
use crate::db::models::FetchTarget;
use crate::errors::PipelineError;

/// Bounded-retry policy for transport-level fetch failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            min_delay: RETRY_MIN_DELAY,
            max_delay: RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, after `attempt` attempts have failed.
    /// Doubles from the floor and is clamped to the ceiling.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Only transport-level errors are worth retrying. A response that
    /// arrived but carried an error status is an application failure.
    fn is_retryable(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }
}

/// Client for the Open-Meteo weather and air-quality APIs.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    weather_url: String,
    air_quality_url: String,
    retry: RetryPolicy,
}

impl OpenMeteoClient {
    pub fn new() -> Self {
        Self::with_base_urls(WEATHER_API_URL, AIR_QUALITY_API_URL)
    }

    /// Construct against alternative endpoints (used by tests).
    pub fn with_base_urls(weather_url: &str, air_quality_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            weather_url: weather_url.to_string(),
            air_quality_url: air_quality_url.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Fetch the hourly + daily weather forecast for a city.
    pub async fn fetch_weather(
        &self,
        target: &FetchTarget,
    ) -> Result<serde_json::Value, PipelineError> {
        let params = [
            ("latitude", target.latitude.to_string()),
            ("longitude", target.longitude.to_string()),
            ("hourly", HOURLY_WEATHER_VARS.join(",")),
            ("daily", DAILY_WEATHER_VARS.join(",")),
            ("timezone", TIMEZONE.to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ];
        self.fetch(&self.weather_url, &params).await
    }

    /// Fetch the hourly air-quality forecast for a city.
    pub async fn fetch_air_quality(
        &self,
        target: &FetchTarget,
    ) -> Result<serde_json::Value, PipelineError> {
        let params = [
            ("latitude", target.latitude.to_string()),
            ("longitude", target.longitude.to_string()),
            ("hourly", HOURLY_AQI_VARS.join(",")),
            ("timezone", TIMEZONE.to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ];
        self.fetch(&self.air_quality_url, &params).await
    }

    async fn fetch(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, PipelineError> {
        let mut attempt = 1;
        loop {
            match self.client.get(url).query(params).send().await {
                Ok(response) => {
                    let response = response.error_for_status()?;
                    return Ok(response.json().await?);
                }
                Err(e) if self.retry.is_retryable(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Transport error fetching {} (attempt {}/{}), retrying in {:?}: {}",
                        url,
                        attempt,
                        self.retry.max_attempts,
                        delay,
                        e,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jaipur() -> FetchTarget {
        FetchTarget {
            name: "Jaipur".to_string(),
            latitude: 26.9124,
            longitude: 75.7873,
            elevation_m: 431.0,
        }
    }

    #[test]
    fn test_backoff_doubles_and_clamps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fetch_weather_sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "26.9124"))
            .and(query_param("timezone", "Asia/Kolkata"))
            .and(query_param("forecast_days", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": { "time": ["2024-05-01T00:00"], "temperature_2m": [31.2] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenMeteoClient::with_base_urls(
            &format!("{}/v1/forecast", server.uri()),
            &format!("{}/v1/air-quality", server.uri()),
        );
        let payload = client.fetch_weather(&jaipur()).await.unwrap();
        assert!(payload.get("hourly").is_some());
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        // expect(1) verifies on drop that exactly one request arrived.
        Mock::given(method("GET"))
            .and(path("/v1/air-quality"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenMeteoClient::with_base_urls(
            &format!("{}/v1/forecast", server.uri()),
            &format!("{}/v1/air-quality", server.uri()),
        );
        let result = client.fetch_air_quality(&jaipur()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_error_retries_then_fails() {
        // Nothing listens on port 1; every attempt is a connection error.
        let mut client = OpenMeteoClient::with_base_urls(
            "http://127.0.0.1:1/v1/forecast",
            "http://127.0.0.1:1/v1/air-quality",
        );
        client.retry = RetryPolicy {
            max_attempts: 2,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        };

        let result = client.fetch_weather(&jaipur()).await;
        assert!(matches!(result, Err(PipelineError::Http(_))));
    }
}

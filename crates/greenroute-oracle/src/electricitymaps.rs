//! ElectricityMaps "latest carbon intensity" client.
//!
//! The API reports a single grid-average intensity per zone in gCO2e/kWh.
//! It is converted to kg with `grams_per_kilogram`, and the market-based
//! value is derived as `location_based * market_factor`. Both constants are
//! configuration, not facts about the grid.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use greenroute_core::CarbonIntensitySample;
use greenroute_core::config::IntensityConfig;

use crate::error::{OracleError, OracleResult};
use crate::traits::IntensityOracle;

/// The subset of the response body we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestIntensity {
    zone: Option<String>,
    carbon_intensity: Option<f64>,
}

/// Intensity oracle over the ElectricityMaps v3 REST API.
pub struct ElectricityMapsOracle {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    /// Zone mapping and unit conversion.
    config: IntensityConfig,
}

impl ElectricityMapsOracle {
    pub fn new(config: &IntensityConfig, api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            config: config.clone(),
        }
    }

    fn to_sample(&self, grams_per_kwh: f64) -> OracleResult<CarbonIntensitySample> {
        let location_based = grams_per_kwh / self.config.grams_per_kilogram;
        let market_based = location_based * self.config.market_factor;
        Ok(CarbonIntensitySample::new(location_based, market_based)?)
    }
}

#[async_trait]
impl IntensityOracle for ElectricityMapsOracle {
    async fn fetch(&self, region_code: &str) -> OracleResult<CarbonIntensitySample> {
        let zone = self.config.zone_for(region_code);
        let url = format!("{}/carbon-intensity/latest", self.endpoint);
        debug!(region = region_code, zone, %url, "fetching carbon intensity");

        let response = self
            .client
            .get(&url)
            .query(&[("zone", zone)])
            .header("auth-token", &self.api_token)
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(region = region_code, zone, status = status.as_u16(), "carbon intensity request rejected");
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: LatestIntensity = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        let grams = body.carbon_intensity.ok_or_else(|| {
            OracleError::InvalidResponse(format!(
                "no carbonIntensity for zone {}",
                body.zone.as_deref().unwrap_or(zone)
            ))
        })?;

        self.to_sample(grams)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn oracle(server: &MockServer) -> ElectricityMapsOracle {
        let config = IntensityConfig {
            endpoint: format!("{}/v3/", server.uri()),
            ..IntensityConfig::default()
        };
        ElectricityMapsOracle::new(&config, "test-token")
    }

    #[tokio::test]
    async fn converts_grams_and_derives_market_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/carbon-intensity/latest"))
            .and(query_param("zone", "GB"))
            .and(header("auth-token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "zone": "GB",
                "carbonIntensity": 200,
                "datetime": "2026-10-17T12:00:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sample = oracle(&server).fetch("eu-west-2").await.unwrap();
        assert!((sample.location_based - 0.2).abs() < 1e-12);
        assert!((sample.market_based - 0.14).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unmapped_region_uses_default_zone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("zone", "DE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "zone": "DE",
                "carbonIntensity": 400
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sample = oracle(&server).fetch("il-central-1").await.unwrap();
        assert!((sample.location_based - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn configured_zone_table_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("zone", "US-MIDA-PJM"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "zone": "US-MIDA-PJM",
                "carbonIntensity": 380
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("zone", "NO-NO1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "zone": "NO-NO1",
                "carbonIntensity": 20
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = IntensityConfig {
            endpoint: server.uri(),
            ..IntensityConfig::default()
        };
        config.zones.insert("eu-north-1".into(), "NO-NO1".into());
        let oracle = ElectricityMapsOracle::new(&config, "test-token");

        // Shipped mapping for Ohio, overridden mapping for Stockholm.
        let ohio = oracle.fetch("us-east-2").await.unwrap();
        assert!((ohio.location_based - 0.38).abs() < 1e-12);
        let stockholm = oracle.fetch("eu-north-1").await.unwrap();
        assert!((stockholm.location_based - 0.02).abs() < 1e-12);
    }

    #[tokio::test]
    async fn missing_intensity_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "zone": "SE"
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            oracle(&server).fetch("eu-north-1").await,
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn http_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        match oracle(&server).fetch("eu-west-1").await {
            Err(OracleError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid token");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_intensity_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "carbonIntensity": -5
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            oracle(&server).fetch("eu-west-1").await,
            Err(OracleError::Invalid(_))
        ));
    }
}

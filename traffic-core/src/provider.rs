use crate::{
    Config,
    error::{ConfigError, FetchError},
    model::{FlowReading, Point, TrafficRecord},
    provider::tomtom::TomTomProvider,
};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use std::{fmt::Debug, time::Duration};

pub mod tomtom;

/// A source of current traffic-flow speeds for a single point.
#[async_trait]
pub trait TrafficProvider: Send + Sync + Debug {
    async fn fetch_flow(&self, point: &Point) -> Result<FlowReading, FetchError>;
}

/// Construct the TomTom provider from config. Fails when no API key is set,
/// before any HTTP client is created.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn TrafficProvider>> {
    let api_key = config.api_key().ok_or(ConfigError::MissingApiKey)?;

    let provider = TomTomProvider::new(
        api_key.to_owned(),
        config.endpoint.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;

    Ok(Box::new(provider))
}

/// Fetch one point and turn the reading into a record stamped with the
/// current hour in `tz`.
pub async fn fetch_record(
    provider: &dyn TrafficProvider,
    point: &Point,
    tz: Tz,
) -> Result<TrafficRecord, FetchError> {
    let reading = provider.fetch_flow(point).await?;
    let now = Utc::now().with_timezone(&tz).naive_local();
    TrafficRecord::from_reading(point, reading, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(FlowReading);

    #[async_trait]
    impl TrafficProvider for Fixed {
        async fn fetch_flow(&self, _point: &Point) -> Result<FlowReading, FetchError> {
            Ok(self.0)
        }
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::MissingApiKey)));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = Config { api_key: Some("   ".into()), ..Config::default() };
        assert!(provider_from_config(&cfg).is_err());
    }

    #[test]
    fn provider_from_config_works_when_key_is_set() {
        let cfg = Config { api_key: Some("KEY".into()), ..Config::default() };
        assert!(provider_from_config(&cfg).is_ok());
    }

    #[tokio::test]
    async fn fetch_record_stamps_in_configured_timezone() {
        let provider = Fixed(FlowReading::new(40.0, 50.0));
        let point = Point::named("Tay_Ho", 21.0702, 105.8188);

        let rec = fetch_record(&provider, &point, chrono_tz::Asia::Ho_Chi_Minh).await.unwrap();

        assert_eq!(rec.congestion_ratio, 0.8);
        assert_eq!(rec.traffic_density, 0.2);
        assert!(rec.hour.ends_with(":00"));
        assert_eq!(rec.date.len(), 10);
    }

    #[tokio::test]
    async fn fetch_record_rejects_zero_free_flow() {
        let provider = Fixed(FlowReading::new(40.0, 0.0));
        let point = Point::unnamed(21.0, 105.8);

        let err = fetch_record(&provider, &point, chrono_tz::UTC).await.unwrap_err();
        assert!(matches!(err, FetchError::ZeroFreeFlow));
    }
}

use std::time::Duration;

use chrono_tz::Tz;
use log::{info, warn};

use crate::{
    model::{Point, TrafficRecord},
    provider::{TrafficProvider, fetch_record},
};

/// Default pause between two requests.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Walks the points one at a time, pausing after every request.
#[derive(Debug)]
pub struct Collector<'a> {
    provider: &'a dyn TrafficProvider,
    timezone: Tz,
    delay: Duration,
}

/// What a finished collection pass produced.
#[derive(Debug, Default)]
pub struct Collection {
    pub records: Vec<TrafficRecord>,
    pub attempted: usize,
    pub missed: usize,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> Collector<'a> {
    pub fn new(provider: &'a dyn TrafficProvider, timezone: Tz) -> Self {
        Self { provider, timezone, delay: DEFAULT_DELAY }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn collect(&self, points: &[Point]) -> Collection {
        let total = points.len();
        let mut collection = Collection { records: Vec::with_capacity(total), ..Default::default() };

        for (i, point) in points.iter().enumerate() {
            info!("{}/{} -> {}", i + 1, total, point);
            collection.attempted += 1;

            match fetch_record(self.provider, point, self.timezone).await {
                Ok(record) => collection.records.push(record),
                Err(e) => {
                    warn!("No data for {point}: {e}");
                    collection.missed += 1;
                }
            }

            // Applies after misses too.
            tokio::time::sleep(self.delay).await;
        }

        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::FetchError, model::FlowReading};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Scripted {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TrafficProvider for Scripted {
        async fn fetch_flow(&self, point: &Point) -> Result<FlowReading, FetchError> {
            let name = point.name.clone().unwrap_or_default();
            self.calls.lock().unwrap().push(name.clone());
            match name.as_str() {
                "ok" => Ok(FlowReading::new(30.0, 60.0)),
                "zero" => Ok(FlowReading::new(30.0, 0.0)),
                "empty" => Err(FetchError::MissingPayload),
                _ => Err(FetchError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: String::new(),
                }),
            }
        }
    }

    fn points(names: &[&str]) -> Vec<Point> {
        names.iter().enumerate().map(|(i, n)| Point::named(*n, 21.0 + i as f64, 105.0)).collect()
    }

    #[tokio::test]
    async fn misses_are_skipped_and_order_is_kept() {
        let provider = Scripted::default();
        let collector = Collector::new(&provider, chrono_tz::UTC).with_delay(Duration::ZERO);

        let pts = points(&["ok", "boom", "zero", "empty", "ok"]);
        let collection = collector.collect(&pts).await;

        assert_eq!(collection.attempted, 5);
        assert_eq!(collection.missed, 3);
        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.records[0].lat, 21.0);
        assert_eq!(collection.records[1].lat, 25.0);
        assert_eq!(*provider.calls.lock().unwrap(), vec!["ok", "boom", "zero", "empty", "ok"]);
    }

    #[tokio::test]
    async fn no_points_means_empty_collection() {
        let provider = Scripted::default();
        let collection = Collector::new(&provider, chrono_tz::UTC).collect(&[]).await;

        assert!(collection.is_empty());
        assert_eq!(collection.attempted, 0);
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_after_every_point() {
        let provider = Scripted::default();
        let collector = Collector::new(&provider, chrono_tz::UTC);

        let started = tokio::time::Instant::now();
        collector.collect(&points(&["ok", "boom", "ok"])).await;

        assert!(started.elapsed() >= DEFAULT_DELAY * 3);
    }
}

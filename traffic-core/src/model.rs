use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A location to query. `name` is only set for curated points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn named(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self { name: Some(name.into()), lat, lon }
    }

    pub fn unnamed(lat: f64, lon: f64) -> Self {
        Self { name: None, lat, lon }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({}, {})", self.lat, self.lon),
            None => write!(f, "({}, {})", self.lat, self.lon),
        }
    }
}

/// Speeds as reported by a provider, before any validation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowReading {
    pub current_speed: Option<f64>,
    pub free_flow_speed: Option<f64>,
}

impl FlowReading {
    pub fn new(current_speed: f64, free_flow_speed: f64) -> Self {
        Self { current_speed: Some(current_speed), free_flow_speed: Some(free_flow_speed) }
    }
}

/// One CSV row: a point's speeds at a given hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficRecord {
    pub date: String,
    pub hour: String,
    pub location_name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub current_speed: f64,
    pub free_flow_speed: f64,
    pub congestion_ratio: f64,
    pub traffic_density: f64,
}

impl TrafficRecord {
    /// Builds a record from a raw reading, stamped with `observed_at`
    /// (already converted to the configured timezone).
    ///
    /// Zero, missing or non-finite speeds are rejected the same way a
    /// missing field is, so the ratio never divides by zero.
    pub fn from_reading(
        point: &Point,
        reading: FlowReading,
        observed_at: NaiveDateTime,
    ) -> Result<Self, FetchError> {
        let current = present(reading.current_speed).ok_or(FetchError::MissingSpeed)?;
        let free = match reading.free_flow_speed {
            Some(v) if v == 0.0 => return Err(FetchError::ZeroFreeFlow),
            other => present(other).ok_or(FetchError::MissingSpeed)?,
        };

        let (congestion_ratio, traffic_density) = derive_ratios(current, free);

        Ok(Self {
            date: observed_at.format("%Y-%m-%d").to_string(),
            hour: format!("{:02}:00", observed_at.hour()),
            location_name: point.name.clone(),
            lat: point.lat,
            lon: point.lon,
            current_speed: current,
            free_flow_speed: free,
            congestion_ratio,
            traffic_density,
        })
    }
}

fn present(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite() && *v != 0.0)
}

/// `(congestion_ratio, traffic_density)`, both rounded to 2 decimals. The
/// density is computed from the already rounded ratio.
pub fn derive_ratios(current_speed: f64, free_flow_speed: f64) -> (f64, f64) {
    let ratio = round_to(current_speed / free_flow_speed, 2);
    (ratio, round_to(1.0 - ratio, 2))
}

/// Rounds to `decimals` places, ties to even (30/48 gives 0.62, not 0.63).
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap().and_hms_opt(hour, minute, 12).unwrap()
    }

    #[test]
    fn ratios_are_rounded_to_two_decimals() {
        assert_eq!(derive_ratios(30.0, 60.0), (0.5, 0.5));
        assert_eq!(derive_ratios(20.0, 30.0), (0.67, 0.33));
        assert_eq!(derive_ratios(50.0, 40.0), (1.25, -0.25));
        assert_eq!(derive_ratios(1.0, 3.0), (0.33, 0.67));
    }

    #[test]
    fn exact_ties_round_to_even() {
        // 30/48 = 0.625 and 10/80 = 0.125 are exact in binary.
        assert_eq!(derive_ratios(30.0, 48.0), (0.62, 0.38));
        assert_eq!(derive_ratios(10.0, 80.0), (0.12, 0.88));
        assert_eq!(derive_ratios(70.0, 80.0), (0.88, 0.12));
    }

    #[test]
    fn record_is_stamped_with_date_and_truncated_hour() {
        let point = Point::named("Hoan_Kiem", 21.0285, 105.8542);
        let rec = TrafficRecord::from_reading(&point, FlowReading::new(30.0, 60.0), at(7, 45))
            .expect("valid reading");

        assert_eq!(rec.date, "2024-03-07");
        assert_eq!(rec.hour, "07:00");
        assert_eq!(rec.location_name.as_deref(), Some("Hoan_Kiem"));
        assert_eq!(rec.congestion_ratio, 0.5);
        assert_eq!(rec.traffic_density, 0.5);
    }

    #[test]
    fn missing_or_zero_speeds_produce_no_record() {
        let point = Point::unnamed(21.0, 105.8);
        let cases = [
            FlowReading { current_speed: None, free_flow_speed: Some(50.0) },
            FlowReading { current_speed: Some(20.0), free_flow_speed: None },
            FlowReading { current_speed: Some(0.0), free_flow_speed: Some(50.0) },
            FlowReading { current_speed: Some(f64::NAN), free_flow_speed: Some(50.0) },
            FlowReading::default(),
        ];
        for reading in cases {
            let err = TrafficRecord::from_reading(&point, reading, at(1, 0)).unwrap_err();
            assert!(matches!(err, FetchError::MissingSpeed), "{reading:?} gave {err:?}");
        }

        let err = TrafficRecord::from_reading(&point, FlowReading::new(20.0, 0.0), at(1, 0))
            .unwrap_err();
        assert!(matches!(err, FetchError::ZeroFreeFlow));
    }

    #[test]
    fn point_display() {
        assert_eq!(Point::named("Ba_Dinh", 21.0359, 105.8342).to_string(), "Ba_Dinh (21.0359, 105.8342)");
        assert_eq!(Point::unnamed(20.95, 105.75).to_string(), "(20.95, 105.75)");
    }
}

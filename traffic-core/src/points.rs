use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, model::Point, model::round_to};

/// Coordinates are rounded to this many decimals when generated on a grid.
const GRID_DECIMALS: i32 = 5;

/// Finest spacing that still gives distinct coordinates after rounding
/// to `GRID_DECIMALS`.
pub const MIN_GRID_STEP: f64 = 1e-5;

/// Upper bound on the number of points a single grid may produce.
pub const MAX_GRID_POINTS: usize = 100_000;

/// Slack applied when deciding whether the last grid line still fits
/// inside the bounding box.
const GRID_TOLERANCE: f64 = 1e-9;

/// One representative point per Hanoi district, in reporting order.
const HANOI_DISTRICTS: [(&str, f64, f64); 25] = [
    ("Hoan_Kiem", 21.0285, 105.8542),
    ("Ba_Dinh", 21.0359, 105.8342),
    ("Dong_Da", 21.0170, 105.8290),
    ("Hai_Ba_Trung", 21.0102, 105.8500),
    ("Cau_Giay", 21.0362, 105.7906),
    ("Thanh_Xuan", 20.9965, 105.8080),
    ("Hoang_Mai", 20.9740, 105.8460),
    ("Long_Bien", 21.0476, 105.8970),
    ("Ha_Dong", 20.9714, 105.7788),
    ("Nam_Tu_Liem", 21.0122, 105.7658),
    ("Bac_Tu_Liem", 21.0715, 105.7740),
    ("Tay_Ho", 21.0702, 105.8188),
    ("Gia_Lam", 21.0400, 105.9400),
    ("Dong_Anh", 21.1360, 105.8440),
    ("Soc_Son", 21.2600, 105.8000),
    ("Me_Linh", 21.1800, 105.7300),
    ("Ba_Vi", 21.2000, 105.4000),
    ("Thach_That", 21.0600, 105.5800),
    ("Quoc_Oai", 21.0300, 105.5700),
    ("Chuong_My", 20.9500, 105.6500),
    ("Thanh_Oai", 20.8600, 105.7600),
    ("Ung_Hoa", 20.7100, 105.8000),
    ("My_Duc", 20.7000, 105.6000),
    ("Phu_Xuyen", 20.7200, 105.9000),
    ("Thuong_Tin", 20.8500, 105.8700),
];

/// Which set of points a run queries.
///
/// Example TOML:
/// [source]
/// kind = "grid"
/// min_lat = 20.95
/// max_lat = 21.09
/// min_lon = 105.75
/// max_lon = 105.89
/// step = 0.02
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointSource {
    /// The curated district list.
    #[default]
    Named,
    /// Every point of a regular grid over a bounding box.
    Grid(GridSpec),
}

impl PointSource {
    pub fn points(&self) -> Result<Vec<Point>, ConfigError> {
        match self {
            PointSource::Named => Ok(named_points()),
            PointSource::Grid(spec) => spec.points(),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, PointSource::Named)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub step: f64,
}

impl GridSpec {
    /// Bounding box covering central Hanoi.
    pub fn hanoi() -> Self {
        Self { min_lat: 20.95, max_lat: 21.09, min_lon: 105.75, max_lon: 105.89, step: 0.02 }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.step.is_finite() || self.step < MIN_GRID_STEP {
            return Err(ConfigError::InvalidGrid(format!(
                "step must be a number of at least {MIN_GRID_STEP}, got {}",
                self.step
            )));
        }
        for (label, v) in [("min_lat", self.min_lat), ("max_lat", self.max_lat)] {
            if !(-90.0..=90.0).contains(&v) {
                return Err(ConfigError::InvalidGrid(format!("{label} {v} is outside [-90, 90]")));
            }
        }
        for (label, v) in [("min_lon", self.min_lon), ("max_lon", self.max_lon)] {
            if !(-180.0..=180.0).contains(&v) {
                return Err(ConfigError::InvalidGrid(format!(
                    "{label} {v} is outside [-180, 180]"
                )));
            }
        }
        Ok(())
    }

    /// Row-major (latitude outer) grid points. Each coordinate is
    /// `min + i * step`, so whether the maximum is included depends only on
    /// the step count, never on accumulated addition error.
    pub fn points(&self) -> Result<Vec<Point>, ConfigError> {
        self.validate()?;

        let count = axis_steps(self.min_lat, self.max_lat, self.step)
            .map_or(0, |n| n.saturating_add(1))
            .saturating_mul(
                axis_steps(self.min_lon, self.max_lon, self.step).map_or(0, |n| n.saturating_add(1)),
            );
        if count > MAX_GRID_POINTS {
            return Err(ConfigError::InvalidGrid(format!(
                "grid would have about {count} points, more than the limit of {MAX_GRID_POINTS}; use a larger step"
            )));
        }

        let lats = axis(self.min_lat, self.max_lat, self.step);
        let lons = axis(self.min_lon, self.max_lon, self.step);

        let mut points = Vec::with_capacity(lats.len() * lons.len());
        for &lat in &lats {
            for &lon in &lons {
                points.push(Point::unnamed(lat, lon));
            }
        }
        Ok(points)
    }
}

/// Whole steps from `min` that fit below `max`, or `None` for an empty axis.
fn axis_steps(min: f64, max: f64, step: f64) -> Option<usize> {
    if max < min {
        return None;
    }
    Some(((max - min) / step * (1.0 + GRID_TOLERANCE)).floor() as usize)
}

fn axis(min: f64, max: f64, step: f64) -> Vec<f64> {
    let Some(steps) = axis_steps(min, max, step) else {
        return Vec::new();
    };
    (0..=steps)
        .map(|i| round_to(min + i as f64 * step, GRID_DECIMALS))
        .filter(|v| *v <= round_to(max, GRID_DECIMALS))
        .collect()
}

pub fn named_points() -> Vec<Point> {
    HANOI_DISTRICTS.iter().map(|&(name, lat, lon)| Point::named(name, lat, lon)).collect()
}

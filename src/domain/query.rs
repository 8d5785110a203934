use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationError;

const HOURS_PER_DAY: u32 = 24;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Reject non-finite values and values outside the WGS84 range
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::MalformedInput(format!(
                "latitude out of range: {}",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(ValidationError::MalformedInput(format!(
                "longitude out of range: {}",
                self.lon
            )));
        }
        Ok(())
    }
}

/// Where a weather query is addressed
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Named(String),
    Coordinates(Coordinates),
}

impl Location {
    /// Build a location from caller input where either part may be absent.
    ///
    /// A non-blank name wins; a blank name counts as not provided.
    pub fn resolve(
        name: Option<&str>,
        coordinates: Option<Coordinates>,
    ) -> Result<Self, ValidationError> {
        match (name.map(str::trim).filter(|n| !n.is_empty()), coordinates) {
            (Some(name), _) => Ok(Self::Named(name.to_string())),
            (None, Some(coords)) => {
                coords.validate()?;
                Ok(Self::Coordinates(coords))
            }
            (None, None) => Err(ValidationError::MissingLocation),
        }
    }

    pub fn named(name: &str) -> Result<Self, ValidationError> {
        Self::resolve(Some(name), None)
    }

    pub fn at(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        Self::resolve(None, Some(Coordinates::new(lat, lon)))
    }

    fn push_query(&self, pairs: &mut Vec<(&'static str, String)>) {
        match self {
            Self::Named(name) => pairs.push(("q", name.clone())),
            Self::Coordinates(c) => {
                pairs.push(("lat", c.lat.to_string()));
                pairs.push(("lon", c.lon.to_string()));
            }
        }
    }
}

/// Bucket size requested from the history endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Bucket count sent upstream for an offset-mode `count`.
    ///
    /// The history endpoint only serves hourly buckets, so days become hours.
    /// `None` when the hour count does not fit the upstream `cnt` field.
    pub fn upstream_count(&self, count: u32) -> Option<u32> {
        match self {
            Self::Hour => Some(count),
            Self::Day => count.checked_mul(HOURS_PER_DAY),
        }
    }
}

/// Temporal shape of a weather query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Absolute { start: DateTime<Utc>, end: DateTime<Utc> },
    RelativeFuture { start: DateTime<Utc>, count: u32 },
    RelativePast { end: DateTime<Utc>, count: u32 },
}

impl TimeWindow {
    /// `None` when the offset leaves the representable date range
    pub fn resolved_start(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Absolute { start, .. } | Self::RelativeFuture { start, .. } => Some(start),
            Self::RelativePast { end, count } => {
                end.checked_sub_signed(Duration::days(i64::from(count)))
            }
        }
    }

    /// `None` when the offset leaves the representable date range
    pub fn resolved_end(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Absolute { end, .. } | Self::RelativePast { end, .. } => Some(end),
            Self::RelativeFuture { start, count } => {
                start.checked_add_signed(Duration::days(i64::from(count)))
            }
        }
    }
}

/// A validated weather history query, independent of the call shape that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    location: Location,
    window: TimeWindow,
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    upstream_count: Option<u32>,
}

impl RequestDescriptor {
    /// Only the normalizer builds descriptors, after validation.
    ///
    /// Both window bounds and the outbound bucket count are resolved here.
    pub(crate) fn new(
        location: Location,
        window: TimeWindow,
        granularity: Granularity,
    ) -> Result<Self, ValidationError> {
        let start = window.resolved_start().ok_or_else(|| {
            ValidationError::MalformedInput(format!("window start is out of range: {window:?}"))
        })?;
        let end = window.resolved_end().ok_or_else(|| {
            ValidationError::WindowInFuture(format!("window end is out of range: {window:?}"))
        })?;
        let upstream_count = match window {
            TimeWindow::Absolute { .. } => None,
            TimeWindow::RelativeFuture { count, .. } | TimeWindow::RelativePast { count, .. } => {
                Some(granularity.upstream_count(count).ok_or_else(|| {
                    ValidationError::MalformedInput(format!(
                        "{count} {}(s) exceeds the upstream bucket count",
                        granularity.as_str()
                    ))
                })?)
            }
        };

        Ok(Self {
            location,
            window,
            granularity,
            start,
            end,
            upstream_count,
        })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Query parameters for the history endpoint, excluding the credential
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        self.location.push_query(&mut pairs);

        pairs.push(("start", self.start.timestamp().to_string()));
        match self.upstream_count {
            Some(cnt) => pairs.push(("cnt", cnt.to_string())),
            None => pairs.push(("end", self.end.timestamp().to_string())),
        }

        pairs.push(("type", self.granularity.as_str().to_string()));
        pairs
    }
}

/// A validated coordinate-to-place lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverseGeocodeQuery {
    coordinates: Coordinates,
    limit: u32,
}

impl ReverseGeocodeQuery {
    pub const DEFAULT_LIMIT: u32 = 1;

    pub(crate) fn new(coordinates: Coordinates, limit: u32) -> Self {
        Self { coordinates, limit }
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lat", self.coordinates.lat.to_string()),
            ("lon", self.coordinates.lon.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

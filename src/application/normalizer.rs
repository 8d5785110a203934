use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::domain::{
    Coordinates, Granularity, Location, RequestDescriptor, ReverseGeocodeQuery, TimeWindow,
    ValidationError,
};

/// Calendar date format accepted from callers
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Turns the public call shapes into validated request descriptors
#[derive(Debug, Clone, Default)]
pub struct QueryNormalizer {
    fixed_now: Option<DateTime<Utc>>,
}

impl QueryNormalizer {
    /// Normalizer reading "now" from the wall clock
    pub fn new() -> Self {
        Self { fixed_now: None }
    }

    /// Normalizer pinned to a fixed instant
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            fixed_now: Some(now),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    /// Parse `MM/DD/YYYY` as midnight in the local timezone
    pub fn parse_date(input: &str) -> Result<DateTime<Utc>, ValidationError> {
        let date = NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|e| {
            ValidationError::MalformedInput(format!("invalid date {input:?} (expected MM/DD/YYYY): {e}"))
        })?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ValidationError::MalformedInput(format!("invalid date {input:?}")))?;
        Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| {
                ValidationError::MalformedInput(format!("local midnight does not exist on {input:?}"))
            })
    }

    /// `count` days of data starting at `start`
    pub fn future_window(
        &self,
        location: Location,
        start: &str,
        count: u32,
        granularity: Granularity,
    ) -> Result<RequestDescriptor, ValidationError> {
        let start = Self::parse_date(start)?;
        let now = self.now();
        if start > now {
            return Err(ValidationError::WindowInFuture(format!(
                "start {} is after now {}",
                start.to_rfc3339(),
                now.to_rfc3339()
            )));
        }

        let window = TimeWindow::RelativeFuture { start, count };
        let end = window.resolved_end().ok_or_else(|| {
            ValidationError::WindowInFuture(format!(
                "{count} day(s) from {} is past the representable date range",
                start.to_rfc3339()
            ))
        })?;
        if end > now {
            return Err(ValidationError::WindowInFuture(format!(
                "{count} day(s) from {} ends at {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }

        self.descriptor(location, window, granularity)
    }

    /// `count` days of data ending at `end`; the start is only bounded by the
    /// representable date range
    pub fn past_window(
        &self,
        location: Location,
        end: &str,
        count: u32,
        granularity: Granularity,
    ) -> Result<RequestDescriptor, ValidationError> {
        let end = Self::parse_date(end)?;
        let now = self.now();
        if end > now {
            return Err(ValidationError::WindowInFuture(format!(
                "end {} is after now {}",
                end.to_rfc3339(),
                now.to_rfc3339()
            )));
        }

        let window = TimeWindow::RelativePast { end, count };
        if window.resolved_start().is_none() {
            return Err(ValidationError::MalformedInput(format!(
                "{count} day(s) before {} is past the representable date range",
                end.to_rfc3339()
            )));
        }

        self.descriptor(location, window, granularity)
    }

    /// Data between two calendar dates
    pub fn interval(
        &self,
        location: Location,
        start: &str,
        end: &str,
        granularity: Granularity,
    ) -> Result<RequestDescriptor, ValidationError> {
        let start = Self::parse_date(start)?;
        let end = Self::parse_date(end)?;
        if start >= end {
            return Err(ValidationError::InvalidInterval {
                start: start.timestamp(),
                end: end.timestamp(),
            });
        }

        let now = self.now();
        if end > now {
            return Err(ValidationError::WindowInFuture(format!(
                "end {} is after now {}",
                end.to_rfc3339(),
                now.to_rfc3339()
            )));
        }

        self.descriptor(location, TimeWindow::Absolute { start, end }, granularity)
    }

    /// Coordinate-to-place lookup returning at most `limit` places
    pub fn reverse(&self, lat: f64, lon: f64, limit: u32) -> Result<ReverseGeocodeQuery, ValidationError> {
        let coordinates = Coordinates::new(lat, lon);
        coordinates.validate()?;
        if limit == 0 {
            return Err(ValidationError::MalformedInput(
                "reverse geocoding limit must be at least 1".to_string(),
            ));
        }
        Ok(ReverseGeocodeQuery::new(coordinates, limit))
    }

    fn descriptor(
        &self,
        location: Location,
        window: TimeWindow,
        granularity: Granularity,
    ) -> Result<RequestDescriptor, ValidationError> {
        debug!(?location, ?window, ?granularity, "Normalized weather query");
        RequestDescriptor::new(location, window, granularity)
    }
}

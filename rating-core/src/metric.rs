//! Named metrics and the values persisted against them.

use chrono::{DateTime, Datelike, Utc};

use crate::{EntityRef, MetricId, MetricValueId};

/// A named measurable quantity such as `segment_beach` or `tourist_flow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Store-assigned identifier.
    pub id: MetricId,
    /// Unique metric name.
    pub name: String,
}

/// Optional month/year scoping for time-series metrics.
///
/// Static metrics (scores, counts) leave both fields empty; weather and
/// visitor-flow series set one or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Period {
    /// Calendar month in `1..=12`.
    pub month: Option<u8>,
    /// Calendar year.
    pub year: Option<i32>,
}

impl Period {
    /// Period of a static metric.
    pub const NONE: Self = Self {
        month: None,
        year: None,
    };

    /// Period covering a whole year.
    #[must_use]
    pub const fn yearly(year: i32) -> Self {
        Self {
            month: None,
            year: Some(year),
        }
    }

    /// Period covering one month of one year.
    #[must_use]
    pub const fn monthly(month: u8, year: i32) -> Self {
        Self {
            month: Some(month),
            year: Some(year),
        }
    }
}

/// Composite identity of a metric value: at most one row exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricKey {
    /// Metric the value belongs to.
    pub metric: MetricId,
    /// Entity the value describes.
    pub entity: EntityRef,
    /// Time-series scoping.
    pub period: Period,
}

impl MetricKey {
    /// Key for a static metric value.
    #[must_use]
    pub const fn new(metric: MetricId, entity: EntityRef) -> Self {
        Self {
            metric,
            entity,
            period: Period::NONE,
        }
    }

    /// Replace the period.
    #[must_use]
    pub const fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }
}

/// A persisted metric value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    /// Row identifier.
    pub id: MetricValueId,
    /// Metric the value belongs to.
    pub metric: MetricId,
    /// Entity the value describes.
    pub entity: EntityRef,
    /// Numeric value (stored as text).
    pub value: f64,
    /// Time-series scoping.
    pub period: Period,
    /// Time of the last write.
    pub modified_at: DateTime<Utc>,
}

impl MetricValue {
    /// Composite identity of this row.
    #[must_use]
    pub const fn key(&self) -> MetricKey {
        MetricKey {
            metric: self.metric,
            entity: self.entity,
            period: self.period,
        }
    }

    /// Whether the value was written during the calendar month of `now`.
    ///
    /// A computed value stays fresh for the remainder of the month it was
    /// written in.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use rating_core::{EntityRef, LocationId, MetricId, MetricValue, MetricValueId, Period};
    ///
    /// let value = MetricValue {
    ///     id: MetricValueId(1),
    ///     metric: MetricId(1),
    ///     entity: EntityRef::Location(LocationId(9)),
    ///     value: 3.5,
    ///     period: Period::NONE,
    ///     modified_at: Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
    /// };
    /// assert!(value.is_fresh_at(Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap()));
    /// assert!(!value.is_fresh_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
    /// ```
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.modified_at.year() == now.year() && self.modified_at.month() == now.month()
    }
}

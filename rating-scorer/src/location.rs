//! Per-location scores and per-area counts of locations by type.
//!
//! Locations of primary types receive a `location_score` combining their
//! external rating, the sentiment of their reviews and a percentile of their
//! review count. Every counted type also receives a `count_<type>` score per
//! city and per region, ranking how many such locations the area holds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rating_core::{
    Area, EntityRef, GeoContext, Geocoder, Granularity, Location, LocationCatalog, MetricKey,
    MetricStore, SentimentAnalyser,
};
use serde::{Deserialize, Serialize};

use crate::ladder::{PercentileLadder, count_to_f64, publish};
use crate::metrics::{LOCATION_SCORE, count_metric};
use crate::{Deadline, RetryPolicy, ScoringError, Stage};

/// Number of reviews concatenated for sentiment analysis.
pub const REVIEW_LIMIT: usize = 50;

/// Weights of the location score terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationWeights {
    /// Weight of the external rating.
    pub rating: f64,
    /// Weight of review sentiment.
    pub sentiment: f64,
    /// Weight of the review count percentile.
    pub review_count: f64,
}

impl Default for LocationWeights {
    fn default() -> Self {
        Self {
            rating: 0.35,
            sentiment: 0.35,
            review_count: 0.30,
        }
    }
}

impl LocationWeights {
    /// Weighted sum of the three terms, published.
    ///
    /// # Examples
    /// ```
    /// use rating_scorer::LocationWeights;
    ///
    /// let weights = LocationWeights::default();
    /// assert_eq!(weights.combine(4.0, 3.0, 5.0), 3.95);
    /// ```
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "weighted sum of scores")]
    pub fn combine(&self, rating: f64, sentiment: f64, review_count: f64) -> f64 {
        publish(self.rating * rating + self.sentiment * sentiment + self.review_count * review_count)
    }
}

/// Result of scoring one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationOutcome {
    /// A fresh score was computed and stored.
    Scored(f64),
    /// The stored score is from the current month and was left untouched.
    Fresh(f64),
}

impl LocationOutcome {
    /// The score now held by the store.
    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::Scored(value) | Self::Fresh(value) => value,
        }
    }
}

/// Summary of scoring every location of one type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeReport {
    /// Location type.
    pub type_tag: String,
    /// Locations given a new score.
    pub scored: usize,
    /// Locations skipped because their score is fresh.
    pub fresh: usize,
    /// Locations whose scoring failed.
    pub failed: usize,
}

/// Summary of count percentiles for one type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountReport {
    /// Location type.
    pub type_tag: String,
    /// Regions given a count score.
    pub regions: usize,
    /// Cities given a count score.
    pub cities: usize,
    /// Locations that could not be placed in any area.
    pub unplaced: usize,
}

/// Scores locations against a metric store and a sentiment collaborator.
#[derive(Debug)]
pub struct LocationScorer<'a, S: ?Sized, A: ?Sized> {
    store: &'a S,
    sentiment: &'a A,
    weights: LocationWeights,
    retry: RetryPolicy,
}

impl<'a, S, A> LocationScorer<'a, S, A>
where
    S: MetricStore + LocationCatalog + ?Sized,
    A: SentimentAnalyser + ?Sized,
{
    /// Create a scorer with default weights and retry policy.
    pub fn new(store: &'a S, sentiment: &'a A) -> Self {
        Self {
            store,
            sentiment,
            weights: LocationWeights::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the term weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: LocationWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the sentiment retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ladder over the review counts of every location of `type_tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::InsufficientData`] when the counts do not
    /// vary and [`ScoringError::Store`] when the catalogue fails.
    pub fn review_count_ladder(&self, type_tag: &str) -> Result<PercentileLadder, ScoringError> {
        let locations = self.store.locations_by_type(type_tag, None, None)?;
        PercentileLadder::build(
            locations
                .iter()
                .map(|location| count_to_f64(location.review_count())),
        )
        .map_err(|source| ScoringError::insufficient(format!("review counts of {type_tag}"), source))
    }

    /// Score one location unless its stored score is from the current month.
    ///
    /// Sentiment failures are retried per the retry policy and then count
    /// as a sentiment of zero.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Store`] when reading or writing fails.
    pub fn score_location(
        &self,
        location: &Location,
        ladder: &PercentileLadder,
        now: DateTime<Utc>,
    ) -> Result<LocationOutcome, ScoringError> {
        let metric = self.store.metric_id(LOCATION_SCORE)?;
        let key = MetricKey::new(metric, EntityRef::Location(location.id));
        let existing = self.store.find_value(&key)?;
        if let Some(row) = existing.as_ref().filter(|row| row.is_fresh_at(now)) {
            debug!("location {} scored this month; skipping", location.id);
            return Ok(LocationOutcome::Fresh(row.value));
        }

        let sentiment = self.sentiment_of(location)?;
        let review_count = ladder.score(count_to_f64(location.review_count()));
        let value = self
            .weights
            .combine(location.rating(), sentiment, review_count);
        self.store
            .upsert_value(existing.map(|row| row.id), &key, value, now)?;
        debug!("location {} scored {value}", location.id);
        Ok(LocationOutcome::Scored(value))
    }

    fn sentiment_of(&self, location: &Location) -> Result<f64, ScoringError> {
        let reviews = self.store.top_reviews(location.id, REVIEW_LIMIT)?;
        if reviews.is_empty() {
            return Ok(0.0);
        }
        let text = reviews.join("\n");
        match self.retry.run("sentiment", || self.sentiment.analyse(&text)) {
            Ok(score) if score.is_finite() => Ok(score.clamp(0.0, 5.0)),
            Ok(score) => {
                warn!(
                    "sentiment for location {} was {score}; using 0",
                    location.id
                );
                Ok(0.0)
            }
            Err(err) => {
                warn!(
                    "sentiment unavailable for location {}: {err}; using 0",
                    location.id
                );
                Ok(0.0)
            }
        }
    }

    /// Score every location of `type_tag`, isolating per-location failures.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::InsufficientData`] when no review-count ladder
    /// can be built, [`ScoringError::DeadlineExceeded`] when `deadline`
    /// passes, and [`ScoringError::Store`] when the catalogue cannot be read.
    pub fn score_type(
        &self,
        type_tag: &str,
        deadline: &Deadline,
        now: DateTime<Utc>,
    ) -> Result<TypeReport, ScoringError> {
        let ladder = self.review_count_ladder(type_tag)?;
        let mut report = TypeReport {
            type_tag: type_tag.to_owned(),
            ..TypeReport::default()
        };
        for location in self.store.locations_by_type(type_tag, None, None)? {
            deadline.check(Stage::LocationScore)?;
            match self.score_location(&location, &ladder, now) {
                Ok(LocationOutcome::Scored(_)) => report.scored += 1,
                Ok(LocationOutcome::Fresh(_)) => report.fresh += 1,
                Err(err) => {
                    warn!(
                        "location {} ({LOCATION_SCORE}, {}) failed: {err}",
                        location.id,
                        Stage::LocationScore
                    );
                    report.failed += 1;
                }
            }
        }
        info!(
            "{type_tag}: {} scored, {} fresh, {} failed",
            report.scored, report.fresh, report.failed
        );
        Ok(report)
    }

    /// Rank every city and region by how many `type_tag` locations it holds
    /// and store the result as `count_<type_tag>`.
    ///
    /// Locations without an area reference are placed through `geocoder`;
    /// a city's region comes from `geo`. Only areas holding at least one
    /// location are ranked; every other area of `geo` loses its earlier
    /// `count_<type_tag>` row. A granularity whose counts do not vary is
    /// skipped with a warning and cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::DeadlineExceeded`] when `deadline` passes and
    /// [`ScoringError::Store`] when reading or writing fails.
    pub fn count_percentiles<G>(
        &self,
        type_tag: &str,
        geo: &GeoContext,
        geocoder: &G,
        deadline: &Deadline,
        now: DateTime<Utc>,
    ) -> Result<CountReport, ScoringError>
    where
        G: Geocoder + ?Sized,
    {
        let mut report = CountReport {
            type_tag: type_tag.to_owned(),
            ..CountReport::default()
        };
        let mut tallies: BTreeMap<Area, u64> = BTreeMap::new();
        for location in self.store.locations_by_type(type_tag, None, None)? {
            deadline.check(Stage::CountPercentile)?;
            let areas = place(&location, geo, geocoder);
            if areas.is_empty() {
                report.unplaced += 1;
            }
            for area in areas {
                *tallies.entry(area).or_default() += 1;
            }
        }

        let metric_name = count_metric(type_tag);
        let metric = self.store.metric_id(&metric_name)?;
        for granularity in [Granularity::Region, Granularity::City] {
            let counts: Vec<(Area, u64)> = tallies
                .iter()
                .filter(|(area, _)| area.granularity() == granularity)
                .map(|(area, count)| (*area, *count))
                .collect();
            let mut ranked = Vec::new();
            let built = PercentileLadder::build(counts.iter().map(|(_, count)| count_to_f64(*count)));
            match built {
                Ok(ladder) => {
                    for (area, count) in counts {
                        let key = MetricKey::new(metric, area.into());
                        self.store
                            .put_value(&key, ladder.score(count_to_f64(count)), now)?;
                        ranked.push(area);
                    }
                }
                Err(source) => {
                    if !counts.is_empty() {
                        warn!(
                            "{metric_name} for {granularity}s skipped: {}",
                            ScoringError::insufficient(metric_name.as_str(), source)
                        );
                    }
                }
            }
            match granularity {
                Granularity::Region => report.regions = ranked.len(),
                _ => report.cities = ranked.len(),
            }
            for area in geo.areas() {
                if area.granularity() == granularity && !ranked.contains(&area) {
                    self.store.clear_value(&MetricKey::new(metric, area.into()))?;
                }
            }
        }
        info!(
            "{metric_name}: {} regions, {} cities, {} unplaced",
            report.regions, report.cities, report.unplaced
        );
        Ok(report)
    }
}

/// Areas containing `location`, resolving missing references via `geocoder`.
fn place<G>(location: &Location, geo: &GeoContext, geocoder: &G) -> Vec<Area>
where
    G: Geocoder + ?Sized,
{
    let (mut city, mut region) = (location.city, location.region);
    if city.is_none() && region.is_none() {
        match geocoder.resolve(location.location) {
            Ok(Some(placement)) => {
                city = placement.city;
                region = placement.region;
            }
            Ok(None) => {
                debug!("location {} lies outside known areas", location.id);
            }
            Err(err) => {
                warn!("could not geocode location {}: {err}", location.id);
            }
        }
    }
    let region = region.or_else(|| city.and_then(|id| geo.city(id)).and_then(|c| c.region));
    region
        .map(Area::Region)
        .into_iter()
        .chain(city.map(Area::City))
        .collect()
}

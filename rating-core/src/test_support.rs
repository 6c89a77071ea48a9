//! In-memory store and collaborator doubles used by unit and behaviour tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    CityId, CollaboratorError, EntityRef, Location, LocationCatalog, LocationId, MetricId,
    MetricKey, MetricStore, MetricValue, MetricValueId, RegionId, ScopeFilter, SentimentAnalyser,
    StoreError, WeatherSource, store::ensure_finite,
};

/// In-memory [`MetricStore`] and [`LocationCatalog`].
///
/// The store performs linear scans and is intended only for small datasets.
/// Interior mutability keeps the `&self` signatures of the traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    metrics: RefCell<Vec<String>>,
    values: RefCell<Vec<MetricValue>>,
    locations: Vec<Location>,
    city_regions: BTreeMap<CityId, RegionId>,
    reviews: BTreeMap<LocationId, Vec<String>>,
}

impl MemoryStore {
    /// Create a store holding the given locations.
    pub fn with_locations<I>(locations: I) -> Self
    where
        I: IntoIterator<Item = Location>,
    {
        Self {
            locations: locations.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Record that `city` lies in `region` for region-scoped lookups.
    #[must_use]
    pub fn with_city(mut self, city: CityId, region: RegionId) -> Self {
        self.city_regions.insert(city, region);
        self
    }

    /// Attach reviews to a location, best first.
    #[must_use]
    pub fn with_reviews<I, S>(mut self, location: LocationId, reviews: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reviews
            .insert(location, reviews.into_iter().map(Into::into).collect());
        self
    }

    /// Number of persisted metric values.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.borrow().len()
    }

    /// Current value for `name` on `entity` with no period, if stored.
    #[must_use]
    pub fn value_of(&self, name: &str, entity: EntityRef) -> Option<f64> {
        let metric = self.existing_metric(name)?;
        self.values
            .borrow()
            .iter()
            .find(|row| row.key() == MetricKey::new(metric, entity))
            .map(|row| row.value)
    }

    fn existing_metric(&self, name: &str) -> Option<MetricId> {
        self.metrics
            .borrow()
            .iter()
            .position(|known| known == name)
            .and_then(|index| u64::try_from(index + 1).ok())
            .map(MetricId)
    }

    fn region_of(&self, location: &Location) -> Option<RegionId> {
        location.region.or_else(|| {
            location
                .city
                .and_then(|city| self.city_regions.get(&city).copied())
        })
    }
}

impl MetricStore for MemoryStore {
    fn metric_id(&self, name: &str) -> Result<MetricId, StoreError> {
        if let Some(id) = self.existing_metric(name) {
            return Ok(id);
        }
        let mut metrics = self.metrics.borrow_mut();
        metrics.push(name.to_owned());
        let id = u64::try_from(metrics.len())
            .map_err(|_| StoreError::IdOutOfRange { id: u64::MAX })?;
        Ok(MetricId(id))
    }

    fn get_values(
        &self,
        metric: MetricId,
        scope: &ScopeFilter,
    ) -> Result<Vec<MetricValue>, StoreError> {
        Ok(self
            .values
            .borrow()
            .iter()
            .filter(|row| row.metric == metric && scope.matches(row.entity, row.period))
            .cloned()
            .collect())
    }

    fn upsert_value(
        &self,
        existing: Option<MetricValueId>,
        key: &MetricKey,
        value: f64,
        modified_at: DateTime<Utc>,
    ) -> Result<MetricValue, StoreError> {
        ensure_finite(key.metric, value)?;
        let mut values = self.values.borrow_mut();
        let id = match existing {
            Some(id) => {
                let row = values
                    .iter_mut()
                    .find(|row| row.id == id)
                    .ok_or(StoreError::UnknownValue { id })?;
                row.metric = key.metric;
                row.entity = key.entity;
                row.period = key.period;
                row.value = value;
                row.modified_at = modified_at;
                return Ok(row.clone());
            }
            None => values.iter().map(|row| row.id.get()).max().unwrap_or(0) + 1,
        };
        let row = MetricValue {
            id: MetricValueId(id),
            metric: key.metric,
            entity: key.entity,
            value,
            period: key.period,
            modified_at,
        };
        values.push(row.clone());
        Ok(row)
    }

    fn delete_value(&self, id: MetricValueId) -> Result<(), StoreError> {
        self.values.borrow_mut().retain(|row| row.id != id);
        Ok(())
    }
}

impl LocationCatalog for MemoryStore {
    fn locations_by_type(
        &self,
        type_tag: &str,
        region: Option<RegionId>,
        city: Option<CityId>,
    ) -> Result<Vec<Location>, StoreError> {
        Ok(self
            .locations
            .iter()
            .filter(|location| location.has_type(type_tag))
            .filter(|location| region.is_none_or(|id| self.region_of(location) == Some(id)))
            .filter(|location| city.is_none_or(|id| location.city == Some(id)))
            .cloned()
            .collect())
    }

    fn top_reviews(&self, location: LocationId, limit: usize) -> Result<Vec<String>, StoreError> {
        Ok(self
            .reviews
            .get(&location)
            .map(|reviews| reviews.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Sentiment analyser returning the same score for every text.
#[derive(Debug, Clone, Copy)]
pub struct FixedSentiment(pub f64);

impl SentimentAnalyser for FixedSentiment {
    fn analyse(&self, _text: &str) -> Result<f64, CollaboratorError> {
        Ok(self.0)
    }
}

/// Sentiment analyser that always fails and counts attempts.
#[derive(Debug)]
pub struct FailingSentiment {
    error: CollaboratorError,
    calls: Cell<u32>,
}

impl FailingSentiment {
    /// Fail every call with `error`.
    #[must_use]
    pub const fn new(error: CollaboratorError) -> Self {
        Self {
            error,
            calls: Cell::new(0),
        }
    }

    /// Fail every call as an unreachable service.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(CollaboratorError::Unavailable {
            service: "sentiment",
            reason: "connection refused".into(),
        })
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl SentimentAnalyser for FailingSentiment {
    fn analyse(&self, _text: &str) -> Result<f64, CollaboratorError> {
        self.calls.set(self.calls.get().saturating_add(1));
        Err(self.error.clone())
    }
}

/// Weather source backed by a fixed table; unknown entities fail.
#[derive(Debug, Clone, Default)]
pub struct FixedWeather {
    scores: BTreeMap<EntityRef, f64>,
}

impl FixedWeather {
    /// Record the comfort score of an entity.
    #[must_use]
    pub fn with_score(mut self, entity: EntityRef, score: f64) -> Self {
        self.scores.insert(entity, score);
        self
    }
}

impl WeatherSource for FixedWeather {
    fn comfort_score(&self, entity: EntityRef) -> Result<f64, CollaboratorError> {
        self.scores
            .get(&entity)
            .copied()
            .ok_or_else(|| CollaboratorError::Unavailable {
                service: "weather",
                reason: format!("no comfort data for {entity}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo::Coord;
    use rstest::rstest;

    #[rstest]
    fn region_lookup_follows_city_membership() {
        let store = MemoryStore::with_locations([
            Location::new(LocationId(1), "Bay", Coord { x: 0.0, y: 0.0 })
                .with_city(CityId(4))
                .with_type("beach"),
            Location::new(LocationId(2), "Cove", Coord { x: 0.0, y: 0.0 })
                .with_city(CityId(5))
                .with_type("beach"),
        ])
        .with_city(CityId(4), RegionId(1));

        let found = store
            .locations_by_type("beach", Some(RegionId(1)), None)
            .expect("in-memory lookup");
        assert_eq!(
            found.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![LocationId(1)]
        );
    }

    #[rstest]
    fn put_value_keeps_one_row_per_key() {
        let store = MemoryStore::default();
        let metric = store.metric_id("complex").expect("register metric");
        let key = MetricKey::new(metric, EntityRef::City(CityId(1)));
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = store.put_value(&key, 2.5, at).expect("insert");
        let second = store.put_value(&key, 4.5, at).expect("update");

        assert_eq!(first.id, second.id);
        assert_eq!(store.value_count(), 1);
        assert_eq!(store.value_of("complex", key.entity), Some(4.5));
    }

    #[rstest]
    fn cleared_rows_disappear() {
        let store = MemoryStore::default();
        let metric = store.metric_id("segment_eco_w").expect("register metric");
        let key = MetricKey::new(metric, EntityRef::Region(RegionId(2)));
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        store.put_value(&key, 4.0, at).expect("insert");

        assert!(store.clear_value(&key).expect("clear"));
        assert_eq!(store.value_count(), 0);
        assert!(!store.clear_value(&key).expect("clear again"));
    }

    #[rstest]
    fn failing_sentiment_counts_calls() {
        let analyser = FailingSentiment::unavailable();
        assert!(analyser.analyse("x").is_err());
        assert!(analyser.analyse("y").is_err());
        assert_eq!(analyser.calls(), 2);
    }
}

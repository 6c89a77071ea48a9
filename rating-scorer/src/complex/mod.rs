//! Top-level complex score per region and city.
//!
//! The composer is a pure read over persisted components: it never
//! recomputes lower levels and fails with
//! [`ScoringError::MissingDependency`] when a component is absent.
//! [`ComplexPartsBuilder`] computes the components beforehand.

mod parts;

pub use parts::{ComplexPartsBuilder, HOTEL_TYPE, PRICE_CEILING, RENTAL_TYPE};

use chrono::{DateTime, Utc};
use rating_core::{Area, EntityRef, MetricKey, MetricStore};
use serde::{Deserialize, Serialize};

use crate::ScoringError;
use crate::ladder::publish;
use crate::metrics::{
    COMPLEX, COMPLEX_DISTANCE, COMPLEX_L, COMPLEX_N, COMPLEX_NIGHT, COMPLEX_O, COMPLEX_PRICE,
    COMPLEX_T, COMPLEX_TRU,
};

/// Weights of the complex score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexWeights {
    /// Mean segment score.
    pub segments: f64,
    /// General infrastructure location score.
    pub infrastructure: f64,
    /// Blended infrastructure counts.
    pub counts: f64,
    /// Share of primary counts within the blend.
    pub primary_counts: f64,
    /// Share of secondary counts within the blend.
    pub secondary_counts: f64,
    /// Tourist flow percentile.
    pub tourist_flow: f64,
    /// Overnight stays percentile.
    pub overnight_stays: f64,
    /// Inverted distance percentile.
    pub distance: f64,
    /// Inverted price percentile.
    pub price: f64,
}

impl Default for ComplexWeights {
    fn default() -> Self {
        Self {
            segments: 0.35,
            infrastructure: 0.20,
            counts: 0.10,
            primary_counts: 0.7,
            secondary_counts: 0.3,
            tourist_flow: 0.10,
            overnight_stays: 0.10,
            distance: 0.05,
            price: 0.10,
        }
    }
}

/// Persisted components of one complex score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexParts {
    /// `complex_t`.
    pub t: f64,
    /// `complex_o`.
    pub o: f64,
    /// `complex_n`.
    pub n: f64,
    /// `complex_l`.
    pub l: f64,
    /// `complex_tru`.
    pub tru: f64,
    /// `complex_night`.
    pub night: f64,
    /// `complex_distance`.
    pub distance: f64,
    /// `complex_price`.
    pub price: f64,
}

impl ComplexParts {
    /// Weighted sum of the components, not yet published.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "weighted sum of components")]
    pub fn combine(&self, weights: &ComplexWeights) -> f64 {
        let counts = weights.primary_counts * self.n + weights.secondary_counts * self.l;
        weights.segments * self.t
            + weights.infrastructure * self.o
            + weights.counts * counts
            + weights.tourist_flow * self.tru
            + weights.overnight_stays * self.night
            + weights.distance * self.distance
            + weights.price * self.price
    }
}

/// Combines persisted components into the `complex` metric.
#[derive(Debug)]
pub struct ComplexComposer<'a, S: ?Sized> {
    store: &'a S,
    weights: ComplexWeights,
}

impl<'a, S> ComplexComposer<'a, S>
where
    S: MetricStore + ?Sized,
{
    /// Create a composer with default weights.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            weights: ComplexWeights::default(),
        }
    }

    /// Replace the component weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: ComplexWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Read every component for `area`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::MissingDependency`] naming the first absent
    /// component and [`ScoringError::Store`] when reading fails.
    pub fn stored_parts(&self, area: Area) -> Result<ComplexParts, ScoringError> {
        let entity = EntityRef::from(area);
        let read = |name: &str| -> Result<f64, ScoringError> {
            let metric = self.store.metric_id(name)?;
            self.store
                .find_value(&MetricKey::new(metric, entity))?
                .map(|row| row.value)
                .ok_or_else(|| ScoringError::MissingDependency {
                    metric: name.to_owned(),
                    entity,
                })
        };
        Ok(ComplexParts {
            t: read(COMPLEX_T)?,
            o: read(COMPLEX_O)?,
            n: read(COMPLEX_N)?,
            l: read(COMPLEX_L)?,
            tru: read(COMPLEX_TRU)?,
            night: read(COMPLEX_NIGHT)?,
            distance: read(COMPLEX_DISTANCE)?,
            price: read(COMPLEX_PRICE)?,
        })
    }

    /// Compose, publish and store the complex score of `area`.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use rating_core::{Area, EntityRef, MetricKey, MetricStore, RegionId};
    /// use rating_core::test_support::MemoryStore;
    /// use rating_scorer::ComplexComposer;
    ///
    /// let store = MemoryStore::default();
    /// let region = Area::Region(RegionId(1));
    /// for name in [
    ///     "complex_t", "complex_o", "complex_n", "complex_l",
    ///     "complex_tru", "complex_night", "complex_distance", "complex_price",
    /// ] {
    ///     let metric = store.metric_id(name).unwrap();
    ///     store.put_value(&MetricKey::new(metric, region.into()), 4.0, Utc::now()).unwrap();
    /// }
    ///
    /// let score = ComplexComposer::new(&store).compose_complex_score(region, Utc::now()).unwrap();
    /// assert_eq!(score, 4.0);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::MissingDependency`] when a component is
    /// absent, after removing any earlier complex score of the area.
    /// Returns [`ScoringError::Store`] when reading or writing fails.
    pub fn compose_complex_score(&self, area: Area, now: DateTime<Utc>) -> Result<f64, ScoringError> {
        let metric = self.store.metric_id(COMPLEX)?;
        let key = MetricKey::new(metric, area.into());
        let parts = match self.stored_parts(area) {
            Ok(parts) => parts,
            Err(err @ ScoringError::MissingDependency { .. }) => {
                self.store.clear_value(&key)?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let value = publish(parts.combine(&self.weights));
        self.store.put_value(&key, value, now)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rating_core::test_support::MemoryStore;
    use rating_core::{CityId, ScopeFilter};
    use rstest::{fixture, rstest};

    const CITY: Area = Area::City(CityId(5));

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()
    }

    fn put(store: &MemoryStore, name: &str, value: f64) {
        let metric = store.metric_id(name).expect("register metric");
        store
            .put_value(&MetricKey::new(metric, CITY.into()), value, now())
            .expect("store component");
    }

    #[fixture]
    fn store() -> MemoryStore {
        let store = MemoryStore::default();
        put(&store, COMPLEX_T, 4.0);
        put(&store, COMPLEX_O, 3.0);
        put(&store, COMPLEX_N, 5.0);
        put(&store, COMPLEX_L, 2.0);
        put(&store, COMPLEX_TRU, 2.5);
        put(&store, COMPLEX_NIGHT, 3.5);
        put(&store, COMPLEX_DISTANCE, 5.0);
        put(&store, COMPLEX_PRICE, 2.0);
        store
    }

    #[rstest]
    fn weighted_components(store: MemoryStore) {
        let score = ComplexComposer::new(&store)
            .compose_complex_score(CITY, now())
            .expect("compose");
        // 1.4 + 0.6 + 0.1*(3.5 + 0.6) + 0.25 + 0.35 + 0.25 + 0.2
        assert_eq!(score, 3.46);
        assert_eq!(store.value_of(COMPLEX, CITY.into()), Some(3.46));
    }

    #[rstest]
    fn composing_twice_is_idempotent(store: MemoryStore) {
        let composer = ComplexComposer::new(&store);
        let first = composer.compose_complex_score(CITY, now()).expect("first");
        let second = composer.compose_complex_score(CITY, now()).expect("second");
        assert_eq!(first, second);
        let metric = store.metric_id(COMPLEX).expect("metric");
        let rows = store
            .get_values(metric, &ScopeFilter::any())
            .expect("scan complex");
        assert_eq!(rows.len(), 1);
    }

    #[rstest]
    fn missing_component_is_reported() {
        let store = MemoryStore::default();
        put(&store, COMPLEX_T, 4.0);
        let err = ComplexComposer::new(&store)
            .compose_complex_score(CITY, now())
            .expect_err("components missing");
        match err {
            ScoringError::MissingDependency { metric, entity } => {
                assert_eq!(metric, COMPLEX_O);
                assert_eq!(entity, CITY.into());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.value_of(COMPLEX, CITY.into()), None);
    }

    #[rstest]
    fn a_lost_component_removes_the_earlier_score(store: MemoryStore) {
        let composer = ComplexComposer::new(&store);
        composer.compose_complex_score(CITY, now()).expect("compose");
        let metric = store.metric_id(COMPLEX_PRICE).expect("metric");
        store
            .clear_value(&MetricKey::new(metric, CITY.into()))
            .expect("drop price");

        assert!(composer.compose_complex_score(CITY, now()).is_err());
        assert_eq!(store.value_of(COMPLEX, CITY.into()), None);
    }

    #[rstest]
    fn low_composites_are_floored() {
        let parts = ComplexParts {
            t: 1.0,
            o: 1.0,
            n: 1.0,
            l: 1.0,
            tru: 1.0,
            night: 1.0,
            distance: 1.0,
            price: 1.0,
        };
        assert_eq!(publish(parts.combine(&ComplexWeights::default())), 2.0);
    }
}

//! Weather comfort read from precomputed metric values.

use rating_core::{CollaboratorError, EntityRef, MetricStore, ScopeFilter, WeatherSource};

use crate::ladder::mean;
use crate::metrics::WEATHER_COMFORT;

/// [`WeatherSource`] backed by `weather_comfort` rows in a metric store.
///
/// Comfort is the mean over every period stored for the entity, so monthly
/// rows average into a seasonal score.
#[derive(Debug)]
pub struct StoredWeather<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: MetricStore + ?Sized> StoredWeather<'a, S> {
    /// Read comfort scores from `store`.
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: MetricStore + ?Sized> WeatherSource for StoredWeather<'_, S> {
    fn comfort_score(&self, entity: EntityRef) -> Result<f64, CollaboratorError> {
        let unavailable = |reason: String| CollaboratorError::Unavailable {
            service: "weather",
            reason,
        };
        let metric = self
            .store
            .metric_id(WEATHER_COMFORT)
            .map_err(|err| unavailable(err.to_string()))?;
        let rows = self
            .store
            .get_values(metric, &ScopeFilter::entity(entity))
            .map_err(|err| unavailable(err.to_string()))?;
        mean(rows.iter().map(|row| row.value))
            .ok_or_else(|| unavailable(format!("no {WEATHER_COMFORT} rows for {entity}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rating_core::test_support::MemoryStore;
    use rating_core::{CityId, MetricKey, Period};
    use rstest::rstest;

    #[rstest]
    fn averages_monthly_rows() {
        let store = MemoryStore::default();
        let metric = store.metric_id(WEATHER_COMFORT).expect("register metric");
        let city = EntityRef::City(CityId(3));
        for (month, value) in [(6, 4.0), (7, 5.0)] {
            let key = MetricKey::new(metric, city).with_period(Period::monthly(month, 2024));
            store.put_value(&key, value, Utc::now()).expect("store comfort");
        }

        let weather = StoredWeather::new(&store);
        assert_eq!(weather.comfort_score(city), Ok(4.5));
    }

    #[rstest]
    fn missing_rows_are_unavailable() {
        let store = MemoryStore::default();
        let weather = StoredWeather::new(&store);
        let err = weather
            .comfort_score(EntityRef::City(CityId(1)))
            .expect_err("no rows stored");
        assert!(err.is_transient());
    }
}

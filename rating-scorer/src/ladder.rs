//! Percentile ladders mapping raw magnitudes onto the `1..=5` rating scale.
//!
//! A ladder holds 100 ascending breakpoints. Breakpoint `k` is the `k/99`
//! quantile of the sample with linear interpolation, so the first breakpoint
//! is the sample minimum and the last the maximum. Scores are published
//! through [`publish`], which floors at [`MIN_PUBLISHED_SCORE`] and rounds to
//! two decimals.

use crate::InsufficientData;

/// Number of breakpoints in a ladder.
pub const BREAKPOINTS: usize = 100;

/// Lowest score the engine publishes.
pub const MIN_PUBLISHED_SCORE: f64 = 2.0;

/// Highest score on the rating scale.
pub const MAX_SCORE: f64 = 5.0;

const LAST: usize = BREAKPOINTS - 1;
const LAST_U8: u8 = 99;

/// Where a value falls relative to a ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Rank {
    Below,
    Above,
    /// Fractional index `(i + alpha) / 99` in `0.0..=1.0`.
    Within(f64),
}

/// Quantile breakpoints derived from a sample.
///
/// # Examples
/// ```
/// use rating_scorer::PercentileLadder;
///
/// let ladder = PercentileLadder::build((1..=100).map(f64::from)).unwrap();
/// assert_eq!(ladder.score(0.5), 2.0);
/// assert_eq!(ladder.score(50.0), 2.98);
/// assert_eq!(ladder.score(100.5), 5.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileLadder {
    breakpoints: Vec<f64>,
}

impl PercentileLadder {
    /// Derive a ladder from `samples`.
    ///
    /// Non-finite samples are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] when no finite samples remain or all of
    /// them are equal.
    #[expect(clippy::float_arithmetic, reason = "quantile interpolation")]
    pub fn build<I>(samples: I) -> Result<Self, InsufficientData>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut total = 0_usize;
        let mut sorted: Vec<f64> = samples
            .into_iter()
            .inspect(|_| total += 1)
            .filter(|value| value.is_finite())
            .collect();
        sorted.sort_by(f64::total_cmp);

        let insufficient = InsufficientData {
            total,
            usable: sorted.len(),
        };
        let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
            return Err(insufficient);
        };
        if first >= last {
            return Err(insufficient);
        }

        let span = sorted.len() - 1;
        let breakpoints = (0..BREAKPOINTS)
            .map(|k| {
                let scaled = k * span;
                let lower = scaled.checked_div(LAST).unwrap_or(0);
                let remainder = scaled.checked_rem(LAST).unwrap_or(0);
                let fraction = u8::try_from(remainder).map_or(0.0, f64::from) / f64::from(LAST_U8);
                let low = sorted.get(lower).copied().unwrap_or(last);
                let high = sorted.get(lower + 1).copied().unwrap_or(low);
                low + fraction * (high - low)
            })
            .collect();
        Ok(Self { breakpoints })
    }

    /// The 100 ascending breakpoints.
    #[must_use]
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Score `value` where larger is better.
    ///
    /// Values below the observed range score [`MIN_PUBLISHED_SCORE`]; values
    /// at or above the top score [`MAX_SCORE`].
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "linear map onto the rating scale")]
    pub fn score(&self, value: f64) -> f64 {
        match self.rank(value) {
            Rank::Below => MIN_PUBLISHED_SCORE,
            Rank::Above => MAX_SCORE,
            Rank::Within(fraction) => publish(1.0 + 4.0 * fraction),
        }
    }

    /// Score `value` where smaller is better, e.g. distances and prices.
    ///
    /// Values below the observed range score [`MAX_SCORE`]; values above it
    /// score [`MIN_PUBLISHED_SCORE`].
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "linear map onto the rating scale")]
    pub fn score_inverted(&self, value: f64) -> f64 {
        match self.rank(value) {
            Rank::Below => MAX_SCORE,
            Rank::Above => MIN_PUBLISHED_SCORE,
            Rank::Within(fraction) => publish(1.0 + 4.0 * (1.0 - fraction)),
        }
    }

    #[expect(clippy::float_arithmetic, reason = "bracket interpolation")]
    fn rank(&self, value: f64) -> Rank {
        let (Some(&lowest), Some(&highest)) = (self.breakpoints.first(), self.breakpoints.last())
        else {
            return Rank::Below;
        };
        if value.is_nan() || value < lowest {
            return Rank::Below;
        }
        if value > highest {
            return Rank::Above;
        }
        if value >= highest {
            return Rank::Within(1.0);
        }

        // Ties rank at the first equal breakpoint so the sample minimum maps
        // to the bottom of the scale however often it repeats.
        let first_at_or_above = self
            .breakpoints
            .partition_point(|breakpoint| *breakpoint < value);
        if self
            .breakpoints
            .get(first_at_or_above)
            .is_some_and(|breakpoint| *breakpoint <= value)
        {
            let steps = u8::try_from(first_at_or_above).map_or(f64::from(LAST_U8), f64::from);
            return Rank::Within(steps / f64::from(LAST_U8));
        }

        // `lowest < value < highest`, so both bracket ends exist.
        let index = first_at_or_above.saturating_sub(1);
        let low = self.breakpoints.get(index).copied().unwrap_or(lowest);
        let high = self.breakpoints.get(index + 1).copied().unwrap_or(highest);
        let alpha = if high > low {
            (value - low) / (high - low)
        } else {
            0.0
        };
        let steps = u8::try_from(index).map_or(f64::from(LAST_U8), f64::from);
        Rank::Within((steps + alpha) / f64::from(LAST_U8))
    }
}

/// Apply the publication policy: floor at [`MIN_PUBLISHED_SCORE`] and round
/// to two decimals.
///
/// # Examples
/// ```
/// use rating_scorer::publish;
///
/// assert_eq!(publish(1.2), 2.0);
/// assert_eq!(publish(3.456), 3.46);
/// ```
#[must_use]
pub fn publish(raw: f64) -> f64 {
    round2(raw.max(MIN_PUBLISHED_SCORE))
}

/// Round to two decimal places.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "decimal rounding")]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Floor a sub-term at [`MIN_PUBLISHED_SCORE`]; absent terms take the floor.
#[must_use]
pub fn floored(term: Option<f64>) -> f64 {
    term.map_or(MIN_PUBLISHED_SCORE, |value| value.max(MIN_PUBLISHED_SCORE))
}

/// Arithmetic mean, `None` for an empty input.
#[expect(clippy::float_arithmetic, reason = "mean of scores")]
pub(crate) fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_u32), |(sum, count), value| {
            (sum + value, count.saturating_add(1))
        });
    (count > 0).then(|| sum / f64::from(count))
}

/// Convert a count to `f64` for ranking.
#[expect(
    clippy::cast_precision_loss,
    reason = "counts stay far below 2^52"
)]
pub(crate) const fn count_to_f64(count: u64) -> f64 {
    count as f64
}

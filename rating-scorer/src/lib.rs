//! Scoring engine for the tourism rating workspace.
//!
//! Ratings are computed bottom-up and every level is persisted before the
//! next one reads it:
//! - **Location scores** combine the external rating, review sentiment and
//!   a review-count percentile ([`LocationScorer`]).
//! - **Count percentiles** rank each region and city by how many locations
//!   of a type it holds.
//! - **Segment scores** roll location scores, counts and weather comfort up
//!   per tourism segment and area ([`SegmentAggregator`]).
//! - **Complex scores** weigh segment scores against infrastructure, tourist
//!   flow, overnight stays, distance to the capital and accommodation prices
//!   ([`ComplexPartsBuilder`], [`ComplexComposer`]).
//!
//! Every raw magnitude is normalised through a [`PercentileLadder`] and
//! published scores are floored at [`MIN_PUBLISHED_SCORE`]. [`BatchRunner`]
//! drives all stages over a store, isolating failures per entity.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use chrono::Utc;
//! use geo::Coord;
//! use rating_core::GeoContext;
//! use rating_core::test_support::{FixedSentiment, FixedWeather, MemoryStore};
//! use rating_scorer::{BatchRunner, Deadline};
//!
//! let store = MemoryStore::default();
//! let geo = GeoContext::new(Coord { x: 0.0, y: 0.0 }, BTreeMap::new(), BTreeMap::new());
//! let report = BatchRunner::new(&store, &FixedSentiment(3.0), &FixedWeather::default(), &geo, &geo)
//!     .run(&Deadline::none(), Utc::now());
//! assert!(report.is_complete());
//! assert!(report.complex.is_empty());
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod catalogue;
mod complex;
mod deadline;
mod error;
mod ladder;
mod location;
pub mod metrics;
mod pipeline;
mod retry;
mod segment;
mod weather;

pub use catalogue::{SegmentCatalogue, TypeProfile};
pub use complex::{
    ComplexComposer, ComplexParts, ComplexPartsBuilder, ComplexWeights, HOTEL_TYPE, PRICE_CEILING,
    RENTAL_TYPE,
};
pub use deadline::Deadline;
pub use error::{InsufficientData, ScoringError, Stage};
pub use ladder::{
    BREAKPOINTS, MAX_SCORE, MIN_PUBLISHED_SCORE, PercentileLadder, floored, publish, round2,
};
pub use location::{
    CountReport, LocationOutcome, LocationScorer, LocationWeights, REVIEW_LIMIT, TypeReport,
};
pub use pipeline::{BatchReport, BatchRunner, EntityFailure, PipelineConfig};
pub use retry::RetryPolicy;
pub use segment::{SegmentAggregator, SegmentParts, SegmentWeights};
pub use weather::StoredWeather;

//! Location type profiles for segments and general infrastructure.

use std::collections::{BTreeMap, BTreeSet};

use rating_core::Segment;
use serde::{Deserialize, Serialize};

/// Location types that feed one score.
///
/// Primary types contribute individually scored locations and the `n`
/// count term; secondary types contribute only the `l` count term.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeProfile {
    /// Types central to the profile.
    pub primary: Vec<String>,
    /// Supplementary types.
    pub secondary: Vec<String>,
}

impl TypeProfile {
    /// Build a profile from string slices.
    #[must_use]
    pub fn new(primary: &[&str], secondary: &[&str]) -> Self {
        Self {
            primary: primary.iter().map(|tag| (*tag).to_owned()).collect(),
            secondary: secondary.iter().map(|tag| (*tag).to_owned()).collect(),
        }
    }
}

/// Type profiles for every segment plus general infrastructure.
///
/// # Examples
/// ```
/// use rating_core::Segment;
/// use rating_scorer::SegmentCatalogue;
///
/// let catalogue = SegmentCatalogue::default();
/// assert!(catalogue.profile(Segment::Beach).primary.contains(&"beach".to_owned()));
/// assert!(catalogue.primary_types().contains("hotel"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCatalogue {
    segments: BTreeMap<Segment, TypeProfile>,
    infrastructure: TypeProfile,
}

impl SegmentCatalogue {
    /// Build a catalogue from explicit profiles. Segments without a profile
    /// have no location types.
    #[must_use]
    pub const fn new(segments: BTreeMap<Segment, TypeProfile>, infrastructure: TypeProfile) -> Self {
        Self {
            segments,
            infrastructure,
        }
    }

    /// Profile of `segment`; empty when not configured.
    #[must_use]
    pub fn profile(&self, segment: Segment) -> &TypeProfile {
        static EMPTY: TypeProfile = TypeProfile {
            primary: Vec::new(),
            secondary: Vec::new(),
        };
        self.segments.get(&segment).unwrap_or(&EMPTY)
    }

    /// Profile of general infrastructure used by the complex score.
    #[must_use]
    pub const fn infrastructure(&self) -> &TypeProfile {
        &self.infrastructure
    }

    fn profiles(&self) -> impl Iterator<Item = &TypeProfile> {
        self.segments
            .values()
            .chain(std::iter::once(&self.infrastructure))
    }

    /// Types whose locations receive an individual `location_score`.
    #[must_use]
    pub fn primary_types(&self) -> BTreeSet<&str> {
        self.profiles()
            .flat_map(|profile| profile.primary.iter())
            .map(String::as_str)
            .collect()
    }

    /// Every type that receives a per-area count percentile.
    #[must_use]
    pub fn counted_types(&self) -> BTreeSet<&str> {
        self.profiles()
            .flat_map(|profile| profile.primary.iter().chain(profile.secondary.iter()))
            .map(String::as_str)
            .collect()
    }
}

impl Default for SegmentCatalogue {
    fn default() -> Self {
        let segments = BTreeMap::from([
            (
                Segment::Beach,
                TypeProfile::new(&["beach"], &["hotel", "restaurant", "cafe", "water_park"]),
            ),
            (
                Segment::Health,
                TypeProfile::new(&["sanatorium", "spa"], &["hospital", "pharmacy", "hotel"]),
            ),
            (
                Segment::Business,
                TypeProfile::new(
                    &["business_center", "conference_hall"],
                    &["hotel", "restaurant", "coworking"],
                ),
            ),
            (
                Segment::Pilgrimage,
                TypeProfile::new(
                    &["church", "monastery", "mosque", "temple"],
                    &["hotel", "souvenir_shop"],
                ),
            ),
            (
                Segment::Educational,
                TypeProfile::new(
                    &["museum", "theatre", "gallery", "landmark"],
                    &["library", "university"],
                ),
            ),
            (
                Segment::Family,
                TypeProfile::new(
                    &["amusement_park", "zoo", "aquarium", "water_park"],
                    &["playground", "restaurant", "hotel"],
                ),
            ),
            (
                Segment::Sports,
                TypeProfile::new(
                    &["stadium", "ski_resort", "sports_center"],
                    &["gym", "swimming_pool"],
                ),
            ),
            (
                Segment::Eco,
                TypeProfile::new(
                    &["national_park", "hiking_trail", "nature_reserve"],
                    &["campsite", "viewpoint"],
                ),
            ),
        ]);
        let infrastructure = TypeProfile::new(
            &["hotel", "restaurant", "transport_hub"],
            &["cafe", "shopping_mall", "bank", "pharmacy"],
        );
        Self::new(segments, infrastructure)
    }
}

//! Version-translation units. Each unit covers exactly one pair of adjacent
//! protocol versions and populates a [`crate::registry::TranslationRegistry`]
//! with the packets that change shape across that pair; anything it does not
//! register flows through untouched. Wider version gaps are bridged by
//! chaining units, one registry per hop.

pub mod text;
pub mod world;

//! # tide-core
//!
//! Core types, growth model, and error types for Tide.
//!
//! This crate provides the foundational pieces shared across all Tide crates:
//! - Entity structs for every persisted record (assignments, anchors, daily
//!   states, projections, plans, recompute tasks)
//! - Tier and status enums with state machine transitions
//! - The cube-root TGC growth model, confidence bands, and FCR constants
//! - The anchor normalizer and typed domain events
//! - Cross-cutting error types and read-shape responses

pub mod clock;
pub mod confidence;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod events;
pub mod fcr;
pub mod growth;
pub mod ids;
pub mod normalizer;
pub mod responses;
pub mod window;

/// Biomass in kilograms for a head count at an average weight in grams.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn biomass_kg(population: i64, average_weight_g: f64) -> f64 {
    population as f64 * average_weight_g / 1000.0
}

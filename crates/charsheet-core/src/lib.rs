// ABOUTME: Domain models for charsheet, each paired with the descriptor that persists it.
// ABOUTME: Encounters own points of interest, linked by the encounter's record id.

pub mod encounter;
pub mod migrations;
pub mod point_of_interest;

pub use encounter::Encounter;
pub use migrations::builtin_migrations;
pub use point_of_interest::PointOfInterest;

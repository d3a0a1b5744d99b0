//! Score normalization and per-student statistics.

pub mod normalizer;
pub mod stats;

pub use normalizer::{normalize, InvalidScoreError};
pub use stats::{recompute, Recomputed};

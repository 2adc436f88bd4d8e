//! CLI library components for the CSV normalizer.

pub mod logging;

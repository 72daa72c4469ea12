pub mod metrics;
pub mod normalizer;

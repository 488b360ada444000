pub mod aggregator;
pub mod filters;
pub mod normalizer;
pub mod statistics;

//! Layer data aggregation: per-layer source resolution, nearest-year
//! selection and min-max normalization.

pub mod aggregator;
pub mod analysis;
pub mod state;

pub use aggregator::*;
pub use state::*;

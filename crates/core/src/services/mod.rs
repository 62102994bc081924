//! Business logic services.

mod activity;
mod aggregator;
mod cache;
mod catalog;
mod marketplace;

pub use activity::*;
pub use aggregator::*;
pub use cache::*;
pub use catalog::*;
pub use marketplace::*;

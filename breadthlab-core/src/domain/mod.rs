//! Domain types for BreadthLab

pub mod breadth;
pub mod index;
pub mod price;

pub use breadth::{BreadthMode, BreadthPoint, BreadthSeries, ALIGNMENT_PERIODS};
pub use index::{IndexPoint, IndexSeries};
pub use price::{PricePoint, PriceSeries};

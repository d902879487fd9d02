//! Domain types shared by every pipeline stage.

pub mod feature;
pub mod price;
pub mod signal;

pub use feature::{columns, FeatureRow, LabeledRow, NumericRecord};
pub use price::{PricePoint, PriceSeries};
pub use signal::Signal;

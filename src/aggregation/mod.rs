pub mod merge;
pub mod normalize;

pub use merge::{merge, AggregationResult, NormalizedRating};
pub use normalize::{classify, normalize, ColorBand};

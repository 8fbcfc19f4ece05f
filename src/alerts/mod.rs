pub mod evaluator;
pub mod thresholds;

pub use evaluator::{percent_change, ThresholdEvaluator};
pub use thresholds::{Alert, AlertDirection, AlertThresholds, KindThresholds};

pub mod calculator;
pub mod floyd;
pub mod search;

pub use calculator::{CrossRateCalculator, Mode};
pub use floyd::ClosedFormSolution;

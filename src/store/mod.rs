//! Persistence of finished matches

pub mod results;

pub use results::{MatchResult, ResultRecorder, ResultsClient};

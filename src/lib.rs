//! Nonverbal-behaviour scoring for short recorded clips of a person speaking.
//!
//! A clip is repaired if needed, sampled into a bounded set of frames and
//! scored for posture, eye contact and movement. The three scores are folded
//! into a single confidence score. See [`Analyzer::analyze`].

pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod face;
pub mod frame;
pub mod model;
pub mod pose;
pub mod video;

pub use analysis::{AggregateResult, ScoreDetails, SignalScore};
pub use analyzer::Analyzer;
pub use config::Config;
pub use error::AnalysisError;
pub use frame::Frame;

//! Periodic facial-affect sampling of the camera track.

mod classifier;
mod sampler;

pub use classifier::{AffectClassifier, Emotion, HttpClassifier};
pub use sampler::{AffectSample, AffectSampler};

pub mod config;
pub mod error;
pub mod geometry;
pub mod helper;
pub mod modules;
pub mod pipeline;
pub mod scoring;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::config::AppConfig;
pub use error::{ComparisonError, FailureReport, ServiceError};
pub use geometry::metrics::{MetricName, MetricVector};
pub use helper::face_helper::{AffineImageWarper, ImageWarper};
pub use modules::landmark_detection_client::{LandmarkDetector, VisionLandmarkClient};
pub use modules::text_generation_client::{ChatCompletionClient, TextGenerator};
pub use pipeline::pipeline::{ComparisonPipeline, ComparisonResult};
pub use utils::coordinate::{DetectedFace, LandmarkName, LandmarkSet, Point2D};

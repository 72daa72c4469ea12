use std::fmt;

use serde::Serialize;

use crate::pipeline::state::ComparisonState;
use crate::utils::coordinate::{ImageRole, LandmarkName};

/// The two external collaborators the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalService {
    LandmarkDetector,
    TextGenerator,
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalService::LandmarkDetector => f.write_str("landmark detector"),
            ExternalService::TextGenerator => f.write_str("text generator"),
        }
    }
}

/// Failures of a single call to an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{service} credentials are not configured")]
    MissingCredentials { service: ExternalService },

    #[error("cannot connect to {service} at {url}")]
    Connection { service: ExternalService, url: String },

    #[error("{service} request timed out after {timeout_secs}s")]
    Timeout { service: ExternalService, timeout_secs: u64 },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: ExternalService,
        status: u16,
        body: String,
    },

    #[error("{service} reported an error: {message}")]
    Remote { service: ExternalService, message: String },

    #[error("{service} response could not be parsed: {message}")]
    ResponseParsing { service: ExternalService, message: String },

    #[error("{service} request failed: {message}")]
    Http { service: ExternalService, message: String },
}

impl ServiceError {
    pub fn service(&self) -> ExternalService {
        match self {
            ServiceError::MissingCredentials { service }
            | ServiceError::Connection { service, .. }
            | ServiceError::Timeout { service, .. }
            | ServiceError::Status { service, .. }
            | ServiceError::Remote { service, .. }
            | ServiceError::ResponseParsing { service, .. }
            | ServiceError::Http { service, .. } => *service,
        }
    }

    pub(crate) fn from_reqwest(service: ExternalService, url: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_connect() {
            ServiceError::Connection {
                service,
                url: url.to_string(),
            }
        } else if err.is_timeout() {
            ServiceError::Timeout { service, timeout_secs }
        } else if err.is_decode() {
            ServiceError::ResponseParsing {
                service,
                message: err.to_string(),
            }
        } else {
            ServiceError::Http {
                service,
                message: err.to_string(),
            }
        }
    }
}

/// Why a landmark set could not be brought into the canonical frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("reference landmarks missing: {}", join_names(.missing))]
    MissingReferenceLandmarks { missing: Vec<LandmarkName> },

    #[error("reference landmarks are degenerate (distance {distance})")]
    DegenerateReference { distance: f64 },
}

/// Terminal failure of one comparison request.
#[derive(Debug, thiserror::Error)]
pub enum ComparisonError {
    #[error("no face detected (before: {before}, after: {after})")]
    NoFaceDetected { before: usize, after: usize },

    #[error("{image} image is missing reference landmarks: {}", join_names(.missing))]
    MissingReferenceLandmarks { image: ImageRole, missing: Vec<LandmarkName> },

    #[error("{image} image has degenerate reference landmarks (distance {distance})")]
    DegenerateReference { image: ImageRole, distance: f64 },

    #[error(transparent)]
    ExternalService(#[from] ServiceError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ComparisonError {
    pub(crate) fn from_normalization(image: ImageRole, err: NormalizationError) -> Self {
        match err {
            NormalizationError::MissingReferenceLandmarks { missing } => {
                ComparisonError::MissingReferenceLandmarks { image, missing }
            }
            NormalizationError::DegenerateReference { distance } => {
                ComparisonError::DegenerateReference { image, distance }
            }
        }
    }

    /// Stable reason code reported to callers.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ComparisonError::NoFaceDetected { .. } => "NoFaceDetected",
            ComparisonError::MissingReferenceLandmarks { .. } => "MissingReferenceLandmarks",
            ComparisonError::DegenerateReference { .. } => "DegenerateReference",
            ComparisonError::ExternalService(_) => "ExternalServiceError",
            ComparisonError::InvalidInput(_) => "InvalidInput",
        }
    }

    /// Structured form of the failure with whatever diagnostics apply.
    pub fn report(&self) -> FailureReport {
        let mut report = FailureReport {
            reason: self.reason_code(),
            message: self.to_string(),
            faces_detected: None,
            image: None,
            missing_landmarks: Vec::new(),
            service: None,
            states: Vec::new(),
        };
        match self {
            ComparisonError::NoFaceDetected { before, after } => {
                report.faces_detected = Some(FaceCounts {
                    before: *before,
                    after: *after,
                });
            }
            ComparisonError::MissingReferenceLandmarks { image, missing } => {
                report.image = Some(*image);
                report.missing_landmarks = missing.clone();
            }
            ComparisonError::DegenerateReference { image, .. } => report.image = Some(*image),
            ComparisonError::ExternalService(err) => report.service = Some(err.service()),
            ComparisonError::InvalidInput(_) => {}
        }
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceCounts {
    pub before: usize,
    pub after: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub reason: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces_detected: Option<FaceCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRole>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_landmarks: Vec<LandmarkName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ExternalService>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<ComparisonState>,
}

impl FailureReport {
    /// Attaches the states the request went through before failing.
    pub fn with_states(mut self, states: Vec<ComparisonState>) -> Self {
        self.states = states;
        self
    }
}

fn join_names(names: &[LandmarkName]) -> String {
    names.iter().map(LandmarkName::as_str).collect::<Vec<_>>().join(", ")
}

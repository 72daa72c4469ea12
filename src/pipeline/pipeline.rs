use std::sync::Arc;

use serde::Serialize;

use crate::config::config::AppConfig;
use crate::error::{ComparisonError, FailureReport, NormalizationError};
use crate::geometry::metrics::{FaceMetrics, MetricExtractor, MetricVector};
use crate::helper::face_helper::{AlignmentTransform, FaceHelper, ImageWarper};
use crate::modules::landmark_detection_client::LandmarkDetector;
use crate::modules::text_generation_client::TextGenerator;
use crate::pipeline::prompt::build_commentary_prompt;
use crate::pipeline::state::{ComparisonState, StateTracker};
use crate::scoring::composite::{compute_composites, CompositeIndex};
use crate::scoring::delta::{score_deltas, DeltaRecord};
use crate::utils::coordinate::{DetectedFace, DominantColor, HeadPose, ImageRole, LandmarkName, LandmarkSet};

/// Per-image detection and normalization facts.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDiagnostics {
    pub faces_detected: usize,
    pub confidence: Option<f64>,
    pub pose: Option<HeadPose>,
    pub landmark_count: usize,
    pub realigned: bool,
    pub normalization_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_reference_landmarks: Vec<LandmarkName>,
}

impl ImageDiagnostics {
    fn record_normalization(&mut self, error: Option<&NormalizationError>) {
        if let Some(error) = error {
            self.normalization_error = Some(error.to_string());
            if let NormalizationError::MissingReferenceLandmarks { missing } = error {
                self.missing_reference_landmarks = missing.clone();
            }
        }
    }
}

/// Head pose change, after minus before, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseDelta {
    pub roll: f64,
    pub pan: f64,
    pub tilt: f64,
}

impl PoseDelta {
    pub fn between(before: &HeadPose, after: &HeadPose) -> Self {
        PoseDelta {
            roll: after.roll - before.roll,
            pan: after.pan - before.pan,
            tilt: after.tilt - before.tilt,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonDiagnostics {
    pub before: ImageDiagnostics,
    pub after: ImageDiagnostics,
    pub pose_change: Option<PoseDelta>,
    pub alignment: Option<AlignmentTransform>,
    pub states: Vec<ComparisonState>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub before: MetricVector,
    pub after: MetricVector,
    pub deltas: Vec<DeltaRecord>,
    pub composites: Vec<CompositeIndex>,
    /// Absent for landmark-only comparisons.
    pub commentary: Option<String>,
    pub diagnostics: ComparisonDiagnostics,
}

struct Scored {
    before: FaceMetrics,
    after: FaceMetrics,
    deltas: Vec<DeltaRecord>,
    composites: Vec<CompositeIndex>,
}

/// Runs a before/after comparison around the injected collaborators.
#[derive(Clone)]
pub struct ComparisonPipeline {
    detector: Arc<dyn LandmarkDetector>,
    text_generator: Arc<dyn TextGenerator>,
    warper: Option<Arc<dyn ImageWarper>>,
    face_helper: FaceHelper,
    extractor: MetricExtractor,
    config: AppConfig,
}

impl ComparisonPipeline {
    /// new initializes new instance of the pipeline
    pub fn new(
        detector: Arc<dyn LandmarkDetector>,
        text_generator: Arc<dyn TextGenerator>,
        warper: Option<Arc<dyn ImageWarper>>,
        config: AppConfig,
    ) -> Self {
        ComparisonPipeline {
            detector,
            text_generator,
            warper,
            face_helper: FaceHelper::new(None),
            extractor: MetricExtractor::new(&config.scoring),
            config,
        }
    }

    /// compare detects both faces, scores them and asks for commentary.
    ///
    /// # Arguments
    /// * `before` - encoded image taken before the treatment
    /// * `after` - encoded image taken after the treatment
    ///
    /// # Returns
    /// * `Result<ComparisonResult, ComparisonError>`
    pub async fn compare(&self, before: &[u8], after: &[u8]) -> Result<ComparisonResult, ComparisonError> {
        let mut tracker = StateTracker::new();
        self.compare_tracked(&mut tracker, before, after).await
    }

    /// compare_reported runs [`ComparisonPipeline::compare`] and turns a failure
    /// into a report listing the states walked through, ending in `Failed`.
    pub async fn compare_reported(&self, before: &[u8], after: &[u8]) -> Result<ComparisonResult, FailureReport> {
        let mut tracker = StateTracker::new();
        let outcome = self.compare_tracked(&mut tracker, before, after).await;
        outcome.map_err(|err| err.report().with_states(tracker.into_history()))
    }

    /// compare_landmarks scores two already detected landmark sets without
    /// calling any external service.
    pub fn compare_landmarks(&self, before: &LandmarkSet, after: &LandmarkSet) -> Result<ComparisonResult, ComparisonError> {
        let mut tracker = StateTracker::new();
        self.compare_landmarks_tracked(&mut tracker, before, after)
    }

    /// Offline counterpart of [`ComparisonPipeline::compare_reported`].
    pub fn compare_landmarks_reported(
        &self,
        before: &LandmarkSet,
        after: &LandmarkSet,
    ) -> Result<ComparisonResult, FailureReport> {
        let mut tracker = StateTracker::new();
        let outcome = self.compare_landmarks_tracked(&mut tracker, before, after);
        outcome.map_err(|err| err.report().with_states(tracker.into_history()))
    }

    async fn compare_tracked(
        &self,
        tracker: &mut StateTracker,
        before: &[u8],
        after: &[u8],
    ) -> Result<ComparisonResult, ComparisonError> {
        match self.run_compare(tracker, before, after).await {
            Ok(mut result) => {
                tracker.advance(ComparisonState::Complete);
                result.diagnostics.states = tracker.history().to_vec();
                Ok(result)
            }
            Err(err) => {
                tracker.advance(ComparisonState::Failed(err.reason_code()));
                Err(err)
            }
        }
    }

    fn compare_landmarks_tracked(
        &self,
        tracker: &mut StateTracker,
        before: &LandmarkSet,
        after: &LandmarkSet,
    ) -> Result<ComparisonResult, ComparisonError> {
        let scored = match self.score(before, &[], after, &[]) {
            Ok(scored) => scored,
            Err(err) => {
                tracker.advance(ComparisonState::Failed(err.reason_code()));
                return Err(err);
            }
        };
        tracker.advance(ComparisonState::MetricsComputed);

        let mut diagnostics = ComparisonDiagnostics::default();
        diagnostics.before.landmark_count = before.len();
        diagnostics.after.landmark_count = after.len();
        diagnostics.before.record_normalization(scored.before.normalization_error.as_ref());
        diagnostics.after.record_normalization(scored.after.normalization_error.as_ref());

        tracker.advance(ComparisonState::Complete);
        diagnostics.states = tracker.history().to_vec();

        Ok(ComparisonResult {
            before: scored.before.metrics,
            after: scored.after.metrics,
            deltas: scored.deltas,
            composites: scored.composites,
            commentary: None,
            diagnostics,
        })
    }

    async fn run_compare(
        &self,
        tracker: &mut StateTracker,
        before: &[u8],
        after: &[u8],
    ) -> Result<ComparisonResult, ComparisonError> {
        if before.is_empty() || after.is_empty() {
            return Err(ComparisonError::InvalidInput("both images must be non-empty".to_string()));
        }

        tracker.advance(ComparisonState::LandmarksRequested);
        let (before_faces, after_faces) = tokio::join!(self.detector.detect(before), self.detector.detect(after));
        let before_faces = before_faces?;
        let after_faces = after_faces?;

        let (before_face, after_face) = match (before_faces.first(), after_faces.first()) {
            (Some(before_face), Some(after_face)) => (before_face, after_face),
            _ => {
                return Err(ComparisonError::NoFaceDetected {
                    before: before_faces.len(),
                    after: after_faces.len(),
                })
            }
        };
        if before_faces.len() > 1 || after_faces.len() > 1 {
            tracing::info!(
                "multiple faces detected (before: {}, after: {}), using the first",
                before_faces.len(),
                after_faces.len()
            );
        }

        let mut diagnostics = ComparisonDiagnostics {
            before: describe_detection(before_faces.len(), before_face),
            after: describe_detection(after_faces.len(), after_face),
            pose_change: Some(PoseDelta::between(&before_face.pose, &after_face.pose)),
            ..ComparisonDiagnostics::default()
        };

        let mut before_landmarks = &before_face.landmarks;
        let realigned = match &self.warper {
            Some(warper) if self.config.pipeline.realign => {
                tracker.advance(ComparisonState::RealignmentRequested);
                self.realign(warper.as_ref(), before, after, before_face, after_face).await
            }
            _ => None,
        };
        if let Some((landmarks, transform)) = &realigned {
            before_landmarks = landmarks;
            diagnostics.before.realigned = true;
            diagnostics.before.landmark_count = landmarks.len();
            diagnostics.alignment = Some(transform.clone());
        }

        let scored = self.score(
            before_landmarks,
            &before_face.dominant_colors,
            &after_face.landmarks,
            &after_face.dominant_colors,
        )?;
        diagnostics.before.record_normalization(scored.before.normalization_error.as_ref());
        diagnostics.after.record_normalization(scored.after.normalization_error.as_ref());
        tracker.advance(ComparisonState::MetricsComputed);

        let prompt = build_commentary_prompt(&scored.deltas, &scored.composites);
        tracker.advance(ComparisonState::CommentaryRequested);
        let text = self.text_generator.generate(&prompt).await?;
        let commentary = if text.trim().is_empty() {
            tracing::warn!("text generator returned empty commentary, using fallback");
            self.config.pipeline.fallback_commentary.clone()
        } else {
            text.trim().to_string()
        };

        Ok(ComparisonResult {
            before: scored.before.metrics,
            after: scored.after.metrics,
            deltas: scored.deltas,
            composites: scored.composites,
            commentary: Some(commentary),
            diagnostics,
        })
    }

    /// Warps the before image onto the after pose and re-detects it.
    /// Every failure falls back to the original landmarks.
    async fn realign(
        &self,
        warper: &dyn ImageWarper,
        before: &[u8],
        after: &[u8],
        before_face: &DetectedFace,
        after_face: &DetectedFace,
    ) -> Option<(LandmarkSet, AlignmentTransform)> {
        let transform = match self.face_helper.estimate_alignment(&before_face.landmarks, &after_face.landmarks) {
            Some(transform) => transform,
            None => {
                tracing::warn!("realignment skipped: not enough shared landmarks");
                return None;
            }
        };

        let warped = match warper.warp(before, after, &transform) {
            Ok(warped) => warped,
            Err(err) => {
                tracing::warn!("realignment skipped: {err:#}");
                return None;
            }
        };

        match self.detector.detect(&warped).await {
            Ok(faces) => match faces.into_iter().next() {
                Some(face) => {
                    tracing::info!(
                        "before image realigned (rotation {:.1}deg, scale {:.3})",
                        transform.rotation_deg,
                        transform.scale
                    );
                    Some((face.landmarks, transform))
                }
                None => {
                    tracing::warn!("realignment skipped: no face found on the warped image");
                    None
                }
            },
            Err(err) => {
                tracing::warn!("realignment skipped: {err}");
                None
            }
        }
    }

    fn score(
        &self,
        before: &LandmarkSet,
        before_colors: &[DominantColor],
        after: &LandmarkSet,
        after_colors: &[DominantColor],
    ) -> Result<Scored, ComparisonError> {
        let before = self.extractor.extract_face(before, before_colors);
        let after = self.extractor.extract_face(after, after_colors);
        let deltas = score_deltas(&before.metrics, &after.metrics, &self.config.scoring);

        if deltas.is_empty() {
            if let Some(err) = &before.normalization_error {
                return Err(ComparisonError::from_normalization(ImageRole::Before, err.clone()));
            }
            if let Some(err) = &after.normalization_error {
                return Err(ComparisonError::from_normalization(ImageRole::After, err.clone()));
            }
        }

        let composites = compute_composites(&deltas, &self.config.scoring);
        Ok(Scored {
            before,
            after,
            deltas,
            composites,
        })
    }
}

fn describe_detection(faces_detected: usize, face: &DetectedFace) -> ImageDiagnostics {
    ImageDiagnostics {
        faces_detected,
        confidence: Some(face.confidence),
        pose: Some(face.pose),
        landmark_count: face.landmarks.len(),
        ..ImageDiagnostics::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::Error;
    use async_trait::async_trait;

    use crate::config::config::AppConfig;
    use crate::error::{ComparisonError, ExternalService, ServiceError};
    use crate::geometry::metrics::MetricName;
    use crate::helper::face_helper::{AlignmentTransform, ImageWarper};
    use crate::modules::landmark_detection_client::LandmarkDetector;
    use crate::modules::text_generation_client::TextGenerator;
    use crate::pipeline::pipeline::ComparisonPipeline;
    use crate::pipeline::prompt::NO_CHANGES_LINE;
    use crate::pipeline::state::ComparisonState;
    use crate::scoring::composite::{CompositeKind, SlimTrend};
    use crate::scoring::delta::find;
    use crate::test_support::{detected, full_face};
    use crate::utils::coordinate::{DetectedFace, ImageRole, LandmarkName, LandmarkSet, Point2D};

    const BEFORE: &[u8] = b"before-image";
    const AFTER: &[u8] = b"after-image";
    const WARPED: &[u8] = b"warped-image";

    struct FakeDetector {
        faces: HashMap<Vec<u8>, Vec<DetectedFace>>,
        calls: AtomicUsize,
    }

    impl FakeDetector {
        fn new(entries: Vec<(&[u8], Vec<DetectedFace>)>) -> Arc<Self> {
            Arc::new(FakeDetector {
                faces: entries.into_iter().map(|(k, v)| (k.to_vec(), v)).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LandmarkDetector for FakeDetector {
        async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.faces.get(image).cloned().ok_or(ServiceError::Connection {
                service: ExternalService::LandmarkDetector,
                url: "fake://detector".to_string(),
            })
        }
    }

    struct FakeGenerator {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(FakeGenerator {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(FakeGenerator {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or(ServiceError::Status {
                service: ExternalService::TextGenerator,
                status: 503,
                body: "overloaded".to_string(),
            })
        }
    }

    struct FakeWarper {
        fail: bool,
    }

    impl ImageWarper for FakeWarper {
        fn warp(&self, _before: &[u8], _after: &[u8], _transform: &AlignmentTransform) -> Result<Vec<u8>, Error> {
            if self.fail {
                Err(Error::msg("cannot decode image bytes"))
            } else {
                Ok(WARPED.to_vec())
            }
        }
    }

    fn lifted_face() -> LandmarkSet {
        full_face()
            .iter()
            .map(|(name, p)| match name {
                LandmarkName::LeftCheekCenter | LandmarkName::RightCheekCenter => (name, Point2D::new(p.x, p.y - 4.0)),
                LandmarkName::ChinLeftGonion | LandmarkName::ChinRightGonion => {
                    (name, Point2D::new(p.x + (130.0 - p.x) * 0.05, p.y))
                }
                _ => (name, p),
            })
            .collect()
    }

    fn pipeline(detector: Arc<FakeDetector>, generator: Arc<FakeGenerator>) -> ComparisonPipeline {
        ComparisonPipeline::new(detector, generator, None, AppConfig::default())
    }

    #[tokio::test]
    async fn test_identical_faces_have_neutral_result() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(full_face())]),
        ]);
        let generator = FakeGenerator::replying("Nothing changed.");
        let result = pipeline(detector, generator.clone()).compare(BEFORE, AFTER).await.unwrap();

        assert!(!result.deltas.is_empty());
        for delta in &result.deltas {
            assert_eq!(delta.change, 0.0);
            assert!(!delta.improved);
            if let Some(percent) = delta.change_percent {
                assert_eq!(percent, 0.0);
            }
        }
        let overall = result.composites.iter().find(|c| c.kind == CompositeKind::OverallScore).unwrap();
        assert_eq!(overall.value, 50.0);
        let lift = result.composites.iter().find(|c| c.kind == CompositeKind::FaceLiftIndex).unwrap();
        assert_eq!(lift.value, 0.0);
        let slim = result.composites.iter().find(|c| c.kind == CompositeKind::FaceSlimIndex).unwrap();
        assert_eq!(slim.trend, Some(SlimTrend::Stable));

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(NO_CHANGES_LINE));
        assert_eq!(result.commentary.as_deref(), Some("Nothing changed."));
        assert_eq!(result.diagnostics.states.last(), Some(&ComparisonState::Complete));
    }

    #[tokio::test]
    async fn test_no_face_reports_counts_and_skips_commentary() {
        let detector = FakeDetector::new(vec![(BEFORE, vec![detected(full_face())]), (AFTER, vec![])]);
        let generator = FakeGenerator::replying("unused");
        let err = pipeline(detector, generator.clone()).compare(BEFORE, AFTER).await.unwrap_err();

        assert!(matches!(err, ComparisonError::NoFaceDetected { before: 1, after: 0 }));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_report_keeps_state_history() {
        let detector = FakeDetector::new(vec![(BEFORE, vec![detected(full_face())]), (AFTER, vec![])]);
        let report = pipeline(detector, FakeGenerator::replying("unused"))
            .compare_reported(BEFORE, AFTER)
            .await
            .unwrap_err();

        assert_eq!(report.reason, "NoFaceDetected");
        assert_eq!(
            report.states,
            vec![
                ComparisonState::AwaitingImages,
                ComparisonState::LandmarksRequested,
                ComparisonState::Failed("NoFaceDetected"),
            ]
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["states"][1]["state"], "landmarks_requested");
        assert_eq!(json["states"][2]["reason"], "NoFaceDetected");
    }

    #[test]
    fn test_offline_failure_report_ends_in_failed() {
        let lone_eye: LandmarkSet = [(LandmarkName::RightEye, Point2D::new(160.0, 200.0))].into_iter().collect();
        let pipeline = pipeline(FakeDetector::new(vec![]), FakeGenerator::replying("unused"));
        let report = pipeline.compare_landmarks_reported(&lone_eye, &lone_eye).unwrap_err();

        assert_eq!(report.reason, "MissingReferenceLandmarks");
        assert_eq!(report.states.first(), Some(&ComparisonState::AwaitingImages));
        assert_eq!(report.states.last(), Some(&ComparisonState::Failed("MissingReferenceLandmarks")));
    }

    #[tokio::test]
    async fn test_missing_right_eye_keeps_other_families() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(lifted_face().without(LandmarkName::RightEye))]),
        ]);
        let result = pipeline(detector, FakeGenerator::replying("ok")).compare(BEFORE, AFTER).await.unwrap();

        assert!(find(&result.deltas, MetricName::FaceWidth).is_some());
        assert!(find(&result.deltas, MetricName::CheekWidthRatio).is_some());
        assert!(find(&result.deltas, MetricName::CheekDroopIndex).is_none());
        assert!(find(&result.deltas, MetricName::EyeDistance).is_none());
        assert_eq!(result.diagnostics.after.missing_reference_landmarks, vec![LandmarkName::RightEye]);
        assert!(result.diagnostics.after.normalization_error.is_some());
        assert!(result.composites.iter().all(|c| c.kind != CompositeKind::OverallScore));
    }

    #[tokio::test]
    async fn test_nothing_comparable_returns_normalization_error() {
        let mut before = detected([(LandmarkName::RightEye, Point2D::new(160.0, 200.0))].into_iter().collect());
        before.dominant_colors.clear();
        let after = before.clone();
        let detector = FakeDetector::new(vec![(BEFORE, vec![before]), (AFTER, vec![after])]);
        let err = pipeline(detector, FakeGenerator::replying("ok")).compare(BEFORE, AFTER).await.unwrap_err();

        match err {
            ComparisonError::MissingReferenceLandmarks { image, missing } => {
                assert_eq!(image, ImageRole::Before);
                assert_eq!(missing, vec![LandmarkName::LeftEye]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_text_generator_failure_is_fatal() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(lifted_face())]),
        ]);
        let err = pipeline(detector, FakeGenerator::failing()).compare(BEFORE, AFTER).await.unwrap_err();
        assert_eq!(err.reason_code(), "ExternalServiceError");
        assert_eq!(err.report().service, Some(ExternalService::TextGenerator));
    }

    #[tokio::test]
    async fn test_detector_failure_is_fatal() {
        let detector = FakeDetector::new(vec![(BEFORE, vec![detected(full_face())])]);
        let err = pipeline(detector, FakeGenerator::replying("ok")).compare(BEFORE, AFTER).await.unwrap_err();
        assert_eq!(err.report().service, Some(ExternalService::LandmarkDetector));
    }

    #[tokio::test]
    async fn test_blank_commentary_uses_fallback() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(lifted_face())]),
        ]);
        let result = pipeline(detector, FakeGenerator::replying("  \n")).compare(BEFORE, AFTER).await.unwrap();
        assert_eq!(result.commentary, Some(AppConfig::default().pipeline.fallback_commentary));
    }

    #[tokio::test]
    async fn test_lifted_face_improves_sagging_metrics() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(lifted_face())]),
        ]);
        let generator = FakeGenerator::replying("Cheeks look lifted.");
        let result = pipeline(detector, generator.clone()).compare(BEFORE, AFTER).await.unwrap();

        assert!(find(&result.deltas, MetricName::CheekDroopIndex).unwrap().improved);
        assert!(find(&result.deltas, MetricName::JawWidthRatio).unwrap().improved);
        let overall = result.composites.iter().find(|c| c.kind == CompositeKind::OverallScore).unwrap();
        assert!(overall.value > 50.0);
        assert!(generator.prompts.lock().unwrap()[0].contains("Cheek-droop index"));
    }

    #[tokio::test]
    async fn test_realignment_uses_redetected_landmarks() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(lifted_face())]),
            (WARPED, vec![detected(lifted_face())]),
        ]);
        let pipeline = ComparisonPipeline::new(
            detector.clone(),
            FakeGenerator::replying("ok"),
            Some(Arc::new(FakeWarper { fail: false })),
            AppConfig::default(),
        );
        let result = pipeline.compare(BEFORE, AFTER).await.unwrap();

        assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
        assert!(result.diagnostics.before.realigned);
        assert!(result.diagnostics.alignment.is_some());
        assert!(result.diagnostics.states.contains(&ComparisonState::RealignmentRequested));
        assert!(result.deltas.iter().all(|d| d.change == 0.0));
    }

    #[tokio::test]
    async fn test_realignment_failure_falls_back() {
        let detector = FakeDetector::new(vec![
            (BEFORE, vec![detected(full_face())]),
            (AFTER, vec![detected(lifted_face())]),
        ]);
        let pipeline = ComparisonPipeline::new(
            detector.clone(),
            FakeGenerator::replying("ok"),
            Some(Arc::new(FakeWarper { fail: true })),
            AppConfig::default(),
        );
        let result = pipeline.compare(BEFORE, AFTER).await.unwrap();

        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
        assert!(!result.diagnostics.before.realigned);
        assert!(find(&result.deltas, MetricName::CheekDroopIndex).unwrap().improved);
        assert_eq!(result.diagnostics.states.last(), Some(&ComparisonState::Complete));
    }

    #[test]
    fn test_compare_landmarks_runs_offline() {
        let detector = FakeDetector::new(vec![]);
        let generator = FakeGenerator::replying("unused");
        let pipeline = pipeline(detector.clone(), generator.clone());
        let result = pipeline.compare_landmarks(&full_face(), &lifted_face()).unwrap();

        assert!(result.commentary.is_none());
        assert!(find(&result.deltas, MetricName::CheekDroopIndex).unwrap().improved);
        assert!(find(&result.deltas, MetricName::SkinBrightness).is_none());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        assert!(generator.prompts.lock().unwrap().is_empty());
    }
}

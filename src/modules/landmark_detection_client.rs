use std::time::Duration;

use anyhow::{Context, Error};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::config::DetectorConfig;
use crate::error::{ExternalService, ServiceError};
use crate::utils::coordinate::{DetectedFace, DominantColor, HeadPose, LandmarkSet, Point2D};
use crate::utils::image::encode_base64_image;

const SERVICE: ExternalService = ExternalService::LandmarkDetector;

/// Finds faces and their named landmarks in an encoded image.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ServiceError>;
}

/// Landmark detector backed by the Google Cloud Vision `images:annotate` endpoint.
#[derive(Debug, Clone)]
pub struct VisionLandmarkClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: u64,
    max_faces: u32,
}

impl VisionLandmarkClient {
    pub fn new(config: DetectorConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .context("landmark_detection_client - cannot build http client")?;

        Ok(VisionLandmarkClient {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
            timeout: config.timeout,
            max_faces: config.max_faces,
        })
    }

    fn build_request(&self, image: &[u8]) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: encode_base64_image(image),
                },
                features: vec![
                    Feature {
                        kind: "FACE_DETECTION",
                        max_results: Some(self.max_faces),
                    },
                    Feature {
                        kind: "IMAGE_PROPERTIES",
                        max_results: None,
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl LandmarkDetector for VisionLandmarkClient {
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::MissingCredentials { service: SERVICE })?;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&self.build_request(image))
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, &self.endpoint, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnnotateResponse = response.json().await.map_err(|e| ServiceError::ResponseParsing {
            service: SERVICE,
            message: e.to_string(),
        })?;

        let faces = parse_annotate_response(parsed)?;
        tracing::debug!("landmark detector returned {} face(s)", faces.len());
        Ok(faces)
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    image_properties_annotation: Option<ImageProperties>,
    error: Option<RemoteStatus>,
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

// Vision omits zero-valued numeric fields, so every number defaults to 0.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceAnnotation {
    #[serde(default)]
    landmarks: Vec<WireLandmark>,
    #[serde(default)]
    roll_angle: f64,
    #[serde(default)]
    pan_angle: f64,
    #[serde(default)]
    tilt_angle: f64,
    #[serde(default)]
    detection_confidence: f64,
}

#[derive(Debug, Deserialize)]
struct WireLandmark {
    #[serde(rename = "type")]
    kind: String,
    position: WirePosition,
}

#[derive(Debug, Deserialize)]
struct WirePosition {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageProperties {
    dominant_colors: Option<ColorInfoList>,
}

#[derive(Debug, Deserialize)]
struct ColorInfoList {
    #[serde(default)]
    colors: Vec<ColorInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColorInfo {
    #[serde(default)]
    color: WireColor,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    pixel_fraction: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WireColor {
    #[serde(default)]
    red: f64,
    #[serde(default)]
    green: f64,
    #[serde(default)]
    blue: f64,
}

/// Converts a Vision response into faces. Dominant colours are image-wide and
/// attached to every face.
fn parse_annotate_response(response: AnnotateResponse) -> Result<Vec<DetectedFace>, ServiceError> {
    let image_response = response.responses.into_iter().next().unwrap_or_default();

    if let Some(err) = image_response.error {
        return Err(ServiceError::Remote {
            service: SERVICE,
            message: format!("{} (code {})", err.message, err.code),
        });
    }

    let dominant_colors: Vec<DominantColor> = image_response
        .image_properties_annotation
        .and_then(|props| props.dominant_colors)
        .map(|list| {
            list.colors
                .into_iter()
                .map(|c| DominantColor {
                    red: c.color.red,
                    green: c.color.green,
                    blue: c.color.blue,
                    score: c.score,
                    pixel_fraction: c.pixel_fraction,
                })
                .collect()
        })
        .unwrap_or_default();

    let faces = image_response
        .face_annotations
        .into_iter()
        .map(|face| {
            let landmarks = LandmarkSet::from_named_points(
                face.landmarks
                    .iter()
                    .map(|lm| (lm.kind.as_str(), Point2D::new(lm.position.x, lm.position.y))),
            );
            DetectedFace {
                landmarks,
                pose: HeadPose {
                    roll: face.roll_angle,
                    pan: face.pan_angle,
                    tilt: face.tilt_angle,
                },
                confidence: face.detection_confidence,
                dominant_colors: dominant_colors.clone(),
            }
        })
        .collect();

    Ok(faces)
}

use anyhow::{Context, Error};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::DynamicImage;
use ndarray::Array2;

use crate::utils::coordinate::{LandmarkName, LandmarkSet};

/// Strips an optional `data:image/...;base64,` prefix and decodes the payload.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, Error> {
    let trimmed = payload.trim();
    let data = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((_, data)) => data,
            None => return Err(Error::msg("data url is not base64 encoded")),
        },
        None => trimmed,
    };
    let bytes = STANDARD.decode(data).context("invalid base64 image payload")?;
    Ok(bytes)
}

pub fn encode_base64_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn convert_bytes_to_image(im_bytes: &[u8]) -> Result<DynamicImage, Error> {
    let img = image::load_from_memory(im_bytes).context("cannot decode image bytes")?;
    Ok(img)
}

/// Stacks the landmarks both sets share into two `(n, 2)` arrays with matching rows.
///
/// Rows follow the `LandmarkName` ordering. Returns the names used so callers
/// can tell which landmarks took part.
pub fn convert_common_landmarks_to_ndarray(
    source: &LandmarkSet,
    target: &LandmarkSet,
) -> Result<(Vec<LandmarkName>, Array2<f64>, Array2<f64>), Error> {
    let mut names = Vec::new();
    let mut src = Vec::new();
    let mut dst = Vec::new();

    for (name, point) in source.iter() {
        if let Some(other) = target.get(name) {
            names.push(name);
            src.extend_from_slice(&[point.x, point.y]);
            dst.extend_from_slice(&[other.x, other.y]);
        }
    }

    let nrows = names.len();
    let src = Array2::from_shape_vec((nrows, 2), src)?;
    let dst = Array2::from_shape_vec((nrows, 2), dst)?;
    Ok((names, src, dst))
}

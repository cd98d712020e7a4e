// storage.rs
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::{distr::Alphanumeric, Rng};

use crate::error::{ApiError, FieldErrors};

/// Image content types accepted for survey uploads.
const ALLOWED_TYPES: &[&str] = &["jpg", "jpeg", "gif", "png"];

/// Public URL prefix under which stored images are served.
pub const IMAGES_PREFIX: &str = "images";

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

fn invalid(message: &str) -> ApiError {
    ApiError::Validation(FieldErrors::of("image", message))
}

/// Decode a `data:image/<type>;base64,<payload>` URI.
///
/// Spaces in the payload are folded back to `+` before decoding; form
/// encoding on the wire turns them into spaces.
pub fn parse_data_uri(input: &str) -> Result<DecodedImage, ApiError> {
    let rest = input
        .strip_prefix("data:image/")
        .ok_or_else(|| invalid("The image must be a base64 image data URI"))?;

    let (extension, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("The image must be a base64 image data URI"))?;

    let extension = extension.to_ascii_lowercase();
    if !ALLOWED_TYPES.contains(&extension.as_str()) {
        return Err(invalid("The image must be of type jpg, jpeg, gif or png"));
    }

    let payload = payload.replace(' ', "+");
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| invalid("The image payload is not valid base64"))?;

    Ok(DecodedImage { extension, bytes })
}

fn random_name() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Write a decoded image under `dir` and return the relative reference
/// recorded on the survey (`images/<name>.<ext>`).
pub fn save_image(dir: &Path, image: &DecodedImage) -> Result<String, ApiError> {
    fs::create_dir_all(dir)?;

    let file = format!("{}.{}", random_name(), image.extension);
    fs::write(dir.join(&file), &image.bytes)?;

    Ok(format!("{IMAGES_PREFIX}/{file}"))
}

/// Best-effort blob removal; a missing file is not an error worth failing
/// the request over.
pub fn delete_image(dir: &Path, reference: &str) {
    let Some(name) = reference.rsplit('/').next() else {
        return;
    };

    if let Err(e) = fs::remove_file(dir.join(name)) {
        tracing::warn!("failed to remove image {reference}: {e}");
    }
}

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use serde::Serialize;
use std::time::Duration;

use crate::error::{DispatchError, Result};

const UPLOAD_URL_TTL: Duration = Duration::from_secs(3600);
const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "heic", "webp"];

#[derive(Serialize, Debug)]
pub struct PhotoUpload {
    pub photo_id: String,
    pub upload_url: String,
    pub method: String,
    /// Pass this to `complete` once the upload succeeded.
    pub photo_url: String,
    pub content_type: String,
}

/// Object key for a new disposition photo: `leads/{lead_id}/{uuid}.{ext}`.
pub fn photo_key(lead_id: &str, photo_id: &str, file_name: &str) -> Result<String> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(DispatchError::InvalidArgument(format!(
            "Unsupported photo type '.{}'",
            extension
        )));
    }
    Ok(format!("leads/{}/{}.{}", lead_id, photo_id, extension))
}

/// Whether `url` is an https object URL under `leads/{lead_id}/`, the only
/// place `presigned_photo_upload` hands out.
pub fn is_lead_photo_url(url: &str, lead_id: &str) -> bool {
    let path = match url.strip_prefix("https://").and_then(|rest| rest.split_once('/')) {
        Some((host, path)) if !host.is_empty() => path,
        _ => return false,
    };
    let prefix = format!("leads/{}/", lead_id);
    match path.strip_prefix(&prefix) {
        Some(name) => !name.is_empty() && !name.contains('/') && !name.contains('?'),
        None => false,
    }
}

/// Generate a presigned URL for direct upload from the device
pub async fn presigned_photo_upload(
    s3_client: &S3Client,
    bucket: &str,
    lead_id: &str,
    file_name: &str,
    content_type: &str,
) -> Result<PhotoUpload> {
    if !content_type.starts_with("image/") {
        return Err(DispatchError::InvalidArgument(format!(
            "content_type must be an image type, got '{}'",
            content_type
        )));
    }

    let photo_id = uuid::Uuid::new_v4().to_string();
    let key = photo_key(lead_id, &photo_id, file_name)?;

    let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
        .map_err(|e| DispatchError::Internal(format!("Invalid presigning config: {}", e)))?;
    let presigned_request = s3_client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .content_type(content_type)
        .presigned(presigning)
        .await
        .map_err(|e| DispatchError::Internal(format!("Failed to generate presigned URL: {}", e)))?;

    tracing::info!("Presigned photo upload {} for lead {}", key, lead_id);

    Ok(PhotoUpload {
        photo_id,
        upload_url: presigned_request.uri().to_string(),
        method: "PUT".to_string(),
        photo_url: format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        content_type: content_type.to_string(),
    })
}

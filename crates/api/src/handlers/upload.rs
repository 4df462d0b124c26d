//! Multipart image upload parsing shared by the image endpoints.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::{AppError, AppResult};

/// Largest accepted image upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Request body limit for image routes: the image plus room for the other
/// multipart fields.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Accepted image content types.
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

pub struct UploadedImage {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// A parsed multipart form: the required `file` field plus any text fields.
pub struct ImageForm {
    pub image: UploadedImage,
    pub fields: HashMap<String, String>,
}

/// Read a multipart form with a required image `file` field.
///
/// Rejects unsupported content types and images over [`MAX_UPLOAD_BYTES`].
pub async fn read_image_form(mut multipart: Multipart) -> AppResult<ImageForm> {
    let mut image: Option<UploadedImage> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let content_type = field.content_type().unwrap_or("").to_ascii_lowercase();
            if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
                return Err(AppError::BadRequest(
                    "Invalid file type. Please upload a JPEG, PNG, or WebP image.".into(),
                ));
            }
            let filename = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            if data.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::BadRequest(
                    "File too large. Maximum size is 10MB.".into(),
                ));
            }
            image = Some(UploadedImage {
                filename,
                bytes: data.to_vec(),
            });
        } else if !name.is_empty() {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            fields.insert(name, text);
        }
    }

    let image =
        image.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    Ok(ImageForm { image, fields })
}

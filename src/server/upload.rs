use std::collections::HashMap;

use axum::extract::Multipart;

use crate::server::response::ApiError;

const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require_text(&self, name: &str) -> Result<&str, ApiError> {
        self.text(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request(format!("Field '{name}' is required")))
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn require_file(&self, name: &str) -> Result<&UploadedFile, ApiError> {
        self.file(name)
            .ok_or_else(|| ApiError::bad_request(format!("File '{name}' is required")))
    }
}

/// Drains a multipart body into named text fields and file parts.
/// Parts carrying a filename are treated as files, everything else as text.
pub async fn collect_multipart(mut multipart: Multipart) -> Result<MultipartForm, ApiError> {
    let mut fields = HashMap::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {e}")))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };

        if let Some(filename) = field.file_name().map(ToString::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file '{name}': {e}")))?;

            if data.len() > MAX_UPLOAD_SIZE {
                return Err(ApiError::bad_request(format!(
                    "File size ({} bytes) exceeds maximum allowed size ({MAX_UPLOAD_SIZE} bytes)",
                    data.len()
                )));
            }

            files.insert(
                name,
                UploadedFile {
                    filename,
                    data: data.to_vec(),
                },
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read field '{name}': {e}")))?;
            fields.insert(name, value);
        }
    }

    Ok(MultipartForm { fields, files })
}

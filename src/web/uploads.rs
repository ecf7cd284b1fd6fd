use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting an uploaded file.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no `{field}` part in the form")]
    MissingFile { field: String },
    #[error("the `{field}` part has an empty filename")]
    EmptyFilename { field: String },
    #[error("only one file may be uploaded in `{field}`")]
    TooManyFiles { field: String },
    #[error("`.{extension}` files are not supported")]
    UnsupportedType { extension: String },
    #[error("upload exceeds the request size limit")]
    TooLarge,
    #[error("failed to parse upload form: {0}")]
    Malformed(String),
    #[error("failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

/// Expectations for the single multipart file field a route accepts.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub fallback_stem: &'a str,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, allowed_extensions: &'a [&'a str]) -> Self {
        Self {
            field_name,
            allowed_extensions,
            fallback_stem: "upload",
        }
    }

    fn allows(&self, extension: &str) -> bool {
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> UploadResult<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Parses multipart form data and persists the one file carried in the
/// configured field under `dest_dir`.
///
/// Other parts are ignored. The caller owns `dest_dir` and should remove it
/// if this returns an error after the file was started.
pub async fn receive_file(
    mut multipart: Multipart,
    dest_dir: &Path,
    config: FileFieldConfig<'_>,
) -> UploadResult<SavedFile> {
    let mut saved: Option<SavedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(form_error)?
    {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name != config.field_name {
            debug!(field = %field_name, "ignoring unexpected upload form part");
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if saved.is_some() {
            return Err(UploadError::TooManyFiles { field: field_name });
        }

        if file_name.trim().is_empty() {
            return Err(UploadError::EmptyFilename { field: field_name });
        }

        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !config.allows(&extension) {
            return Err(UploadError::UnsupportedType { extension });
        }

        let stored_name = stored_name_for(&file_name, &extension, config.fallback_stem);

        ensure_directory(dest_dir).await?;
        let stored_path = dest_dir.join(&stored_name);
        let mut file = File::create(&stored_path).await?;

        let mut total_bytes: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(form_error)?
        {
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        saved = Some(SavedFile {
            original_name: file_name,
            stored_name,
            stored_path,
            file_size: total_bytes,
        });
    }

    saved.ok_or_else(|| UploadError::MissingFile {
        field: config.field_name.to_string(),
    })
}

fn form_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Malformed(err.body_text())
    }
}

fn stored_name_for(original: &str, extension: &str, fallback_stem: &str) -> String {
    let sanitized = sanitize_filename::sanitize(original);
    let sanitized = sanitized.trim_start_matches('.');
    if !sanitized.is_empty() {
        return sanitized.to_string();
    }

    if extension.is_empty() {
        fallback_stem.to_string()
    } else {
        format!("{fallback_stem}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_strips_path_components() {
        assert_eq!(
            stored_name_for("../../etc/passwd.png", "png", "upload"),
            "etcpasswd.png"
        );
        assert_eq!(stored_name_for("cat.PNG", "png", "upload"), "cat.PNG");
    }

    #[test]
    fn stored_name_falls_back_when_nothing_survives() {
        assert_eq!(stored_name_for("...", "", "upload"), "upload");
        assert_eq!(stored_name_for("/", "", "upload"), "upload");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let config = FileFieldConfig::new("file", &["png", "jpg"]);
        assert!(config.allows("png"));
        assert!(config.allows("JPG"));
        assert!(!config.allows("exe"));
        assert!(!config.allows(""));
        assert!(FileFieldConfig::new("file", &[]).allows("anything"));
    }
}

use std::path::Path;

use axum::{
    extract::{Multipart, Path as AxumPath, State, multipart::MultipartRejection},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    classifier::{ClassifyError, Verdict, classify_image},
    web::{
        AppError, AppState, auth, storage,
        templates::{ResultView, render_result_page},
        uploads::{FileFieldConfig, UploadError, receive_file},
    },
};

const FILE_FIELD: &str = "file";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

/// Stores the uploaded image, classifies it and renders the verdict.
pub async fn upload_image(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AppError> {
    let session = auth::require_user(&state, &jar).await?;
    let multipart = multipart.map_err(|rejection| AppError::BadUpload(rejection.body_text()))?;

    let upload_id = Uuid::new_v4();
    let upload_dir = state.config().upload_dir.join(upload_id.to_string());

    let saved = match receive_file(
        multipart,
        &upload_dir,
        FileFieldConfig::new(FILE_FIELD, IMAGE_EXTENSIONS),
    )
    .await
    {
        Ok(saved) => saved,
        Err(err) => {
            discard_upload(&upload_dir).await;
            return Err(upload_error(err));
        }
    };

    let bytes = tokio::fs::read(&saved.stored_path).await.map_err(|err| {
        error!(?err, file = %saved.stored_path.display(), "failed to read back upload");
        AppError::Internal
    })?;

    let classifier = state.classifier();
    let outcome =
        tokio::task::spawn_blocking(move || classify_image(classifier.as_ref(), &bytes)).await;

    let classification = match outcome {
        Ok(Ok(classification)) => classification,
        Ok(Err(ClassifyError::Preprocess(err))) => {
            warn!(%err, file = %saved.original_name, "rejected unreadable upload");
            discard_upload(&upload_dir).await;
            return Err(AppError::UnreadableImage);
        }
        Ok(Err(ClassifyError::Model(err))) => {
            error!(?err, "watermark inference failed");
            return Err(AppError::Internal);
        }
        Err(err) => {
            error!(?err, "classification task failed");
            return Err(AppError::Internal);
        }
    };

    info!(
        username = %session.username,
        %upload_id,
        file = %saved.stored_name,
        bytes = saved.file_size,
        probability = classification.probability,
        verdict = classification.verdict.label(),
        "classified upload"
    );

    let preview_url = format!("/uploads/{upload_id}");
    Ok(Html(render_result_page(&ResultView {
        username: &session.username,
        filename: &saved.stored_name,
        preview_url: &preview_url,
        label: classification.verdict.label(),
        watermarked: classification.verdict == Verdict::Watermarked,
        probability: classification.probability,
    })))
}

/// Serves the image stored for an upload so the result page can preview it.
pub async fn uploaded_image(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(upload_id): AxumPath<String>,
) -> Result<Response, AppError> {
    auth::require_user(&state, &jar).await?;
    let upload_id = Uuid::parse_str(&upload_id).map_err(|_| AppError::NotFound)?;

    let upload_dir = state.config().upload_dir.join(upload_id.to_string());
    let mut entries = match tokio::fs::read_dir(&upload_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(err) => {
            error!(?err, dir = %upload_dir.display(), "failed to open upload directory");
            return Err(AppError::Internal);
        }
    };

    let entry = entries
        .next_entry()
        .await
        .map_err(|err| {
            error!(?err, dir = %upload_dir.display(), "failed to list upload directory");
            AppError::Internal
        })?
        .ok_or(AppError::NotFound)?;

    let filename = entry.file_name().to_string_lossy().into_owned();
    storage::stream_file(&entry.path(), &filename).await
}

fn upload_error(err: UploadError) -> AppError {
    match err {
        UploadError::MissingFile { .. } => AppError::NoFileUploaded,
        UploadError::EmptyFilename { .. } => AppError::NoFileSelected,
        UploadError::TooLarge => AppError::FileTooLarge,
        UploadError::Storage(err) => {
            error!(?err, "failed to store upload");
            AppError::Internal
        }
        other => AppError::BadUpload(other.to_string()),
    }
}

async fn discard_upload(upload_dir: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(upload_dir).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(?err, dir = %upload_dir.display(), "failed to discard upload directory");
        }
    }
}

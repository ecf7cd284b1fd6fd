use std::path::Path;

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::web::AppError;

/// Picks a content type for a stored image from its extension.
pub fn image_content_type(filename: &str) -> mime::Mime {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "webp" => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "tif" | "tiff" => "image/tiff".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Serve a stored file inline.
pub async fn stream_file(path: &Path, filename: &str) -> Result<Response, AppError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound);
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read stored upload");
            return Err(AppError::Internal);
        }
    };

    let content_type = image_content_type(filename);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref()).map_err(|_| AppError::Internal)?,
    );
    // Non-ASCII names cannot travel in a plain header value.
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", filename))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(image_content_type("a.PNG"), mime::IMAGE_PNG);
        assert_eq!(image_content_type("b.jpeg"), mime::IMAGE_JPEG);
        assert_eq!(image_content_type("c.webp").as_ref(), "image/webp");
        assert_eq!(image_content_type("noext"), mime::APPLICATION_OCTET_STREAM);
    }
}

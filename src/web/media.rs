//! Uploaded files under `/media/`

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::middleware::{AppError, AppState};

/// GET /media/{*path}
pub async fn serve_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let Some(file_path) = state.media.resolve(&path) else {
        return Err(AppError::NotFound);
    };

    match tokio::fs::read(&file_path).await {
        Ok(contents) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type(&path)),
                (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
            ],
            Body::from(contents),
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
        Err(e) => {
            tracing::warn!("Failed to read media file {}: {}", file_path.display(), e);
            Err(AppError::NotFound)
        }
    }
}

/// Content type from the file extension
fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

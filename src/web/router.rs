use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, landing, predict};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .route("/", get(landing::home_page))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/upload", post(predict::upload_image))
        .route("/uploads/:upload_id", get(predict::uploaded_image))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

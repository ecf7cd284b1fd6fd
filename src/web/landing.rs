use axum::{
    extract::State,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;

use crate::web::{AppState, auth, templates::render_home_page};

pub async fn home_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let session = auth::require_user_redirect(&state, &jar).await?;
    Ok(Html(render_home_page(&session.username)))
}

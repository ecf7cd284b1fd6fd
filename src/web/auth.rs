use axum::{
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::users::{self, CreateUserError};
use crate::web::{
    AppError, AppState,
    session::SessionMarker,
    templates::{render_login_page, render_register_page},
};

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
pub struct LoginQuery {
    pub status: Option<String>,
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<LoginQuery>,
) -> Result<Html<String>, Redirect> {
    if current_session(&state, &jar).await.is_some() {
        return Err(Redirect::to("/"));
    }

    let flash = match params.status.as_deref() {
        Some("registered") => Some("Registration complete. Please sign in."),
        Some("logged_out") => Some("You have been logged out."),
        _ => None,
    };

    Ok(Html(render_login_page(flash)))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let username = form.username.trim();

    let user = match users::find_user(state.pool_ref(), username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(%username, "login attempt for unknown user");
            return Err(AppError::InvalidCredentials);
        }
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(AppError::Internal);
        }
    };

    if !users::verify_password(&form.password, &user.password_hash) {
        warn!(%username, "login attempt with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    // A browser signing in again replaces its previous marker.
    if let Some(previous) = session_id_from(&jar) {
        state.sessions().clear(previous).await;
    }

    let session_id = Uuid::new_v4();
    state
        .sessions()
        .set(session_id, SessionMarker::new(user.id, user.username.clone()))
        .await;
    info!(username = %user.username, "user signed in");

    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);

    Ok((jar.add(cookie), Redirect::to("/")))
}

pub async fn register_page() -> Html<String> {
    Html(render_register_page())
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Redirect, AppError> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(AppError::MissingCredentials);
    }

    match users::create_user(state.pool_ref(), username, &form.password).await {
        Ok(user_id) => {
            info!(%username, user_id, "registered new user");
            Ok(Redirect::to("/login?status=registered"))
        }
        Err(CreateUserError::Duplicate) => {
            warn!(%username, "registration rejected: username taken");
            Err(AppError::DuplicateUsername)
        }
        Err(err) => {
            error!(?err, "failed to create user");
            Err(AppError::Internal)
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(session_id) = session_id_from(&jar) {
        if let Some(marker) = state.sessions().clear(session_id).await {
            let session_minutes = (Utc::now() - marker.signed_in_at).num_minutes();
            info!(username = %marker.username, session_minutes, "user logged out");
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));

    (jar.remove(removal), Redirect::to("/login?status=logged_out"))
}

fn session_id_from(jar: &CookieJar) -> Option<Uuid> {
    let cookie = jar.get(SESSION_COOKIE)?;
    Uuid::parse_str(cookie.value()).ok()
}

/// Resolves the session marker carried by the request, if any.
pub async fn current_session(state: &AppState, jar: &CookieJar) -> Option<SessionMarker> {
    let session_id = session_id_from(jar)?;
    state.sessions().get(session_id).await
}

/// Session gate for page routes: anonymous requests are sent to `/login`.
pub async fn require_user_redirect(
    state: &AppState,
    jar: &CookieJar,
) -> Result<SessionMarker, Redirect> {
    current_session(state, jar)
        .await
        .ok_or_else(|| Redirect::to("/login"))
}

/// Session gate for routes that report failures through [`AppError`].
pub async fn require_user(state: &AppState, jar: &CookieJar) -> Result<SessionMarker, AppError> {
    current_session(state, jar)
        .await
        .ok_or(AppError::LoginRequired)
}

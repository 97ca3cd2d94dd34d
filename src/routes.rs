// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{any, get},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, profile, project},
    state::AppState,
    utils::session::auth_middleware,
};

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Assembles the main application router.
///
/// * Account routes are public; `/logout/` accepts any method.
/// * Project and profile routes sit behind the session middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let auth_routes = Router::new()
        .route("/register/", get(auth::register_form).post(auth::register))
        .route("/login/", get(auth::login_form).post(auth::login))
        .route("/logout/", any(auth::logout));

    // `route_layer` keeps unknown paths a 404 instead of a 401.
    let protected_routes = Router::new()
        .route("/projects/", get(project::list_projects))
        .route(
            "/projects/create/",
            get(project::create_form).post(project::create_project),
        )
        .route(
            "/projects/{id}/edit/",
            get(project::edit_form).post(project::edit_project),
        )
        .route(
            "/projects/{id}/delete/",
            get(project::delete_confirm).post(project::delete_project),
        )
        .route("/profile/", get(profile::get_profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

//! API Router
//! Mission: Assemble public, authenticated, and admin route trees

use crate::api::users;
use crate::auth::{
    api::{self as auth_api, AuthState},
    middleware::{auth_middleware, role_gate, ADMIN_ONLY},
};
use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the API router
pub fn create_router(state: AuthState) -> Router {
    // Public routes: no bearer token required
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/refresh", post(auth_api::refresh))
        .with_state(state.clone());

    // Routes behind the session guard only
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::me))
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/api/auth/change-password", post(auth_api::change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // Admin user management: guard first, then the role gate
    let admin_routes = Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::deactivate_user),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            role_gate(ADMIN_ONLY, req, next)
        }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub mod auth;
mod bookings;
pub mod error;
mod extract;
mod filters;
mod listings;
mod validation;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::Layer;
use tower_http::{
    cors::{Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// The API router, accepting paths with or without a trailing slash
pub type App = NormalizePath<Router>;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let listing_routes = Router::new()
        .route(
            "/",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route("/my_listings", get(listings::my_listings))
        .route("/available", get(listings::available_listings))
        .route(
            "/:id",
            get(listings::get_listing)
                .put(listings::replace_listing)
                .patch(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route(
            "/:id/toggle_availability",
            post(listings::toggle_availability),
        );

    let booking_routes = Router::new()
        .route(
            "/",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/my_bookings", get(bookings::my_bookings))
        .route(
            "/my_property_bookings",
            get(bookings::my_property_bookings),
        )
        .route("/upcoming", get(bookings::upcoming_bookings))
        .route(
            "/:id",
            get(bookings::get_booking)
                .put(bookings::replace_booking)
                .patch(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/:id/confirm", post(bookings::confirm_booking))
        .route("/:id/cancel", post(bookings::cancel_booking));

    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/listings", listing_routes)
        .nest("/api/bookings", booking_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Wrap the router so `/api/listings/` and `/api/listings` hit the same route
pub fn create_app(state: Arc<AppState>) -> App {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn health_check() -> &'static str {
    "OK"
}

use crate::controllers::{
    clear_payments, create_payment, get_payment, health, list_payments, ping, AppState,
};
use crate::ui;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

fn api_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ping", get(ping))
        .route("/payments", get(list_payments).delete(clear_payments))
        .route("/pay", post(create_payment))
        .route("/pay/{id}", get(get_payment))
        .layer(CorsLayer::permissive())
}

/// API at the root and under `/api`, where the bundled client calls it.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::index))
        .route("/app.js", get(ui::app_js))
        .route("/styles.css", get(ui::styles_css))
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

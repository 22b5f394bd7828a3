use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod health;
mod middleware_auth;
mod tasks;

pub use health::health;

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    let task_router = Router::new()
        .route("/", post(tasks::routes::create).get(tasks::routes::list))
        .route("/overdue", get(tasks::routes::overdue))
        .route("/stats", get(tasks::routes::stats))
        .route(
            "/{id}",
            get(tasks::routes::get)
                .put(tasks::routes::update)
                .patch(tasks::routes::update)
                .delete(tasks::routes::delete),
        )
        .route("/{id}/mark_completed", post(tasks::routes::mark_completed));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .nest(
            "/api",
            Router::new()
                .route("/me", get(auth::me))
                .nest("/tasks", task_router)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    middleware_auth::require_auth,
                )),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Welcome to the task tracker API"
}

use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use middleware_owner::require_owner;
use routes::{
    chat::chat_ask,
    courses::{create_course, list_courses},
    files::serve_file,
    health::healthz,
    search::search_preview,
    upload::{upload_image, upload_pdf},
};

pub mod api_state;
pub mod error;
mod middleware_owner;
mod routes;

/// Router for the tutoring API
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    let public = Router::new()
        .route("/healthz", get(healthz))
        .route("/chat/ask", post(chat_ask))
        .route("/search/preview", get(search_preview))
        .route("/files/{*location}", get(serve_file));

    // Owner may come from the header or the form, so these check it themselves
    let uploads = Router::new()
        .route("/upload/pdf", post(upload_pdf))
        .route("/upload/image", post(upload_image))
        .layer(DefaultBodyLimit::max(app_state.config.upload_max_body_bytes));

    let owned = Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route_layer(from_fn(require_owner));

    public.merge(uploads).merge(owned)
}

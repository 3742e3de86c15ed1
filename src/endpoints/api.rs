pub mod generate;
pub mod posts;

use axum::{routing::{any, post}, Router};

pub fn get_router() -> Router<crate::SharedState> {
    Router::new()
        .route("/generate", any(generate::generate))
        .route("/posts", post(posts::create).delete(posts::reset))
        .route("/posts/regenerate", post(posts::regenerate))
}

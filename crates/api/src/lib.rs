//! HTTP ingestion gateway.

pub mod extractors;
pub mod gateway;
pub mod response;
pub mod routes;
pub mod state;

pub use gateway::{Gateway, Receipt};
pub use routes::router;
pub use state::AppState;

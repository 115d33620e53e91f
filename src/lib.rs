pub mod app;
pub mod authz;
pub mod db;
pub mod errors;
pub mod gate;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod session;

// Re-export commonly used items for tests
pub use app::{build_router, create_app, AppState};

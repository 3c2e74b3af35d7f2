pub mod augment;
pub mod cache;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod settings;

pub use routes::create_router;

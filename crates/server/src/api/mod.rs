pub mod downloads;
pub mod error;
pub mod handlers;
pub mod requests;
pub mod routes;


pub use routes::create_router;

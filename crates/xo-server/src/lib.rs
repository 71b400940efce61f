pub mod client;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};

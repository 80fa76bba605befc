// HTTP module: API server and probe client.

pub mod client;
pub mod server;

// Re-export server types
pub use server::{HttpServer, Server};

// Common controller/middleware interfaces
pub use crate::controller::controller::Controller;
pub use crate::middleware::middleware::Middleware;

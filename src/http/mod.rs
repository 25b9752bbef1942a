//! HTTP surface for the admission check.

mod server;

pub use server::HttpServer;

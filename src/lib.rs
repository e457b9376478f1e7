//! Bookshelf application library
//!
//! Wires the books module into the kernel registry and the HTTP server.

#![recursion_limit = "256"]

pub mod app;
pub mod modules;

pub use app::App;

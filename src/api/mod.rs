// Crate facade: tracing setup and a client that wires the layers together.

pub mod client_api;
pub mod simple;

pub use client_api::VideoClient;
pub use simple::init_tracing;

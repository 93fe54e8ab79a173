pub mod api;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod upload;
pub mod view;

pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod output;
pub mod query;
pub mod store;
pub mod tui;

//! Policy Pipeline Library
//!
//! Core library for normalizing and enriching scraped government
//! funding-announcement records

pub mod api;
pub mod cache;
pub mod dedup;
pub mod documents;
pub mod fetch;
pub mod mapper;
pub mod orchestrator;
pub mod period;
pub mod resolver;
pub mod roadmap;
pub mod sections;
pub mod store;
pub mod summary;
pub mod text;
pub mod title;
pub mod types;

pub use types::*;

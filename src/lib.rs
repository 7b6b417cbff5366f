pub mod composer;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod render;
pub mod stats;
pub mod store;

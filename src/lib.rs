pub mod app;
pub mod atlas;
pub mod clean;
pub mod config;
pub mod domain;
pub mod error;
pub mod flatten;
pub mod normalize;
pub mod output;

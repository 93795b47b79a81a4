pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod poller;
pub mod publisher;
pub mod resolve;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod template;
pub mod twitter;
pub mod upstream;

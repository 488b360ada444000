pub mod config;
pub mod file_system;
pub mod github;
pub mod logger;
pub mod output;

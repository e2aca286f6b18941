pub mod assets;
pub mod chat;
pub mod cli;
pub mod engine;
pub mod input;
pub mod physics;
pub mod project_config;
pub mod script_runner;
pub mod session;
pub mod watcher;
pub mod world;

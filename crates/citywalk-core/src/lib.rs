pub mod animation;
pub mod camera;
pub mod components;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod input;
pub mod locomotion;
pub mod proximity;

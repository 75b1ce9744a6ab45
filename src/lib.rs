pub mod ai;
pub mod config;
pub mod constants;
pub mod engine;
pub mod events;
pub mod level;
pub mod pathfinding;
pub mod types;

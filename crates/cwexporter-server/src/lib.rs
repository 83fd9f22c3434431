pub mod app;
pub mod config;
pub mod exposition;
pub mod scheduler;
pub mod state;

pub mod config;
pub mod dump;
pub mod view;

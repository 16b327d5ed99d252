pub mod files;
pub mod global_config;
pub mod replace;
pub mod types;

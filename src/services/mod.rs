pub mod config;
pub mod distribution;
pub mod game_data;

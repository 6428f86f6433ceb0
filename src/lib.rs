pub mod admin;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keyboard;
pub mod leaderboard;
pub mod quiz;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

pub use commands::*;
pub use config::Config;
pub use error::*;
pub use state::*;
pub use types::*;

pub mod cli;
pub mod load_config;
pub mod logging;
pub mod prompt;
pub mod supabase;

pub use cli::{run, run_with, Cli, Commands};

//! Layered settings: a TOML file, then `PORTCULLIS__*` environment
//! overrides. See `bin/settings_demo.rs` for a quick check of a file.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;

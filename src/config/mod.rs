pub mod args;
mod structs;
pub mod validators;

pub use args::CliArgs;
pub use structs::*;

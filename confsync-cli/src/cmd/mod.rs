//! CLI subcommands.

pub mod groups;
pub mod replicate;

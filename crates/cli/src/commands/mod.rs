//! CLI subcommand implementations

pub mod definition;
pub mod evaluate;
pub mod invoke;
pub mod predict;
pub mod preprocess;
pub mod run;

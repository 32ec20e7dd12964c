//! Command-line front end for the text-to-Cypher pipeline.

pub mod cli;
pub mod cli_builder;
pub mod commands;
pub mod error;
pub mod factory;

// crates/cypherloop-core/src/lib.rs
pub mod config;
pub mod cypher;
pub mod error;
pub mod neo4j_client;
pub mod traits;
pub mod types;

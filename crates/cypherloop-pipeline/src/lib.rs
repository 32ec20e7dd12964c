//! Text-to-Cypher pipeline: schema extraction, exemplar retrieval, pruning,
//! generation, normalization, validation and the bounded repair loop.

pub mod exemplars;
pub mod generator;
mod oracle_call;
pub mod post_processor;
pub mod pruner;
pub mod repair;
pub mod resolver;
pub mod schema;
pub mod validator;

pub use exemplars::ExemplarIndex;
pub use generator::QueryGenerator;
pub use oracle_call::TimedCall;
pub use post_processor::PostProcessor;
pub use pruner::{PrunedSchema, SchemaPruner};
pub use repair::{LoopOutcome, LoopState, RepairContext, RepairController};
pub use resolver::Resolver;
pub use schema::{extract_schema, SchemaCache};
pub use validator::Validator;

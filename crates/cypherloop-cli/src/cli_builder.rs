//! CLI argument definitions.

use clap::{Arg, ArgAction, Command};

/// Build the main CLI command structure
pub fn build_cli() -> Command {
    Command::new("cypherloop")
        .version("0.1.0")
        .about("Answers natural-language questions over a Neo4j graph with validated Cypher")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML, YAML or JSON)")
                .global(true)
                .required(false),
        )
        .arg(
            Arg::new("override")
                .short('o')
                .long("override")
                .value_name("KEY=VALUE")
                .help("Override configuration values, e.g. pipeline.default_limit=50")
                .global(true)
                .action(ArgAction::Append),
        )
        .subcommand(
            Command::new("ask")
                .about("Translate a question into Cypher, validate it and run it")
                .arg(
                    Arg::new("question")
                        .help("The question to answer")
                        .required(true)
                        .num_args(1..),
                )
                .arg(
                    Arg::new("query-only")
                        .long("query-only")
                        .help("Print only the final query")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("schema")
                .about("Print the schema document extracted from the database")
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .value_parser(["json", "yaml"])
                        .default_value("json")
                        .help("Output format"),
                ),
        )
        .subcommand(
            Command::new("normalize")
                .about("Apply the deterministic post-processing rules to a query")
                .arg(
                    Arg::new("query")
                        .help("The Cypher query to normalize")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("exemplars")
                .about("Inspect and extend the exemplar corpus")
                .subcommand_required(true)
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .help("Exemplar corpus file; defaults to exemplars_path from the config"),
                )
                .subcommand(Command::new("list").about("List all exemplars"))
                .subcommand(
                    Command::new("add")
                        .about("Append an exemplar and persist the corpus")
                        .arg(Arg::new("question").required(true))
                        .arg(Arg::new("query").required(true)),
                )
                .subcommand(
                    Command::new("search")
                        .about("Show the exemplars nearest to a question")
                        .arg(Arg::new("question").required(true))
                        .arg(
                            Arg::new("k")
                                .short('k')
                                .value_name("K")
                                .value_parser(clap::value_parser!(usize))
                                .help("Number of exemplars; defaults to pipeline.exemplar_k"),
                        ),
                ),
        )
}

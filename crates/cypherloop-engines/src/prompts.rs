//! Prompt templates for the three oracle call sites.

use cypherloop_core::config::NamingConventions;
use cypherloop_core::types::{Exemplar, GraphSchema};

pub const PRUNE_INSTRUCTIONS: &str = r#"You are given a labelled property graph schema and a question.
Return ONLY the subset of the schema relevant to the question.
Include only the nodes, edges and properties needed to answer it.
Every edge you keep must reference node labels you also keep.
Do not invent labels or properties that are not in the input schema.

Respond with a single JSON object of the form:
{"nodes": [{"label": "...", "properties": [{"name": "...", "type": "..."}]}],
 "edges": [{"label": "...", "from": "...", "to": "...", "properties": [{"name": "...", "type": "..."}]}]}
Output the JSON object and nothing else."#;

pub const RETURN_RESULTS_RULES: &str = r#"<RETURN_RESULTS>
- Return property values (not whole nodes or edges).
- Integers as integers.
- Do not coerce types.
- No extraneous keywords or text outside the query.
</RETURN_RESULTS>"#;

fn syntax_rules(conventions: &NamingConventions) -> String {
    format!(
        "<SYNTAX>\n\
         - Match {scholar} names on `{scholar_name}`.\n\
         - For all other entities (countries, cities, continents, institutions, ...), match on `{default_name}`.\n\
         - Use short alphanumeric variable names (a1, r1, etc.).\n\
         - Respect relationship directions (FROM -> TO).\n\
         - For string comparisons: lowercase both sides with {fold}(), use WHERE + CONTAINS.\n\
         - Do NOT use APOC.\n\
         </SYNTAX>",
        scholar = conventions.scholar_label,
        scholar_name = conventions.scholar_name_property,
        default_name = conventions.default_name_property,
        fold = conventions.case_fold_function,
    )
}

fn schema_json(schema: &GraphSchema) -> String {
    serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string())
}

pub fn prune_prompt(question: &str, full_schema: &GraphSchema) -> String {
    format!(
        "{}\n\nQuestion: {}\n\nInput schema:\n{}\n",
        PRUNE_INSTRUCTIONS,
        question,
        schema_json(full_schema)
    )
}

pub fn generate_prompt(
    question: &str,
    schema: &GraphSchema,
    exemplars: &[Exemplar],
    conventions: &NamingConventions,
) -> String {
    let mut prompt = String::from(
        "Translate the question into a valid Cypher query that respects the schema.\n\n",
    );
    prompt.push_str(&syntax_rules(conventions));
    prompt.push_str("\n\n");
    if !exemplars.is_empty() {
        prompt.push_str("Use the FEW-SHOT EXAMPLES to imitate structure and style.\n\n");
        prompt.push_str("<FEW_SHOT_EXAMPLES>\n");
        prompt.push_str(&Exemplar::format_block(exemplars));
        prompt.push_str("\n</FEW_SHOT_EXAMPLES>\n\n");
    }
    prompt.push_str(RETURN_RESULTS_RULES);
    prompt.push_str(&format!(
        "\n\nSchema:\n{}\n\nQuestion: {}\n\nRespond with the Cypher query on a single line and nothing else.\n",
        schema_json(schema),
        question
    ));
    prompt
}

pub fn repair_prompt(
    question: &str,
    invalid_query: &str,
    error: &str,
    pruned_schema: &GraphSchema,
    full_schema: &GraphSchema,
    conventions: &NamingConventions,
) -> String {
    format!(
        "The following Cypher query was generated for the question below, \
         but the database rejected it.\n\n\
         Question: {question}\n\n\
         Invalid query: {invalid_query}\n\n\
         Database error: {error}\n\n\
         Pruned schema used for generation:\n{pruned}\n\n\
         Full database schema (labels or properties missing from the pruned schema may be found here):\n{full}\n\n\
         {syntax}\n\n\
         {returns}\n\n\
         Return a corrected Cypher query on a single line and nothing else.\n",
        pruned = schema_json(pruned_schema),
        full = schema_json(full_schema),
        syntax = syntax_rules(conventions),
        returns = RETURN_RESULTS_RULES,
    )
}

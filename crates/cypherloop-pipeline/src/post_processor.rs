//! Deterministic rewrite pass applied to every draft query.
//!
//! Rules run over the lossless token stream from [`cypherloop_core::cypher`], so
//! whitespace, comments and string contents survive untouched. Each rule is
//! idempotent and so is their composition.

use std::collections::HashMap;

use cypherloop_core::config::NamingConventions;
use cypherloop_core::cypher::{self, Token, TokenKind};

/// Bracket frames seen while scanning for case-fold targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Arguments of a case-fold call; contents are already folded.
    Fold,
    /// `{ ... }` after CALL / EXISTS / COUNT / COLLECT.
    Subquery,
    /// Map literal or inline property map; values must match stored text exactly.
    Map,
    Group,
}

const SUBQUERY_KEYWORDS: &[&str] = &["CALL", "EXISTS", "COUNT", "COLLECT"];

/// `(variable:Label` declarations. The first label seen for a variable wins.
fn label_bindings<'a>(tokens: &[Token<'a>]) -> HashMap<&'a str, &'a str> {
    let mut bindings = HashMap::new();
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_punct('(') {
            continue;
        }
        let Some(var) = cypher::next_significant(tokens, i) else {
            continue;
        };
        if !tokens[var].is_identifier() {
            continue;
        }
        let Some(colon) = cypher::next_significant(tokens, var) else {
            continue;
        };
        if !tokens[colon].is_punct(':') {
            continue;
        }
        if let Some(label) = cypher::next_significant(tokens, colon) {
            if tokens[label].is_identifier() {
                bindings
                    .entry(tokens[var].name())
                    .or_insert(tokens[label].name());
            }
        }
    }
    bindings
}

fn next_is(tokens: &[Token<'_>], index: usize, chars: &[char]) -> bool {
    cypher::next_significant(tokens, index)
        .is_some_and(|n| chars.iter().any(|&c| tokens[n].is_punct(c)))
}

fn prev_is(tokens: &[Token<'_>], index: usize, chars: &[char]) -> bool {
    cypher::prev_significant(tokens, index)
        .is_some_and(|p| chars.iter().any(|&c| tokens[p].is_punct(c)))
}

pub struct PostProcessor {
    conventions: NamingConventions,
    default_limit: u64,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(NamingConventions::default(), 100)
    }
}

impl PostProcessor {
    pub fn new(conventions: NamingConventions, default_limit: u64) -> Self {
        Self {
            conventions,
            default_limit,
        }
    }

    /// Return-clause expansion, then case folding, then the result cap.
    pub fn normalize(&self, query: &str) -> String {
        let expanded = self.expand_return_clause(query);
        let folded = self.enforce_case_folding(&expanded);
        self.enforce_limit(&folded)
    }

    /// Projects bare label-bound variables in the final RETURN clause onto their
    /// name property. Aggregate arguments are rewritten too, so `count(s)` becomes
    /// `count(s.knownName)`.
    pub fn expand_return_clause(&self, query: &str) -> String {
        let tokens = cypher::tokenize(query);
        let Some(clause) = cypher::final_return_clause(&tokens) else {
            return query.to_string();
        };
        let bindings = label_bindings(&tokens);
        if bindings.is_empty() {
            return query.to_string();
        }

        let mut out = String::with_capacity(query.len() + 32);
        for (i, token) in tokens.iter().enumerate() {
            out.push_str(token.text);
            if !clause.items.contains(&i) || !token.is_identifier() {
                continue;
            }
            let Some(label) = bindings.get(token.name()) else {
                continue;
            };
            let projected = next_is(&tokens, i, &['.', '(', ':', '{']);
            let is_alias = cypher::prev_significant(&tokens, i)
                .is_some_and(|p| tokens[p].is_keyword("AS"));
            if projected || is_alias || prev_is(&tokens, i, &['.']) {
                continue;
            }
            out.push('.');
            out.push_str(self.conventions.name_property_for(label));
        }
        out
    }

    fn is_fold_call(&self, tokens: &[Token<'_>], index: usize) -> bool {
        let token = &tokens[index];
        token.kind == TokenKind::Ident
            && !prev_is(tokens, index, &['.'])
            && (token.text.eq_ignore_ascii_case(&self.conventions.case_fold_function)
                || token.text.eq_ignore_ascii_case("toLower")
                || token.text.eq_ignore_ascii_case("lower"))
    }

    /// `var.prop` starting at `index` with a case-insensitive `prop`; returns the
    /// index of the property token.
    fn folded_property_access(&self, tokens: &[Token<'_>], index: usize) -> Option<usize> {
        if !tokens[index].is_identifier() || prev_is(tokens, index, &['.', ':']) {
            return None;
        }
        let dot = cypher::next_significant(tokens, index)?;
        if !tokens[dot].is_punct('.') {
            return None;
        }
        let property = cypher::next_significant(tokens, dot)?;
        let is_target = tokens[property].is_identifier()
            && self.conventions.is_case_insensitive(tokens[property].name())
            && !next_is(tokens, property, &['.', '(']);
        is_target.then_some(property)
    }

    /// Wraps case-insensitive property accesses and string literals in the case-fold
    /// function. Projections, property maps and existing fold calls are left alone.
    pub fn enforce_case_folding(&self, query: &str) -> String {
        let tokens = cypher::tokenize(query);
        let mut open = vec![false; tokens.len()];
        let mut close = vec![false; tokens.len()];
        let mut frames: Vec<Frame> = Vec::new();
        // Frame depth of the RETURN whose projection is being skipped.
        let mut projection: Option<usize> = None;

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let shielded = projection.is_some()
                || frames.iter().any(|f| matches!(f, Frame::Fold | Frame::Map));

            match token.kind {
                TokenKind::Punct => match token.text {
                    "(" => {
                        let fold = cypher::prev_significant(&tokens, i)
                            .is_some_and(|p| self.is_fold_call(&tokens, p));
                        frames.push(if fold { Frame::Fold } else { Frame::Group });
                    }
                    "[" => frames.push(Frame::Group),
                    "{" => {
                        let subquery = cypher::prev_significant(&tokens, i).is_some_and(|p| {
                            SUBQUERY_KEYWORDS.iter().any(|kw| tokens[p].is_keyword(kw))
                        });
                        frames.push(if subquery { Frame::Subquery } else { Frame::Map });
                    }
                    ")" | "]" | "}" => {
                        frames.pop();
                        if projection.is_some_and(|depth| frames.len() < depth) {
                            projection = None;
                        }
                    }
                    _ => {}
                },
                TokenKind::Ident if token.is_keyword("RETURN") => {
                    projection = Some(frames.len());
                }
                TokenKind::Ident if token.is_keyword("UNION") => {
                    if projection == Some(frames.len()) {
                        projection = None;
                    }
                }
                TokenKind::StringLit { terminated: true } if !shielded => {
                    open[i] = true;
                    close[i] = true;
                }
                TokenKind::Ident | TokenKind::QuotedIdent if !shielded => {
                    if let Some(property) = self.folded_property_access(&tokens, i) {
                        open[i] = true;
                        close[property] = true;
                        i = property + 1;
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        let fold = &self.conventions.case_fold_function;
        let mut out = String::with_capacity(query.len() + 32);
        for (i, token) in tokens.iter().enumerate() {
            if open[i] {
                out.push_str(fold);
                out.push('(');
            }
            out.push_str(token.text);
            if close[i] {
                out.push(')');
            }
        }
        out
    }

    /// Appends `LIMIT <default>` when no LIMIT clause exists, ahead of any trailing
    /// statement terminator.
    pub fn enforce_limit(&self, query: &str) -> String {
        let tokens = cypher::tokenize(query);
        if cypher::has_limit(&tokens) {
            return query.to_string();
        }
        let Some(mut anchor) = tokens.iter().rposition(|t| !t.is_trivia()) else {
            return query.to_string();
        };
        if tokens[anchor].kind == (TokenKind::StringLit { terminated: false }) {
            return query.to_string();
        }
        while tokens[anchor].is_punct(';') {
            match cypher::prev_significant(&tokens, anchor) {
                Some(prev) => anchor = prev,
                None => return query.to_string(),
            }
        }
        // A LIMIT after an accessor reads as a property name.
        if tokens[anchor].is_punct('.') || tokens[anchor].is_punct(':') {
            return query.to_string();
        }

        let at = tokens[anchor].end();
        format!(
            "{} LIMIT {}{}",
            &query[..at],
            self.default_limit,
            &query[at..]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp() -> PostProcessor {
        PostProcessor::default()
    }

    #[test]
    fn test_scholar_variable_projects_known_name() {
        assert_eq!(
            pp().expand_return_clause("MATCH (s:Scholar)-[:WON]->(p:Prize) RETURN s, p.category"),
            "MATCH (s:Scholar)-[:WON]->(p:Prize) RETURN s.knownName, p.category"
        );
    }

    #[test]
    fn test_other_labels_project_name() {
        assert_eq!(
            pp().expand_return_clause("MATCH (s:Scholar)-[:AFFILIATED_WITH]->(i:Institution) RETURN DISTINCT i"),
            "MATCH (s:Scholar)-[:AFFILIATED_WITH]->(i:Institution) RETURN DISTINCT i.name"
        );
    }

    #[test]
    fn test_suffix_and_aliases_untouched() {
        assert_eq!(
            pp().expand_return_clause("MATCH (s:Scholar) RETURN s AS scholar ORDER BY s LIMIT 5"),
            "MATCH (s:Scholar) RETURN s.knownName AS scholar ORDER BY s LIMIT 5"
        );
    }

    #[test]
    fn test_aggregate_arguments_are_expanded() {
        // Bare identifiers inside function calls are rewritten like any other.
        assert_eq!(
            pp().expand_return_clause("MATCH (s:Scholar)-[:WON]->(p:Prize) RETURN p.category, count(s) AS n"),
            "MATCH (s:Scholar)-[:WON]->(p:Prize) RETURN p.category, count(s.knownName) AS n"
        );
    }

    #[test]
    fn test_unbound_and_earlier_clauses_untouched() {
        let query = "MATCH (s:Scholar) WITH s, 1 AS x RETURN x, s.knownName";
        assert_eq!(pp().expand_return_clause(query), query);
        let query = "MATCH (s) RETURN s";
        assert_eq!(pp().expand_return_clause(query), query);
    }

    #[test]
    fn test_case_folding_wraps_property_and_literal() {
        assert_eq!(
            pp().enforce_case_folding("MATCH (p:Prize) WHERE p.category = 'Physics' AND p.awardYear > 1950 RETURN p.category"),
            "MATCH (p:Prize) WHERE toLower(p.category) = toLower('Physics') AND p.awardYear > 1950 RETURN p.category"
        );
    }

    #[test]
    fn test_case_folding_never_double_wraps() {
        let once = pp().enforce_case_folding("toLower(s.name)");
        assert_eq!(once, "toLower(s.name)");
        assert_eq!(pp().enforce_case_folding(&once), "toLower(s.name)");

        let query = "MATCH (i:Institution) WHERE toLower(i.name) CONTAINS toLower('Karolinska') RETURN i.name";
        assert_eq!(pp().enforce_case_folding(query), query);
    }

    #[test]
    fn test_case_folding_skips_property_maps() {
        let query = "MATCH (s:Scholar {knownName: 'Marie Curie'})-[:WON]->(p:Prize) RETURN p.category";
        assert_eq!(pp().enforce_case_folding(query), query);
    }

    #[test]
    fn test_case_folding_enters_subqueries() {
        assert_eq!(
            pp().enforce_case_folding("MATCH (s:Scholar) WHERE EXISTS { MATCH (s)-[:WON]->(p:Prize) WHERE p.category = 'physics' } RETURN s.knownName"),
            "MATCH (s:Scholar) WHERE EXISTS { MATCH (s)-[:WON]->(p:Prize) WHERE toLower(p.category) = toLower('physics') } RETURN s.knownName"
        );
    }

    #[test]
    fn test_case_folding_leaves_union_projections() {
        let query = "MATCH (s:Scholar) WHERE s.gender = 'female' RETURN s.knownName UNION MATCH (s:Scholar) WHERE s.gender = 'male' RETURN s.knownName";
        assert_eq!(
            pp().enforce_case_folding(query),
            "MATCH (s:Scholar) WHERE toLower(s.gender) = toLower('female') RETURN s.knownName UNION MATCH (s:Scholar) WHERE toLower(s.gender) = toLower('male') RETURN s.knownName"
        );
    }

    #[test]
    fn test_limit_appended_once() {
        assert_eq!(
            pp().enforce_limit("MATCH (s:Scholar) RETURN s.knownName"),
            "MATCH (s:Scholar) RETURN s.knownName LIMIT 100"
        );
        let limited = "MATCH (s:Scholar) RETURN s.knownName LIMIT 50";
        assert_eq!(pp().enforce_limit(limited), limited);
        assert_eq!(
            pp().enforce_limit("match (s) return s.knownName limit 7"),
            "match (s) return s.knownName limit 7"
        );
    }

    #[test]
    fn test_limit_goes_before_terminator_and_comment() {
        assert_eq!(
            pp().enforce_limit("MATCH (s) RETURN s.knownName ;\n"),
            "MATCH (s) RETURN s.knownName LIMIT 100 ;\n"
        );
        assert_eq!(
            pp().enforce_limit("MATCH (s) RETURN s.knownName // names"),
            "MATCH (s) RETURN s.knownName LIMIT 100 // names"
        );
    }

    #[test]
    fn test_limit_degenerate_inputs() {
        assert_eq!(pp().enforce_limit(""), "");
        assert_eq!(pp().enforce_limit("  ;"), "  ;");
        assert_eq!(pp().enforce_limit("RETURN 'open"), "RETURN 'open");
    }

    #[test]
    fn test_limit_skips_dangling_accessor() {
        for query in ["MATCH (s:Scholar) RETURN s.", "MATCH (s:Scholar) RETURN s: ;"] {
            assert_eq!(pp().enforce_limit(query), query);
        }
        let once = pp().normalize("MATCH (s:Scholar) RETURN s.");
        assert_eq!(pp().normalize(&once), once);
    }

    #[test]
    fn test_limit_added_after_limited_subquery() {
        assert_eq!(
            pp().enforce_limit("CALL { MATCH (p:Prize) RETURN p LIMIT 1 } RETURN p.category"),
            "CALL { MATCH (p:Prize) RETURN p LIMIT 1 } RETURN p.category LIMIT 100"
        );
    }

    #[test]
    fn test_custom_limit() {
        let pp = PostProcessor::new(NamingConventions::default(), 25);
        assert_eq!(pp.enforce_limit("RETURN 1"), "RETURN 1 LIMIT 25");
    }

    #[test]
    fn test_normalize_full_example() {
        assert_eq!(
            pp().normalize("MATCH (s:Scholar)-[:WON]->(p:Prize) WHERE p.category = 'Physics' RETURN s, p.awardYear;"),
            "MATCH (s:Scholar)-[:WON]->(p:Prize) WHERE toLower(p.category) = toLower('Physics') RETURN s.knownName, p.awardYear LIMIT 100;"
        );
    }
}

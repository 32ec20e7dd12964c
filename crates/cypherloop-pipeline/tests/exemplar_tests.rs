use std::sync::Arc;
use std::thread;

use cypherloop_core::types::Exemplar;
use cypherloop_pipeline::ExemplarIndex;

#[test]
fn nearest_exemplars_are_deterministic() {
    let index = ExemplarIndex::default();
    let question = "Which physics laureates won after 1950?";

    let first = index.top_k(question, 3);
    let second = index.top_k(question, 3);

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(first[0].question.contains("Physics"));
}

#[test]
fn k_larger_than_corpus_returns_everything() {
    let index = ExemplarIndex::default();

    assert_eq!(index.top_k("anything", 50).len(), index.len());
}

#[test]
fn format_top_k_renders_numbered_block() {
    let index = ExemplarIndex::new(vec![Exemplar::new(
        "Economics winners",
        "MATCH (s:Scholar)-[:WON]->(p:Prize)\nRETURN s.knownName",
    )]);

    let block = index.format_top_k("economics", 1);

    assert_eq!(
        block,
        "Example 1:\nQuestion: Economics winners\nCypher: MATCH (s:Scholar)-[:WON]->(p:Prize) RETURN s.knownName"
    );
}

#[test]
fn save_and_load_preserve_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exemplars.json");
    let index = ExemplarIndex::default();
    index
        .add(
            "Who founded the Institute for Advanced Study?",
            "MATCH (i:Institution) RETURN i.name",
        )
        .unwrap();

    index.save(&path).unwrap();
    let loaded = ExemplarIndex::load(&path).unwrap();

    assert_eq!(loaded.exemplars(), index.exemplars());
    assert_eq!(
        loaded.top_k("institute advanced study", 1)[0].query,
        "MATCH (i:Institution) RETURN i.name"
    );
}

#[test]
fn missing_file_loads_builtin_corpus() {
    let dir = tempfile::tempdir().unwrap();

    let index = ExemplarIndex::load(&dir.path().join("absent.json")).unwrap();

    assert_eq!(index.exemplars(), ExemplarIndex::default().exemplars());
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exemplars.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = ExemplarIndex::load(&path).err().unwrap();

    assert!(format!("{:#}", err).contains("Failed to parse exemplars"));
}

#[test]
fn concurrent_appends_are_all_kept() {
    let index = Arc::new(ExemplarIndex::new(Vec::new()));

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                index
                    .add(&format!("question number {}", i), "MATCH (n) RETURN n")
                    .unwrap();
                // Readers never observe a half-built model.
                let nearest = index.top_k(&format!("question number {}", i), 1);
                assert_eq!(nearest.len(), 1);
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(index.len(), 8);
}

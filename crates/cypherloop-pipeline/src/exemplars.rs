//! Few-shot exemplar corpus with TF-IDF retrieval.
//!
//! The corpus and its vector model live in one immutable [`Snapshot`]. Appending
//! builds a fresh snapshot off to the side and swaps the pointer, so readers always
//! see either the old model or the new one.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Context, Result};
use cypherloop_core::types::Exemplar;
use log::{debug, info};
use unicode_segmentation::UnicodeSegmentation;

/// Sparse TF-IDF vector, sorted by term index.
type SparseVector = Vec<(usize, f64)>;

pub fn seed_exemplars() -> Vec<Exemplar> {
    vec![
        Exemplar::new(
            "Which scholars won the Nobel Physics prize after 1950?",
            "MATCH (s:Scholar)-[:WON]->(p:Prize) WHERE toLower(p.category)=toLower('physics') AND p.awardYear>1950 RETURN s.knownName, p.category, p.awardYear",
        ),
        Exemplar::new(
            "List laureates affiliated with University of Cambridge",
            "MATCH (s:Scholar)-[:AFFILIATED_WITH]->(i:Institution) WHERE toLower(i.name) CONTAINS toLower('university of cambridge') RETURN s.knownName, i.name",
        ),
        Exemplar::new(
            "Show economics prize winners and their award years",
            "MATCH (s:Scholar)-[:WON]->(p:Prize) WHERE toLower(p.category)=toLower('economics') RETURN s.knownName, p.awardYear",
        ),
        Exemplar::new(
            "Find chemistry laureates born before 1900",
            "MATCH (s:Scholar)-[:WON]->(p:Prize) WHERE toLower(p.category)=toLower('chemistry') AND s.birthDate<'1900-01-01' RETURN s.knownName, s.birthDate, p.awardYear",
        ),
        Exemplar::new(
            "Who won a medicine prize at Karolinska Institutet?",
            "MATCH (s:Scholar)-[:WON]->(p:Prize) MATCH (s)-[:AFFILIATED_WITH]->(i:Institution) WHERE toLower(p.category)=toLower('medicine') AND toLower(i.name) CONTAINS toLower('karolinska institutet') RETURN s.knownName, i.name, p.awardYear",
        ),
    ]
}

/// Lower-cased word unigrams and bigrams. Words split at apostrophes and other
/// inner punctuation, and pieces shorter than two characters are dropped before
/// bigrams are formed.
fn terms(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .unicode_words()
        .flat_map(|w| w.split(|c: char| !c.is_alphanumeric() && c != '_'))
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 2)
        .collect();

    let mut terms = words.clone();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

fn normalize(vector: &mut SparseVector) {
    let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in vector.iter_mut() {
            *w /= norm;
        }
    }
}

fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[derive(Debug, Default)]
struct Snapshot {
    exemplars: Vec<Exemplar>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
}

impl Snapshot {
    fn build(exemplars: Vec<Exemplar>) -> Self {
        let documents: Vec<Vec<String>> = exemplars.iter().map(|e| terms(&e.question)).collect();

        let mut vocabulary = HashMap::new();
        let mut document_frequency: Vec<usize> = Vec::new();
        for document in &documents {
            let mut seen = Vec::new();
            for term in document {
                let next = vocabulary.len();
                let index = *vocabulary.entry(term.clone()).or_insert(next);
                if index == document_frequency.len() {
                    document_frequency.push(0);
                }
                if !seen.contains(&index) {
                    seen.push(index);
                    document_frequency[index] += 1;
                }
            }
        }

        let n = documents.len() as f64;
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let mut snapshot = Snapshot {
            exemplars,
            vocabulary,
            idf,
            vectors: Vec::new(),
        };
        snapshot.vectors = documents.iter().map(|d| snapshot.vectorize(d)).collect();
        snapshot
    }

    /// Terms outside the vocabulary carry no weight.
    fn vectorize(&self, terms: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in terms {
            if let Some(&index) = self.vocabulary.get(term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        vector.sort_by_key(|&(index, _)| index);
        normalize(&mut vector);
        vector
    }

    fn top_k(&self, question: &str, k: usize) -> Vec<Exemplar> {
        let query = self.vectorize(&terms(question));
        let mut ranked: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&query, v)))
            .collect();
        // Stable: equal scores keep corpus order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(k)
            .map(|(i, _)| self.exemplars[i].clone())
            .collect()
    }
}

/// Owns the exemplar corpus and its similarity model.
pub struct ExemplarIndex {
    snapshot: RwLock<Arc<Snapshot>>,
    append: Mutex<()>,
}

impl Default for ExemplarIndex {
    fn default() -> Self {
        Self::new(seed_exemplars())
    }
}

impl ExemplarIndex {
    pub fn new(exemplars: Vec<Exemplar>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::build(exemplars))),
            append: Mutex::new(()),
        }
    }

    fn current(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Most similar exemplars first; `k` beyond the corpus size returns the whole corpus.
    pub fn top_k(&self, question: &str, k: usize) -> Vec<Exemplar> {
        self.current().top_k(question, k)
    }

    /// The in-context block for the `k` nearest exemplars.
    pub fn format_top_k(&self, question: &str, k: usize) -> String {
        Exemplar::format_block(&self.top_k(question, k))
    }

    /// Appends an exemplar and rebuilds the model before returning.
    pub fn add(&self, question: &str, query: &str) -> Result<()> {
        if question.trim().is_empty() || query.trim().is_empty() {
            return Err(anyhow!("Exemplar question and query must not be empty"));
        }

        let _writer = self.append.lock().unwrap_or_else(|e| e.into_inner());
        let mut exemplars = self.current().exemplars.clone();
        exemplars.push(Exemplar::new(question.trim(), query.trim()));
        let rebuilt = Arc::new(Snapshot::build(exemplars));
        debug!("Rebuilt exemplar model with {} terms", rebuilt.vocabulary.len());

        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = rebuilt;
        Ok(())
    }

    pub fn exemplars(&self) -> Vec<Exemplar> {
        self.current().exemplars.clone()
    }

    pub fn len(&self) -> usize {
        self.current().exemplars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads a JSON array of exemplars. A missing file yields the seed corpus.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "Exemplar file {} not found, using the built-in corpus",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read exemplars from {}", path.display()))?;
        let exemplars: Vec<Exemplar> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse exemplars in {}", path.display()))?;
        info!("Loaded {} exemplars from {}", exemplars.len(), path.display());
        Ok(Self::new(exemplars))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.exemplars())?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write exemplars to {}", path.display()))?;
        Ok(())
    }
}

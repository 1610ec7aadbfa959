//! Deterministic, dependency-free embedding engine.
//!
//! Produces fixed-size `f32` vectors for similarity search without a
//! downloaded ML model: a trained corpus gets TF-IDF vectors; anything
//! outside the trained vocabulary falls back to an MD5-seeded
//! locality-sensitive hash so every string still gets a stable, comparable
//! embedding.

use std::collections::HashMap;
use std::sync::LazyLock;

use md5::{Digest, Md5};

pub const VECTOR_SIZE: usize = 128;
const DEFAULT_MAX_CACHE: usize = 10_000;

/// Tokens dropped before TF-IDF accounting: function words that carry no
/// scope- or topic-discriminating signal (mirrors the ground-truth
/// tokenizer's stopword list).
static STOPWORDS: LazyLock<std::collections::HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has",
        "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "must",
        "shall", "can", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "or",
        "and", "but", "if", "then", "so", "than", "that", "this", "these", "those", "it", "its",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub vector_size: usize,
    pub cache_embeddings: bool,
    pub max_cache_size: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            vector_size: VECTOR_SIZE,
            cache_embeddings: true,
            max_cache_size: DEFAULT_MAX_CACHE,
        }
    }
}

/// TF-IDF-over-trained-corpus embedder with an MD5 hash-embedding fallback.
pub struct Embedder {
    config: EmbedderConfig,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    trained: bool,
    cache: HashMap<String, Vec<f32>>,
}

impl Embedder {
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            trained: false,
            cache: HashMap::new(),
            config,
        }
    }

    /// Lowercase, split on non-alphanumerics, drop tokens of length <= 2 and
    /// stopwords (§4.1, grounded on the ground-truth tokenizer).
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2 && !STOPWORDS.contains(t))
            .map(|t| t.to_string())
            .collect()
    }

    /// Build (or rebuild) the vocabulary and IDF table from a corpus.
    pub fn train(&mut self, corpus: &[String]) {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let mut seen = std::collections::HashSet::new();
            for tok in Self::tokenize(doc) {
                if seen.insert(tok.clone()) {
                    *doc_freq.entry(tok).or_insert(0) += 1;
                }
            }
        }
        let mut terms: Vec<&String> = doc_freq.keys().collect();
        terms.sort();
        self.vocabulary = terms
            .iter()
            .enumerate()
            .map(|(i, t)| ((*t).clone(), i))
            .collect();
        let n = corpus.len().max(1) as f32;
        self.idf = terms
            .iter()
            .map(|t| {
                let df = *doc_freq.get(**t).unwrap_or(&0) as f32;
                if df == 0.0 {
                    0.0
                } else {
                    (n / df).ln()
                }
            })
            .collect();
        self.trained = !self.vocabulary.is_empty();
        self.cache.clear();
    }

    /// Embed one piece of text, using the trained TF-IDF space when the
    /// engine has a non-empty vocabulary, otherwise the hash fallback.
    pub fn embed(&mut self, text: &str) -> Vec<f32> {
        if self.config.cache_embeddings {
            if let Some(cached) = self.cache.get(text) {
                return cached.clone();
            }
        }

        let vector = if self.trained {
            self.tfidf_embed(text)
        } else {
            self.hash_embed(text)
        };

        if self.config.cache_embeddings {
            if self.cache.len() >= self.config.max_cache_size {
                let drop: Vec<String> = self
                    .cache
                    .keys()
                    .take(self.config.max_cache_size / 2)
                    .cloned()
                    .collect();
                for k in drop {
                    self.cache.remove(&k);
                }
            }
            self.cache.insert(text.to_string(), vector.clone());
        }
        vector
    }

    fn tfidf_embed(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return self.hash_embed(text);
        }
        let mut tf: HashMap<&str, f32> = HashMap::new();
        for t in &tokens {
            *tf.entry(t.as_str()).or_insert(0.0) += 1.0;
        }
        let total = tokens.len() as f32;

        let mut sparse = vec![0.0f32; self.vocabulary.len()];
        for (term, count) in &tf {
            if let Some(&idx) = self.vocabulary.get(*term) {
                let tf_weight = (1.0 + count.ln()) / total;
                sparse[idx] = tf_weight * self.idf[idx];
            }
        }
        project_to_fixed_size(&sparse, self.config.vector_size)
    }

    /// MD5-seeded locality-sensitive hash: stable across processes, no
    /// training data required. Each of `vector_size` dimensions is derived
    /// from hashing `(text, dimension_index)`.
    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.config.vector_size);
        for i in 0..self.config.vector_size {
            let mut hasher = Md5::new();
            hasher.update(text.as_bytes());
            hasher.update(i.to_le_bytes());
            let digest = hasher.finalize();
            let bits: u32 = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
            let unit = bits as f32 / u32::MAX as f32;
            out.push(unit * 2.0 - 1.0);
        }
        normalise(&mut out);
        out
    }
}

/// Deterministically fold a sparse vector of arbitrary length into
/// `size` dimensions by summing each source dimension into
/// `index % size`, then L2-normalising.
fn project_to_fixed_size(sparse: &[f32], size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; size];
    for (i, v) in sparse.iter().enumerate() {
        out[i % size] += v;
    }
    normalise(&mut out);
    out
}

fn normalise(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two vectors of equal length.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    (dot / (na * nb)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embed_is_deterministic() {
        let mut e = Embedder::new(EmbedderConfig::default());
        let a = e.embed("hello world");
        let mut e2 = Embedder::new(EmbedderConfig {
            cache_embeddings: false,
            ..EmbedderConfig::default()
        });
        let b = e2.embed("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_embed_differs_for_different_text() {
        let mut e = Embedder::new(EmbedderConfig::default());
        let a = e.embed("rust programming");
        let b = e.embed("python programming");
        assert_ne!(a, b);
    }

    #[test]
    fn trained_embeddings_favor_matching_documents() {
        let corpus = vec![
            "rust ownership borrow checker".to_string(),
            "python dynamic typing duck typing".to_string(),
        ];
        let mut e = Embedder::new(EmbedderConfig::default());
        e.train(&corpus);
        let a = e.embed("rust ownership model");
        let b = e.embed("rust borrow checker rules");
        let c = e.embed("python duck typing");
        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.7071];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn cache_evicts_half_when_full() {
        let mut e = Embedder::new(EmbedderConfig {
            max_cache_size: 4,
            ..EmbedderConfig::default()
        });
        for i in 0..8 {
            e.embed(&format!("text {i}"));
        }
        assert!(e.cache.len() <= 4);
    }
}

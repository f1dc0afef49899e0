use std::collections::{BTreeMap, HashSet};

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Function words shared by every intent; they carry no signal for centroid scoring.
const STOP_WORDS: [&str; 42] = [
    "a", "an", "the", "is", "are", "am", "was", "to", "from", "of", "in", "on", "at", "for",
    "by", "and", "or", "i", "me", "my", "we", "it", "this", "that", "do", "does", "did",
    "there", "here", "what", "what's", "be", "can", "you", "please", "po", "ang", "ng", "sa",
    "si", "mga", "ba",
];

/// Lowercased alphanumeric terms; apostrophes stay inside a term.
pub(crate) fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|ch: char| !(ch.is_alphanumeric() || ch == '\''))
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
}

pub(crate) fn content_terms(text: &str) -> impl Iterator<Item = String> + '_ {
    terms(text).filter(|term| !STOP_WORDS.contains(&term.as_str()))
}

/// TF-IDF embedding over the content terms of a fitted corpus.
///
/// Terms outside the corpus are ignored, so unrelated text embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct TfIdfEmbeddingModel {
    index: BTreeMap<String, usize>,
    idf: Vec<f32>,
}

impl TfIdfEmbeddingModel {
    /// Smoothed IDF: `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut document_frequency = BTreeMap::<String, usize>::new();
        let mut documents_seen = 0_usize;

        for document in documents {
            documents_seen += 1;
            for term in content_terms(document).collect::<HashSet<_>>() {
                *document_frequency.entry(term).or_default() += 1;
            }
        }

        let n = documents_seen as f32;
        let mut index = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (position, (term, df)) in document_frequency.into_iter().enumerate() {
            index.insert(term, position);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }

        Self { index, idf }
    }

    pub fn dims(&self) -> usize {
        self.idf.len()
    }
}

impl EmbeddingModel for TfIdfEmbeddingModel {
    fn model_name(&self) -> &'static str {
        "tfidf-terms"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut weights = vec![0.0_f32; self.dims()];
        for term in content_terms(text) {
            if let Some(&slot) = self.index.get(&term) {
                weights[slot] += self.idf[slot];
            }
        }
        into_unit(weights)
    }
}

/// Scales to unit length; the zero vector is returned unchanged.
pub(crate) fn into_unit(mut values: Vec<f32>) -> Vec<f32> {
    let length = dot(&values, &values).sqrt();
    if length > 0.0 {
        values.iter_mut().for_each(|value| *value /= length);
    }
    values
}

/// Inner product; equals cosine similarity for unit vectors.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

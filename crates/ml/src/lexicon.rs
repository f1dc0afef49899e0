use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use commute_core::bio::CONTINUATION_MARKER;
use commute_core::tags::OUTSIDE_TAG;
use commute_core::{TagVocabulary, TaggedPiece};
use tracing::debug;

use crate::wordpiece::{SubWord, WordPieceSplitter, CLS_PIECE, SEP_PIECE};
use crate::TokenClassifier;

const DIRECTIONAL_KIND: &str = "LOCATION";

const DEFAULT_GAZETTEER: &str = r#"{
  "LOCATION": [
    "Manila", "Quezon City", "Cubao", "Makati", "Pasay", "Ortigas", "Monumento",
    "Baclaran", "Parañaque", "Taguig", "BGC", "Divisoria", "Quiapo", "Alabang",
    "Marikina", "Pasig", "SM North EDSA", "Fairview", "Lawton", "España", "St. Luke's"
  ],
  "TRANSPORT": ["jeep", "jeepney", "bus", "tricycle", "MRT", "LRT", "taxi", "UV Express", "P2P bus"],
  "ROUTE": ["EDSA Carousel", "EDSA", "Commonwealth Avenue", "Taft Avenue", "C5"],
  "DISCOUNT": ["student", "senior", "PWD"],
  "ATTRACTION": ["Intramuros", "Rizal Park", "Manila Ocean Park"]
}"#;

/// Unit words that turn a preceding number into a typed entity.
const UNIT_RULES: [(&str, &str); 12] = [
    ("pesos", "FARE"),
    ("peso", "FARE"),
    ("php", "FARE"),
    ("minutes", "TIME"),
    ("minute", "TIME"),
    ("mins", "TIME"),
    ("hours", "TIME"),
    ("hour", "TIME"),
    ("km", "DISTANCE"),
    ("kilometers", "DISTANCE"),
    ("kilometres", "DISTANCE"),
    ("meters", "DISTANCE"),
];

/// Separators allowed between digit groups of one number: decimals and thousands.
const NUMBER_SEPARATORS: [&str; 2] = [".", ","];

#[derive(Debug, Clone)]
struct GazetteerEntry {
    kind: String,
    phrase: String,
}

/// Typed place and transit phrases.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Gazetteer {
    pub fn from_json_str(raw: &str, vocabulary: &TagVocabulary) -> Result<Self> {
        let by_kind: BTreeMap<String, Vec<String>> =
            serde_json::from_str(raw).context("gazetteer must map entity types to phrase lists")?;

        let mut entries = Vec::new();
        for (kind, phrases) in by_kind {
            if !vocabulary.contains(&format!("B-{kind}")) {
                anyhow::bail!("gazetteer type {kind} has no B-{kind} tag");
            }
            entries.extend(
                phrases
                    .into_iter()
                    .map(|phrase| phrase.trim().to_string())
                    .filter(|phrase| !phrase.is_empty())
                    .map(|phrase| GazetteerEntry {
                        kind: kind.clone(),
                        phrase,
                    }),
            );
        }

        Ok(Self { entries })
    }

    pub fn from_json_file(path: impl AsRef<Path>, vocabulary: &TagVocabulary) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed reading gazetteer at {}", path.as_ref().display())
        })?;
        Self::from_json_str(&raw, vocabulary)
    }

    pub fn builtin(vocabulary: &TagVocabulary) -> Result<Self> {
        Self::from_json_str(DEFAULT_GAZETTEER, vocabulary)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every phrase as written, for seeding a piece vocabulary.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.phrase.as_str())
    }
}

/// A pre-token: a run of pieces starting at a non-continuation piece.
#[derive(Debug)]
struct Word {
    key: String,
    token_index: usize,
    pieces: Range<usize>,
}

#[derive(Debug, Clone)]
struct CompiledPhrase {
    kind: String,
    keys: Vec<String>,
}

/// Gazetteer-driven token classifier producing BERT-style tagged word pieces.
#[derive(Debug, Clone)]
pub struct LexiconTokenTagger {
    vocabulary: TagVocabulary,
    phrases: Vec<CompiledPhrase>,
    splitter: WordPieceSplitter,
}

impl LexiconTokenTagger {
    /// Phrases go through the same splitter as queries, so punctuation inside a phrase
    /// lines up with the query's pieces.
    pub fn new(
        vocabulary: TagVocabulary,
        gazetteer: Gazetteer,
        splitter: WordPieceSplitter,
    ) -> Result<Self> {
        let mut phrases = Vec::with_capacity(gazetteer.len());
        for entry in gazetteer.entries {
            let tokens = entry
                .phrase
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>();
            let pieces = splitter.split(&tokens)?;
            let keys = group_words(&splitter, &pieces)?
                .into_iter()
                .map(|word| word.key)
                .collect::<Vec<_>>();
            if keys.is_empty() {
                continue;
            }
            phrases.push(CompiledPhrase {
                kind: entry.kind,
                keys,
            });
        }
        // Stable: equal lengths keep file order.
        phrases.sort_by(|a, b| b.keys.len().cmp(&a.keys.len()));

        Ok(Self {
            vocabulary,
            phrases,
            splitter,
        })
    }

    /// Built-in transit vocabulary and gazetteer, with gazetteer words added to the piece vocab.
    pub fn builtin() -> Result<Self> {
        let vocabulary = TagVocabulary::transit();
        let gazetteer = Gazetteer::builtin(&vocabulary)?;
        let splitter = WordPieceSplitter::with_base_vocab(gazetteer.phrases())?;
        Self::new(vocabulary, gazetteer, splitter)
    }

    fn longest_match(&self, words: &[Word], start: usize) -> Option<&CompiledPhrase> {
        self.phrases.iter().find(|phrase| {
            let end = start + phrase.keys.len();
            end <= words.len()
                && words[start..end]
                    .iter()
                    .zip(&phrase.keys)
                    .all(|(word, key)| word.key == *key)
        })
    }

    fn word_tags(&self, words: &[Word]) -> Vec<String> {
        let mut tags = vec![OUTSIDE_TAG.to_string(); words.len()];
        let mut idx = 0;

        while idx < words.len() {
            if let Some(phrase) = self.longest_match(words, idx) {
                let kind = self.directional_kind(&phrase.kind, words, idx);
                let span = phrase.keys.len();
                self.tag_span(&mut tags[idx..idx + span], kind);
                idx += span;
                continue;
            }

            if let Some((end, kind)) = unit_span(words, idx) {
                self.tag_span(&mut tags[idx..end], kind);
                idx = end;
                continue;
            }

            idx += 1;
        }

        tags
    }

    fn tag_span(&self, tags: &mut [String], kind: &str) {
        if let Some((first, rest)) = tags.split_first_mut() {
            *first = format!("B-{kind}");
            for tag in rest {
                *tag = self.inside_tag(kind);
            }
        }
    }

    fn directional_kind<'k>(&self, kind: &'k str, words: &[Word], idx: usize) -> &'k str {
        if kind != DIRECTIONAL_KIND || idx == 0 {
            return kind;
        }
        match words[idx - 1].key.as_str() {
            "to" | "papunta" | "papuntang" | "towards" => "DESTINATION",
            "from" | "galing" | "mula" => "ORIGIN",
            _ => kind,
        }
    }

    fn inside_tag(&self, kind: &str) -> String {
        let tag = format!("I-{kind}");
        if self.vocabulary.contains(&tag) {
            tag
        } else {
            OUTSIDE_TAG.to_string()
        }
    }
}

impl TokenClassifier for LexiconTokenTagger {
    fn model_name(&self) -> &'static str {
        "lexicon-tagger"
    }

    fn vocabulary(&self) -> &TagVocabulary {
        &self.vocabulary
    }

    fn tag(&self, tokens: &[String]) -> Result<Vec<TaggedPiece>> {
        let sub_words = self.splitter.split(tokens)?;
        let words = group_words(&self.splitter, &sub_words)?;
        let word_tags = self.word_tags(&words);

        let unknown = sub_words.iter().filter(|sub| sub.is_unknown()).count();
        if unknown > 0 {
            debug!(unknown, pieces = sub_words.len(), "pieces outside the vocabulary");
        }

        let mut pieces = vec![TaggedPiece::new(CLS_PIECE, OUTSIDE_TAG)];
        for (word, tag) in words.iter().zip(&word_tags) {
            // Later pieces of an entity word carry the matching I- tag.
            let continuation_tag = match tag.strip_prefix("B-").or_else(|| tag.strip_prefix("I-")) {
                Some(kind) => self.inside_tag(kind),
                None => OUTSIDE_TAG.to_string(),
            };
            for idx in word.pieces.clone() {
                let piece_tag = if idx == word.pieces.start {
                    tag.clone()
                } else {
                    continuation_tag.clone()
                };
                let glued = idx > 0 && sub_words[idx - 1].token_index == sub_words[idx].token_index;
                let text = if glued {
                    format!("{CONTINUATION_MARKER}{}", sub_words[idx].text)
                } else {
                    sub_words[idx].text.clone()
                };
                pieces.push(TaggedPiece::new(text, piece_tag));
            }
        }
        pieces.push(TaggedPiece::new(SEP_PIECE, OUTSIDE_TAG));

        Ok(pieces)
    }
}

/// Groups pieces into pre-tokens keyed by their folded surface text.
fn group_words(splitter: &WordPieceSplitter, sub_words: &[SubWord]) -> Result<Vec<Word>> {
    let mut words = Vec::new();
    let mut start = 0;
    while start < sub_words.len() {
        let token_index = sub_words[start].token_index;
        let mut end = start + 1;
        while end < sub_words.len()
            && sub_words[end].is_continuation()
            && sub_words[end].token_index == token_index
        {
            end += 1;
        }

        let surface = sub_words[start..end]
            .iter()
            .map(|sub| sub.text.as_str())
            .collect::<String>();
        words.push(Word {
            key: splitter.fold(&surface)?,
            token_index,
            pieces: start..end,
        });
        start = end;
    }
    Ok(words)
}

fn is_digits(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|ch| ch.is_ascii_digit())
}

/// A number (`13`, `13.50`, `1,200`) written inside one token, followed by a unit word.
/// Returns the exclusive end of the span, unit included.
fn unit_span(words: &[Word], start: usize) -> Option<(usize, &'static str)> {
    let first = words.get(start)?;
    if !is_digits(&first.key) {
        return None;
    }

    let mut end = start + 1;
    while let (Some(separator), Some(group)) = (words.get(end), words.get(end + 1)) {
        let same_token =
            separator.token_index == first.token_index && group.token_index == first.token_index;
        let joins = NUMBER_SEPARATORS.contains(&separator.key.as_str()) && is_digits(&group.key);
        if !(same_token && joins) {
            break;
        }
        end += 2;
    }

    let unit = words.get(end)?;
    UNIT_RULES
        .iter()
        .find(|(word, _)| *word == unit.key)
        .map(|(_, kind)| (end + 1, *kind))
}

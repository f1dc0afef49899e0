use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use commute_core::bio::CONTINUATION_MARKER;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{NormalizedString, Normalizer, TokenizerBuilder, TokenizerImpl};

pub const UNKNOWN_PIECE: &str = "[UNK]";
pub const CLS_PIECE: &str = "[CLS]";
pub const SEP_PIECE: &str = "[SEP]";

const MAX_CHARS_PER_WORD: usize = 100;

const BASE_WORDS: [&str; 48] = [
    "the", "a", "an", "to", "from", "and", "or", "is", "are", "what", "how", "where", "when",
    "which", "much", "long", "far", "fare", "route", "ride", "get", "go", "going", "there",
    "here", "take", "will", "it", "i", "me", "my", "for", "by", "via", "at", "in", "on", "near",
    "time", "minutes", "hours", "pesos", "km", "jeep", "bus", "train", "station", "stop",
];

const PUNCTUATION: [&str; 13] = [
    "?", "!", ".", ",", "'", "-", ";", "&", ":", "/", "(", ")", "\"",
];

const SUFFIXES: [&str; 10] = ["s", "es", "ing", "ed", "er", "ila", "ao", "ati", "ay", "que"];

type BertWordPiece = TokenizerImpl<
    WordPiece,
    BertNormalizer,
    BertPreTokenizer,
    PostProcessorWrapper,
    DecoderWrapper,
>;

/// One word piece aligned back to the whitespace token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubWord {
    /// Vocabulary entry, `##` prefixed for continuations or `[UNK]`.
    pub piece: String,
    /// Caller's text covered by the piece.
    pub text: String,
    pub token_index: usize,
}

impl SubWord {
    pub fn is_continuation(&self) -> bool {
        self.piece.starts_with(CONTINUATION_MARKER)
    }

    pub fn is_unknown(&self) -> bool {
        self.piece == UNKNOWN_PIECE
    }
}

/// BERT uncased word-piece tokenizer over pre-split whitespace tokens.
#[derive(Clone)]
pub struct WordPieceSplitter {
    tokenizer: Arc<BertWordPiece>,
}

impl fmt::Debug for WordPieceSplitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordPieceSplitter")
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}

impl WordPieceSplitter {
    /// Builds a vocabulary from distinct pieces; the special pieces are always present.
    pub fn new(pieces: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut distinct = pieces.into_iter().collect::<BTreeSet<_>>();
        for special in [UNKNOWN_PIECE, CLS_PIECE, SEP_PIECE] {
            distinct.insert(special.to_string());
        }

        let model = WordPiece::builder()
            .vocab(
                distinct
                    .into_iter()
                    .enumerate()
                    .map(|(id, piece)| (piece, id as u32))
                    .collect(),
            )
            .unk_token(UNKNOWN_PIECE.to_string())
            .continuing_subword_prefix(CONTINUATION_MARKER.to_string())
            .max_input_chars_per_word(MAX_CHARS_PER_WORD)
            .build()
            .map_err(|err| anyhow!("invalid word-piece vocabulary: {err}"))?;
        Self::from_model(model)
    }

    /// Base vocabulary: common transit words, punctuation, every single letter and digit
    /// (whole and continuation), a few frequent suffixes, and the alphanumeric runs of any
    /// extra text supplied.
    pub fn with_base_vocab<'a>(extra_text: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut pieces = BASE_WORDS
            .iter()
            .chain(PUNCTUATION.iter())
            .map(|word| word.to_string())
            .collect::<Vec<_>>();
        for ch in ('a'..='z').chain('0'..='9') {
            pieces.push(ch.to_string());
            pieces.push(format!("{CONTINUATION_MARKER}{ch}"));
        }
        pieces.extend(
            SUFFIXES
                .iter()
                .map(|suffix| format!("{CONTINUATION_MARKER}{suffix}")),
        );
        for text in extra_text {
            let folded = fold_text(text)?;
            pieces.extend(
                folded
                    .split(|ch: char| !ch.is_alphanumeric())
                    .filter(|run| !run.is_empty())
                    .map(str::to_string),
            );
        }
        Self::new(pieces)
    }

    /// Reads a `vocab.txt` style file: one piece per line, line number as id.
    pub fn from_vocab_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let location = path
            .to_str()
            .with_context(|| format!("word-piece vocab path {} is not utf-8", path.display()))?;
        let model = WordPiece::from_file(location)
            .unk_token(UNKNOWN_PIECE.to_string())
            .continuing_subword_prefix(CONTINUATION_MARKER.to_string())
            .build()
            .map_err(|err| anyhow!("failed reading word-piece vocab at {location}: {err}"))?;
        Self::from_model(model)
    }

    fn from_model(model: WordPiece) -> Result<Self> {
        let tokenizer: BertWordPiece = TokenizerBuilder::new()
            .with_model(model)
            .with_normalizer(Some(BertNormalizer::default()))
            .with_pre_tokenizer(Some(BertPreTokenizer))
            .with_post_processor(None)
            .with_decoder(None)
            .build()
            .map_err(|err| anyhow!("failed assembling word-piece tokenizer: {err}"))?;
        Ok(Self {
            tokenizer: Arc::new(tokenizer),
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    /// Splits whitespace tokens into word pieces. Punctuation inside a token becomes its own
    /// piece; `text` keeps the caller's casing and accents.
    pub fn split(&self, tokens: &[String]) -> Result<Vec<SubWord>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let words = tokens.iter().map(String::as_str).collect::<Vec<_>>();
        let encoding = self
            .tokenizer
            .encode(words.as_slice(), false)
            .map_err(|err| anyhow!("word-piece encoding failed: {err}"))?;

        encoding
            .get_tokens()
            .iter()
            .zip(encoding.get_word_ids())
            .zip(encoding.get_offsets())
            .map(|((piece, word_id), &(start, end))| {
                let token_index = word_id
                    .map(|id| id as usize)
                    .filter(|&idx| idx < tokens.len())
                    .with_context(|| format!("piece {piece} is not aligned to an input token"))?;
                let text = tokens[token_index]
                    .get(start..end)
                    .unwrap_or_else(|| piece.trim_start_matches(CONTINUATION_MARKER));
                Ok(SubWord {
                    piece: piece.clone(),
                    text: text.to_string(),
                    token_index,
                })
            })
            .collect()
    }

    /// Lookup form of a surface string: lowercased with accents stripped.
    pub fn fold(&self, text: &str) -> Result<String> {
        match self.tokenizer.get_normalizer() {
            Some(normalizer) => normalize_with(normalizer, text),
            None => Ok(text.to_string()),
        }
    }
}

fn fold_text(text: &str) -> Result<String> {
    normalize_with(&BertNormalizer::default(), text)
}

fn normalize_with(normalizer: &BertNormalizer, text: &str) -> Result<String> {
    let mut normalized = NormalizedString::from(text);
    normalizer
        .normalize(&mut normalized)
        .map_err(|err| anyhow!("failed normalizing {text:?}: {err}"))?;
    Ok(normalized.get().to_string())
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;

    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn splitter() -> WordPieceSplitter {
        WordPieceSplitter::with_base_vocab(["man", "Cubao", "Parañaque"]).unwrap()
    }

    fn pieces(sub_words: &[SubWord]) -> Vec<&str> {
        sub_words.iter().map(|sub| sub.piece.as_str()).collect()
    }

    fn texts(sub_words: &[SubWord]) -> Vec<&str> {
        sub_words.iter().map(|sub| sub.text.as_str()).collect()
    }

    #[test]
    fn whole_words_stay_single_pieces() {
        let split = splitter().split(&tokens("Cubao Fare")).unwrap();
        assert_eq!(pieces(&split), vec!["cubao", "fare"]);
        assert_eq!(texts(&split), vec!["Cubao", "Fare"]);
        assert_eq!(split[1].token_index, 1);
    }

    #[test]
    fn splits_with_continuation_marker() {
        let split = splitter().split(&tokens("Manila")).unwrap();
        assert_eq!(pieces(&split), vec!["man", "##ila"]);
        assert_eq!(texts(&split), vec!["Man", "ila"]);
        assert!(split[1].is_continuation());
    }

    #[test]
    fn accents_fold_but_text_keeps_them() {
        let split = splitter().split(&tokens("Parañaque")).unwrap();
        assert_eq!(pieces(&split), vec!["paranaque"]);
        assert_eq!(texts(&split), vec!["Parañaque"]);
    }

    #[test]
    fn punctuation_is_its_own_piece_within_the_token() {
        let split = splitter().split(&tokens("to Manila?")).unwrap();
        let question = split.last().unwrap();
        assert_eq!(question.piece, "?");
        assert_eq!(question.token_index, 1);
        assert!(!question.is_continuation());
    }

    #[test]
    fn uncoverable_word_becomes_unknown() {
        let split = splitter().split(&tokens("東")).unwrap();
        assert_eq!(split.len(), 1);
        assert!(split[0].is_unknown());
        assert_eq!(split[0].text, "東");
    }

    #[test]
    fn empty_input_has_no_pieces() {
        assert!(splitter().split(&[]).unwrap().is_empty());
    }

    #[test]
    fn fold_lowercases_and_strips_accents() {
        assert_eq!(splitter().fold("España").unwrap(), "espana");
    }

    #[test]
    fn loads_vocab_file() {
        let path = env::temp_dir().join(format!("commute-vocab-{}.txt", std::process::id()));
        fs::write(&path, "[UNK]\ncubao\n##s\n").unwrap();

        let splitter = WordPieceSplitter::from_vocab_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(splitter.vocab_size(), 3);
        let split = splitter.split(&tokens("Cubaos Pasay")).unwrap();
        assert_eq!(pieces(&split), vec!["cubao", "##s", UNKNOWN_PIECE]);
    }
}

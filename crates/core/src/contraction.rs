use crate::error::CoreError;

pub const PLACEHOLDER_TAG: &str = "O";

const CONTRACTIONS: [(&str, [&str; 2]); 5] = [
    ("what's", ["What", "'s"]),
    ("how's", ["How", "'s"]),
    ("isn't", ["is", "n't"]),
    ("doesn't", ["does", "n't"]),
    ("can't", ["can", "n't"]),
];

fn expansion_for(token: &str) -> Option<[&'static str; 2]> {
    let lower = token.to_lowercase();
    CONTRACTIONS
        .iter()
        .find(|(contraction, _)| *contraction == lower)
        .map(|(_, expansion)| *expansion)
}

/// Splits the known contractions into two tokens, copying the token's tag onto both halves.
///
/// Every token needs exactly one tag; a length mismatch is an error rather than a truncation.
pub fn expand_contractions<T: Clone>(
    tokens: &[String],
    tags: &[T],
) -> Result<(Vec<String>, Vec<T>), CoreError> {
    if tokens.len() != tags.len() {
        return Err(CoreError::TagCountMismatch {
            tokens: tokens.len(),
            tags: tags.len(),
        });
    }
    Ok(expand_pairs(tokens.iter().zip(tags)))
}

/// Whitespace-splits an utterance and expands contractions ahead of token classification.
pub fn normalize_utterance(utterance: &str) -> Vec<String> {
    let tokens = utterance
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>();
    expand_pairs(tokens.iter().map(|token| (token, &PLACEHOLDER_TAG))).0
}

fn expand_pairs<'a, T: Clone + 'a>(
    pairs: impl Iterator<Item = (&'a String, &'a T)>,
) -> (Vec<String>, Vec<T>) {
    let mut out_tokens = Vec::new();
    let mut out_tags = Vec::new();

    for (token, tag) in pairs {
        match expansion_for(token) {
            Some([head, tail]) => {
                out_tokens.push(head.to_string());
                out_tokens.push(tail.to_string());
                out_tags.push(tag.clone());
                out_tags.push(tag.clone());
            }
            None => {
                out_tokens.push(token.clone());
                out_tags.push(tag.clone());
            }
        }
    }

    (out_tokens, out_tags)
}

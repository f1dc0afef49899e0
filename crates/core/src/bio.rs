use crate::models::{EntityMap, TaggedPiece};
use crate::tags::{Tag, TagVocabulary};

pub const CONTINUATION_MARKER: &str = "##";

const SPECIAL_PIECES: [&str; 6] = ["[CLS]", "[SEP]", "[PAD]", "<s>", "</s>", "<pad>"];

pub fn is_special_piece(piece: &str) -> bool {
    SPECIAL_PIECES.contains(&piece)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SpanState {
    Idle,
    Open { kind: String, text: String },
}

/// Decodes BIO-tagged sub-word pieces into entity spans grouped by type.
#[derive(Debug)]
pub struct EntityDecoder<'a> {
    vocabulary: &'a TagVocabulary,
    state: SpanState,
    entities: EntityMap,
}

impl<'a> EntityDecoder<'a> {
    pub fn new(vocabulary: &'a TagVocabulary) -> Self {
        Self {
            vocabulary,
            state: SpanState::Idle,
            entities: EntityMap::new(),
        }
    }

    pub fn push(&mut self, piece: &str, tag: &str) {
        if is_special_piece(piece) {
            return;
        }

        match self.vocabulary.resolve(tag) {
            Tag::Begin(kind) => {
                self.flush();
                self.state = SpanState::Open {
                    kind,
                    text: strip_marker(piece).to_string(),
                };
            }
            Tag::Inside(kind) => {
                if let SpanState::Open {
                    kind: open_kind,
                    text,
                } = &mut self.state
                {
                    if *open_kind == kind {
                        append_piece(text, piece);
                        return;
                    }
                }
                self.flush();
            }
            Tag::Outside => self.flush(),
        }
    }

    pub fn finish(mut self) -> EntityMap {
        self.flush();
        self.entities
    }

    fn flush(&mut self) {
        if let SpanState::Open { kind, text } = std::mem::replace(&mut self.state, SpanState::Idle)
        {
            self.entities.entry(kind).or_default().push(text);
        }
    }
}

pub fn decode_entities(pieces: &[TaggedPiece], vocabulary: &TagVocabulary) -> EntityMap {
    let mut decoder = EntityDecoder::new(vocabulary);
    for piece in pieces {
        decoder.push(&piece.piece, &piece.tag);
    }
    decoder.finish()
}

fn strip_marker(piece: &str) -> &str {
    piece.strip_prefix(CONTINUATION_MARKER).unwrap_or(piece)
}

/// Continuation pieces glue onto the previous word; new words are space separated.
fn append_piece(text: &mut String, piece: &str) {
    match piece.strip_prefix(CONTINUATION_MARKER) {
        Some(rest) => text.push_str(rest),
        None => {
            text.push(' ');
            text.push_str(piece);
        }
    }
}

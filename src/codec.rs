//! Flowsheet codec: equipment sequences to and from compact strings.
//!
//! A flowsheet string is the concatenation of the codes of its equipment
//! kinds, without separators. Decoding splits the text into tokens of the
//! form "one uppercase letter or digit, followed by zero or more lowercase
//! letters" and resolves each token by exact code match. Because the
//! registry only admits codes that are single tokens, and codes are unique,
//! `decode(encode(s)) == s` for every sequence drawn from the registry.
//!
//! # Example
//!
//! ```
//! use flowsynth::codec::{FlowsheetCodec, simplify};
//! use flowsynth::registry::EquipmentRegistry;
//!
//! let registry = EquipmentRegistry::standard();
//! let codec = FlowsheetCodec::new(&registry);
//!
//! let kinds = codec.decode("FTHxaCCompHxaHPEnd").unwrap();
//! assert_eq!(kinds.len(), 9);
//! assert_eq!(codec.encode(&kinds).unwrap(), "FTHxaCCompHxaHPEnd");
//!
//! // Lossy projection for compact logs
//! assert_eq!(simplify("FTHxaCCompHxaHPEnd"), "FTHxCCompHxHP");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::registry::{EquipmentKind, EquipmentRegistry};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z0-9][a-z]*").expect("flowsheet token pattern is a valid regex")
});

/// Errors raised by the flowsheet codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Token has no matching equipment code
    #[error("Unknown flowsheet token '{token}' at offset {offset}")]
    UnknownToken { token: String, offset: usize },
    /// Character cannot start a token (e.g. a stray lowercase letter)
    #[error("Unexpected character {character:?} at offset {offset}")]
    UnexpectedCharacter { character: char, offset: usize },
    /// Kind does not belong to the codec's registry
    #[error("Equipment kind {0} is not registered")]
    UnregisteredKind(EquipmentKind),
}

/// A token of a flowsheet string together with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub offset: usize,
}

/// Splits a flowsheet string into grammar tokens.
///
/// Characters that cannot start a token are skipped, which matches the
/// behavior expected by [`simplify`]. Use [`FlowsheetCodec::decode`] for a
/// strict parse.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str(),
            offset: m.start(),
        })
        .collect()
}

/// Strict tokenizer: every character must belong to a token.
fn tokenize_strict(text: &str) -> Result<Vec<Token<'_>>, CodecError> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for m in TOKEN_RE.find_iter(text) {
        if m.start() != cursor {
            return Err(unexpected_at(text, cursor));
        }
        tokens.push(Token {
            text: m.as_str(),
            offset: m.start(),
        });
        cursor = m.end();
    }

    if cursor != text.len() {
        return Err(unexpected_at(text, cursor));
    }
    Ok(tokens)
}

fn unexpected_at(text: &str, offset: usize) -> CodecError {
    let character = text[offset..].chars().next().unwrap_or('\u{FFFD}');
    CodecError::UnexpectedCharacter { character, offset }
}

/// Encoder/decoder bound to one equipment registry.
#[derive(Debug, Clone, Copy)]
pub struct FlowsheetCodec<'r> {
    registry: &'r EquipmentRegistry,
}

impl<'r> FlowsheetCodec<'r> {
    /// Creates a codec over `registry`.
    pub fn new(registry: &'r EquipmentRegistry) -> Self {
        FlowsheetCodec { registry }
    }

    /// Concatenates the codes of `kinds` in order.
    pub fn encode(&self, kinds: &[EquipmentKind]) -> Result<String, CodecError> {
        let mut out = String::with_capacity(kinds.len() * 2);
        for &kind in kinds {
            let spec = self.registry.spec(kind).ok_or(CodecError::UnregisteredKind(kind))?;
            out.push_str(&spec.code);
        }
        Ok(out)
    }

    /// Parses a flowsheet string back into equipment kinds.
    ///
    /// Fails on the first token without a matching code, or on the first
    /// character that cannot start a token.
    pub fn decode(&self, text: &str) -> Result<Vec<EquipmentKind>, CodecError> {
        tokenize_strict(text)?
            .into_iter()
            .map(|token| {
                self.registry.kind_of_code(token.text).ok_or_else(|| CodecError::UnknownToken {
                    token: token.text.to_string(),
                    offset: token.offset,
                })
            })
            .collect()
    }

    /// Encodes and then simplifies.
    pub fn encode_simplified(&self, kinds: &[EquipmentKind]) -> Result<String, CodecError> {
        self.encode(kinds).map(|text| simplify(&text))
    }
}

/// Lossy projection of a flowsheet string for compact logging.
///
/// Per token:
/// - `H`, `C`, `F`, `P` tokens are kept verbatim, except `H` followed by `x`
///   which collapses to `Hx`
/// - digit tokens (`1`, `2`, `3`) become the bare digit, or `-digit` when the
///   rest of the token is exactly `s`
/// - any other token keeps only its leading symbol
///
/// The final character is dropped; a well-formed flowsheet ends with `End`,
/// whose `E` is the character removed. There is no inverse.
pub fn simplify(text: &str) -> String {
    let mut simplified = String::with_capacity(text.len());

    for token in tokenize(text) {
        let mut chars = token.text.chars();
        let Some(base) = chars.next() else { continue };
        let rest = chars.as_str();

        match base {
            'H' if rest.starts_with('x') => simplified.push_str("Hx"),
            'H' | 'C' | 'F' | 'P' => simplified.push_str(token.text),
            '1' | '2' | '3' => {
                if rest == "s" {
                    simplified.push('-');
                }
                simplified.push(base);
            }
            _ => simplified.push(base),
        }
    }

    simplified.pop();
    simplified
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference flowsheets for the DME synthesis case studies.
    const TRIAL_STRINGS: &[(&str, &str)] = &[
        ("CstrD", "F1cMHCstrCstrCDcrP1sPump1eEnd"),
        ("PfrD", "F1cMHPfrCDcrP1sPump1eEnd"),
        ("Ned1", "FTHxaCCompHxaHPEnd"),
        ("Ned2", "FTHxaCCompSH1cMHP1sHxa1eEnd"),
        ("Ned3", "FTHxaCCompHSH1cMHP1sHxa1eEnd"),
        ("Ned4", "FTHxa2cMHxbCCompSH1cMSHP1sHxa1e2sHxbT2eEnd"),
        ("Ned5", "FTHxa2cMHxbCCompSH1cMSH3cMHP1sHxb1e2sHxaST2e3s3eEnd"),
    ];

    fn kinds(registry: &EquipmentRegistry, codes: &[&str]) -> Vec<EquipmentKind> {
        codes.iter().map(|c| registry.kind_of_code(c).unwrap()).collect()
    }

    #[test]
    fn test_encode_heater_splitter() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);
        let seq = kinds(&registry, &["H", "S"]);

        assert_eq!(codec.encode(&seq).unwrap(), "HS");
        assert_eq!(codec.decode("HS").unwrap(), seq);
    }

    #[test]
    fn test_trial_strings_round_trip() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);

        for (name, text) in TRIAL_STRINGS {
            let decoded = codec.decode(text).unwrap_or_else(|e| panic!("{}: {}", name, e));
            assert_eq!(codec.encode(&decoded).unwrap(), *text, "{}", name);
        }
    }

    #[test]
    fn test_decode_multi_character_tokens() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);

        let decoded = codec.decode("HxaHxHDcrDc1s1cEnd").unwrap();
        assert_eq!(decoded, kinds(&registry, &["Hxa", "Hx", "H", "Dcr", "Dc", "1s", "1c", "End"]));
    }

    #[test]
    fn test_decode_empty() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);
        assert!(codec.decode("").unwrap().is_empty());
        assert_eq!(codec.encode(&[]).unwrap(), "");
    }

    #[test]
    fn test_unknown_token_reports_offset() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);

        assert_eq!(
            codec.decode("FHxqEnd"),
            Err(CodecError::UnknownToken {
                token: "Hxq".to_string(),
                offset: 1,
            })
        );
        assert_eq!(
            codec.decode("FTZEnd"),
            Err(CodecError::UnknownToken {
                token: "Z".to_string(),
                offset: 2,
            })
        );
    }

    #[test]
    fn test_unexpected_character() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);

        assert_eq!(
            codec.decode("xF"),
            Err(CodecError::UnexpectedCharacter {
                character: 'x',
                offset: 0,
            })
        );
        assert_eq!(
            codec.decode("FH-End"),
            Err(CodecError::UnexpectedCharacter {
                character: '-',
                offset: 2,
            })
        );
        assert_eq!(
            codec.decode("FEnd "),
            Err(CodecError::UnexpectedCharacter {
                character: ' ',
                offset: 4,
            })
        );
    }

    #[test]
    fn test_encode_unregistered_kind() {
        let registry = EquipmentRegistry::standard();
        let codec = FlowsheetCodec::new(&registry);
        assert_eq!(
            codec.encode(&[EquipmentKind(0), EquipmentKind(999)]),
            Err(CodecError::UnregisteredKind(EquipmentKind(999)))
        );
    }

    #[test]
    fn test_simplify_trial_strings() {
        assert_eq!(simplify("FTHxaCCompHxaHPEnd"), "FTHxCCompHxHP");
        assert_eq!(simplify("F1cMHCstrCstrCDcrP1sPump1eEnd"), "F1MHCstrCstrCDP-1Pump1");
        assert_eq!(
            simplify("FTHxa2cMHxbCCompSH1cMSHP1sHxa1e2sHxbT2eEnd"),
            "FTHx2MHxCCompSH1MSHP-1Hx1-2HxT2"
        );
    }

    #[test]
    fn test_simplify_drops_last_character() {
        assert_eq!(simplify("HS"), "H");
        assert_eq!(simplify("End"), "");
        assert_eq!(simplify(""), "");
    }

    #[test]
    fn test_tokenize_offsets() {
        let tokens = tokenize("FHxa1sEnd");
        let pairs: Vec<(&str, usize)> = tokens.iter().map(|t| (t.text, t.offset)).collect();
        assert_eq!(pairs, vec![("F", 0), ("Hxa", 1), ("1s", 4), ("End", 6)]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_sequence(len: usize) -> impl Strategy<Value = Vec<EquipmentKind>> {
        prop::collection::vec((0..len).prop_map(EquipmentKind), 0..40)
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(seq in arb_sequence(EquipmentRegistry::standard().len())) {
            let registry = EquipmentRegistry::standard();
            let codec = FlowsheetCodec::new(&registry);
            let text = codec.encode(&seq).unwrap();
            prop_assert_eq!(codec.decode(&text).unwrap(), seq);
        }
    }
}

//! Subcommand implementations.

pub mod embed;
pub mod inspect;
pub mod matching;
pub mod search;

use image2vec::Emotion;

/// Parse an optional mood label; no label means no offset.
pub fn parse_emotion(label: Option<&str>) -> Emotion {
    match label {
        Some(label) => Emotion::from(label.to_string()),
        None => Emotion::Other(String::new()),
    }
}

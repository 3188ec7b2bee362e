//! Content transforms applied to text while recreating a document.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Something that rewrites run text.
///
/// Implemented for plain closures so callers can pass `|t: &str| t.to_uppercase()`.
pub trait TextProcessor {
    fn process(&self, text: &str) -> String;
}

impl<F> TextProcessor for F
where
    F: Fn(&str) -> String,
{
    fn process(&self, text: &str) -> String {
        self(text)
    }
}

/// Built-in transforms selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Leave text unchanged.
    #[default]
    Identity,
    Uppercase,
    Lowercase,
}

impl Transform {
    /// Short name used in output file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
        }
    }
}

impl TextProcessor for Transform {
    fn process(&self, text: &str) -> String {
        match self {
            Self::Identity => text.to_string(),
            Self::Uppercase => text.to_uppercase(),
            Self::Lowercase => text.to_lowercase(),
        }
    }
}

impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identity" | "none" => Ok(Self::Identity),
            "upper" | "uppercase" => Ok(Self::Uppercase),
            "lower" | "lowercase" => Ok(Self::Lowercase),
            other => Err(Error::UnknownTransform(other.to_string())),
        }
    }
}

/// Apply `processor` to `text` if one is given.
pub fn process_text(text: &str, processor: Option<&dyn TextProcessor>) -> String {
    match processor {
        Some(p) => p.process(text),
        None => text.to_string(),
    }
}

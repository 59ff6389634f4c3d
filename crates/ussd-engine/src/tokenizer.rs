//! Input tokenizer.
//!
//! Splits the accumulated gateway text into step tokens. Tokens are not
//! interpreted here; a malformed token is still a token.

/// Splits accumulated input on the configured delimiter.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    delimiter: String,
}

impl Tokenizer {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Ordered, non-empty tokens of `text`. Empty text yields no tokens.
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split(self.delimiter.as_str())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new("*")
    }
}

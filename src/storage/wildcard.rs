use crate::error::Result;
use regex::Regex;

/// Case-insensitive `*` / `?` matcher used to scope storage searches.
///
/// `/` and `\` are interchangeable on both sides of the match.
#[derive(Debug, Clone)]
pub struct Wildcard {
    pattern: String,
    regex: Regex,
}

impl Wildcard {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 8);
        expr.push_str("(?is)^");

        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                '\\' | '/' => expr.push('/'),
                c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');

        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn is_match(&self, name: &str) -> bool {
        if name.contains('\\') {
            self.regex.is_match(&name.replace('\\', "/"))
        } else {
            self.regex.is_match(name)
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

//! Query string parsing.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// A conjunctive query: every term must match.
///
/// A term holding several space-separated tokens is a phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    raw: String,
    terms: Vec<String>,
}

impl Query {
    /// Parse a query string.
    ///
    /// Terms are separated by whitespace or `+`. A double-quoted span is a
    /// single phrase term; an unterminated quote runs to the end of the input.
    /// Repeated terms are kept once.
    pub fn parse(input: &str) -> Self {
        let mut terms: Vec<String> = Vec::new();
        let mut chars = input.chars().peekable();

        while let Some(term) = next_term(&mut chars) {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }

        Query {
            raw: input.to_string(),
            terms,
        }
    }

    /// Build a query from terms that are already split.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms: Vec<String> = terms.into_iter().map(Into::into).collect();
        Query {
            raw: terms.join(" "),
            terms,
        }
    }

    /// The text the query was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Terms in query order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the query has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Drop a term. Returns whether it was present.
    pub fn remove_term(&mut self, term: &str) -> bool {
        let before = self.terms.len();
        self.terms.retain(|t| t != term);
        self.terms.len() != before
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if is_phrase(term) {
                write!(f, "\"{term}\"")?;
            } else {
                f.write_str(term)?;
            }
        }
        Ok(())
    }
}

/// Whether a query term is a phrase.
pub fn is_phrase(term: &str) -> bool {
    term.contains(char::is_whitespace)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '+'
}

fn next_term(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    loop {
        while chars.next_if(|&c| is_separator(c)).is_some() {}

        match chars.peek()? {
            '"' => {
                chars.next();
                let mut phrase = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    phrase.push(c);
                }
                let tokens: Vec<&str> = phrase.split_whitespace().collect();
                if !tokens.is_empty() {
                    return Some(tokens.join(" "));
                }
            }
            _ => {
                let mut term = String::new();
                while let Some(c) = chars.next_if(|&c| !is_separator(c) && c != '"') {
                    term.push(c);
                }
                return Some(term);
            }
        }
    }
}

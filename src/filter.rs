//! Keyword classification oracle.
//!
//! Scans message content against a blocklist file using a case-insensitive
//! Aho-Corasick automaton. The blocklist is plain text, one keyword per
//! line; blank lines and `#` comments are skipped. A periodic task reloads
//! the file so edits take effect without a restart.

use aho_corasick::AhoCorasick;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A blocklist match against message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    /// The canonical (lowercased) blocklist entry that matched.
    pub word: String,
}

struct Compiled {
    matcher: Option<AhoCorasick>,
    /// Pattern strings, index-aligned with the automaton.
    words: Vec<String>,
}

/// The keyword blocklist, shared across handler tasks.
pub struct KeywordFilter {
    path: PathBuf,
    inner: RwLock<Compiled>,
}

impl KeywordFilter {
    /// Build a filter from the blocklist file. A missing or unreadable file
    /// yields an empty (match-nothing) filter.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let filter = Self {
            path: path.into(),
            inner: RwLock::new(Compiled {
                matcher: None,
                words: Vec::new(),
            }),
        };
        filter.reload();
        filter
    }

    /// Re-read the blocklist file and rebuild the automaton.
    pub fn reload(&self) {
        let words = read_blocklist(&self.path);
        let matcher = if words.is_empty() {
            None
        } else {
            match AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(&words)
            {
                Ok(matcher) => Some(matcher),
                Err(err) => {
                    warn!(error = ?err, path = %self.path.display(), "failed to build keyword matcher; keyword matching disabled");
                    None
                }
            }
        };
        *self.inner.write() = Compiled { matcher, words };
    }

    /// Classify message content. Returns the first blocklist match, if any.
    pub fn classify(&self, text: &str) -> Option<KeywordHit> {
        let compiled = self.inner.read();
        let matcher = compiled.matcher.as_ref()?;
        let mat = matcher.find(text)?;
        Some(KeywordHit {
            word: compiled.words[mat.pattern().as_usize()].clone(),
        })
    }

    /// Number of loaded keywords.
    pub fn len(&self) -> usize {
        self.inner.read().words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_blocklist(path: &Path) -> Vec<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to read keyword blocklist");
            return Vec::new();
        }
    };

    let mut words: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect();
    words.sort();
    words.dedup();
    words
}

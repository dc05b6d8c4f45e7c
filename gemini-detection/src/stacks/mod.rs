//! ## gemini-detection::stacks
//! **Aho-Corasick substring filter over captured stack text**
//!
//! Patterns can be added while the sampler is running; the automaton is
//! rebuilt on every change and read under a shared lock.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Pattern compilation failed: {0}")]
    PatternError(String),
}

pub struct StackFilter {
    patterns: RwLock<Vec<String>>,
    matcher: RwLock<Option<AhoCorasick>>,
}

impl StackFilter {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
            matcher: RwLock::new(None),
        }
    }

    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, DetectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = Self::new();
        filter
            .patterns
            .write()
            .extend(patterns.into_iter().map(Into::into));
        filter.rebuild_matcher()?;
        Ok(filter)
    }

    pub fn pattern_add(&self, pattern: &str) -> Result<(), DetectionError> {
        {
            let mut patterns = self.patterns.write();
            patterns.push(pattern.to_string());
        }
        self.rebuild_matcher()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }

    fn rebuild_matcher(&self) -> Result<(), DetectionError> {
        let patterns = self.patterns.read();
        if patterns.is_empty() {
            *self.matcher.write() = None;
            return Ok(());
        }
        let matcher = AhoCorasickBuilder::new()
            .build(patterns.iter())
            .map_err(|e| DetectionError::PatternError(e.to_string()))?;

        *self.matcher.write() = Some(matcher);
        Ok(())
    }

    /// The registered pattern occurring earliest in `stack`, if any.
    pub fn suppressed_by(&self, stack: &str) -> Option<String> {
        let index = self
            .matcher
            .read()
            .as_ref()?
            .find(stack)?
            .pattern()
            .as_usize();
        self.patterns.read().get(index).cloned()
    }
}

impl Default for StackFilter {
    fn default() -> Self {
        Self::new()
    }
}

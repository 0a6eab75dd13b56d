//! Detects a reviewer that keeps saying the same thing

use std::collections::HashSet;

/// Word-set overlap between two feedback strings.
///
/// Both texts are split on whitespace, lower-cased and deduplicated; the
/// score is the intersection size over the size of the larger set. Either
/// side being empty scores 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_words: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let b_words: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let shared = a_words.intersection(&b_words).count() as f64;
    shared / a_words.len().max(b_words.len()) as f64
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceDetector {
    threshold: f64,
}

impl ConvergenceDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// True when the new feedback is close enough to the previous round's
    /// that further iteration is unlikely to change the verdict
    pub fn is_stuck(&self, previous: &str, current: &str) -> bool {
        let score = similarity(previous, current);
        log::debug!("[CONVERGENCE] Feedback similarity {:.3} (threshold {})", score, self.threshold);
        score > self.threshold
    }
}

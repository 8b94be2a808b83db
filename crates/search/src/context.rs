//! Feedback context: a short history of recent edits and how they measured,
//! rendered into the next generation prompt.

use std::collections::VecDeque;

/// Entries kept before the oldest is evicted.
pub const CONTEXT_CAPACITY: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct FeedbackContext {
    original_fitness: Option<f64>,
    entries: VecDeque<String>,
}

impl FeedbackContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_original_fitness(&mut self, fitness: f64) {
        self.original_fitness = Some(fitness);
    }

    pub fn original_fitness(&self) -> Option<f64> {
        self.original_fitness
    }

    /// Record one edit outcome, evicting the oldest entry past capacity.
    pub fn push(&mut self, description: &str, fitness: f64) {
        self.entries.push_back(format!(
            "the following edit: {} had fitness {}",
            description, fitness
        ));
        while self.entries.len() > CONTEXT_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Prompt text; empty until the first entry is pushed.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut text = String::from(
            "These are edits you suggested previously and the fitness each one \
             measured (lower is better).",
        );
        if let Some(original) = self.original_fitness {
            text.push_str(&format!(
                " The original program had fitness {} and we want to do better.",
                original
            ));
        }
        text.push('\n');
        for entry in &self.entries {
            text.push_str(entry);
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_renders_nothing() {
        let mut ctx = FeedbackContext::new();
        ctx.set_original_fitness(10.0);
        assert_eq!(ctx.render(), "");
    }

    #[test]
    fn test_render_order_and_baseline() {
        let mut ctx = FeedbackContext::new();
        ctx.set_original_fitness(1000000.0);
        ctx.push("first", 900000.0);
        ctx.push("second", 950000.0);

        let text = ctx.render();
        assert!(text.contains("original program had fitness 1000000"));
        let first = text.find("the following edit: first had fitness 900000").unwrap();
        let second = text.find("the following edit: second had fitness 950000").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_fifo_eviction_ignores_fitness() {
        let mut ctx = FeedbackContext::new();
        // The oldest entry is also the best one; it is still evicted.
        ctx.push("e0", 1.0);
        for i in 1..=5 {
            ctx.push(&format!("e{}", i), 100.0 + i as f64);
        }
        assert_eq!(ctx.len(), CONTEXT_CAPACITY);
        let kept: Vec<_> = ctx.entries().collect();
        assert!(kept[0].contains("e1 "));
        assert!(kept[4].contains("e5 "));
        assert!(!ctx.render().contains("e0 "));
    }
}

//! Packs ranked hits into a character-bounded prompt context.

use rag_store::RetrievalResult;
use tracing::debug;

use crate::document::QueryContext;

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    separator: String,
    citation_markers: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            separator: "\n\n".to_string(),
            citation_markers: true,
        }
    }
}

impl ContextAssembler {
    pub fn new(separator: impl Into<String>, citation_markers: bool) -> Self {
        Self {
            separator: separator.into(),
            citation_markers,
        }
    }

    /// Appends hits in the given order while the total stays within `budget`
    /// characters and stops at the first one that does not fit.
    ///
    /// A top hit that is over budget on its own is kept, cut at the budget.
    pub fn assemble(&self, results: &[RetrievalResult], budget: usize) -> QueryContext {
        let mut ctx = QueryContext::default();
        if budget == 0 {
            return ctx;
        }

        for (i, hit) in results.iter().enumerate() {
            let block = self.render(i, hit);
            let block_len = block.chars().count();

            if ctx.total_length + block_len <= budget {
                ctx.text.push_str(&block);
                ctx.total_length += block_len;
                ctx.results.push(hit.clone());
                continue;
            }
            if i == 0 {
                ctx.text = block.chars().take(budget).collect();
                ctx.total_length = budget;
                ctx.truncated = true;
                ctx.results.push(hit.clone());
            }
            break;
        }

        debug!(
            offered = results.len(),
            used = ctx.results.len(),
            chars = ctx.total_length,
            budget,
            truncated = ctx.truncated,
            "context assembled"
        );
        ctx
    }

    fn render(&self, i: usize, hit: &RetrievalResult) -> String {
        let mut block = String::new();
        if i > 0 {
            block.push_str(&self.separator);
        }
        if self.citation_markers {
            block.push_str(&format!("[{}] ", i + 1));
        }
        block.push_str(hit.text.trim());
        block
    }
}

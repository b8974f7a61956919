//! Prompt builder: short system message + numbered context block.

use crate::document::QueryContext;

/// Default system instructions for document answers.
///
/// Keep this short: it consistently improves steering without wasting tokens.
pub const DEFAULT_SYSTEM: &str = r#"
You answer questions about the user's uploaded documents. Be concise.
Use the numbered context as ground truth and cite passages as [n] when you rely on them.
If the context does not contain the answer, say so instead of guessing.
"#;

/// Prepended to answers produced without any retrieved context.
pub const NO_CONTEXT_NOTICE: &str =
    "No relevant passages were found in the uploaded documents, so this answer is not grounded in them.";

/// Builds the user message from the question and the assembled context.
///
/// # Example
/// ```
/// # use rag_pipeline::{prompt::build_user_prompt, QueryContext};
/// let prompt = build_user_prompt("How to X?", &QueryContext::default());
/// assert!(prompt.contains("Question:"));
/// ```
pub fn build_user_prompt(question: &str, ctx: &QueryContext) -> String {
    let mut out = String::with_capacity(ctx.text.len() + question.len() + 128);

    if ctx.is_empty() {
        out.push_str("No context is available for this question.\n\n");
    } else {
        out.push_str("Context (top-ranked):\n");
        out.push_str(&ctx.text);
        if ctx.truncated {
            out.push_str("\n…");
        }
        out.push_str("\n\n");
    }

    out.push_str("Question:\n");
    out.push_str(question.trim());
    out.push('\n');

    if !ctx.is_empty() {
        out.push_str("\nAnswer using only the context above when possible.\n");
    }
    out
}

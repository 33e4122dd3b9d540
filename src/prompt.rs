//! Prompt assembly.

use crate::models::RetrievalResult;

/// Instruction template sent to the language model. `{context}` and
/// `{question}` are the only placeholders.
pub const PROMPT_TEMPLATE: &str = "
You must answer using ONLY the context below.
If the answer is not in the context, say: \"Not found in the provided documents.\"

Context:
{context}

Question: {question}

Answer (one short sentence):
";

/// Placed between consecutive context chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Join the chunk texts in ranked order.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render [`PROMPT_TEMPLATE`] for `question` over `results`.
pub fn build_prompt(results: &[RetrievalResult], question: &str) -> String {
    render_template(PROMPT_TEMPLATE, &build_context(results), question)
}

/// Substitute `{context}` and `{question}` in one left-to-right pass.
///
/// Substituted text is copied verbatim, so placeholders appearing inside the
/// context or the question are never expanded.
pub fn render_template(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

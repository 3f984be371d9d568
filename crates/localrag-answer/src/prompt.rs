//! Prompt layout.
//!
//! ```text
//! Answer the question using only the context below. ...
//!
//! Context:
//! [1] source: docs/water.md (chunk 1 of 3)
//! <chunk text>
//!
//! Question: <query verbatim>
//! Answer:
//! ```

use localrag_core::types::RetrievalResult;

/// Emitted in place of the context block when nothing was retrieved.
pub const NO_CONTEXT_MARKER: &str = "NO RELEVANT CONTEXT FOUND";

const INSTRUCTION: &str = "Answer the question using only the context below. \
If the context does not contain the answer, say that you don't know. \
Do not make up an answer.";

/// Render the prompt for `query` over `retrieval`, hits in ranked order.
/// Pure function of its inputs.
pub fn build_prompt(query: &str, retrieval: &RetrievalResult) -> String {
    let mut out = String::with_capacity(256 + retrieval.iter().map(|h| h.chunk.text.len() + 64).sum::<usize>());
    out.push_str(INSTRUCTION);
    out.push_str("\n\nContext:\n");
    if retrieval.is_empty() {
        out.push_str(NO_CONTEXT_MARKER);
        out.push('\n');
    }
    for (rank, hit) in retrieval.iter().enumerate() {
        let c = &hit.chunk;
        out.push_str(&format!(
            "[{}] source: {} (chunk {} of {})\n",
            rank + 1,
            c.source.path,
            c.chunk_index + 1,
            c.total_chunks
        ));
        out.push_str(c.text.trim_end());
        out.push_str("\n\n");
    }
    if !retrieval.is_empty() {
        out.pop();
    }
    out.push_str(&format!("\nQuestion: {}\nAnswer:", query));
    out
}

//! Query diagnostics.
//!
//! A [`QueryObserver`] sees the context chosen for the prompt and the prompt
//! itself. `rag query --debug` installs [`StderrObserver`]; output goes to
//! **stderr** so stdout keeps only the answer and its sources.

use std::io::Write;

use crate::models::RetrievalResult;

pub trait QueryObserver: Send + Sync {
    /// Called with the filtered context results, in ranked order.
    fn on_retrieved(&self, results: &[RetrievalResult]);

    /// Called with the rendered prompt before it is sent.
    fn on_prompt(&self, prompt: &str);
}

/// Default observer; ignores everything.
pub struct NoopObserver;

impl QueryObserver for NoopObserver {
    fn on_retrieved(&self, _results: &[RetrievalResult]) {}

    fn on_prompt(&self, _prompt: &str) {}
}

/// Human-readable diagnostics on stderr.
pub struct StderrObserver;

impl QueryObserver for StderrObserver {
    fn on_retrieved(&self, results: &[RetrievalResult]) {
        let mut stderr = std::io::stderr().lock();
        for r in results {
            let _ = writeln!(stderr, "{}", format_result(r));
        }
        let _ = stderr.flush();
    }

    fn on_prompt(&self, prompt: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "\n--- PROMPT ---\n\n{}\n--- END PROMPT ---\n", prompt);
        let _ = stderr.flush();
    }
}

/// `Score: 0.8123 | Source: Data/a.pdf (page 3)`
fn format_result(r: &RetrievalResult) -> String {
    match r.page {
        Some(page) => format!(
            "Score: {:.4} | Source: {} (page {})",
            r.score, r.source, page
        ),
        None => format!("Score: {:.4} | Source: {}", r.score, r.source),
    }
}

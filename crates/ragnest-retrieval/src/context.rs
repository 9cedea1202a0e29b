//! Prompt context assembly

use ragnest_core::models::{RetrievalResult, SourceAttribution};

/// Fixed instructions placed ahead of every context block
pub const INSTRUCTIONS: &str = "Answer the question using only the context below. \
Cite the sources you rely on by their [Source N] markers. \
If the context does not contain the answer, say that you do not know.";

/// Context handed to the generator, plus the attributions it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    /// Length of `text` in characters
    pub length: usize,
    pub sources: Vec<SourceAttribution>,
}

/// Concatenates ranked chunks under a character budget
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Source marker for one result, e.g. `[Source 1: report.pdf p.3 #7]`
    pub fn marker(result: &RetrievalResult) -> String {
        format!("[Source {}: {}]", result.rank, result.chunk.locator())
    }

    /// Join results in rank order until the budget is spent
    ///
    /// The top-ranked result is always included, even when it alone exceeds the budget.
    pub fn assemble(&self, results: &[RetrievalResult]) -> AssembledContext {
        let mut text = String::new();
        let mut length = 0usize;
        let mut sources = Vec::new();

        for result in results {
            let block = format!("{}\n{}", Self::marker(result), result.chunk.content.trim());
            let separator = if text.is_empty() { 0 } else { 2 };
            let block_len = block.chars().count() + separator;

            if !sources.is_empty() && length + block_len > self.max_chars {
                tracing::debug!(
                    included = sources.len(),
                    dropped = results.len() - sources.len(),
                    max_chars = self.max_chars,
                    "Context budget reached"
                );
                break;
            }

            if separator > 0 {
                text.push_str("\n\n");
            }
            text.push_str(&block);
            length += block_len;
            sources.push(SourceAttribution::from_result(result));
        }

        AssembledContext {
            text,
            length,
            sources,
        }
    }
}

/// Full prompt: instructions, context, then the question on the last line
pub fn build_prompt(context: &str, query: &str) -> String {
    format!("{}\n\nContext:\n{}\n\nQuestion: {}", INSTRUCTIONS, context, query.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ragnest_core::models::{ChunkId, ChunkInput, ChunkMetadata, ChunkRecord};

    fn result(rank: usize, text: &str, page: Option<usize>) -> RetrievalResult {
        let mut metadata = ChunkMetadata::new("manual.pdf", rank * 10);
        metadata.page = page;
        RetrievalResult {
            score: 1.0 / rank as f32,
            rank,
            chunk: ChunkRecord::new(ChunkId(rank as u64), ChunkInput::new(text, metadata)),
        }
    }

    #[test]
    fn test_markers_in_rank_order() {
        let assembled = ContextAssembler::new(10_000)
            .assemble(&[result(1, "First chunk.", Some(3)), result(2, "Second chunk.", None)]);

        assert_eq!(
            assembled.text,
            "[Source 1: manual.pdf p.3 #10]\nFirst chunk.\n\n[Source 2: manual.pdf #20]\nSecond chunk."
        );
        assert_eq!(assembled.length, assembled.text.chars().count());
        assert_eq!(assembled.sources.len(), 2);
        assert_eq!(assembled.sources[1].rank, 2);
    }

    #[test]
    fn test_budget_keeps_top_chunk() {
        let long = "x".repeat(500);
        let assembled = ContextAssembler::new(100).assemble(&[result(1, &long, None), result(2, "short", None)]);

        assert_eq!(assembled.sources.len(), 1);
        assert!(assembled.text.contains(&long));
        assert!(assembled.length > 100);
    }

    #[test]
    fn test_prompt_ends_with_question() {
        let prompt = build_prompt("[Source 1: a #0]\ntext", "  why?  ");
        assert!(prompt.starts_with(INSTRUCTIONS));
        assert_eq!(prompt.lines().last(), Some("Question: why?"));
    }

    proptest! {
        #[test]
        fn prop_length_matches_text(
            texts in proptest::collection::vec("[a-z ]{1,40}", 1..8),
            budget in 0usize..400,
        ) {
            let results: Vec<RetrievalResult> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| result(i + 1, t, None))
                .collect();
            let assembled = ContextAssembler::new(budget).assemble(&results);

            prop_assert_eq!(assembled.length, assembled.text.chars().count());
            prop_assert!(!assembled.sources.is_empty());
            prop_assert!(assembled.sources.len() == 1 || assembled.length <= budget);
        }
    }
}

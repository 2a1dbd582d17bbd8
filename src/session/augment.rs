//! Prompt assembly from retrieved chunks.

use std::fmt::Write;

use crate::types::QueryResult;

use super::types::AugmentedPrompt;

/// System prompt used when the caller does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the question using \
only the provided context. If the context does not contain the answer, say so.";

/// Builds a prompt that places the retrieved chunks, numbered in rank
/// order, ahead of the question.
pub(crate) fn build_prompt(
    question: &str,
    result: &QueryResult,
    system_prompt: Option<&str>,
) -> AugmentedPrompt {
    let system_prompt = system_prompt
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();

    let mut user_prompt = String::from("Context:\n");
    for (rank, hit) in result.hits.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = write!(user_prompt, "\n[{}] {}\n", rank + 1, hit.text);
    }
    let _ = write!(user_prompt, "\nQuestion: {}\n", question.trim());

    AugmentedPrompt {
        system_prompt,
        user_prompt,
        context_ids: result.hits.iter().map(|h| h.id.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueryHit;

    fn result() -> QueryResult {
        QueryResult {
            hits: vec![
                QueryHit {
                    id: "t1_2".into(),
                    text: "the lazy dog".into(),
                    distance: 0.1,
                    ordinal: Some(2),
                },
                QueryHit {
                    id: "t1_0".into(),
                    text: "the quick brown fox".into(),
                    distance: 0.8,
                    ordinal: Some(0),
                },
            ],
        }
    }

    #[test]
    fn test_blocks_in_rank_order() {
        let prompt = build_prompt("Who is lazy?", &result(), None);
        let first = prompt.user_prompt.find("[1] the lazy dog").unwrap();
        let second = prompt.user_prompt.find("[2] the quick brown fox").unwrap();
        let question = prompt.user_prompt.find("Question: Who is lazy?").unwrap();
        assert!(first < second && second < question);
        assert_eq!(prompt.context_ids, vec!["t1_2", "t1_0"]);
    }

    #[test]
    fn test_default_system_prompt() {
        assert_eq!(build_prompt("q", &result(), None).system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(build_prompt("q", &result(), Some("  ")).system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(build_prompt("q", &result(), Some("Be brief.")).system_prompt, "Be brief.");
    }

    #[test]
    fn test_empty_result_still_has_question() {
        let prompt = build_prompt("anything?", &QueryResult::default(), None);
        assert!(prompt.context_ids.is_empty());
        assert!(prompt.user_prompt.ends_with("Question: anything?\n"));
    }
}

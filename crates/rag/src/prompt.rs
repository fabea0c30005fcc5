//! Grounding prompt for the support agent

use voice_agent_core::{render_history, HistoryEntry};

const PERSONA: &str = "\
You are a helpful and friendly telecom support agent. Your role is to assist users with network and device troubleshooting.
Use the following retrieved knowledge base articles to answer the user's question.
If the articles do not contain the answer, say that you don't have enough information but offer to help with other issues.
Do not mention the knowledge base or the articles in your response. Just answer the question directly.";

/// Build the single-message prompt sent to the model.
///
/// `articles` are joined one per line between `---` fences; an empty slice
/// yields an empty block, which the persona tells the model to decline on.
pub fn build_grounding_prompt(query: &str, history: &[HistoryEntry], articles: &[String]) -> String {
    format!(
        "{persona}\n\n\
         Previous conversation:\n{history}\n\n\
         Knowledge Base Articles:\n---\n{articles}\n---\n\n\
         User's Question: \"{query}\"\n\n\
         Your Answer:",
        persona = PERSONA,
        history = render_history(history),
        articles = articles.join("\n"),
        query = query.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_sections() {
        let history = vec![
            HistoryEntry::user("my internet is slow"),
            HistoryEntry::agent("Have you tried restarting the router?"),
        ];
        let articles = vec!["Restart the router.".to_string(), "Check cables.".to_string()];

        let prompt = build_grounding_prompt("still slow", &history, &articles);

        assert!(prompt.starts_with("You are a helpful and friendly telecom support agent."));
        assert!(prompt.contains(
            "Previous conversation:\nUser: my internet is slow\nAgent: Have you tried restarting the router?"
        ));
        assert!(prompt.contains("Knowledge Base Articles:\n---\nRestart the router.\nCheck cables.\n---"));
        assert!(prompt.contains("User's Question: \"still slow\""));
        assert!(prompt.ends_with("Your Answer:"));
    }

    #[test]
    fn test_empty_context() {
        let prompt = build_grounding_prompt("hello", &[], &[]);
        assert!(prompt.contains("Knowledge Base Articles:\n---\n\n---"));
        assert!(prompt.contains("don't have enough information"));
    }
}

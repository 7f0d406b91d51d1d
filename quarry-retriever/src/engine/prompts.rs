//! Prompt assembly for answering and question condensing.
//!
//! Every completion request gets the same framing: a fixed system prompt,
//! then the task body wrapped in `<|USER|>`/`<|ASSISTANT|>` markers the
//! instruction-tuned model expects.

use crate::engine::chat::ChatTurn;

/// Instructions prepended to every completion request.
pub const SYSTEM_PROMPT: &str = "You are a Q&A assistant. \
    Your goal is to answer questions as accurately as possible based on the \
    instructions and the context provided, in detail. Provide references for \
    your answers, do not make up information, and do not answer with \
    incomplete sentences.";

/// Wrap a task body in the system prompt and user/assistant markers.
fn wrap(body: &str) -> String {
    format!("{SYSTEM_PROMPT} <|USER|>{body}<|ASSISTANT|>")
}

/// Build the answering prompt from retrieved context windows and a question.
pub fn qa_prompt(question: &str, contexts: &[&str]) -> String {
    let context_block = contexts.join("\n\n");
    let body = format!(
        "Context information is below.\n\
         ---------------------\n\
         {context_block}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    );
    wrap(&body)
}

/// Build the prompt that rewrites a follow-up message into a standalone
/// question, given the conversation so far.
pub fn condense_prompt(history: &[ChatTurn], follow_up: &str) -> String {
    let body = format!(
        "Given a conversation (between Human and Assistant) and a follow up \
         message from Human, rewrite the message to be a standalone question \
         that captures all relevant context from the conversation.\n\n\
         <Chat History>\n\
         {}\n\n\
         <Follow Up Message>\n\
         {follow_up}\n\n\
         <Standalone question>\n",
        history_transcript(history)
    );
    wrap(&body)
}

fn history_transcript(history: &[ChatTurn]) -> String {
    let mut lines = Vec::with_capacity(history.len() * 2);
    for turn in history {
        lines.push(format!("Human: {}", turn.user));
        lines.push(format!("Assistant: {}", turn.assistant));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_prompt_includes_contexts_and_question() {
        let prompt = qa_prompt("What is grounding?", &["window one", "window two"]);
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("window one\n\nwindow two"));
        assert!(prompt.contains("Query: What is grounding?"));
        assert!(prompt.contains("<|USER|>"));
        assert!(prompt.ends_with("<|ASSISTANT|>"));
    }

    #[test]
    fn test_qa_prompt_with_no_contexts_is_still_well_formed() {
        let prompt = qa_prompt("anything?", &[]);
        assert!(prompt.contains("Context information is below."));
        assert!(prompt.contains("Query: anything?"));
    }

    #[test]
    fn test_condense_prompt_includes_transcript_and_follow_up() {
        let history = vec![ChatTurn {
            user: "What does R56 cover?".into(),
            assistant: "Site grounding standards.".into(),
        }];
        let prompt = condense_prompt(&history, "What about light duty sites?");
        assert!(prompt.contains("Human: What does R56 cover?"));
        assert!(prompt.contains("Assistant: Site grounding standards."));
        assert!(prompt.contains("<Follow Up Message>\nWhat about light duty sites?"));
        assert!(prompt.ends_with("<|ASSISTANT|>"));
    }
}

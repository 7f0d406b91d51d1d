//! Conversational layer over the retrieval engine.
//!
//! Follow-up messages lean on earlier turns ("what about light duty sites?"),
//! which retrieval alone cannot resolve. [`ChatEngine`] first asks the
//! completion model to rewrite each follow-up into a standalone question
//! using the conversation so far, then runs that question through the
//! regular query pipeline.

use serde::Serialize;
use tracing::debug;

use crate::engine::{prompts, QueryOutcome, RetrievalEngine};
use crate::error::Result;

/// One completed user/assistant exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

/// Multi-turn question answering with history condensing.
pub struct ChatEngine {
    engine: RetrievalEngine,
    history: Vec<ChatTurn>,
}

impl ChatEngine {
    pub fn new(engine: RetrievalEngine) -> Self {
        ChatEngine {
            engine,
            history: Vec::new(),
        }
    }

    /// Answer `message` in the context of the conversation so far.
    ///
    /// The exchange is appended to the history only after the answer
    /// succeeds, so a failed turn can simply be retried.
    pub async fn chat(&mut self, message: &str) -> Result<QueryOutcome> {
        let question = self.condense(message).await?;
        let outcome = self.engine.query_with_sources(&question).await?;
        self.history.push(ChatTurn {
            user: message.to_string(),
            assistant: outcome.answer.clone(),
        });
        Ok(outcome)
    }

    /// Rewrite a follow-up message into a standalone question.
    ///
    /// The first message of a conversation is already standalone and goes
    /// through untouched. If the model returns nothing usable, the original
    /// message is used as-is.
    async fn condense(&self, message: &str) -> Result<String> {
        if self.history.is_empty() {
            return Ok(message.to_string());
        }

        let prompt = prompts::condense_prompt(&self.history, message);
        let completion = self.engine.completion().complete(&prompt).await?;
        let condensed = completion.text.trim();
        if condensed.is_empty() {
            return Ok(message.to_string());
        }
        debug!("Condensed follow-up into: {}", condensed);
        Ok(condensed.to_string())
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Forget the conversation, keeping the underlying engine.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }
}

//! Integration tests for the retrieve-rerank-answer pipeline
//!
//! These tests run the engine against a hand-built in-memory index with
//! scripted model clients, verifying:
//! - Retrieval caps and ordering through the reranker
//! - Prompt assembly from window text and the question
//! - Streaming answers
//! - Multi-turn chat with follow-up condensing

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use half::f16;
use quarry_clients::{
    ClientError, CompletionClient, CompletionDelta, CompletionResult, CompletionStream,
    EmbeddingClient,
};
use quarry_ingest::IndexableUnit;
use quarry_retriever::{
    ChatEngine, EngineConfig, IndexEntry, Reranker, RetrievalEngine, RetrieverError, ScoredUnit,
    VectorIndex,
};
use tokio::sync::mpsc;

const DIMENSION: usize = 4;

/// Embedding client that always answers with one fixed vector.
struct FixedEmbedding {
    vector: Vec<f16>,
}

impl FixedEmbedding {
    fn new(values: &[f32]) -> Arc<Self> {
        Arc::new(FixedEmbedding {
            vector: values.iter().copied().map(f16::from_f32).collect(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for FixedEmbedding {
    async fn embed(&self, _text: &str) -> quarry_clients::Result<Vec<f16>> {
        Ok(self.vector.clone())
    }
}

/// Completion client that replays scripted responses and records every
/// prompt it was asked to complete.
struct ScriptedCompletion {
    prompts: Mutex<Vec<String>>,
    script: Mutex<VecDeque<String>>,
    fail: bool,
}

impl ScriptedCompletion {
    fn new<I, S>(script: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(ScriptedCompletion {
            prompts: Mutex::new(Vec::new()),
            script: Mutex::new(script.into_iter().map(Into::into).collect()),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(ScriptedCompletion {
            prompts: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fail: true,
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_scripted(&self) -> String {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string())
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> quarry_clients::Result<CompletionResult> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(ClientError::malformed("completion backend unavailable"));
        }
        let text = self.next_scripted();
        Ok(CompletionResult {
            raw: serde_json::json!({ "text": text }),
            text,
        })
    }

    async fn stream_complete(&self, prompt: &str) -> quarry_clients::Result<CompletionStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(ClientError::malformed("completion backend unavailable"));
        }
        let text = self.next_scripted();

        let (tx, rx) = mpsc::channel(8);
        let producer = tokio::spawn(async move {
            let mid = text.len() / 2;
            let mid = (mid..text.len()).find(|&i| text.is_char_boundary(i)).unwrap_or(0);
            for piece in [&text[..mid], &text[mid..]] {
                if piece.is_empty() {
                    continue;
                }
                if tx
                    .send(Ok(CompletionDelta {
                        text: piece.to_string(),
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
        Ok(CompletionStream::new(rx, producer))
    }
}

/// Reranker that keeps similarity scores and order, only truncating.
struct Passthrough;

impl Reranker for Passthrough {
    fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<ScoredUnit>,
        top_n: usize,
    ) -> Vec<ScoredUnit> {
        candidates.truncate(top_n);
        candidates
    }
}

fn unit(seq: usize, core: &str, window: &str) -> IndexableUnit {
    IndexableUnit {
        core_text: core.to_string(),
        window_text: window.to_string(),
        source_path: "manual.pdf".to_string(),
        sequence: seq,
    }
}

fn entry(seq: usize, core: &str, window: &str, values: &[f32]) -> IndexEntry {
    IndexEntry {
        unit: unit(seq, core, window),
        embedding: values.iter().copied().map(f16::from_f32).collect(),
    }
}

/// Six units at decreasing similarity to the query vector [1, 0, 0, 0].
fn sample_index() -> VectorIndex {
    let mut index = VectorIndex::new(DIMENSION);
    index
        .insert_batch(vec![
            entry(0, "C0 core.", "W0 window text.", &[1.0, 0.0, 0.0, 0.0]),
            entry(1, "C1 core.", "W1 window text.", &[1.0, 0.4, 0.0, 0.0]),
            entry(2, "C2 core.", "W2 window text.", &[1.0, 1.0, 0.0, 0.0]),
            entry(3, "C3 core.", "W3 window text.", &[0.2, 1.0, 0.0, 0.0]),
            entry(4, "C4 core.", "W4 window text.", &[0.0, 1.0, 0.0, 0.0]),
            entry(5, "C5 core.", "W5 window text.", &[0.0, 0.0, 1.0, 0.0]),
        ])
        .unwrap();
    index
}

fn engine_with(
    completion: Arc<ScriptedCompletion>,
    top_k: usize,
    top_n: usize,
) -> RetrievalEngine {
    let embedding = FixedEmbedding::new(&[1.0, 0.0, 0.0, 0.0]);
    let config = EngineConfig::new()
        .with_similarity_top_k(top_k)
        .with_rerank_top_n(top_n);
    RetrievalEngine::from_index(sample_index(), embedding, completion, config)
}

/// Test that retrieval returns at most min(top_k, top_n) units, best first.
#[tokio::test]
async fn test_retrieve_respects_top_k_and_top_n() -> Result<()> {
    let engine = engine_with(ScriptedCompletion::new::<_, String>([]), 4, 2)
        .with_reranker(Box::new(Passthrough));

    let results = engine.retrieve("anything").await?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].unit.sequence, 0);
    assert_eq!(results[1].unit.sequence, 1);
    assert!(results[0].score >= results[1].score);

    // top_k below top_n caps the result the same way.
    let engine = engine_with(ScriptedCompletion::new::<_, String>([]), 3, 10)
        .with_reranker(Box::new(Passthrough));
    let results = engine.retrieve("anything").await?;
    assert_eq!(results.len(), 3);
    Ok(())
}

/// Test that retrieval never returns more units than the index holds.
#[tokio::test]
async fn test_retrieve_never_adds_units() -> Result<()> {
    let engine = engine_with(ScriptedCompletion::new::<_, String>([]), 100, 50)
        .with_reranker(Box::new(Passthrough));

    let results = engine.retrieve("anything").await?;
    assert_eq!(results.len(), 6);

    let sequences: Vec<usize> = results.iter().map(|r| r.unit.sequence).collect();
    for seq in &sequences {
        assert!(*seq < 6, "unknown unit {seq} appeared in results");
    }
    Ok(())
}

/// Test that the default reranker promotes term-matching units past
/// higher-similarity ones.
#[tokio::test]
async fn test_default_reranker_promotes_term_matches() -> Result<()> {
    let mut index = VectorIndex::new(DIMENSION);
    index
        .insert_batch(vec![
            entry(0, "C0.", "Nothing relevant here.", &[1.0, 0.0, 0.0, 0.0]),
            entry(
                1,
                "C1.",
                "Grounding requirements for sites.",
                &[0.0, 1.0, 0.0, 0.0],
            ),
        ])
        .unwrap();

    let engine = RetrievalEngine::from_index(
        index,
        FixedEmbedding::new(&[1.0, 0.0, 0.0, 0.0]),
        ScriptedCompletion::new::<_, String>([]),
        EngineConfig::new(),
    );

    let results = engine.retrieve("grounding requirements").await?;
    assert_eq!(results[0].unit.sequence, 1);
    Ok(())
}

/// Test that a query embedding of the wrong length is rejected.
#[tokio::test]
async fn test_retrieve_rejects_mismatched_query_dimension() -> Result<()> {
    let embedding = FixedEmbedding::new(&[1.0, 0.0]);
    let engine = RetrievalEngine::from_index(
        sample_index(),
        embedding,
        ScriptedCompletion::new::<_, String>([]),
        EngineConfig::new(),
    );

    let result = engine.retrieve("anything").await;
    assert!(matches!(
        result,
        Err(RetrieverError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));
    Ok(())
}

/// Test that the answering prompt carries window text, not core text, plus
/// the question, and that the scripted answer comes back with sources.
#[tokio::test]
async fn test_query_prompt_contains_windows_and_question() -> Result<()> {
    let completion = ScriptedCompletion::new(["The conductors must be bonded."]);
    let engine = engine_with(completion.clone(), 100, 2).with_reranker(Box::new(Passthrough));

    let outcome = engine.query_with_sources("What must be bonded?").await?;
    assert_eq!(outcome.answer, "The conductors must be bonded.");
    assert_eq!(outcome.sources.len(), 2);

    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("W0 window text."));
    assert!(prompts[0].contains("W1 window text."));
    assert!(!prompts[0].contains("C0 core."));
    assert!(prompts[0].contains("Query: What must be bonded?"));
    assert!(prompts[0].contains("<|USER|>"));
    assert!(prompts[0].ends_with("<|ASSISTANT|>"));
    Ok(())
}

/// Test that streaming queries deliver the scripted answer in pieces.
#[tokio::test]
async fn test_stream_query_yields_answer_deltas() -> Result<()> {
    let completion = ScriptedCompletion::new(["streamed answer text"]);
    let engine = engine_with(completion, 100, 3).with_reranker(Box::new(Passthrough));

    let (stream, sources) = engine.stream_query("anything").await?;
    assert_eq!(sources.len(), 3);
    assert_eq!(stream.collect_text().await?, "streamed answer text");
    Ok(())
}

/// Test that the first chat turn goes straight to answering.
#[tokio::test]
async fn test_chat_first_turn_skips_condensing() -> Result<()> {
    let completion = ScriptedCompletion::new(["Bond them at the perimeter."]);
    let engine = engine_with(completion.clone(), 100, 2);
    let mut chat = ChatEngine::new(engine);

    let outcome = chat.chat("What must be bonded?").await?;
    assert_eq!(outcome.answer, "Bond them at the perimeter.");

    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 1, "first turn must not condense");
    assert!(prompts[0].contains("Query: What must be bonded?"));

    assert_eq!(chat.history().len(), 1);
    assert_eq!(chat.history()[0].user, "What must be bonded?");
    assert_eq!(chat.history()[0].assistant, "Bond them at the perimeter.");
    Ok(())
}

/// Test that follow-up turns are condensed against the history before
/// retrieval.
#[tokio::test]
async fn test_chat_follow_up_is_condensed() -> Result<()> {
    let completion = ScriptedCompletion::new([
        "R56 covers site grounding.",
        "What does R56 say about light duty sites?",
        "Light duty sites use a single ground ring.",
    ]);
    let engine = engine_with(completion.clone(), 100, 2);
    let mut chat = ChatEngine::new(engine);

    chat.chat("What does R56 cover?").await?;
    let outcome = chat.chat("What about light duty sites?").await?;
    assert_eq!(outcome.answer, "Light duty sites use a single ground ring.");

    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 3);

    // Second call is the condense prompt built from the first exchange.
    assert!(prompts[1].contains("<Chat History>"));
    assert!(prompts[1].contains("Human: What does R56 cover?"));
    assert!(prompts[1].contains("Assistant: R56 covers site grounding."));
    assert!(prompts[1].contains("<Follow Up Message>\nWhat about light duty sites?"));

    // Third call answers the condensed question, not the raw follow-up.
    assert!(prompts[2].contains("Query: What does R56 say about light duty sites?"));
    assert!(!prompts[2].contains("Query: What about light duty sites?"));

    assert_eq!(chat.history().len(), 2);
    assert_eq!(chat.history()[1].user, "What about light duty sites?");
    Ok(())
}

/// Test that an empty condense result falls back to the raw message.
#[tokio::test]
async fn test_chat_blank_condense_falls_back() -> Result<()> {
    let completion = ScriptedCompletion::new([
        "First answer.",
        "   ",
        "Second answer.",
    ]);
    let engine = engine_with(completion.clone(), 100, 2);
    let mut chat = ChatEngine::new(engine);

    chat.chat("First question?").await?;
    chat.chat("Second question?").await?;

    let prompts = completion.prompts();
    assert!(prompts[2].contains("Query: Second question?"));
    Ok(())
}

/// Test that a failed turn leaves the history untouched.
#[tokio::test]
async fn test_failed_turn_leaves_history_unchanged() -> Result<()> {
    let engine = engine_with(ScriptedCompletion::failing(), 100, 2);
    let mut chat = ChatEngine::new(engine);

    let result = chat.chat("Does this work?").await;
    assert!(result.is_err());
    assert!(chat.history().is_empty());
    Ok(())
}

/// Test that resetting a chat clears the history but keeps answering.
#[tokio::test]
async fn test_chat_reset_clears_history() -> Result<()> {
    let completion = ScriptedCompletion::new(["One.", "Two."]);
    let engine = engine_with(completion.clone(), 100, 2);
    let mut chat = ChatEngine::new(engine);

    chat.chat("First?").await?;
    assert_eq!(chat.history().len(), 1);

    chat.reset();
    assert!(chat.history().is_empty());

    // Next turn behaves like a fresh first turn: no condense call.
    chat.chat("Second?").await?;
    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("Query: Second?"));
    Ok(())
}

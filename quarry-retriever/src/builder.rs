//! Incremental index construction over a document corpus.
//!
//! [`IndexBuilder`] walks a corpus directory in stable lexical order, windows
//! each document into [`IndexableUnit`]s, embeds them through an
//! [`EmbeddingClient`], and checkpoints the in-memory index to SQLite every
//! `checkpoint_interval` successfully indexed files. Each checkpoint is a
//! persist followed by a reload, so the builder keeps proving that the
//! artifact on disk can actually be read back.
//!
//! Files that fail extraction or embedding are logged and skipped; the build
//! carries on. Persistence failures are fatal, since a checkpoint that cannot
//! be written means the artifact is no longer trustworthy.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ignore::WalkBuilder;
use quarry_clients::EmbeddingClient;
use quarry_ingest::{DocumentReader, IngestConfig};
use tracing::{debug, error, info, warn};

use crate::error::{Result, RetrieverError};
use crate::index::storage::IndexStorage;
use crate::index::{IndexEntry, VectorIndex};

/// Settings for one indexing run.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Directory tree to index.
    pub corpus_root: PathBuf,
    /// Directory where the index database lands.
    pub storage_dir: PathBuf,
    /// Persist and reload after this many successfully indexed files.
    pub checkpoint_interval: usize,
    /// Expected length of every embedding vector.
    pub embedding_dimension: usize,
    /// How many times to retry reloading a checkpoint before failing.
    pub reload_attempts: usize,
    /// Extraction and windowing settings.
    pub ingest: IngestConfig,
}

impl BuilderConfig {
    pub fn new(corpus_root: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
        BuilderConfig {
            corpus_root: corpus_root.into(),
            storage_dir: storage_dir.into(),
            checkpoint_interval: 10,
            embedding_dimension: 768,
            reload_attempts: 3,
            ingest: IngestConfig::default(),
        }
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub fn with_reload_attempts(mut self, attempts: usize) -> Self {
        self.reload_attempts = attempts;
        self
    }

    pub fn with_ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }
}

/// Where the builder currently is in its persist/reload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuilderState {
    /// Nothing has been indexed yet.
    #[default]
    Empty,
    /// Accumulating embedded units in memory.
    Building,
    /// Writing a checkpoint to storage.
    Persisting,
    /// Reading the checkpoint back from storage.
    Reloading,
    /// A persist or reload failed; the run is over.
    Failed,
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuilderState::Empty => "empty",
            BuilderState::Building => "building",
            BuilderState::Persisting => "persisting",
            BuilderState::Reloading => "reloading",
            BuilderState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed indexing run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub units_indexed: usize,
    pub persist_count: usize,
    pub final_state: BuilderState,
}

/// Builds a persisted vector index from a corpus directory.
pub struct IndexBuilder {
    config: BuilderConfig,
    reader: DocumentReader,
    embedding: Arc<dyn EmbeddingClient>,
    state: BuilderState,
}

impl IndexBuilder {
    pub fn new(config: BuilderConfig, embedding: Arc<dyn EmbeddingClient>) -> Self {
        let reader = DocumentReader::new(config.ingest.clone());
        IndexBuilder {
            config,
            reader,
            embedding,
            state: BuilderState::Empty,
        }
    }

    /// Current position in the build state machine.
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Walk the corpus and build the index, checkpointing as configured.
    ///
    /// Returns a report of what was indexed. Extraction and embedding
    /// failures skip the offending file; storage failures abort the run.
    pub async fn run(&mut self) -> Result<BuildReport> {
        if !self.config.corpus_root.is_dir() {
            return Err(RetrieverError::CorpusRootMissing {
                path: self.config.corpus_root.clone(),
            });
        }

        let files = self.collect_files();
        info!(
            "Indexing {} files under {}",
            files.len(),
            self.config.corpus_root.display()
        );

        let interval = self.config.checkpoint_interval.max(1);
        let mut index = VectorIndex::new(self.config.embedding_dimension);
        let mut storage: Option<IndexStorage> = None;
        let mut report = BuildReport::default();
        let mut indexed = 0usize;

        for path in files {
            let entries = match self.process_file(&path).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.files_skipped += 1;
                    continue;
                }
            };

            let unit_count = entries.len();
            if let Err(e) = index.insert_batch(entries) {
                warn!("Skipping {}: {}", path.display(), e);
                report.files_skipped += 1;
                continue;
            }

            self.state = BuilderState::Building;
            report.files_indexed += 1;
            report.units_indexed += unit_count;
            indexed += 1;
            debug!("Indexed {} ({} units)", path.display(), unit_count);

            if indexed % interval == 0 {
                let store = self.open_or_reuse(&mut storage).await?;
                self.checkpoint(&store, &index).await?;
                report.persist_count += 1;

                self.state = BuilderState::Reloading;
                index = self.reload_index(&store).await?;
                self.state = BuilderState::Building;
            }
        }

        // A run whose file count does not land on a checkpoint boundary still
        // needs its tail persisted. Aligned runs already wrote everything.
        if indexed > 0 && indexed % interval != 0 {
            let store = self.open_or_reuse(&mut storage).await?;
            self.checkpoint(&store, &index).await?;
            report.persist_count += 1;
            self.state = BuilderState::Building;
        }

        report.final_state = self.state;
        info!(
            "Indexed {} files ({} units, {} skipped, {} persists)",
            report.files_indexed, report.units_indexed, report.files_skipped, report.persist_count
        );
        Ok(report)
    }

    /// All regular files under the corpus root, in stable lexical order.
    fn collect_files(&self) -> Vec<PathBuf> {
        let walk = WalkBuilder::new(&self.config.corpus_root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walk {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|t| t.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Skipping unreadable directory entry: {}", e),
            }
        }
        files
    }

    /// Extract, window, and embed a single file.
    async fn process_file(&self, path: &std::path::Path) -> Result<Vec<IndexEntry>> {
        let units = self.reader.ingest(path)?;

        let mut entries = Vec::with_capacity(units.len());
        for unit in units {
            let embedding = self.embedding.embed(&unit.core_text).await?;
            entries.push(IndexEntry { unit, embedding });
        }
        Ok(entries)
    }

    async fn open_or_reuse(&mut self, storage: &mut Option<IndexStorage>) -> Result<IndexStorage> {
        if let Some(store) = storage {
            return Ok(store.clone());
        }
        let store = match IndexStorage::open(&self.config.storage_dir).await {
            Ok(store) => store,
            Err(e) => {
                self.state = BuilderState::Failed;
                error!("Failed to open index storage: {}", e);
                return Err(e);
            }
        };
        *storage = Some(store.clone());
        Ok(store)
    }

    async fn checkpoint(&mut self, storage: &IndexStorage, index: &VectorIndex) -> Result<()> {
        self.state = BuilderState::Persisting;
        if let Err(e) = storage.persist(index).await {
            self.state = BuilderState::Failed;
            error!("Failed to persist index checkpoint: {}", e);
            return Err(e);
        }
        debug!("Persisted checkpoint with {} units", index.len());
        Ok(())
    }

    async fn reload_index(&mut self, storage: &IndexStorage) -> Result<VectorIndex> {
        let attempts = self.config.reload_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match storage.load().await {
                Ok(index) => return Ok(index),
                Err(e) => {
                    warn!("Reload attempt {}/{} failed: {}", attempt, attempts, e);
                    last_err = Some(e);
                }
            }
        }

        self.state = BuilderState::Failed;
        error!("Giving up after {} reload attempts", attempts);
        Err(last_err
            .unwrap_or_else(|| RetrieverError::reload("reload retries exhausted")))
    }
}

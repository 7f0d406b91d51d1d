//! # quarry-ingest
//!
//! Document ingestion and sentence windowing for the quarry pipeline. Takes a
//! source file and produces the ordered [`IndexableUnit`]s the index builder
//! embeds and stores: one unit per sentence, each carrying a window of
//! neighboring sentences so retrieval can hand a model more context than the
//! matched sentence alone.
//!
//! File types are gated by an explicit allow-list (PDF by default); text
//! extraction goes through `pdf-extract` for PDFs and plain UTF-8 reads for
//! anything else allowed. Ingestion never embeds and never touches the index.
//!
//! ```
//! use quarry_ingest::{DocumentReader, IngestConfig};
//! use std::io::Write;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("report.txt");
//! std::fs::File::create(&path)
//!     .and_then(|mut f| f.write_all(b"First point. Second point. Third point."))
//!     .unwrap();
//!
//! let reader = DocumentReader::new(
//!     IngestConfig::new()
//!         .with_window_size(1)
//!         .with_allowed_extensions(["txt"]),
//! );
//! let units = reader.ingest(&path).unwrap();
//! assert_eq!(units.len(), 3);
//! assert_eq!(units[1].window_text, "First point. Second point. Third point.");
//! ```

pub mod error;
pub mod reader;
pub mod sentences;
pub mod unit;

pub use error::{IngestError, Result};
pub use reader::{DocumentReader, IngestConfig};
pub use sentences::split_sentences;
pub use unit::IndexableUnit;

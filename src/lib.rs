//! Cross-reference and include resolution for plain-text documentation.
//!
//! A corpus is a directory of RST-like documents. Documents
//! include each other's text, declare anchors (explicit labels, section
//! titles, object descriptions) and reference them through roles such as
//! `:ref:`, `:doc:` and `:dbcommand:`. This crate expands includes, builds
//! the corpus-wide anchor table, resolves every reference and reports what
//! is broken.
//!
//! ```
//! use docref::{validate, Config, Corpus};
//!
//! let corpus = Corpus::from_sources([
//!     ("index", ".. include:: /includes/intro.rst\n\nSee :ref:`geo`.\n"),
//!     ("includes/intro", "Welcome.\n"),
//!     ("geo", ".. _geo:\n\nGeospatial\n==========\n"),
//! ]);
//!
//! let validation = validate(&corpus, &Config::default());
//! assert!(validation.report.diagnostics().is_empty());
//! ```

pub mod domain;
pub use domain::{
    expand, validate, Anchor, AnchorKey, AnchorTable, Config, Corpus, Diagnostic, DiagnosticKind,
    DocId, Document, ExpandedDocument, IncludeError, Label, Location, ObjectKind, Reference,
    Report, Resolution, RoleKind, Severity, Validation,
};

/// Filesystem storage: markup parsing and directory loading.
pub mod storage;
pub use storage::{Directory, LoadError};

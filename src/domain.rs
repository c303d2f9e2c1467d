//! The in-memory model of a documentation corpus.
//!
//! Nothing in this module touches the filesystem. Documents are parsed from
//! strings, collected into a [`Corpus`] and validated with [`validate`].

mod anchors;
pub use anchors::{Anchor, AnchorKey, AnchorTable, DuplicateAnchorError, Namespace};

mod config;
pub use config::Config;

mod corpus;
pub use corpus::Corpus;

/// Document identifiers, locations and parsed documents.
pub mod document;
pub use document::{AnchorDecl, AnchorOrigin, Block, BlockKind, DocId, Document, Include, Location};

mod includes;
pub use includes::{
    expand, ExpandedDocument, IncludeError, IncludeRange, Segment, SegmentKind,
};

mod label;
pub use label::Label;

mod references;
pub use references::{Reference, Resolution, Resolver, TOCTREE_ROLE};

mod role;
pub use role::{ObjectKind, RoleKind};

mod validation;
pub use validation::{
    validate, Diagnostic, DiagnosticKind, Report, ResolvedCorpus, Severity, Validation,
};

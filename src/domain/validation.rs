//! Whole-corpus validation.
//!
//! Validation is a batch pipeline over an in-memory corpus:
//!
//! 1. build the anchor table over the raw corpus (a failure here aborts the
//!    run, since nothing can be resolved against an ambiguous table)
//! 2. expand the includes of every top-level document
//! 3. resolve the references of every expanded document against the shared,
//!    read-only anchor table
//! 4. derive reachability and unreferenced-anchor warnings
//!
//! Steps 2 and 3 run in parallel, one unit of work per top-level document. A
//! fatal error only stops the document it occurs in.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::visit::Dfs;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::instrument;

use crate::domain::{
    expand, AnchorOrigin, AnchorTable, Config, Corpus, DocId, DuplicateAnchorError,
    ExpandedDocument, IncludeError, Location, Reference, Resolution, Resolver,
};

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Processing of the affected unit stopped.
    Fatal,
    /// Recorded, processing continued.
    Warning,
}

/// The kinds of problem validation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Two locations declare the same anchor.
    DuplicateAnchor,
    /// The include graph has a cycle.
    CircularInclude,
    /// A partial include names a range its target lacks.
    MissingIncludeRange,
    /// An include names a document outside the corpus.
    MissingIncludeTarget,
    /// A reference matches no anchor or document.
    UnresolvedReference,
    /// A role is outside the vocabulary and the external allow-list.
    UnknownRole,
    /// A reference points into a document no entry point reaches.
    UnreachableTarget,
    /// An explicit anchor is never referenced.
    UnreferencedAnchor,
}

impl DiagnosticKind {
    /// The severity diagnostics of this kind always have.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::DuplicateAnchor
            | Self::CircularInclude
            | Self::MissingIncludeRange
            | Self::MissingIncludeTarget => Severity::Fatal,
            Self::UnresolvedReference
            | Self::UnknownRole
            | Self::UnreachableTarget
            | Self::UnreferencedAnchor => Severity::Warning,
        }
    }

    /// The kebab-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateAnchor => "duplicate-anchor",
            Self::CircularInclude => "circular-include",
            Self::MissingIncludeRange => "missing-include-range",
            Self::MissingIncludeTarget => "missing-include-target",
            Self::UnresolvedReference => "unresolved-reference",
            Self::UnknownRole => "unknown-role",
            Self::UnreachableTarget => "unreachable-target",
            Self::UnreferencedAnchor => "unreferenced-anchor",
        }
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Diagnostic {
    /// The severity, always `kind.severity()`.
    pub severity: Severity,
    /// Where the problem is.
    pub location: Location,
    /// What kind of problem it is.
    pub kind: DiagnosticKind,
    /// A human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub const fn new(kind: DiagnosticKind, location: Location, message: String) -> Self {
        Self {
            severity: kind.severity(),
            location,
            kind,
            message,
        }
    }
}

impl From<&DuplicateAnchorError> for Diagnostic {
    fn from(error: &DuplicateAnchorError) -> Self {
        Self::new(
            DiagnosticKind::DuplicateAnchor,
            error.second.clone(),
            error.to_string(),
        )
    }
}

impl From<&IncludeError> for Diagnostic {
    fn from(error: &IncludeError) -> Self {
        let kind = match error {
            IncludeError::CircularInclude { .. } => DiagnosticKind::CircularInclude,
            IncludeError::MissingIncludeRange { .. } => DiagnosticKind::MissingIncludeRange,
            IncludeError::MissingIncludeTarget { .. } => DiagnosticKind::MissingIncludeTarget,
        };
        Self::new(kind, error.location().clone(), error.to_string())
    }
}

/// The diagnostics of a validation run.
///
/// Diagnostics are sorted, fatal errors first, and identical diagnostics
/// (a document included from several places) are reported once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn finish(mut self) -> Self {
        self.diagnostics.sort();
        self.diagnostics.dedup();
        self
    }

    /// All diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// The number of fatal diagnostics.
    #[must_use]
    pub fn fatal_count(&self) -> usize {
        self.count(Severity::Fatal)
    }

    /// The number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Whether any fatal error was reported. A run with fatal errors fails;
    /// warnings alone do not.
    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.fatal_count() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// The output of a validation run, rebuilt from scratch on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCorpus {
    /// The expanded text of every top-level document that expanded cleanly.
    pub expanded: BTreeMap<DocId, ExpandedDocument>,
    /// The references found in each expanded document, in order.
    pub references: BTreeMap<DocId, Vec<Reference>>,
}

/// The result of validating a corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Expanded documents and resolved references.
    pub resolved: ResolvedCorpus,
    /// Every error and warning.
    pub report: Report,
}

/// Validates a corpus.
///
/// # Examples
///
/// ```
/// use docref::{validate, Config, Corpus, DiagnosticKind};
///
/// let corpus = Corpus::from_sources([("x", "See :ref:`missing-label`.\n")]);
/// let validation = validate(&corpus, &Config::default());
///
/// let warnings: Vec<_> = validation
///     .report
///     .of_kind(DiagnosticKind::UnresolvedReference)
///     .collect();
/// assert_eq!(warnings.len(), 1);
/// assert!(!validation.report.has_fatal());
/// ```
#[must_use]
#[instrument(skip_all, fields(documents = corpus.len()))]
pub fn validate(corpus: &Corpus, config: &Config) -> Validation {
    let mut report = Report::default();

    let anchors = match AnchorTable::build(corpus) {
        Ok(anchors) => anchors,
        Err(duplicates) => {
            tracing::info!("{} duplicate anchors, aborting", duplicates.len());
            for duplicate in &duplicates {
                report.push(duplicate.into());
            }
            return Validation {
                resolved: ResolvedCorpus::default(),
                report: report.finish(),
            };
        }
    };
    tracing::debug!("built anchor table with {} anchors", anchors.len());

    let roots = corpus.top_level_documents();
    let expansions: Vec<_> = roots
        .par_iter()
        .filter_map(|id| corpus.get(id))
        .map(|document| (document.id().clone(), expand(corpus, document)))
        .collect();

    let mut expanded = BTreeMap::new();
    let mut cycles = BTreeSet::new();
    for (id, expansion) in expansions {
        match expansion {
            Ok(document) => {
                expanded.insert(id, document);
            }
            Err(error) => {
                tracing::debug!("expansion of {id} failed: {error}");
                if let Some(cycle) = error.cycle() {
                    if !cycles.insert(cycle) {
                        tracing::debug!("cycle already reported, skipping {id}");
                        continue;
                    }
                }
                report.push((&error).into());
            }
        }
    }

    let resolver = Resolver::new(corpus, &anchors, config.external_roles());
    let references: BTreeMap<DocId, Vec<Reference>> = expanded
        .par_iter()
        .map(|(id, document)| (id.clone(), resolver.resolve(document)))
        .collect();

    for reference in references.values().flatten() {
        match reference.resolution {
            Resolution::Unresolved => report.push(Diagnostic::new(
                DiagnosticKind::UnresolvedReference,
                reference.location.clone(),
                format!(
                    "unresolved {} reference to '{}'",
                    reference.role, reference.target
                ),
            )),
            Resolution::UnknownRole => report.push(Diagnostic::new(
                DiagnosticKind::UnknownRole,
                reference.location.clone(),
                format!("unknown role ':{}:'", reference.role),
            )),
            _ => {}
        }
    }

    let entry_points: Vec<DocId> = if config.entry_points().is_empty() {
        roots.into_iter().cloned().collect()
    } else {
        config.entry_points().iter().map(DocId::new).collect()
    };
    let reachable = reachable_documents(corpus, &references, &entry_points);

    for reference in references.values().flatten() {
        let Some(target) = reference.resolution.target_document() else {
            continue;
        };
        if !reachable.contains(target) {
            report.push(Diagnostic::new(
                DiagnosticKind::UnreachableTarget,
                reference.location.clone(),
                format!(
                    "{} reference to '{}' points into {target}, which no entry point reaches",
                    reference.role, reference.target
                ),
            ));
        }
    }

    if config.warn_unreferenced_anchors {
        let referenced: BTreeSet<_> = references
            .values()
            .flatten()
            .filter_map(|reference| match &reference.resolution {
                Resolution::Anchor(anchor) => Some(&anchor.key),
                _ => None,
            })
            .collect();
        for anchor in anchors.iter() {
            if anchor.origin == AnchorOrigin::Explicit && !referenced.contains(&anchor.key) {
                report.push(Diagnostic::new(
                    DiagnosticKind::UnreferencedAnchor,
                    anchor.location.clone(),
                    format!("anchor '{}' is never referenced", anchor.key),
                ));
            }
        }
    }

    Validation {
        resolved: ResolvedCorpus {
            expanded,
            references,
        },
        report: report.finish(),
    }
}

/// The documents reachable from the entry points through includes, `:doc:`
/// references and toctree entries.
fn reachable_documents<'a>(
    corpus: &'a Corpus,
    references: &'a BTreeMap<DocId, Vec<Reference>>,
    entry_points: &'a [DocId],
) -> BTreeSet<&'a DocId> {
    let mut graph = corpus.include_graph();
    for reference in references.values().flatten() {
        if let Resolution::Document(target) = &reference.resolution {
            graph.add_edge(&reference.location.document, target, ());
        }
    }

    let mut reachable = BTreeSet::new();
    let mut dfs = Dfs::empty(&graph);
    for entry in entry_points {
        if !graph.contains_node(entry) {
            tracing::warn!("entry point {entry} is not in the corpus");
            continue;
        }
        dfs.move_to(entry);
        while let Some(node) = dfs.next(&graph) {
            reachable.insert(node);
        }
    }
    reachable
}

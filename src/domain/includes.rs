//! Include expansion.
//!
//! Expansion is depth-first and left-to-right. Each include directive is
//! replaced in place by the (optionally partial) content of its target, which
//! is itself expanded first. Content pulled in by an indented directive is
//! indented to the directive's level.

use std::{collections::BTreeSet, ops::Range};

use nonempty::NonEmpty;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::domain::{BlockKind, Corpus, DocId, Document, Location};

/// Errors that stop the expansion of a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncludeError {
    /// Expanding the document would include a document that is already being
    /// expanded.
    #[error("circular include: {}", display_chain(.chain))]
    CircularInclude {
        /// The full inclusion chain, starting at the expanded document and
        /// ending with the document that closes the cycle.
        chain: NonEmpty<DocId>,
        /// The include directive that closes the cycle.
        location: Location,
    },

    /// A partial include names a range that the target does not have.
    #[error("include range not found in {target}: {reason}")]
    MissingIncludeRange {
        /// The included document.
        target: DocId,
        /// What could not be found.
        reason: String,
        /// The include directive.
        location: Location,
    },

    /// An include names a document that is not in the corpus.
    #[error("include target '{target}' not found")]
    MissingIncludeTarget {
        /// The target as written.
        target: String,
        /// The include directive.
        location: Location,
    },
}

impl IncludeError {
    /// The include directive the error is attributed to.
    #[must_use]
    pub const fn location(&self) -> &Location {
        match self {
            Self::CircularInclude { location, .. }
            | Self::MissingIncludeRange { location, .. }
            | Self::MissingIncludeTarget { location, .. } => location,
        }
    }
}

impl IncludeError {
    /// The documents that form the cycle of a [`IncludeError::CircularInclude`],
    /// each once, rotated to start at the smallest identifier.
    ///
    /// Every expansion that runs into the same cycle yields the same value,
    /// whichever document it started from and wherever it entered the cycle.
    #[must_use]
    pub fn cycle(&self) -> Option<Vec<DocId>> {
        let Self::CircularInclude { chain, .. } = self else {
            return None;
        };
        let chain: Vec<&DocId> = chain.iter().collect();
        let (closing, rest) = chain.split_last()?;
        let entry = rest.iter().position(|id| id == closing)?;
        let mut cycle: Vec<DocId> = rest[entry..].iter().map(|&id| id.clone()).collect();
        let smallest = cycle
            .iter()
            .enumerate()
            .min_by_key(|&(_, id)| id)
            .map_or(0, |(i, _)| i);
        cycle.rotate_left(smallest);
        Some(cycle)
    }
}

fn display_chain(chain: &NonEmpty<DocId>) -> String {
    chain
        .iter()
        .map(DocId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The part of an included document that is copied.
///
/// Line options select a 0-based, end-exclusive slice of lines and are
/// applied first. Marker options then narrow the slice to the lines after the
/// first line containing `start-after` and before the first following line
/// containing `end-before`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeRange {
    start_line: Option<usize>,
    end_line: Option<usize>,
    start_after: Option<String>,
    end_before: Option<String>,
}

impl IncludeRange {
    /// Reads the range from include directive options.
    ///
    /// Options that do not select a range are ignored.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if a line option is not a number.
    pub fn from_options(options: &[(String, String)]) -> Result<Self, String> {
        let mut range = Self::default();
        for (name, value) in options {
            match name.as_str() {
                "start-line" => range.start_line = Some(parse_line_number(name, value)?),
                "end-line" => range.end_line = Some(parse_line_number(name, value)?),
                "start-after" => range.start_after = Some(value.clone()),
                "end-before" => range.end_before = Some(value.clone()),
                other => tracing::debug!("ignoring include option '{other}'"),
            }
        }
        Ok(range)
    }

    /// Whether the whole document is selected.
    #[must_use]
    pub const fn is_whole(&self) -> bool {
        self.start_line.is_none()
            && self.end_line.is_none()
            && self.start_after.is_none()
            && self.end_before.is_none()
    }

    /// Selects the range within `lines`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if a line option is out of bounds
    /// or a marker does not occur.
    pub fn select(&self, lines: &[String]) -> Result<Range<usize>, String> {
        let mut start = self.start_line.unwrap_or(0);
        let mut end = self.end_line.unwrap_or(lines.len());
        if end > lines.len() {
            return Err(format!(
                "end-line {end} is past the end of the document ({} lines)",
                lines.len()
            ));
        }
        if start > end {
            return Err(format!("start-line {start} is after end-line {end}"));
        }

        if let Some(marker) = &self.start_after {
            let found = find_marker(lines, start..end, marker)
                .ok_or_else(|| format!("start-after marker '{marker}' not found"))?;
            start = found + 1;
        }
        if let Some(marker) = &self.end_before {
            end = find_marker(lines, start..end, marker)
                .ok_or_else(|| format!("end-before marker '{marker}' not found"))?;
        }

        Ok(start..end)
    }
}

fn parse_line_number(name: &str, value: &str) -> Result<usize, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{name} '{value}' is not a line number"))
}

fn find_marker(lines: &[String], range: Range<usize>, marker: &str) -> Option<usize> {
    range.into_iter().find(|&i| lines[i].contains(marker))
}

/// How a segment of expanded text is treated by the reference resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Prose, scanned for roles.
    Text,
    /// Never scanned.
    Opaque,
    /// Toctree entries.
    TocTree,
}

/// A run of expanded text that came from consecutive lines of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The document the lines were written in.
    pub origin: DocId,
    /// 0-based index of the first line within `origin`.
    pub first_line: usize,
    /// How the resolver treats the text.
    pub kind: SegmentKind,
    /// The text, with any include indentation applied.
    pub text: String,
}

/// A document with every include directive replaced by its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedDocument {
    root: DocId,
    segments: Vec<Segment>,
}

impl ExpandedDocument {
    /// A view of `document` with include directives left unexpanded.
    ///
    /// The directives themselves are opaque.
    #[must_use]
    pub fn unexpanded(document: &Document) -> Self {
        let segments = document
            .blocks()
            .iter()
            .map(|block| Segment {
                origin: document.id().clone(),
                first_line: block.lines.start,
                kind: segment_kind(&block.kind),
                text: document.lines()[block.lines.clone()].concat(),
            })
            .collect();
        Self {
            root: document.id().clone(),
            segments,
        }
    }

    /// The document that was expanded.
    #[must_use]
    pub const fn root(&self) -> &DocId {
        &self.root
    }

    /// The segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The full expanded text.
    #[must_use]
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Every document other than the root that contributed content.
    #[must_use]
    pub fn included_documents(&self) -> BTreeSet<&DocId> {
        self.segments
            .iter()
            .map(|s| &s.origin)
            .filter(|origin| *origin != &self.root)
            .collect()
    }
}

const fn segment_kind(kind: &BlockKind) -> SegmentKind {
    match kind {
        BlockKind::Text => SegmentKind::Text,
        BlockKind::TocTree => SegmentKind::TocTree,
        BlockKind::Opaque | BlockKind::Include(_) => SegmentKind::Opaque,
    }
}

/// Expands every include directive in `document`.
///
/// # Errors
///
/// Fails on the first include that cannot be expanded: a target outside the
/// corpus, a range the target does not have, or a cycle. The error carries
/// the location of the offending directive.
///
/// # Examples
///
/// ```
/// use docref::{expand, Corpus, DocId};
///
/// let corpus = Corpus::from_sources([
///     ("index", "Intro\n\n.. include:: /includes/fact.rst\n\nOutro\n"),
///     ("includes/fact", "A fact.\n"),
/// ]);
/// let index = corpus.get(&DocId::new("index")).unwrap();
///
/// let expanded = expand(&corpus, index).unwrap();
/// assert_eq!(expanded.text(), "Intro\n\nA fact.\n\nOutro\n");
/// ```
#[instrument(level = "debug", skip_all, fields(document = %document.id()))]
pub fn expand(corpus: &Corpus, document: &Document) -> Result<ExpandedDocument, IncludeError> {
    let mut expander = Expander {
        corpus,
        chain: NonEmpty::new(document.id().clone()),
        segments: Vec::new(),
    };
    expander.expand_range(document, 0..document.lines().len(), "", false)?;
    Ok(ExpandedDocument {
        root: document.id().clone(),
        segments: expander.segments,
    })
}

struct Expander<'c> {
    corpus: &'c Corpus,
    /// The documents currently being expanded, outermost first.
    chain: NonEmpty<DocId>,
    segments: Vec<Segment>,
}

impl<'c> Expander<'c> {
    fn expand_range(
        &mut self,
        document: &'c Document,
        range: Range<usize>,
        indent: &str,
        opaque: bool,
    ) -> Result<(), IncludeError> {
        for block in document.blocks() {
            let start = block.lines.start.max(range.start);
            let end = block.lines.end.min(range.end);
            if start >= end {
                continue;
            }

            let BlockKind::Include(include) = &block.kind else {
                let kind = if opaque {
                    SegmentKind::Opaque
                } else {
                    segment_kind(&block.kind)
                };
                self.push_segment(document, start..end, kind, indent);
                continue;
            };

            if !range.contains(&block.lines.start) {
                continue;
            }

            let location = Location::at_index(document.id().clone(), block.lines.start);
            let target = self
                .corpus
                .resolve_target(document.id(), &include.target)
                .and_then(|id| self.corpus.get(&id))
                .ok_or_else(|| IncludeError::MissingIncludeTarget {
                    target: include.target.clone(),
                    location: location.clone(),
                })?;

            if self.chain.contains(target.id()) {
                let mut chain = self.chain.clone();
                chain.push(target.id().clone());
                return Err(IncludeError::CircularInclude { chain, location });
            }

            let missing_range = |reason| IncludeError::MissingIncludeRange {
                target: target.id().clone(),
                reason,
                location: location.clone(),
            };
            let selection = IncludeRange::from_options(&include.options).map_err(missing_range)?;
            let sub_range = selection
                .select(target.lines())
                .map_err(missing_range)?;

            if selection.is_whole() {
                tracing::trace!("including {} at {location}", target.id());
            } else {
                tracing::trace!("including lines {sub_range:?} of {} at {location}", target.id());
            }

            let nested_indent = format!("{indent}{}", include.indent);
            self.chain.push(target.id().clone());
            self.expand_range(target, sub_range, &nested_indent, opaque || include.opaque)?;
            self.chain.pop();

            // Included content always ends its last line, so the including
            // document resumes on a fresh line.
            if let Some(last) = self.segments.last_mut() {
                if !last.text.is_empty() && !last.text.ends_with('\n') {
                    last.text.push('\n');
                }
            }
        }
        Ok(())
    }

    fn push_segment(
        &mut self,
        document: &Document,
        lines: Range<usize>,
        kind: SegmentKind,
        indent: &str,
    ) {
        let mut text = String::new();
        for line in &document.lines()[lines.clone()] {
            if !indent.is_empty() && !line.trim().is_empty() {
                text.push_str(indent);
            }
            text.push_str(line);
        }
        self.segments.push(Segment {
            origin: document.id().clone(),
            first_line: lines.start,
            kind,
            text,
        });
    }
}

use std::{
    fmt,
    ops::Range,
    path::{Component, Path},
};

use serde::Serialize;

use crate::domain::role::ObjectKind;

/// The identifier of a document.
///
/// Identifiers are the document's path relative to the corpus root, with `/`
/// separators and without the source extension. `core/2dsphere.txt` has the
/// identifier `core/2dsphere`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Creates an identifier from a corpus-relative path string.
    ///
    /// A leading `/` is ignored.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        match id.strip_prefix('/') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(id),
        }
    }

    /// Derives an identifier from a path relative to the corpus root.
    ///
    /// Returns `None` if the path contains anything other than plain
    /// components, or a component that is not valid UTF-8.
    #[must_use]
    pub fn from_relative_path(path: &Path, extensions: &[String]) -> Option<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        let joined = segments.join("/");
        Some(Self(strip_extension(&joined, extensions).to_string()))
    }

    /// Resolves a target written inside this document.
    ///
    /// Targets starting with `/` are relative to the corpus root, all others
    /// are relative to this document's directory. `.` and `..` segments are
    /// normalised and a known source extension is stripped.
    ///
    /// Returns `None` if the target escapes the corpus root or is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use docref::DocId;
    ///
    /// let extensions = vec!["txt".to_string()];
    /// let from = DocId::new("core/indexes/2d");
    ///
    /// assert_eq!(
    ///     from.resolve("/includes/fact-2d.txt", &extensions),
    ///     Some(DocId::new("includes/fact-2d"))
    /// );
    /// assert_eq!(
    ///     from.resolve("../geospatial", &extensions),
    ///     Some(DocId::new("core/geospatial"))
    /// );
    /// assert_eq!(from.resolve("../../../outside", &extensions), None);
    /// ```
    #[must_use]
    pub fn resolve(&self, target: &str, extensions: &[String]) -> Option<Self> {
        let target = target.trim();
        let mut segments: Vec<&str> = match target.strip_prefix('/') {
            Some(_) => Vec::new(),
            None => {
                let mut base: Vec<&str> = self.0.split('/').collect();
                base.pop();
                base
            }
        };

        for segment in target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return None;
        }

        let joined = segments.join("/");
        Some(Self(strip_extension(&joined, extensions).to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_extension<'a>(path: &'a str, extensions: &[String]) -> &'a str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, extension) = path.split_at(file_start + dot);
            if extensions.iter().any(|e| e == &extension[1..]) {
                stem
            } else {
                path
            }
        }
        _ => path,
    }
}

/// A position in the corpus: a document and a 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// The document.
    pub document: DocId,
    /// The 1-based line number.
    pub line: usize,
}

impl Location {
    /// The location of the line with 0-based index `index` in `document`.
    #[must_use]
    pub const fn at_index(document: DocId, index: usize) -> Self {
        Self {
            document,
            line: index + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.document, self.line)
    }
}

/// How an anchor came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "kind")]
pub enum AnchorOrigin {
    /// An explicit `.. _label:` declaration.
    Explicit,
    /// The implicit anchor of a section title.
    Section,
    /// An object description directive or glossary entry.
    Object(ObjectKind),
}

/// An anchor as declared in the source, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorDecl {
    /// The label or title text as written.
    pub name: String,
    /// What declared the anchor.
    pub origin: AnchorOrigin,
    /// 0-based index of the line the anchor points at.
    pub line: usize,
}

/// An include directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    /// The target path as written.
    pub target: String,
    /// Directive options (`:start-after:` and friends), in source order.
    pub options: Vec<(String, String)>,
    /// Leading whitespace of the directive line.
    ///
    /// Included content is indented by the same amount, so it sits at the
    /// nesting level of the directive.
    pub indent: String,
    /// Whether the directive sits in the body of an admonition. The content
    /// is then expanded but not scanned for roles.
    pub opaque: bool,
}

/// What a run of lines contains, as far as the resolver is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Prose that is scanned for roles.
    Text,
    /// Content that is never scanned: code, admonitions, comments and literal
    /// blocks.
    Opaque,
    /// The body of a `toctree` directive, whose entries link to documents.
    TocTree,
    /// An include directive, replaced by the target during expansion.
    Include(Include),
}

/// A contiguous run of lines of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The kind of content.
    pub kind: BlockKind,
    /// 0-based, end-exclusive line range.
    pub lines: Range<usize>,
}

/// A parsed source document.
///
/// Documents are immutable once parsed; a changed source file is parsed
/// again from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocId,
    lines: Vec<String>,
    blocks: Vec<Block>,
    anchors: Vec<AnchorDecl>,
}

impl Document {
    /// Parses RST source into a document.
    #[must_use]
    pub fn parse(id: DocId, source: &str) -> Self {
        crate::storage::rst::parse(id, source)
    }

    pub(crate) const fn from_parts(
        id: DocId,
        lines: Vec<String>,
        blocks: Vec<Block>,
        anchors: Vec<AnchorDecl>,
    ) -> Self {
        Self {
            id,
            lines,
            blocks,
            anchors,
        }
    }

    /// The document's identifier.
    #[must_use]
    pub const fn id(&self) -> &DocId {
        &self.id
    }

    /// The source lines, each including its line terminator (if any).
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The blocks of the document, in source order, covering every line.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The anchors declared by the document, in source order.
    #[must_use]
    pub fn anchors(&self) -> &[AnchorDecl] {
        &self.anchors
    }

    /// The include directives of the document with their 0-based line index.
    pub fn includes(&self) -> impl Iterator<Item = (&Include, usize)> {
        self.blocks.iter().filter_map(|block| match &block.kind {
            BlockKind::Include(include) => Some((include, block.lines.start)),
            _ => None,
        })
    }

    /// The original source text.
    #[must_use]
    pub fn source(&self) -> String {
        self.lines.concat()
    }
}

//! Role reference resolution.
//!
//! References are found in the prose segments of a (possibly expanded)
//! document and in toctree bodies. Each one is resolved against the corpus
//! and the shared anchor table, according to its [`RoleKind`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use crate::domain::{
    Anchor, AnchorKey, AnchorTable, Corpus, DocId, ExpandedDocument, Label, Location, RoleKind,
    Segment, SegmentKind,
};

static ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":(?P<role>[A-Za-z][\w.+-]*(?::[A-Za-z][\w.+-]*)?):`(?P<body>[^`]+)`")
        .expect("this must never fail")
});

static INLINE_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)``.+?``").expect("this must never fail"));

static EXPLICIT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<display>.*?)\s*<(?P<target>[^<>]+)>$").expect("this must never fail")
});

/// The role name recorded for toctree entries.
pub const TOCTREE_ROLE: &str = "toctree";

/// What a reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An anchor in the corpus.
    Anchor(Anchor),
    /// A document in the corpus.
    Document(DocId),
    /// Resolved outside the corpus (external allow-list).
    External,
    /// Written with a leading `!`, so never resolved.
    Suppressed,
    /// Nothing matches the target.
    Unresolved,
    /// The role is neither in the vocabulary nor in the external allow-list.
    UnknownRole,
}

impl Resolution {
    /// The document the reference points into, if it resolved inside the
    /// corpus.
    #[must_use]
    pub const fn target_document(&self) -> Option<&DocId> {
        match self {
            Self::Anchor(anchor) => Some(&anchor.location.document),
            Self::Document(id) => Some(id),
            _ => None,
        }
    }
}

/// An inline role occurrence (or toctree entry) and its resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The role name as written, e.g. `dbcommand`.
    pub role: String,
    /// The role's place in the vocabulary, if it has one.
    pub kind: Option<RoleKind>,
    /// The text shown to readers.
    pub display: String,
    /// The target: the explicit `<label>` if given, otherwise the display
    /// text.
    pub target: String,
    /// Where the reference was written.
    pub location: Location,
    /// The outcome of resolution.
    pub resolution: Resolution,
}

/// Resolves references against a corpus and its anchor table.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    corpus: &'a Corpus,
    anchors: &'a AnchorTable,
    external_roles: &'a [String],
}

impl<'a> Resolver<'a> {
    /// Creates a resolver.
    ///
    /// Roles named in `external_roles` are resolved outside the corpus and
    /// are never reported.
    #[must_use]
    pub const fn new(
        corpus: &'a Corpus,
        anchors: &'a AnchorTable,
        external_roles: &'a [String],
    ) -> Self {
        Self {
            corpus,
            anchors,
            external_roles,
        }
    }

    /// Finds and resolves every reference in `document`, in order.
    #[must_use]
    #[instrument(level = "debug", skip_all, fields(document = %document.root()))]
    pub fn resolve(&self, document: &ExpandedDocument) -> Vec<Reference> {
        let mut references = Vec::new();
        for segment in document.segments() {
            match segment.kind {
                SegmentKind::Text => self.scan_roles(segment, &mut references),
                SegmentKind::TocTree => self.scan_toctree(segment, &mut references),
                SegmentKind::Opaque => {}
            }
        }
        references
    }

    fn scan_roles(&self, segment: &Segment, references: &mut Vec<Reference>) {
        let text = blank_inline_literals(&segment.text);

        for captures in ROLE.captures_iter(&text) {
            let (Some(whole), Some(role), Some(body)) =
                (captures.get(0), captures.name("role"), captures.name("body"))
            else {
                continue;
            };

            let line = segment.first_line + text[..whole.start()].matches('\n').count();
            let location = Location::at_index(segment.origin.clone(), line);

            let body = collapse_whitespace(body.as_str());
            let (suppressed, body) = match body.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, body.as_str()),
            };
            let body = body.strip_prefix('~').unwrap_or(body);
            let (display, target) = split_target(body);

            let role = role.as_str();
            let kind = RoleKind::from_role_name(role);
            let resolution = if suppressed {
                Resolution::Suppressed
            } else {
                self.resolve_target(role, kind, &target, &segment.origin)
            };

            references.push(Reference {
                role: role.to_string(),
                kind,
                display,
                target,
                location,
                resolution,
            });
        }
    }

    fn scan_toctree(&self, segment: &Segment, references: &mut Vec<Reference>) {
        for (offset, line) in segment.text.lines().enumerate() {
            let entry = line.trim();
            if entry.is_empty()
                || entry.starts_with(':')
                || entry == "self"
                || entry.contains("://")
                || entry.contains('*')
            {
                continue;
            }

            let (display, target) = split_target(entry);
            let resolution = self.resolve_target(
                TOCTREE_ROLE,
                Some(RoleKind::Doc),
                &target,
                &segment.origin,
            );
            references.push(Reference {
                role: TOCTREE_ROLE.to_string(),
                kind: Some(RoleKind::Doc),
                display,
                target,
                location: Location::at_index(segment.origin.clone(), segment.first_line + offset),
                resolution,
            });
        }
    }

    fn resolve_target(
        &self,
        role: &str,
        kind: Option<RoleKind>,
        target: &str,
        from: &DocId,
    ) -> Resolution {
        if self.is_external(role) {
            return Resolution::External;
        }
        let Some(kind) = kind else {
            return Resolution::UnknownRole;
        };

        let resolved = match kind {
            RoleKind::Doc => self
                .corpus
                .resolve_target(from, target)
                .filter(|id| self.corpus.contains(id))
                .map(Resolution::Document),
            RoleKind::Ref => self.lookup(target, AnchorKey::label),
            RoleKind::Object(object) => self.lookup(target, |label| AnchorKey::object(object, label)),
            RoleKind::Issue | RoleKind::Link => None,
        };
        resolved.unwrap_or(Resolution::Unresolved)
    }

    fn lookup(&self, target: &str, key: impl FnOnce(Label) -> AnchorKey) -> Option<Resolution> {
        let key = key(Label::normalize(target)?);
        self.anchors
            .get(&key)
            .map(|anchor| Resolution::Anchor(anchor.clone()))
    }

    fn is_external(&self, role: &str) -> bool {
        let short = role.rsplit(':').next().unwrap_or(role);
        self.external_roles
            .iter()
            .any(|external| external == role || external == short)
    }
}

/// Replaces inline literals with spaces, keeping line breaks, so roles
/// inside them are not found and line numbers stay put.
fn blank_inline_literals(text: &str) -> String {
    INLINE_LITERAL
        .replace_all(text, |captures: &regex::Captures| {
            captures[0]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect::<String>()
        })
        .into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `display text <target>` into its parts. Without an explicit target
/// the whole body is both display text and target.
fn split_target(body: &str) -> (String, String) {
    match EXPLICIT_TARGET.captures(body) {
        Some(captures) => {
            let target = captures["target"].trim().to_string();
            let display = captures["display"].trim();
            let display = if display.is_empty() {
                target.clone()
            } else {
                display.to_string()
            };
            (display, target)
        }
        None => (body.to_string(), body.to_string()),
    }
}

//! The corpus-wide anchor table.
//!
//! The table is built once, over the raw (unexpanded) corpus, and is then
//! only ever read. Every document can reference every anchor in it.

use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
};

use nonempty::NonEmpty;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::domain::{AnchorOrigin, Corpus, Label, Location, ObjectKind};

/// The namespace an anchor lives in.
///
/// Explicit labels and section titles share one namespace. Each kind of
/// object description has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Explicit labels and section titles.
    Label,
    /// Objects of one kind.
    Object(ObjectKind),
}

impl From<AnchorOrigin> for Namespace {
    fn from(origin: AnchorOrigin) -> Self {
        match origin {
            AnchorOrigin::Explicit | AnchorOrigin::Section => Self::Label,
            AnchorOrigin::Object(kind) => Self::Object(kind),
        }
    }
}

/// The key an anchor is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AnchorKey {
    /// The namespace.
    pub namespace: Namespace,
    /// The normalised label.
    pub label: Label,
}

impl AnchorKey {
    /// A key in the label namespace.
    #[must_use]
    pub const fn label(label: Label) -> Self {
        Self {
            namespace: Namespace::Label,
            label,
        }
    }

    /// A key in the namespace of objects of kind `kind`.
    #[must_use]
    pub const fn object(kind: ObjectKind, label: Label) -> Self {
        Self {
            namespace: Namespace::Object(kind),
            label,
        }
    }
}

impl fmt::Display for AnchorKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.namespace {
            Namespace::Label => write!(f, "{}", self.label),
            Namespace::Object(kind) => write!(f, "{kind}:{}", self.label),
        }
    }
}

/// An addressable location in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    /// The lookup key.
    pub key: AnchorKey,
    /// The label, title or object name as written.
    pub name: String,
    /// What declared the anchor.
    pub origin: AnchorOrigin,
    /// Where the anchor points.
    pub location: Location,
}

/// Two different locations declare the same anchor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate anchor '{key}' declared at {first} and {second}")]
pub struct DuplicateAnchorError {
    /// The colliding key.
    pub key: AnchorKey,
    /// The location that declared the anchor first.
    pub first: Location,
    /// The location that declared it again.
    pub second: Location,
}

/// Every anchor in a corpus, keyed by namespace and normalised label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorTable {
    anchors: BTreeMap<AnchorKey, Anchor>,
}

impl AnchorTable {
    /// Collects the anchors of every document in the corpus.
    ///
    /// An explicit label directly above a section title points at the title,
    /// so a label and title that normalise to the same key are one anchor,
    /// not a duplicate.
    ///
    /// # Errors
    ///
    /// Returns every [`DuplicateAnchorError`] found. Anchors are never
    /// silently overwritten.
    #[instrument(level = "debug", skip_all, fields(documents = corpus.len()))]
    pub fn build(corpus: &Corpus) -> Result<Self, NonEmpty<DuplicateAnchorError>> {
        let mut anchors: BTreeMap<AnchorKey, Anchor> = BTreeMap::new();
        let mut duplicates = Vec::new();

        for document in corpus.documents() {
            for decl in document.anchors() {
                let Some(label) = Label::normalize(&decl.name) else {
                    tracing::debug!(
                        "ignoring anchor '{}' in {} with an empty label",
                        decl.name,
                        document.id()
                    );
                    continue;
                };

                let key = AnchorKey {
                    namespace: decl.origin.into(),
                    label,
                };
                let location = Location::at_index(document.id().clone(), decl.line);

                match anchors.entry(key) {
                    Entry::Vacant(entry) => {
                        let key = entry.key().clone();
                        entry.insert(Anchor {
                            key,
                            name: decl.name.clone(),
                            origin: decl.origin,
                            location,
                        });
                    }
                    // A label directly above a title with the same key names the same anchor.
                    Entry::Occupied(entry)
                        if entry.get().location == location && entry.get().origin != decl.origin => {}
                    Entry::Occupied(entry) => duplicates.push(DuplicateAnchorError {
                        key: entry.key().clone(),
                        first: entry.get().location.clone(),
                        second: location,
                    }),
                }
            }
        }

        NonEmpty::from_vec(duplicates).map_or(Ok(Self { anchors }), Err)
    }

    /// Looks up an anchor.
    #[must_use]
    pub fn get(&self, key: &AnchorKey) -> Option<&Anchor> {
        self.anchors.get(key)
    }

    /// All anchors, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    /// The number of anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocId;

    fn label(text: &str) -> AnchorKey {
        AnchorKey::label(Label::normalize(text).unwrap())
    }

    #[test]
    fn collects_explicit_section_and_object_anchors() {
        let corpus = Corpus::from_sources([(
            "reference/command/geoNear",
            ".. _geonear-command:\n\n=======\ngeoNear\n=======\n\n.. dbcommand:: geoNear\n\n   Text.\n",
        )]);
        let table = AnchorTable::build(&corpus).unwrap();

        let keys: Vec<String> = table.iter().map(|a| a.key.to_string()).collect();
        assert_eq!(keys, vec!["geonear", "geonear-command", "dbcommand:geonear"]);

        let explicit = table.get(&label("geonear-command")).unwrap();
        assert_eq!(explicit.origin, AnchorOrigin::Explicit);
        assert_eq!(
            explicit.location,
            Location::at_index(DocId::new("reference/command/geoNear"), 3)
        );
    }

    #[test]
    fn building_twice_is_deterministic() {
        let corpus = Corpus::from_sources([
            ("a", ".. _one:\n\nOne\n===\n\nTwo\n===\n"),
            ("b", ".. _three:\n\ntext\n"),
        ]);
        assert_eq!(
            AnchorTable::build(&corpus).unwrap(),
            AnchorTable::build(&corpus).unwrap()
        );
    }

    #[test]
    fn label_above_matching_title_is_one_anchor() {
        let corpus = Corpus::from_sources([(
            "a",
            ".. _geospatial-indexes:\n\nGeospatial Indexes\n==================\n",
        )]);
        let table = AnchorTable::build(&corpus).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(&label("geospatial-indexes")).unwrap().origin,
            AnchorOrigin::Explicit
        );
    }

    #[test]
    fn repeated_label_above_one_title_is_a_duplicate() {
        let corpus = Corpus::from_sources([("a", ".. _loc:\n.. _loc:\n\nTitle\n=====\n")]);
        let errors = AnchorTable::build(&corpus).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.head.key, label("loc"));
        assert_eq!(errors.head.first, errors.head.second);
    }

    #[test]
    fn labels_normalising_alike_above_one_title_are_a_duplicate() {
        let corpus = Corpus::from_sources([(
            "a",
            ".. _2d_index:\n.. _2d-index:\n\nOther\n=====\n",
        )]);
        let errors = AnchorTable::build(&corpus).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.head.key, label("2d-index"));
    }

    #[test]
    fn duplicate_labels_across_documents() {
        let corpus = Corpus::from_sources([
            ("x", ".. _loc:\n\ntext\n"),
            ("y", "intro\n\n.. _loc:\n\ntext\n"),
        ]);
        let errors = AnchorTable::build(&corpus).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.head,
            DuplicateAnchorError {
                key: label("loc"),
                first: Location::at_index(DocId::new("x"), 0),
                second: Location::at_index(DocId::new("y"), 2),
            }
        );
    }

    #[test]
    fn labels_collide_after_normalisation() {
        let corpus = Corpus::from_sources([(
            "a",
            ".. _2d_index:\n\ntext\n\n.. _2d-Index:\n\nmore\n",
        )]);
        let errors = AnchorTable::build(&corpus).unwrap_err();
        assert_eq!(errors.head.key, label("2d-index"));
    }

    #[test]
    fn namespaces_do_not_collide() {
        let corpus = Corpus::from_sources([(
            "a",
            "near\n====\n\n.. query:: $near\n\n.. expression:: near\n",
        )]);
        let table = AnchorTable::build(&corpus).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn every_duplicate_is_reported() {
        let corpus = Corpus::from_sources([
            ("a", "Overview\n========\n"),
            ("b", "Overview\n========\n"),
            ("c", "Overview\n========\n"),
        ]);
        let errors = AnchorTable::build(&corpus).unwrap_err();
        let seconds: Vec<_> = errors.iter().map(|e| e.second.document.as_str()).collect();
        assert_eq!(seconds, vec!["b", "c"]);
    }
}

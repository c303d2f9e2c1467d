//! The in-memory set of documents.
//!
//! The [`Corpus`] knows nothing about the filesystem. Documents are added
//! already parsed, keyed by their [`DocId`].

use std::collections::BTreeMap;

use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap, Direction};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::domain::{Config, DocId, Document};

/// A set of documents that are validated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    documents: BTreeMap<DocId, Document>,

    /// Source extensions stripped from include and `:doc:` targets.
    extensions: Vec<String>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new(Config::default().source_extensions().to_vec())
    }
}

impl Corpus {
    /// Creates an empty corpus.
    #[must_use]
    pub const fn new(extensions: Vec<String>) -> Self {
        Self {
            documents: BTreeMap::new(),
            extensions,
        }
    }

    /// Parses in-memory sources into a corpus with the default source
    /// extensions.
    ///
    /// Each source is a `(document id, text)` pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use docref::{Corpus, DocId};
    ///
    /// let corpus = Corpus::from_sources([
    ///     ("index", "See :doc:`/geo`.\n"),
    ///     ("geo", "Geo\n===\n"),
    /// ]);
    ///
    /// assert_eq!(corpus.len(), 2);
    /// assert!(corpus.contains(&DocId::new("geo")));
    /// ```
    #[must_use]
    pub fn from_sources<'s>(sources: impl IntoIterator<Item = (&'s str, &'s str)>) -> Self {
        let sources: Vec<_> = sources.into_iter().collect();
        let documents: Vec<Document> = sources
            .into_par_iter()
            .map(|(id, text)| Document::parse(DocId::new(id), text))
            .collect();

        let mut corpus = Self::default();
        for document in documents {
            corpus.insert(document);
        }
        corpus
    }

    /// Adds a document, returning the document it replaced, if any.
    pub fn insert(&mut self, document: Document) -> Option<Document> {
        self.documents.insert(document.id().clone(), document)
    }

    /// Retrieves a document by identifier.
    #[must_use]
    pub fn get(&self, id: &DocId) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Whether the corpus contains a document.
    #[must_use]
    pub fn contains(&self, id: &DocId) -> bool {
        self.documents.contains_key(id)
    }

    /// All documents, ordered by identifier.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// The number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus has no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Resolves a target written in document `from`. See [`DocId::resolve`].
    #[must_use]
    pub fn resolve_target(&self, from: &DocId, target: &str) -> Option<DocId> {
        from.resolve(target, &self.extensions)
    }

    /// The include graph of the raw corpus.
    ///
    /// Every document is a node. Edges point from the including document to
    /// the included one; includes of documents outside the corpus are left
    /// out.
    #[must_use]
    pub fn include_graph(&self) -> DiGraphMap<&DocId, ()> {
        let mut graph = DiGraphMap::with_capacity(self.documents.len(), self.documents.len());
        for (id, document) in &self.documents {
            graph.add_node(id);
            for (include, _) in document.includes() {
                let Some(target) = self.resolve_target(id, &include.target) else {
                    continue;
                };
                if let Some((target, _)) = self.documents.get_key_value(&target) {
                    graph.add_edge(id, target, ());
                }
            }
        }
        graph
    }

    /// The documents that are validated as independent units.
    ///
    /// These are the documents no other document includes. A group of
    /// documents that only include each other (an include cycle nobody else
    /// reaches) contributes its smallest identifier, so the cycle is still
    /// expanded, and reported, exactly once.
    #[must_use]
    pub fn top_level_documents(&self) -> Vec<&DocId> {
        let graph = self.include_graph();
        let mut roots: Vec<&DocId> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                !component.iter().any(|&node| {
                    graph
                        .neighbors_directed(node, Direction::Incoming)
                        .any(|from| !component.contains(&from))
                })
            })
            .filter_map(|component| component.into_iter().min())
            .collect();
        roots.sort();
        roots
    }
}

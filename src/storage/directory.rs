//! A filesystem backed documentation corpus.
//!
//! The [`Directory`] walks a directory tree, reads every source file in
//! parallel and parses it into the filesystem agnostic [`Corpus`].

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use nonempty::NonEmpty;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;
use walkdir::WalkDir;

use crate::domain::{validate, Config, Corpus, DocId, Document, Validation};

/// The name of the configuration file at the corpus root.
pub const CONFIG_FILE: &str = "docref.toml";

/// A directory whose documents have been read and parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    corpus: Corpus,
    config: Config,
}

/// A directory that has not been read yet.
#[derive(Debug, PartialEq, Eq)]
pub struct Unloaded;

/// A filesystem backed documentation corpus.
#[derive(Debug)]
pub struct Directory<S> {
    /// The corpus root. Document ids are relative to it.
    root: PathBuf,
    state: S,
}

impl<S> Directory<S> {
    /// The corpus root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Directory<Unloaded> {
    /// Opens a directory at the given path.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
            state: Unloaded,
        }
    }

    /// Reads and parses every source document under the root.
    ///
    /// Files are read and parsed in parallel. If two files map to the same
    /// document id (`a.txt` and `a.rst`), the first in path order is kept and
    /// the other is skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] listing every source file that could not be
    /// read.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn load(self) -> Result<Directory<Loaded>, LoadError> {
        let config = load_config(&self.root);
        let paths = collect_source_paths(&self.root, &config);
        tracing::debug!("found {} source files", paths.len());

        let (documents, failures): (Vec<_>, Vec<_>) = paths
            .par_iter()
            .map(|path| try_load_document(path, &self.root, &config))
            .partition(Result::is_ok);

        let failures: Vec<_> = failures.into_iter().filter_map(Result::err).collect();
        if let Some(failures) = NonEmpty::from_vec(failures) {
            return Err(LoadError { failures });
        }

        let mut corpus = Corpus::new(config.source_extensions().to_vec());
        for document in documents.into_iter().filter_map(Result::ok).flatten() {
            if corpus.contains(document.id()) {
                tracing::warn!(
                    "skipping a second source file for document {}",
                    document.id()
                );
                continue;
            }
            corpus.insert(document);
        }

        Ok(Directory {
            root: self.root,
            state: Loaded { corpus, config },
        })
    }
}

impl Directory<Loaded> {
    /// The parsed corpus.
    #[must_use]
    pub const fn corpus(&self) -> &Corpus {
        &self.state.corpus
    }

    /// The configuration the corpus was loaded with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.state.config
    }

    /// Validates the loaded corpus.
    #[must_use]
    pub fn validate(&self) -> Validation {
        validate(&self.state.corpus, &self.state.config)
    }
}

/// Source files that could not be read.
#[derive(Debug, thiserror::Error)]
pub struct LoadError {
    /// Each unreadable file with the reason.
    pub failures: NonEmpty<(PathBuf, io::Error)>,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to read source files: ")?;
        for (i, (path, error)) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} ({error})", path.display())?;
        }
        Ok(())
    }
}

/// Loads `docref.toml` from the root, falling back to the defaults.
#[must_use]
pub fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_FILE);
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

fn collect_source_paths(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !config.is_excluded(name))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && config.is_source(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

/// Reads and parses one file. Paths that yield no document id are skipped.
fn try_load_document(
    path: &Path,
    root: &Path,
    config: &Config,
) -> Result<Option<Document>, (PathBuf, io::Error)> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let Some(id) = DocId::from_relative_path(relative, config.source_extensions()) else {
        tracing::debug!("Skipping file with no document id at {}", path.display());
        return Ok(None);
    };

    let source = std::fs::read_to_string(path).map_err(|e| (path.to_path_buf(), e))?;
    Ok(Some(Document::parse(id, &source)))
}

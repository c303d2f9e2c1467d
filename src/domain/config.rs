use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for a documentation corpus.
///
/// Stored as `docref.toml` at the corpus root. Every field is optional in
/// the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// File extensions of source documents, without the dot.
    ///
    /// These are also stripped from include and `:doc:` targets, so
    /// `/includes/fact.rst` names the document `includes/fact`.
    source_extensions: Vec<String>,

    /// Directory or file names skipped while walking the corpus root.
    exclude: Vec<String>,

    /// Roles that point outside the corpus and are never resolved.
    ///
    /// An entry matches either the full role name (`mongodb:manual`) or its
    /// last component (`manual`).
    external_roles: Vec<String>,

    /// Documents reachability is computed from.
    ///
    /// If this is empty, every top-level document is an entry point.
    entry_points: Vec<String>,

    /// Whether explicit anchors that nothing references are reported.
    pub warn_unreferenced_anchors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_extensions: default_source_extensions(),
            exclude: default_exclude(),
            external_roles: default_external_roles(),
            entry_points: Vec::new(),
            warn_unreferenced_anchors: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the source file extensions.
    #[must_use]
    pub fn source_extensions(&self) -> &[String] {
        &self.source_extensions
    }

    /// Returns the excluded names.
    #[must_use]
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Returns the external roles.
    #[must_use]
    pub fn external_roles(&self) -> &[String] {
        &self.external_roles
    }

    /// Returns the configured entry points.
    #[must_use]
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    /// Sets the entry points.
    pub fn set_entry_points(&mut self, entry_points: Vec<String>) {
        self.entry_points = entry_points;
    }

    /// Checks if a directory or file name is excluded.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|excluded| excluded == name)
    }

    /// Checks if a path has one of the source extensions.
    #[must_use]
    pub fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| self.source_extensions.iter().any(|e| e == extension))
    }
}

fn default_source_extensions() -> Vec<String> {
    vec!["txt".to_string(), "rst".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec!["build".to_string(), ".git".to_string()]
}

fn default_external_roles() -> Vec<String> {
    [
        "issue",
        "manual",
        "api",
        "wiki",
        "dochub",
        "website",
        "source",
        "ecosystem",
        "driver",
        "rfc",
        "pep",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_source_extensions")]
        source_extensions: Vec<String>,

        #[serde(default = "default_exclude")]
        exclude: Vec<String>,

        #[serde(default = "default_external_roles")]
        external_roles: Vec<String>,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        entry_points: Vec<String>,

        #[serde(default)]
        warn_unreferenced_anchors: bool,
    },
}

impl From<Versions> for super::Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                source_extensions,
                exclude,
                external_roles,
                entry_points,
                warn_unreferenced_anchors,
            } => Self {
                source_extensions,
                exclude,
                external_roles,
                entry_points,
                warn_unreferenced_anchors,
            },
        }
    }
}

impl From<super::Config> for Versions {
    fn from(config: super::Config) -> Self {
        Self::V1 {
            source_extensions: config.source_extensions,
            exclude: config.exclude,
            external_roles: config.external_roles,
            entry_points: config.entry_points,
            warn_unreferenced_anchors: config.warn_unreferenced_anchors,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nsource_extensions = [\"txt\"]\nexternal_roles = [\"issue\"]\nentry_points = [\"index\"]\nwarn_unreferenced_anchors = true\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.source_extensions(), &["txt".to_string()]);
        assert_eq!(config.external_roles(), &["issue".to_string()]);
        assert_eq!(config.entry_points(), &["index".to_string()]);
        assert_eq!(config.exclude(), default_exclude().as_slice());
        assert!(config.warn_unreferenced_anchors);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nexclude = \"build\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docref.toml");

        let mut config = Config::default();
        config.set_entry_points(vec!["index".to_string()]);
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn source_files_are_recognised_by_extension() {
        let config = Config::default();
        assert!(config.is_source(Path::new("core/2d.txt")));
        assert!(config.is_source(Path::new("includes/fact.rst")));
        assert!(!config.is_source(Path::new("conf.py")));
        assert!(!config.is_source(Path::new("Makefile")));
        assert!(config.is_excluded("build"));
        assert!(!config.is_excluded("core"));
    }
}

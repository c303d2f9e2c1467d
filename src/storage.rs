pub mod directory;
/// Parsing of RST-like markup into a [`Document`](crate::domain::Document).
pub mod rst;

pub use directory::{load_config, Directory, LoadError, Loaded, Unloaded, CONFIG_FILE};

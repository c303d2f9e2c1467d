use std::path::{Path, PathBuf};

use clap::Parser;
use docref::{expand, DocId, Directory, ExpandedDocument};
use tracing::instrument;

use super::terminal::{Palette, Style};

#[derive(Debug, Parser)]
#[command(about = "Print a document with every include expanded")]
pub struct Expand {
    /// The document, as a path relative to the root (`core/2d` or
    /// `core/2d.txt`)
    document: String,

    /// Prefix each block of text with the document and line it came from
    #[arg(long)]
    annotate: bool,
}

impl Expand {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load()?;

        let id = DocId::from_relative_path(
            Path::new(self.document.trim_start_matches('/')),
            directory.config().source_extensions(),
        )
        .ok_or_else(|| anyhow::anyhow!("'{}' is not a document path", self.document))?;

        let document = directory
            .corpus()
            .get(&id)
            .ok_or_else(|| anyhow::anyhow!("document '{id}' not found"))?;

        let expanded = expand(directory.corpus(), document)?;
        print!("{}", render(&expanded, self.annotate, Palette::detect()));

        Ok(())
    }
}

fn render(expanded: &ExpandedDocument, annotate: bool, palette: Palette) -> String {
    if !annotate {
        return expanded.text();
    }

    let mut output = String::new();
    for segment in expanded.segments() {
        let header = format!(".. from {}:{}", segment.origin, segment.first_line + 1);
        output.push_str(&palette.paint(Style::Dim, &header));
        output.push('\n');
        output.push_str(&segment.text);
    }
    output
}

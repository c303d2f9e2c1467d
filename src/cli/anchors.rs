use std::path::PathBuf;

use clap::Parser;
use docref::{AnchorTable, Directory};
use tracing::instrument;

use super::terminal::{Palette, Style};

#[derive(Debug, Parser)]
#[command(about = "List every anchor in the corpus")]
pub struct Anchors {
    /// Print the anchors as a JSON array
    #[arg(long)]
    json: bool,
}

impl Anchors {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load()?;
        let palette = Palette::detect();

        let anchors = match AnchorTable::build(directory.corpus()) {
            Ok(anchors) => anchors,
            Err(duplicates) => {
                for duplicate in &duplicates {
                    eprintln!("{}: {duplicate}", palette.paint(Style::Error, "error"));
                }
                anyhow::bail!("{} duplicate anchors", duplicates.len());
            }
        };

        if self.json {
            let anchors: Vec<_> = anchors.iter().collect();
            println!("{}", serde_json::to_string_pretty(&anchors)?);
        } else {
            print!("{}", render_table(&anchors, palette));
        }

        Ok(())
    }
}

/// One line per anchor: the key, padded, then where it is declared.
fn render_table(anchors: &AnchorTable, palette: Palette) -> String {
    anchors
        .iter()
        .map(|anchor| {
            format!(
                "{:<40} {}\n",
                anchor.key.to_string(),
                palette.paint(Style::Dim, &anchor.location.to_string())
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use docref::Corpus;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn table_lists_keys_in_order_with_locations() {
        let corpus = Corpus::from_sources([(
            "reference/command/geoNear",
            ".. _geonear-command:\n\n=======\ngeoNear\n=======\n\n.. dbcommand:: geoNear\n",
        )]);
        let anchors = AnchorTable::build(&corpus).unwrap();
        let output = render_table(&anchors, Palette::plain());

        let keys: Vec<_> = output
            .lines()
            .map(|line| line.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(keys, vec!["geonear", "geonear-command", "dbcommand:geonear"]);
        assert!(output
            .lines()
            .all(|line| line.ends_with("reference/command/geoNear:4")
                || line.ends_with("reference/command/geoNear:7")));
    }

    #[test]
    fn duplicate_anchors_fail_the_command() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        std::fs::write(root.join("a.txt"), ".. _loc:\n\ntext\n").unwrap();
        std::fs::write(root.join("b.txt"), ".. _loc:\n\ntext\n").unwrap();

        let anchors = Anchors { json: false };
        let error = anchors.run(root).unwrap_err();
        assert_eq!(error.to_string(), "1 duplicate anchors");
    }
}

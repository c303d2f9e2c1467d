//! A line-oriented reader for the subset of RST the resolver
//! cares about.
//!
//! The reader does not build a full document tree. It splits the source into
//! [`Block`]s that say which lines are prose (scanned for roles), which are
//! opaque (code, admonitions, comments, literal blocks), which are toctree
//! bodies and which are include directives. Along the way it collects every
//! anchor the document declares.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{
    AnchorDecl, AnchorOrigin, Block, BlockKind, DocId, Document, Include, ObjectKind,
};

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.\.\s+_(`[^`]+`|[^:`]+):\s*$").expect("this must never fail")
});

static HYPERLINK_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.\s+_[^:]*:\s+\S").expect("this must never fail"));

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.\.\s+([A-Za-z0-9][\w:+-]*)::(?:\s+(.*?))?\s*$").expect("this must never fail")
});

static OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:([\w-]+):(?:\s+(.*?))?\s*$").expect("this must never fail"));

/// Directives whose body is not scanned for roles or anchors. Include
/// directives in the body are still expanded.
const ADMONITIONS: &[&str] = &[
    "admonition",
    "attention",
    "caution",
    "danger",
    "error",
    "hint",
    "important",
    "note",
    "tip",
    "warning",
    "seealso",
];

/// Directives whose whole extent is verbatim text.
const VERBATIM_DIRECTIVES: &[&str] = &[
    "code",
    "code-block",
    "sourcecode",
    "literalinclude",
    "raw",
    "math",
];

/// Parses RST source into a [`Document`].
///
/// Parsing never fails: anything the reader does not recognise is prose.
#[must_use]
pub fn parse(id: DocId, source: &str) -> Document {
    let lines: Vec<String> = source.split_inclusive('\n').map(str::to_string).collect();
    let (blocks, anchors) = {
        let mut parser = Parser::new(&lines);
        parser.run();
        parser.finish()
    };
    Document::from_parts(id, lines, blocks, anchors)
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    blocks: Vec<Block>,
    anchors: Vec<AnchorDecl>,
    /// Explicit labels waiting to learn whether a section title follows.
    pending: Vec<(String, usize)>,
}

impl<'a> Parser<'a> {
    fn new(lines: &'a [String]) -> Self {
        Self {
            lines: lines
                .iter()
                .map(|line| line.trim_end_matches(['\n', '\r']))
                .collect(),
            blocks: Vec::new(),
            anchors: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            let line = self.lines[i];
            if is_blank(line) {
                self.push(BlockKind::Text, i, i + 1);
                i += 1;
                continue;
            }

            let indent = indent_width(line);
            let trimmed = line.trim();

            if is_explicit_markup(trimmed) {
                i = self.explicit_markup(i, indent, trimmed);
                continue;
            }

            if indent == 0 {
                if let Some((title, title_line, end)) = self.section_title(i) {
                    self.flush_pending(Some(title_line));
                    self.anchors.push(AnchorDecl {
                        name: title.to_string(),
                        origin: AnchorOrigin::Section,
                        line: title_line,
                    });
                    self.push(BlockKind::Text, i, end);
                    i = end;
                    continue;
                }
            }

            self.flush_pending(None);
            self.push(BlockKind::Text, i, i + 1);
            i = if trimmed.ends_with("::") {
                self.literal_block(i + 1, indent)
            } else {
                i + 1
            };
        }
    }

    fn finish(mut self) -> (Vec<Block>, Vec<AnchorDecl>) {
        self.flush_pending(None);
        (self.blocks, self.anchors)
    }

    /// Handles a line starting with `..`. Returns the index of the next line
    /// to process.
    fn explicit_markup(&mut self, start: usize, indent: usize, trimmed: &str) -> usize {
        if let Some(captures) = ANCHOR.captures(trimmed) {
            let name = captures[1].trim_matches('`').trim().to_string();
            self.pending.push((name, start));
            self.push(BlockKind::Opaque, start, start + 1);
            return start + 1;
        }

        self.flush_pending(None);

        if HYPERLINK_TARGET.is_match(trimmed) || !DIRECTIVE.is_match(trimmed) {
            // Comments and external hyperlink targets, with any indented
            // continuation. A bare `..` only covers its own line.
            let end = if trimmed == ".." {
                start + 1
            } else {
                self.extent(start + 1, indent)
            };
            self.push(BlockKind::Opaque, start, end);
            return end;
        }

        let Some(captures) = DIRECTIVE.captures(trimmed) else {
            return start + 1;
        };
        let name = captures[1].to_string();
        let argument = captures.get(2).map_or("", |m| m.as_str()).to_string();

        let (options, body_start) = self.options(start + 1, indent);
        let end = self.extent(body_start, indent);

        match name.as_str() {
            "include" | "includes" => {
                let line = self.lines[start];
                let include = Include {
                    target: argument,
                    options,
                    indent: line[..indent].to_string(),
                    opaque: false,
                };
                self.push(BlockKind::Include(include), start, body_start);
                body_start
            }
            "toctree" => {
                self.push(BlockKind::Opaque, start, body_start);
                self.push(BlockKind::TocTree, body_start, end);
                end
            }
            "glossary" => {
                self.push(BlockKind::Opaque, start, body_start);
                self.glossary_terms(body_start, end);
                body_start
            }
            name if VERBATIM_DIRECTIVES.contains(&name) => {
                self.push(BlockKind::Opaque, start, end);
                end
            }
            name if ADMONITIONS.contains(&name) => {
                self.push(BlockKind::Opaque, start, body_start);
                self.admonition_body(body_start, end);
                end
            }
            name => {
                if let Some(kind) = ObjectKind::from_directive(name) {
                    let declared = match kind {
                        ObjectKind::Option => argument.split_whitespace().next().unwrap_or(""),
                        _ => argument.as_str(),
                    };
                    if !declared.is_empty() {
                        self.anchors.push(AnchorDecl {
                            name: declared.to_string(),
                            origin: AnchorOrigin::Object(kind),
                            line: start,
                        });
                    }
                }
                self.push(BlockKind::Opaque, start, body_start);
                body_start
            }
        }
    }

    /// Marks the body of an admonition as opaque, except for include
    /// directives.
    fn admonition_body(&mut self, start: usize, end: usize) {
        let mut i = start;
        while i < end {
            let line = self.lines[i];
            let indent = indent_width(line);
            let Some(captures) = DIRECTIVE.captures(line.trim()) else {
                self.push(BlockKind::Opaque, i, i + 1);
                i += 1;
                continue;
            };

            let (options, body_start) = self.options(i + 1, indent);
            let next = match &captures[1] {
                "include" | "includes" => {
                    let include = Include {
                        target: captures.get(2).map_or("", |m| m.as_str()).to_string(),
                        options,
                        indent: line[..indent].to_string(),
                        opaque: true,
                    };
                    self.push(BlockKind::Include(include), i, body_start);
                    body_start
                }
                name if VERBATIM_DIRECTIVES.contains(&name) => {
                    let next = self.extent(body_start, indent).min(end);
                    self.push(BlockKind::Opaque, i, next);
                    next
                }
                _ => {
                    self.push(BlockKind::Opaque, i, i + 1);
                    i + 1
                }
            };
            i = next.max(i + 1);
        }
    }

    /// Collects directive options directly below a directive line.
    fn options(&self, start: usize, indent: usize) -> (Vec<(String, String)>, usize) {
        let mut options = Vec::new();
        let mut i = start;
        while i < self.lines.len() {
            let line = self.lines[i];
            if is_blank(line) || indent_width(line) <= indent {
                break;
            }
            let Some(captures) = OPTION.captures(line.trim()) else {
                break;
            };
            let value = captures.get(2).map_or("", |m| m.as_str());
            options.push((captures[1].to_string(), value.to_string()));
            i += 1;
        }
        (options, i)
    }

    /// The end of the indented block starting at `start`, relative to a
    /// construct at `indent`. Trailing blank lines are not part of the block.
    fn extent(&self, start: usize, indent: usize) -> usize {
        let mut end = start;
        while end < self.lines.len() {
            let line = self.lines[end];
            if !is_blank(line) && indent_width(line) <= indent {
                break;
            }
            end += 1;
        }
        while end > start && is_blank(self.lines[end - 1]) {
            end -= 1;
        }
        end
    }

    fn glossary_terms(&mut self, start: usize, end: usize) {
        let Some(term_indent) = self.lines[start..end]
            .iter()
            .find(|line| !is_blank(line))
            .map(|line| indent_width(line))
        else {
            return;
        };

        for index in start..end {
            let line = self.lines[index];
            if is_blank(line) || indent_width(line) != term_indent {
                continue;
            }
            let term = line.trim();
            if OPTION.is_match(term) {
                continue;
            }
            // `term : classifier`
            let term = term.split(" : ").next().unwrap_or(term).trim();
            self.anchors.push(AnchorDecl {
                name: term.to_string(),
                origin: AnchorOrigin::Object(ObjectKind::Term),
                line: index,
            });
        }
    }

    /// Detects a section title starting at `start`.
    ///
    /// Returns the title text, the index of the title line and the index of
    /// the first line after the title's adornment.
    fn section_title(&self, start: usize) -> Option<(&'a str, usize, usize)> {
        // A title starts its own block, so a paragraph's later line never is one.
        if let Some(previous) = start.checked_sub(1).map(|i| self.lines[i]) {
            if !is_blank(previous) && !ANCHOR.is_match(previous.trim()) {
                return None;
            }
        }

        let first = self.lines[start];
        let next = self.lines.get(start + 1).copied()?;

        if is_adornment(first) {
            // Overlined title.
            let underline = self.lines.get(start + 2).copied()?;
            let title = next.trim();
            if title.is_empty() || underline.trim_end() != first.trim_end() {
                return None;
            }
            if adornment_len(first) < title.chars().count() {
                return None;
            }
            return Some((title, start + 1, start + 3));
        }

        let title = first.trim_end();
        if is_adornment(next) && adornment_len(next) >= title.chars().count() {
            return Some((title, start, start + 2));
        }
        None
    }

    /// Marks the indented block after a paragraph ending in `::` as opaque.
    fn literal_block(&mut self, start: usize, paragraph_indent: usize) -> usize {
        let mut first = start;
        while first < self.lines.len() && is_blank(self.lines[first]) {
            first += 1;
        }
        if first >= self.lines.len() || indent_width(self.lines[first]) <= paragraph_indent {
            return start;
        }
        let end = self.extent(first, paragraph_indent);
        self.push(BlockKind::Text, start, first);
        self.push(BlockKind::Opaque, first, end);
        end
    }

    fn flush_pending(&mut self, title_line: Option<usize>) {
        for (name, own_line) in self.pending.drain(..) {
            self.anchors.push(AnchorDecl {
                name,
                origin: AnchorOrigin::Explicit,
                line: title_line.unwrap_or(own_line),
            });
        }
    }

    /// Appends a block, merging it into the previous one when both are plain
    /// text or both are opaque.
    fn push(&mut self, kind: BlockKind, start: usize, end: usize) {
        if start >= end {
            return;
        }
        if let Some(last) = self.blocks.last_mut() {
            let mergeable = matches!(
                (&last.kind, &kind),
                (BlockKind::Text, BlockKind::Text) | (BlockKind::Opaque, BlockKind::Opaque)
            );
            if mergeable && last.lines.end == start {
                last.lines.end = end;
                return;
            }
        }
        self.blocks.push(Block {
            kind,
            lines: start..end,
        });
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_explicit_markup(trimmed: &str) -> bool {
    trimmed == ".." || trimmed.starts_with(".. ") || trimmed.starts_with("..\t")
}

fn is_adornment(line: &str) -> bool {
    let line = line.trim_end();
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_punctuation() && chars.all(|c| c == first)
}

fn adornment_len(line: &str) -> usize {
    line.trim_end().chars().count()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn doc(source: &str) -> Document {
        parse(DocId::new("test"), source)
    }

    fn anchor_names(document: &Document) -> Vec<(&str, AnchorOrigin, usize)> {
        document
            .anchors()
            .iter()
            .map(|a| (a.name.as_str(), a.origin, a.line))
            .collect()
    }

    fn block_kinds(document: &Document) -> Vec<(BlockKind, std::ops::Range<usize>)> {
        document
            .blocks()
            .iter()
            .map(|b| (b.kind.clone(), b.lines.clone()))
            .collect()
    }

    #[test]
    fn blocks_cover_every_line() {
        let source = "Title\n=====\n\n.. note::\n\n   body\n\ntext\n";
        let document = doc(source);
        let mut next = 0;
        for block in document.blocks() {
            assert_eq!(block.lines.start, next);
            next = block.lines.end;
        }
        assert_eq!(next, document.lines().len());
        assert_eq!(document.source(), source);
    }

    #[test]
    fn underlined_and_overlined_titles() {
        let document = doc("=============\nRelease Notes\n=============\n\nCompatibility\n-------------\n");
        assert_eq!(
            anchor_names(&document),
            vec![
                ("Release Notes", AnchorOrigin::Section, 1),
                ("Compatibility", AnchorOrigin::Section, 4),
            ]
        );
    }

    #[test]
    fn short_underline_is_not_a_title() {
        let document = doc("A long paragraph line\n---\n");
        assert!(document.anchors().is_empty());
    }

    #[test]
    fn underlined_second_paragraph_line_is_not_a_title() {
        let document = doc("line one\nline two\n--------\n");
        assert!(document.anchors().is_empty());
    }

    #[test]
    fn title_directly_after_label_is_a_title() {
        let document = doc(".. _loc:\nTitle\n=====\n");
        assert_eq!(
            anchor_names(&document),
            vec![
                ("loc", AnchorOrigin::Explicit, 1),
                ("Title", AnchorOrigin::Section, 1),
            ]
        );
    }

    #[test]
    fn explicit_anchor_before_title_points_at_title() {
        let document = doc(".. _geospatial-indexes:\n\nGeospatial Indexes\n==================\n");
        assert_eq!(
            anchor_names(&document),
            vec![
                ("geospatial-indexes", AnchorOrigin::Explicit, 2),
                ("Geospatial Indexes", AnchorOrigin::Section, 2),
            ]
        );
    }

    #[test]
    fn explicit_anchor_before_paragraph_keeps_own_line() {
        let document = doc("intro\n\n.. _loc:\n\nSome text.\n");
        assert_eq!(
            anchor_names(&document),
            vec![("loc", AnchorOrigin::Explicit, 2)]
        );
    }

    #[test]
    fn hyperlink_targets_are_not_anchors() {
        let document = doc(".. _GeoJSON: http://geojson.org/\n");
        assert!(document.anchors().is_empty());
        assert_eq!(block_kinds(&document), vec![(BlockKind::Opaque, 0..1)]);
    }

    #[test_case("include")]
    #[test_case("includes")]
    fn include_spellings_are_synonyms(directive: &str) {
        let source = format!("before\n\n.. {directive}:: /includes/fact-2d.rst\n\nafter\n");
        let document = doc(&source);
        let includes: Vec<_> = document.includes().collect();
        assert_eq!(includes.len(), 1);
        let (include, line) = includes[0];
        assert_eq!(include.target, "/includes/fact-2d.rst");
        assert_eq!(line, 2);
    }

    #[test]
    fn include_options_and_indent() {
        let document = doc(
            "- item\n\n  .. include:: /includes/steps.rst\n     :start-after: begin\n     :end-before: end\n\nafter\n",
        );
        let (include, _) = document.includes().next().unwrap();
        assert_eq!(include.indent, "  ");
        assert_eq!(
            include.options,
            vec![
                ("start-after".to_string(), "begin".to_string()),
                ("end-before".to_string(), "end".to_string()),
            ]
        );
        let include_block = document
            .blocks()
            .iter()
            .find(|b| matches!(b.kind, BlockKind::Include(_)))
            .unwrap();
        assert_eq!(include_block.lines, 2..5);
    }

    #[test]
    fn admonitions_and_code_are_opaque() {
        let document = doc(
            "text\n\n.. code-block:: javascript\n\n   db.places.find()\n\n.. note::\n   :ref:`hidden`\n\nmore\n",
        );
        assert_eq!(
            block_kinds(&document),
            vec![
                (BlockKind::Text, 0..2),
                (BlockKind::Opaque, 2..5),
                (BlockKind::Text, 5..6),
                (BlockKind::Opaque, 6..8),
                (BlockKind::Text, 8..10),
            ]
        );
    }

    #[test]
    fn includes_inside_admonitions_are_still_includes() {
        let document = doc(
            "Intro\n\n.. note::\n\n   .. include:: /includes/fact-geojson.rst\n      :start-after: begin\n\n   More :ref:`hidden`.\n",
        );
        assert_eq!(
            block_kinds(&document)
                .into_iter()
                .map(|(kind, lines)| (matches!(kind, BlockKind::Include(_)), lines))
                .collect::<Vec<_>>(),
            vec![(false, 0..2), (false, 2..4), (true, 4..6), (false, 6..8)]
        );
        assert_eq!(document.blocks()[3].kind, BlockKind::Opaque);

        let (include, line) = document.includes().next().unwrap();
        assert_eq!(line, 4);
        assert_eq!(include.target, "/includes/fact-geojson.rst");
        assert_eq!(include.indent, "   ");
        assert!(include.opaque);
    }

    #[test]
    fn include_text_in_code_inside_admonition_is_verbatim() {
        let document = doc(".. note::\n\n   .. code-block:: rst\n\n      .. include:: /x.rst\n");
        assert_eq!(document.includes().count(), 0);
        assert_eq!(block_kinds(&document), vec![(BlockKind::Opaque, 0..5)]);
    }

    #[test]
    fn top_level_includes_are_not_opaque() {
        let document = doc(".. include:: /includes/intro.rst\n");
        let (include, _) = document.includes().next().unwrap();
        assert!(!include.opaque);
    }

    #[test]
    fn literal_blocks_are_opaque() {
        let document = doc("Example::\n\n   :ref:`not-a-role`\n\nafter\n");
        assert_eq!(
            block_kinds(&document),
            vec![
                (BlockKind::Text, 0..2),
                (BlockKind::Opaque, 2..3),
                (BlockKind::Text, 3..5),
            ]
        );
    }

    #[test]
    fn comments_are_opaque() {
        let document = doc(".. this is a comment\n   continued\n\ntext\n");
        assert_eq!(
            block_kinds(&document),
            vec![(BlockKind::Opaque, 0..2), (BlockKind::Text, 2..4)]
        );
    }

    #[test]
    fn toctree_body_is_its_own_block() {
        let document = doc(".. toctree::\n   :titlesonly:\n\n   /core/2d\n   Spherical </core/2dsphere>\n\nafter\n");
        assert_eq!(
            block_kinds(&document),
            vec![
                (BlockKind::Opaque, 0..2),
                (BlockKind::TocTree, 2..5),
                (BlockKind::Text, 5..7),
            ]
        );
    }

    #[test]
    fn object_directives_declare_anchors() {
        let document = doc(
            ".. dbcommand:: geoNear\n\n   Body with :query:`$near`.\n\n.. option:: --port <port>\n",
        );
        assert_eq!(
            anchor_names(&document),
            vec![
                ("geoNear", AnchorOrigin::Object(ObjectKind::Command), 0),
                ("--port", AnchorOrigin::Object(ObjectKind::Option), 4),
            ]
        );
        // The body of an object directive is prose.
        assert_eq!(document.blocks()[1].kind, BlockKind::Text);
    }

    #[test]
    fn glossary_entries_declare_terms() {
        let document = doc(
            ".. glossary::\n   :sorted:\n\n   GeoJSON\n      A format for geographic data.\n\n   legacy coordinate pairs : geo\n      Points stored as arrays.\n",
        );
        assert_eq!(
            anchor_names(&document),
            vec![
                ("GeoJSON", AnchorOrigin::Object(ObjectKind::Term), 3),
                ("legacy coordinate pairs", AnchorOrigin::Object(ObjectKind::Term), 6),
            ]
        );
    }

    #[test]
    fn source_without_trailing_newline_round_trips() {
        let source = "Title\n=====\n\nlast line";
        assert_eq!(doc(source).source(), source);
    }
}

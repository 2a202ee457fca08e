//! Markdown documents and the regions that become widgets.
//!
//! A region is a fenced code block whose info string matches a [`Selector`].
//! Building a [`Document`] replaces every region with a slot, in source order,
//! and keeps the surrounding Markdown as text blocks.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Matches fenced code blocks by a word of their info string.
///
/// `interact` matches ```` ```interact ````, ```` ```js interact ```` and
/// ```` ```js,interact ````. A leading `.` is ignored on both sides, so
/// `.interact` also matches ```` ```{.interact} ````. `*` matches every
/// fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Any,
    Word(String),
}

impl Selector {
    pub fn matches(&self, info: &str) -> bool {
        match self {
            Selector::Any => true,
            Selector::Word(word) => info_words(info).any(|w| w.eq_ignore_ascii_case(word)),
        }
    }
}

fn info_words(info: &str) -> impl Iterator<Item = &str> {
    info.split(|c: char| c.is_whitespace() || matches!(c, ',' | '{' | '}'))
        .map(|w| w.trim_start_matches('.'))
        .filter(|w| !w.is_empty())
}

impl FromStr for Selector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(Selector::Any);
        }
        let word = s.trim_start_matches('.');
        if word.is_empty() || word.contains(|c: char| c.is_whitespace() || matches!(c, ',' | '{' | '}')) {
            bail!("invalid selector '{s}': expected a single info-string word or '*'");
        }
        Ok(Selector::Word(word.to_string()))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str("*"),
            Selector::Word(word) => f.write_str(word),
        }
    }
}

/// A matched code block. Consumed once when its widget is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Position among matched regions, in document order.
    pub index: usize,
    /// Byte range of the whole fenced block in the source, closing line
    /// ending included.
    pub range: Range<usize>,
    /// 1-based line of the opening fence.
    pub line: usize,
    pub info: String,
    /// Trimmed block content; the seed code.
    pub text: String,
}

/// Find all regions matching `selector`, in document order.
pub fn find_regions(source: &str, selector: &Selector) -> Vec<Region> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
    let mut regions = Vec::new();
    let mut current: Option<(Range<usize>, String, String)> = None;

    for (event, range) in Parser::new_ext(source, options).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if selector.matches(&info) => {
                current = Some((range, info.to_string(), String::new()));
            }
            Event::Text(text) => {
                if let Some((_, _, code)) = current.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((mut range, info, code)) = current.take() {
                    range.end = through_line_end(source, range.end);
                    let line = source[..range.start].matches('\n').count() + 1;
                    regions.push(Region { index: regions.len(), range, line, info, text: code.trim().to_string() });
                }
            }
            _ => {}
        }
    }
    regions
}

/// Extend `end` past the line ending of the closing fence, if it is not
/// already included.
fn through_line_end(source: &str, end: usize) -> usize {
    if source[..end].ends_with('\n') {
        end
    } else if source[end..].starts_with("\r\n") {
        end + 2
    } else if source[end..].starts_with('\n') {
        end + 1
    } else {
        end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Markdown kept as-is.
    Text(String),
    /// The container that replaced the region with this index.
    Slot(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// Split `source` around `regions`, replacing each with a slot.
    /// `regions` must come from [`find_regions`] on the same source.
    pub fn with_slots(source: &str, regions: &[Region]) -> Self {
        let mut blocks = Vec::with_capacity(regions.len() * 2 + 1);
        let mut cursor = 0;
        for region in regions {
            if region.range.start > cursor {
                blocks.push(Block::Text(source[cursor..region.range.start].to_string()));
            }
            blocks.push(Block::Slot(region.index));
            cursor = region.range.end;
        }
        if cursor < source.len() {
            blocks.push(Block::Text(source[cursor..].to_string()));
        }
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn slot_count(&self) -> usize {
        self.blocks.iter().filter(|b| matches!(b, Block::Slot(_))).count()
    }
}

/// Read a Markdown or text document.
pub fn load(path: &Path) -> Result<String> {
    if !path.exists() {
        bail!("Document file '{}' does not exist", path.display());
    }
    if !path.is_file() {
        bail!("'{}' is not a file", path.display());
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "md" | "markdown" | "mdx" | "txt" | "" => {
            fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path.display()))
        }
        _ => {
            bail!("Unsupported file type: .{}\nCurrently supported: .md, .markdown, .mdx, .txt, and files without extension", extension);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "# Title\n\nIntro.\n\n```interact\nreturn 2+2\n```\n\n```rust\nfn main() {}\n```\n\n```js interact\n  console.log('a', 1)\n```\n";

    #[test]
    fn test_selector_parse_and_match() {
        let sel: Selector = "interact".parse().unwrap();
        assert!(sel.matches("interact"));
        assert!(sel.matches("js interact"));
        assert!(sel.matches("js,Interact"));
        assert!(sel.matches("{.interact}"));
        assert!(!sel.matches("interactive"));
        assert_eq!(".interact".parse::<Selector>().unwrap(), sel);
        assert_eq!("*".parse::<Selector>().unwrap(), Selector::Any);
        assert!("".parse::<Selector>().is_err());
        assert!("a b".parse::<Selector>().is_err());
    }

    #[test]
    fn test_find_regions_in_order() {
        let regions = find_regions(SOURCE, &"interact".parse().unwrap());
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].index, 0);
        assert_eq!(regions[0].text, "return 2+2");
        assert_eq!(regions[0].line, 5);
        assert_eq!(regions[1].index, 1);
        assert_eq!(regions[1].text, "console.log('a', 1)");
        assert_eq!(regions[1].info, "js interact");
        assert!(SOURCE[regions[0].range.clone()].starts_with("```interact"));
    }

    #[test]
    fn test_any_selector_skips_indented_blocks() {
        let source = "```\na\n```\n\n    indented\n\n```sh\nb\n```\n";
        let regions = find_regions(source, &Selector::Any);
        let texts: Vec<&str> = regions.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_document_replaces_regions_with_slots() {
        let regions = find_regions(SOURCE, &"interact".parse().unwrap());
        let doc = Document::with_slots(SOURCE, &regions);
        assert_eq!(doc.slot_count(), 2);
        let blocks = doc.blocks();
        assert!(matches!(&blocks[0], Block::Text(t) if t.starts_with("# Title")));
        assert_eq!(blocks[1], Block::Slot(0));
        assert!(matches!(&blocks[2], Block::Text(t) if t.contains("fn main() {}")));
        assert_eq!(blocks[3], Block::Slot(1));
        let text: String = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Text(t) => Some(t.as_str()),
                Block::Slot(_) => None,
            })
            .collect();
        assert!(!text.contains("return 2+2"));
    }

    #[test]
    fn test_load_rejects_missing_and_unsupported() {
        assert!(load(Path::new("does-not-exist.md")).is_err());
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        fs::write(&pdf, "x").unwrap();
        assert!(load(&pdf).is_err());
        let md = dir.path().join("doc.md");
        fs::write(&md, "# hi\n").unwrap();
        assert_eq!(load(&md).unwrap(), "# hi\n");
    }
}

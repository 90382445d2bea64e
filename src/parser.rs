use std::sync::LazyLock;

use regex::Regex;

use crate::block::{Block, BlockKind, InlineSpan};

const FENCE: &str = "```";

static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.\s(.*)").expect("numbered item pattern is valid"));

/// Line scanner state. Fenced lines borrow from the input until the fence closes.
#[derive(Default)]
enum ParseState<'a> {
    #[default]
    Normal,
    InFence {
        language: &'a str,
        lines: Vec<&'a str>,
    },
}

/// Parse markdown text into a list of blocks
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut state = ParseState::default();

    for line in markdown.split('\n') {
        process_line(line, &mut state, &mut blocks);
    }

    // Unterminated fence: keep whatever code was collected
    if let ParseState::InFence { language, lines } = state {
        let content = lines.join("\n");
        if !content.is_empty() {
            blocks.push(Block::code(content, Some(language)));
        }
    }

    blocks
}

fn process_line<'a>(line: &'a str, state: &mut ParseState<'a>, blocks: &mut Vec<Block>) {
    let trimmed = line.trim();

    if let Some(info) = trimmed.strip_prefix(FENCE) {
        match std::mem::take(state) {
            ParseState::Normal => {
                *state = ParseState::InFence {
                    language: info.trim(),
                    lines: Vec::new(),
                };
            }
            ParseState::InFence { language, lines } => {
                blocks.push(Block::code(lines.join("\n"), Some(language)));
            }
        }
        return;
    }

    if let ParseState::InFence { lines, .. } = state {
        lines.push(line);
        return;
    }

    if trimmed.is_empty() {
        return;
    }

    blocks.push(classify_line(line, trimmed));
}

fn classify_line(line: &str, trimmed: &str) -> Block {
    if let Some((kind, rest)) = heading(line) {
        return Block::new(kind, inline_spans(rest));
    }

    if let Some(rest) = trimmed
        .strip_prefix("* ")
        .or_else(|| trimmed.strip_prefix("- "))
    {
        return Block::new(BlockKind::BulletItem, inline_spans(rest));
    }

    if let Some(caps) = NUMBERED_ITEM.captures(trimmed) {
        let rest = caps.get(1).map_or("", |m| m.as_str());
        // An item with nothing after the marker reads as a paragraph
        if !rest.is_empty() {
            return Block::new(BlockKind::NumberedItem, inline_spans(rest));
        }
    }

    Block::new(BlockKind::Paragraph, inline_spans(line))
}

/// `# `, `## ` or `### ` at the very start of the line.
fn heading(line: &str) -> Option<(BlockKind, &str)> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    let rest = line[level..].strip_prefix(' ')?;
    let kind = BlockKind::heading(u8::try_from(level).ok()?)?;
    Some((kind, rest))
}

/// Split a text fragment into plain and backtick-delimited code spans.
///
/// Backticks themselves are not part of any span. A code span left open at
/// the end of the fragment is kept as plain text, opening backtick included.
/// The result is never empty: a fragment that yields no spans comes back as a
/// single plain span.
pub fn inline_spans(text: &str) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut in_code = false;

    for (i, _) in text.match_indices('`') {
        if in_code {
            spans.push(InlineSpan::code(&text[start..i]));
        } else if i > start {
            spans.push(InlineSpan::plain(&text[start..i]));
        }
        in_code = !in_code;
        start = i + 1;
    }

    let tail = if in_code { start - 1 } else { start };
    if tail < text.len() {
        spans.push(InlineSpan::plain(&text[tail..]));
    }

    if spans.is_empty() {
        spans.push(InlineSpan::plain(text));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::PLAIN_TEXT;

    fn texts(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(Block::text).collect()
    }

    #[test]
    fn paragraph_with_inline_code() {
        let blocks = parse("Hello `world` and more");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(
            blocks[0].text_runs,
            vec![
                InlineSpan::plain("Hello "),
                InlineSpan::code("world"),
                InlineSpan::plain(" and more"),
            ]
        );
    }

    #[test]
    fn headings() {
        let blocks = parse("# One\n## Two\n### Three `x`");
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![BlockKind::Heading1, BlockKind::Heading2, BlockKind::Heading3]
        );
        assert_eq!(texts(&blocks), vec!["One", "Two", "Three x"]);
        assert_eq!(blocks[2].text_runs[1], InlineSpan::code("x"));
    }

    #[test]
    fn deeper_headings_are_paragraphs() {
        let blocks = parse("#### Four");
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[0].text(), "#### Four");
    }

    #[test]
    fn heading_requires_space_and_no_indent() {
        let blocks = parse("#tag\n  # indented");
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
        assert_eq!(blocks[1].text(), "  # indented");
    }

    #[test]
    fn bullet_items() {
        let blocks = parse("* item one\n* item two");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.kind == BlockKind::BulletItem));
        assert_eq!(texts(&blocks), vec!["item one", "item two"]);
    }

    #[test]
    fn indented_dash_bullet() {
        let blocks = parse("   - nested `code`  ");
        assert_eq!(blocks[0].kind, BlockKind::BulletItem);
        assert_eq!(
            blocks[0].text_runs,
            vec![InlineSpan::plain("nested "), InlineSpan::code("code")]
        );
    }

    #[test]
    fn numbered_items() {
        let blocks = parse("1. first\n 12. second");
        assert!(blocks.iter().all(|b| b.kind == BlockKind::NumberedItem));
        assert_eq!(texts(&blocks), vec!["first", "second"]);
    }

    #[test]
    fn number_without_space_is_paragraph() {
        let blocks = parse("3.14 is pi");
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[0].text(), "3.14 is pi");
    }

    #[test]
    fn code_block_with_language() {
        let blocks = parse("```js\nconsole.log(1)\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::CodeBlock);
        assert_eq!(blocks[0].language_tag.as_deref(), Some("js"));
        assert_eq!(blocks[0].text(), "console.log(1)");
    }

    #[test]
    fn code_block_keeps_lines_verbatim() {
        let md = "before\n```\n# not a heading\n\n  * not a bullet\n```\nafter";
        let blocks = parse(md);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].kind, BlockKind::CodeBlock);
        assert_eq!(blocks[1].language_tag.as_deref(), Some(PLAIN_TEXT));
        assert_eq!(blocks[1].text(), "# not a heading\n\n  * not a bullet");
        assert_eq!(blocks[1].text_runs.len(), 1);
        assert!(!blocks[1].text_runs[0].is_code);
    }

    #[test]
    fn empty_fence_still_emits_block() {
        let blocks = parse("```\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "");
    }

    #[test]
    fn unterminated_fence_is_flushed() {
        let blocks = parse("intro\n```python\nx = 1\ny = 2");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind, BlockKind::CodeBlock);
        assert_eq!(blocks[1].language_tag.as_deref(), Some("python"));
        assert_eq!(blocks[1].text(), "x = 1\ny = 2");
    }

    #[test]
    fn unterminated_empty_fence_is_dropped() {
        assert!(parse("```rust\n").is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let blocks = parse("one\n\n   \n\ttwo\n");
        assert_eq!(texts(&blocks), vec!["one", "\ttwo"]);
    }

    #[test]
    fn plain_lines_round_trip() {
        let lines = ["First line", "second, with punctuation!", "  third indented"];
        let blocks = parse(&lines.join("\n"));
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
        assert_eq!(texts(&blocks), lines);
    }

    #[test]
    fn inline_without_backticks_is_one_span() {
        assert_eq!(
            inline_spans("no code here"),
            vec![InlineSpan::plain("no code here")]
        );
        assert_eq!(inline_spans(""), vec![InlineSpan::plain("")]);
    }

    #[test]
    fn inline_code_at_edges() {
        assert_eq!(
            inline_spans("`a` and `b`"),
            vec![
                InlineSpan::code("a"),
                InlineSpan::plain(" and "),
                InlineSpan::code("b"),
            ]
        );
        assert_eq!(inline_spans("``"), vec![InlineSpan::code("")]);
    }

    #[test]
    fn unclosed_inline_code_stays_literal() {
        assert_eq!(
            inline_spans("run `cargo"),
            vec![InlineSpan::plain("run "), InlineSpan::plain("`cargo")]
        );
    }

    #[test]
    fn heading_with_empty_text() {
        let blocks = parse("# ");
        assert_eq!(blocks[0].kind, BlockKind::Heading1);
        assert_eq!(blocks[0].text_runs, vec![InlineSpan::plain("")]);
    }
}

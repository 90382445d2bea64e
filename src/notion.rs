use serde_json::{Map, Value, json};

use crate::block::{Block, BlockKind, InlineSpan, PLAIN_TEXT};

/// Longest `text.content` Notion accepts in one rich text object.
pub const MAX_TEXT_LEN: usize = 2000;

/// Most rich text objects Notion accepts in one block.
pub const MAX_RICH_TEXT: usize = 100;

/// Convert blocks to Notion block objects.
///
/// A block whose text needs more than [`MAX_RICH_TEXT`] rich text objects
/// continues in further blocks of the same type.
pub fn blocks_to_notion(blocks: &[Block]) -> Vec<Value> {
    blocks.iter().flat_map(block_to_notion).collect()
}

fn block_to_notion(block: &Block) -> Vec<Value> {
    let items = rich_text(&block.text_runs);
    if items.is_empty() {
        return vec![notion_block(block, Vec::new())];
    }
    items
        .chunks(MAX_RICH_TEXT)
        .map(|chunk| notion_block(block, chunk.to_vec()))
        .collect()
}

fn notion_block(block: &Block, rich_text: Vec<Value>) -> Value {
    let block_type = block_type(block.kind);
    let mut body = json!({ "rich_text": rich_text });

    if block.kind == BlockKind::CodeBlock {
        body["language"] = json!(notion_language(
            block.language_tag.as_deref().unwrap_or(PLAIN_TEXT)
        ));
    }

    let mut object = Map::new();
    object.insert("object".to_string(), json!("block"));
    object.insert("type".to_string(), json!(block_type));
    object.insert(block_type.to_string(), body);
    Value::Object(object)
}

fn block_type(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Heading1 => "heading_1",
        BlockKind::Heading2 => "heading_2",
        BlockKind::Heading3 => "heading_3",
        BlockKind::BulletItem => "bulleted_list_item",
        BlockKind::NumberedItem => "numbered_list_item",
        BlockKind::CodeBlock => "code",
        BlockKind::Paragraph => "paragraph",
    }
}

fn rich_text(spans: &[InlineSpan]) -> Vec<Value> {
    let mut out = Vec::new();
    for span in spans {
        for piece in split_content(&span.text) {
            let mut item = json!({
                "type": "text",
                "text": { "content": piece },
            });
            if span.is_code {
                item["annotations"] = json!({ "code": true });
            }
            out.push(item);
        }
    }
    out
}

/// Split text into pieces of at most [`MAX_TEXT_LEN`] characters.
/// Empty text stays a single empty piece.
fn split_content(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (count, (index, _)) in text.char_indices().enumerate() {
        if count > 0 && count % MAX_TEXT_LEN == 0 {
            pieces.push(&text[start..index]);
            start = index;
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Map a fence language tag to a name from Notion's code language list.
pub fn notion_language(tag: &str) -> String {
    let tag = tag.trim().to_lowercase();
    let mapped = match tag.as_str() {
        "" | "text" | "txt" | "plaintext" => PLAIN_TEXT,
        "js" | "jsx" | "node" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" | "python3" => "python",
        "sh" | "bash" | "zsh" | "console" => "shell",
        "rs" => "rust",
        "rb" => "ruby",
        "yml" => "yaml",
        "cpp" | "cc" | "cxx" => "c++",
        "cs" | "csharp" => "c#",
        "kt" => "kotlin",
        "md" => "markdown",
        "golang" => "go",
        "ps1" | "pwsh" => "powershell",
        "dockerfile" => "docker",
        _ => return tag,
    };
    mapped.to_string()
}

/// Split blocks into consecutive chunks of at most `size` items.
pub fn chunk_blocks<T>(blocks: &[T], size: usize) -> Vec<&[T]> {
    blocks.chunks(size.max(1)).collect()
}

mod block;
mod config;
mod error;
mod extract;
mod gemini;
mod notion;
mod notion_client;
mod parser;
mod prompt;
mod recap;
mod summarize;

pub use block::{Block, BlockKind, InlineSpan, PLAIN_TEXT};
pub use config::{Config, GeminiConfig, NotionConfig, RecapConfig, SummaryConfig};
pub use error::{Error, Result};
pub use extract::{PDF_PLACEHOLDER, PageContent, PageFetcher, extract_page};
pub use gemini::GeminiClient;
pub use notion::{blocks_to_notion, chunk_blocks, notion_language};
pub use notion_client::{Note, NotionClient, SaveOutcome, SavedPage, blocks_to_text};
pub use parser::inline_spans;
pub use prompt::{combine_pages, recap_prompt, summary_prompt};
pub use recap::{recap_to_html, weekly_recap};
pub use summarize::{Summary, suggested_tags, summarize_page, summary_filename};

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Vec<Block> {
    parser::parse(markdown)
}

/// Convert markdown to Notion block objects.
pub fn markdown_to_notion(markdown: &str) -> Vec<serde_json::Value> {
    let blocks = parse(markdown);
    notion::blocks_to_notion(&blocks)
}

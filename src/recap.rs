use pulldown_cmark::{Options, Parser, html};
use tracing::info;

use crate::error::{Error, Result};
use crate::gemini::GeminiClient;
use crate::notion_client::NotionClient;
use crate::prompt::{combine_pages, recap_prompt};

/// Build a recap of everything saved to the database in the past week.
pub async fn weekly_recap(
    notion: &NotionClient,
    gemini: &GeminiClient,
    database_id: &str,
    max_chars: usize,
) -> Result<String> {
    let pages = notion.pages_with_content(database_id).await?;
    if pages.is_empty() {
        return Err(Error::NoRecentPages);
    }

    let combined = combine_pages(&pages, max_chars);
    info!(pages = pages.len(), chars = combined.len(), "generating weekly recap");

    let recap = gemini.generate(&recap_prompt(&combined)).await?;
    if recap.trim().is_empty() {
        return Err(Error::EmptyResponse("recap"));
    }
    Ok(recap)
}

/// Render a recap as a standalone HTML page.
pub fn recap_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);

    let mut body = String::new();
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Weekly Recap</title>\n</head>\n<body>\n<h2>Weekly Recap</h2>\n{body}</body>\n</html>\n"
    )
}

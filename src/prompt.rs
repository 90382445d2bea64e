use chrono::NaiveDate;

use crate::extract::PageContent;
use crate::notion_client::SavedPage;

pub const TRUNCATION_NOTICE: &str = "... [content truncated due to length]";

/// First `max_chars` characters of `text`, and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}

/// Prompt asking for a markdown summary of one page.
pub fn summary_prompt(page: &PageContent, url: &str, date: NaiveDate, max_chars: usize) -> String {
    let (content, _) = truncate_chars(&page.content, max_chars);
    let title = &page.title;
    let source = if page.source_info.is_empty() {
        "Unknown source"
    } else {
        page.source_info.as_str()
    };
    let date = date.format("%Y-%m-%d");

    format!(
        r#"
Summarize content, within 4000 characters, the following from {title}.
Content: {content}...

Provide a markdown summary with the following format:
# Summary of "{title}"

* URL: {url}
* Date: {date}
* Source: {source}
* Suggested Tags: [Include 3-5 relevant topic tags]

## Summary
[Provide a comprehensive summary of the content in 2-4 paragraphs]

## Key Points
[List 3-5 key points from the content]
"#
    )
}

/// Join saved pages into one document, capped at `max_chars` characters.
pub fn combine_pages(pages: &[SavedPage], max_chars: usize) -> String {
    let combined = pages
        .iter()
        .map(|page| {
            format!(
                "Title: {}\nURL: {}\n\nContent:\n{}\n---\n",
                page.title, page.url, page.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    match truncate_chars(&combined, max_chars) {
        (kept, true) => format!("{kept}{TRUNCATION_NOTICE}"),
        (_, false) => combined,
    }
}

/// Prompt asking for a weekly recap of the combined pages.
pub fn recap_prompt(combined: &str) -> String {
    format!(
        r#"
Analyze my saved tweets and web articles from this past week. Organize the content into meaningful categories such as career, health, relationships, skills, or any emergent themes. Keep it less than 500 words

For each category:

Extract 1-3 key actionable insights from the content, focusing on takeaways that could inform decisions or actions.
Identify connections between different pieces of content, even if they seem unrelated, to uncover deeper themes or evolving interests.
Suggest 1-2 small, concrete action steps I could take in the coming week based on the insights.
Compare this week's insights with previous weeks to track recurring themes, progress, or shifts in focus.
Provide at least one contrarian or alternative perspective on a key idea to challenge my assumptions.
Finally, synthesize everything into a cohesive 'weekly learning narrative' that highlights my overarching themes and key takeaways. In addition, propose innovative and creative ideas that combine concepts/approaches/insights from them.

Here are the saved content items from the past week:

{combined}"#
    )
}

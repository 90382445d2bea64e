use chrono::NaiveDate;
use tracing::info;

use crate::error::{Error, Result};
use crate::extract::PageContent;
use crate::gemini::GeminiClient;
use crate::prompt::summary_prompt;

const TAGS_LABEL: &str = "suggested tags:";
const MAX_SLUG_LEN: usize = 60;

/// A generated page summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub title: String,
    pub url: String,
    pub date: NaiveDate,
    pub markdown: String,
    pub tags: Vec<String>,
}

impl Summary {
    pub fn filename(&self) -> String {
        summary_filename(&self.title, self.date)
    }
}

/// Ask the model for a markdown summary of `page`.
pub async fn summarize_page(
    gemini: &GeminiClient,
    page: &PageContent,
    url: &str,
    date: NaiveDate,
    max_chars: usize,
) -> Result<Summary> {
    if page.content.trim().is_empty() {
        return Err(Error::EmptyContent);
    }

    info!(title = %page.title, chars = page.content.len(), "summarizing page");
    let markdown = gemini
        .generate(&summary_prompt(page, url, date, max_chars))
        .await?;
    if markdown.trim().is_empty() {
        return Err(Error::EmptyResponse("summary"));
    }

    Ok(Summary {
        title: page.title.clone(),
        url: url.to_string(),
        date,
        tags: suggested_tags(&markdown),
        markdown,
    })
}

/// Tags listed on the summary's `Suggested Tags:` line.
pub fn suggested_tags(markdown: &str) -> Vec<String> {
    let Some(list) = markdown.lines().find_map(tags_line) else {
        return Vec::new();
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in list.split(',') {
        let tag = tag
            .trim()
            .trim_matches(|c| matches!(c, '[' | ']' | '*' | '`'))
            .trim()
            .trim_start_matches('#')
            .trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn tags_line(line: &str) -> Option<&str> {
    let line = line
        .trim()
        .trim_start_matches(['*', '-'])
        .trim_start()
        .trim_start_matches("**");
    let lower = line.to_ascii_lowercase();
    let at = lower.find(TAGS_LABEL)?;
    Some(line[at + TAGS_LABEL.len()..].trim_start_matches("**"))
}

/// `<date>-<slug>.md`, the slug built from the title's ASCII letters and digits.
pub fn summary_filename(title: &str, date: NaiveDate) -> String {
    let mut slug = String::new();
    for word in title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let extra = usize::from(!slug.is_empty()) + word.len();
        if slug.len() + extra > MAX_SLUG_LEN {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    if slug.is_empty() {
        slug.push_str("summary");
    }
    format!("{}-{}.md", date.format("%Y-%m-%d"), slug)
}

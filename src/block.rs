use serde::Serialize;

/// Language tag given to code blocks that declare none.
pub const PLAIN_TEXT: &str = "plain text";

/// A run of text, either plain or inline code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSpan {
    pub text: String,
    pub is_code: bool,
}

impl InlineSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_code: false,
        }
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_code: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Heading1,
    Heading2,
    Heading3,
    BulletItem,
    NumberedItem,
    CodeBlock,
    Paragraph,
}

impl BlockKind {
    /// Heading kind for a level between 1 and 3.
    pub fn heading(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Heading1),
            2 => Some(Self::Heading2),
            3 => Some(Self::Heading3),
            _ => None,
        }
    }
}

/// Block-level unit produced from one source line (or one fenced region)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub kind: BlockKind,
    pub text_runs: Vec<InlineSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_tag: Option<String>,
}

impl Block {
    pub fn new(kind: BlockKind, text_runs: Vec<InlineSpan>) -> Self {
        Self {
            kind,
            text_runs,
            language_tag: None,
        }
    }

    /// A fenced code region. A missing or blank tag becomes [`PLAIN_TEXT`].
    pub fn code(content: impl Into<String>, language: Option<&str>) -> Self {
        let language = match language.map(str::trim) {
            Some(lang) if !lang.is_empty() => lang.to_string(),
            _ => PLAIN_TEXT.to_string(),
        };
        Self {
            kind: BlockKind::CodeBlock,
            text_runs: vec![InlineSpan::plain(content)],
            language_tag: Some(language),
        }
    }

    /// Literal text of the block with span annotations discarded.
    pub fn text(&self) -> String {
        self.text_runs.iter().map(|span| span.text.as_str()).collect()
    }
}

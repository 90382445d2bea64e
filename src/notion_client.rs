use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::NotionConfig;
use crate::error::{Error, Result};
use crate::notion::{blocks_to_notion, chunk_blocks};

/// Page metadata written to the database properties.
#[derive(Debug, Clone)]
pub struct Note {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub date: NaiveDate,
}

/// Result of [`NotionClient::save_note`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub page_id: String,
    /// Set when the page exists but some chunks could not be appended.
    pub warning: Option<String>,
}

impl SaveOutcome {
    pub fn is_partial(&self) -> bool {
        self.warning.is_some()
    }
}

/// A saved page flattened to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPage {
    pub id: String,
    pub title: String,
    pub url: String,
    pub content: String,
}

pub struct NotionClient {
    client: Client,
    api_key: String,
    base_url: String,
    version: String,
}

impl NotionClient {
    pub fn new(api_key: impl Into<String>, config: &NotionConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.version.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("notion {} {}", method, path);
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.version)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(Error::Notion {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Create a database page and return its id.
    pub async fn create_page(
        &self,
        database_id: &str,
        note: &Note,
        children: &[Value],
    ) -> Result<String> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": page_properties(note),
            "children": children,
        });

        let page = self
            .send(self.request(Method::POST, "/pages").json(&body))
            .await?;

        page["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Notion {
                status: 200,
                message: "page response has no id".to_string(),
            })
    }

    pub async fn append_children(&self, block_id: &str, children: &[Value]) -> Result<()> {
        let path = format!("/blocks/{}/children", block_id);
        self.send(
            self.request(Method::PATCH, &path)
                .json(&json!({ "children": children })),
        )
        .await?;
        Ok(())
    }

    /// Convert `markdown` and store it as a new page.
    ///
    /// The first `chunk_size` blocks go out with the page itself, the rest
    /// are appended one chunk per request. A failed append stops the upload
    /// and is reported as a warning, since the page already exists.
    pub async fn save_note(
        &self,
        database_id: &str,
        note: &Note,
        markdown: &str,
        chunk_size: usize,
    ) -> Result<SaveOutcome> {
        let blocks = blocks_to_notion(&crate::parse(markdown));
        let chunks = chunk_blocks(&blocks, chunk_size);
        let (first, rest): (&[Value], &[&[Value]]) = match chunks.split_first() {
            Some((first, rest)) => (*first, rest),
            None => (&[], &[]),
        };

        info!(
            title = %note.title,
            blocks = blocks.len(),
            chunks = chunks.len(),
            "saving note to Notion"
        );

        let page_id = self.create_page(database_id, note, first).await?;

        for chunk in rest {
            if let Err(e) = self.append_children(&page_id, chunk).await {
                let message = match e {
                    Error::Notion { message, .. } => message,
                    other => other.to_string(),
                };
                warn!(page_id = %page_id, "append failed: {}", message);
                return Ok(SaveOutcome {
                    page_id,
                    warning: Some(format!("Some content couldn't be added: {}", message)),
                });
            }
        }

        Ok(SaveOutcome {
            page_id,
            warning: None,
        })
    }

    /// Pages whose `Date` property falls in the past week.
    pub async fn pages_from_past_week(&self, database_id: &str) -> Result<Vec<Value>> {
        let path = format!("/databases/{}/query", database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": { "property": "Date", "date": { "past_week": {} } }
            });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let mut data = self
                .send(self.request(Method::POST, &path).json(&body))
                .await?;
            cursor = take_page(&mut data, &mut pages);
            if cursor.is_none() {
                break;
            }
        }

        Ok(pages)
    }

    /// Top-level child blocks of a page.
    pub async fn page_blocks(&self, page_id: &str) -> Result<Vec<Value>> {
        let path = format!("/blocks/{}/children", page_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &path)
                .query(&[("page_size", "100")]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor.as_str())]);
            }

            let mut data = self.send(request).await?;
            cursor = take_page(&mut data, &mut blocks);
            if cursor.is_none() {
                break;
            }
        }

        Ok(blocks)
    }

    /// Every page from the past week with its blocks flattened to text.
    pub async fn pages_with_content(&self, database_id: &str) -> Result<Vec<SavedPage>> {
        let pages = self.pages_from_past_week(database_id).await?;
        info!(count = pages.len(), "pages saved in the past week");

        let mut out = Vec::with_capacity(pages.len());
        for page in &pages {
            let id = page["id"].as_str().unwrap_or_default();
            let blocks = self.page_blocks(id).await?;
            out.push(saved_page(page, &blocks));
        }
        Ok(out)
    }
}

/// Move `results` into `into` and return the next cursor, if any.
fn take_page(data: &mut Value, into: &mut Vec<Value>) -> Option<String> {
    if let Some(Value::Array(results)) = data.get_mut("results").map(Value::take) {
        into.extend(results);
    }
    if data["has_more"].as_bool() == Some(true) {
        data["next_cursor"].as_str().map(str::to_string)
    } else {
        None
    }
}

/// Database properties for a new page: `Title`, `URL`, `Tags` and `Date`.
pub fn page_properties(note: &Note) -> Value {
    let mut properties = json!({
        "Title": { "title": [{ "text": { "content": note.title } }] },
        "Tags": {
            "multi_select": note.tags.iter().map(|tag| json!({ "name": tag })).collect::<Vec<_>>()
        },
        "Date": { "date": { "start": note.date.format("%Y-%m-%d").to_string() } },
    });
    if !note.url.is_empty() {
        properties["URL"] = json!({ "url": note.url });
    }
    properties
}

fn saved_page(page: &Value, blocks: &[Value]) -> SavedPage {
    let properties = &page["properties"];
    let title = properties["Title"]["title"][0]["plain_text"]
        .as_str()
        .unwrap_or("Untitled");
    let url = properties["URL"]["url"].as_str().unwrap_or_default();

    SavedPage {
        id: page["id"].as_str().unwrap_or_default().to_string(),
        title: title.to_string(),
        url: url.to_string(),
        content: blocks_to_text(blocks),
    }
}

/// Flatten Notion blocks to plain text. List items end with one newline,
/// other text blocks with a blank line; unknown block types are skipped.
pub fn blocks_to_text(blocks: &[Value]) -> String {
    let mut text = String::new();

    for block in blocks {
        let Some(block_type) = block["type"].as_str() else {
            continue;
        };
        let separator = match block_type {
            "bulleted_list_item" | "numbered_list_item" => "\n",
            "paragraph" | "code" | "quote" | "callout" => "\n\n",
            t if t.starts_with("heading_") => "\n\n",
            _ => continue,
        };

        if let Some(items) = block[block_type]["rich_text"].as_array() {
            for item in items {
                text.push_str(item["plain_text"].as_str().unwrap_or_default());
            }
        }
        text.push_str(separator);
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> NotionClient {
        let config = NotionConfig {
            base_url: server.uri(),
            ..NotionConfig::default()
        };
        NotionClient::new("secret", &config).unwrap()
    }

    fn note() -> Note {
        Note {
            title: "A page".to_string(),
            url: "https://example.com/a".to_string(),
            tags: vec!["rust".to_string(), "notes".to_string()],
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        }
    }

    fn rich(text: &str) -> Value {
        json!({ "rich_text": [{ "plain_text": text }] })
    }

    #[test]
    fn properties() {
        let props = page_properties(&note());
        assert_eq!(props["Title"]["title"][0]["text"]["content"], "A page");
        assert_eq!(props["URL"]["url"], "https://example.com/a");
        assert_eq!(props["Tags"]["multi_select"][1]["name"], "notes");
        assert_eq!(props["Date"]["date"]["start"], "2025-03-14");
    }

    #[test]
    fn properties_without_url() {
        let mut note = note();
        note.url.clear();
        assert!(page_properties(&note).get("URL").is_none());
    }

    #[test]
    fn flatten_blocks() {
        let blocks = vec![
            json!({ "type": "heading_1", "heading_1": rich("Title") }),
            json!({ "type": "paragraph", "paragraph": rich("Body") }),
            json!({ "type": "bulleted_list_item", "bulleted_list_item": rich("one") }),
            json!({ "type": "numbered_list_item", "numbered_list_item": rich("two") }),
            json!({ "type": "image", "image": {} }),
            json!({ "type": "quote", "quote": rich("Quoted") }),
        ];
        assert_eq!(
            blocks_to_text(&blocks),
            "Title\n\nBody\n\none\ntwo\nQuoted\n\n"
        );
    }

    #[tokio::test]
    async fn save_creates_page_then_appends_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("Notion-Version", "2022-06-28"))
            .and(body_partial_json(json!({ "parent": { "database_id": "db" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/blocks/page-1/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let markdown = "one\ntwo\nthree\nfour\nfive";
        let outcome = client(&server)
            .save_note("db", &note(), markdown, 2)
            .await
            .unwrap();
        assert_eq!(outcome.page_id, "page-1");
        assert!(!outcome.is_partial());

        let requests = server.received_requests().await.unwrap();
        let create: Value = requests[0].body_json().unwrap();
        assert_eq!(create["children"].as_array().map(Vec::len), Some(2));
        let last: Value = requests[2].body_json().unwrap();
        assert_eq!(
            last["children"][0]["paragraph"]["rich_text"][0]["text"]["content"],
            "five"
        );
    }

    #[tokio::test]
    async fn failed_append_is_partial_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page-2" })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "message": "body failed validation" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .save_note("db", &note(), "a\nb\nc", 1)
            .await
            .unwrap();
        assert_eq!(outcome.page_id, "page-2");
        assert_eq!(
            outcome.warning.as_deref(),
            Some("Some content couldn't be added: body failed validation")
        );
    }

    #[tokio::test]
    async fn failed_create_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "API token is invalid." })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .save_note("db", &note(), "text", 100)
            .await
            .unwrap_err();
        match err {
            Error::Notion { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "API token is invalid.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn pages_with_content_follows_cursors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .and(body_partial_json(json!({ "start_cursor": "c1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "id": "p2", "properties": {} }],
                "has_more": false,
                "next_cursor": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .and(body_partial_json(json!({ "filter": { "property": "Date" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": "p1",
                    "properties": {
                        "Title": { "title": [{ "plain_text": "First" }] },
                        "URL": { "url": "https://example.com" }
                    }
                }],
                "has_more": true,
                "next_cursor": "c1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/p1/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "type": "paragraph", "paragraph": rich("hello") }],
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/p2/children"))
            .and(query_param("start_cursor", "b1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "type": "code", "code": rich("x = 1") }],
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/p2/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "type": "bulleted_list_item", "bulleted_list_item": rich("item") }],
                "has_more": true,
                "next_cursor": "b1"
            })))
            .mount(&server)
            .await;

        let pages = client(&server).pages_with_content("db").await.unwrap();
        assert_eq!(
            pages,
            vec![
                SavedPage {
                    id: "p1".to_string(),
                    title: "First".to_string(),
                    url: "https://example.com".to_string(),
                    content: "hello\n\n".to_string(),
                },
                SavedPage {
                    id: "p2".to_string(),
                    title: "Untitled".to_string(),
                    url: String::new(),
                    content: "item\nx = 1\n\n".to_string(),
                },
            ]
        );
    }
}

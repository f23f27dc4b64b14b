use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::datasources::{Page, PageStore, ResourceUsed};
use crate::errors::{ExplainError, ExplainResult};
use crate::models::message::Message;
use crate::prompt_template::{build_system_prompt, DEFAULT_SYSTEM_TEMPLATE, SEARCH_TERMS_PROMPT};
use crate::providers::base::Provider;
use crate::token_counter::TokenCount;
use crate::tool_router::{parse_section_request, resolve_section, section_tool};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TOKEN_LIMIT: usize = 50_000;

/// Tunables for one ask-retrieve-answer flow
#[derive(Debug, Clone)]
pub struct CommunicatorConfig {
    pub model: String,
    /// Distinct pages to fetch at most
    pub n_pages: usize,
    /// Sections the model is asked to read at most
    pub n_sections: usize,
    /// Completion budget for each conversation call
    pub max_tokens: i32,
    /// Completion budget for the search-term extraction call
    pub search_terms_max_tokens: i32,
    /// The system prompt must count strictly fewer tokens than this
    pub token_limit: usize,
    /// Tool rounds allowed before the model has to answer
    pub max_tool_rounds: usize,
    pub answers_dir: PathBuf,
    pub system_template: String,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            n_pages: 1,
            n_sections: 3,
            max_tokens: 300,
            search_terms_max_tokens: 50,
            token_limit: DEFAULT_TOKEN_LIMIT,
            max_tool_rounds: 5,
            answers_dir: PathBuf::from("./answers"),
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }
}

/// Who the answer is written for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskerProfile {
    pub age: u32,
    pub experience: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub markdown: String,
    pub references: Vec<String>,
    pub resources: Vec<ResourceUsed>,
}

/// Per-page metadata the system prompt lists for the model
#[derive(Debug, Serialize)]
struct PageSummary<'a> {
    title: &'a str,
    images: &'a [String],
    sections: Vec<&'a str>,
    url: &'a str,
}

/// Drives one question from search terms to an exported answer.
///
/// A communicator serves a single request; it holds the pages and the
/// conversation for that request only.
pub struct Communicator {
    provider: Arc<dyn Provider>,
    page_store: Arc<dyn PageStore>,
    token_counter: Arc<dyn TokenCount>,
    config: CommunicatorConfig,
    profile: AskerProfile,
    pages: Vec<Page>,
    messages: Vec<Message>,
    consulted: Vec<(String, String)>,
}

impl Communicator {
    pub fn new(
        provider: Arc<dyn Provider>,
        page_store: Arc<dyn PageStore>,
        token_counter: Arc<dyn TokenCount>,
        config: CommunicatorConfig,
        profile: AskerProfile,
    ) -> Self {
        Self {
            provider,
            page_store,
            token_counter,
            config,
            profile,
            pages: Vec::new(),
            messages: Vec::new(),
            consulted: Vec::new(),
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Answer `question`, writing the markdown to the answers directory on success
    pub async fn ask(&mut self, question: &str) -> ExplainResult<Answer> {
        self.pages.clear();
        self.messages.clear();
        self.consulted.clear();

        let terms = self.extract_search_terms(question).await?;
        self.pages = self.fetch_pages(&terms).await?;

        let system_message = self.system_message()?;
        self.messages = vec![Message::system(system_message), Message::user(question)];

        let markdown = self.converse().await?;
        self.export_answer(question, &markdown).await?;

        Ok(self.answer(markdown))
    }

    async fn extract_search_terms(&self, question: &str) -> ExplainResult<Vec<String>> {
        let messages = [Message::system(SEARCH_TERMS_PROMPT), Message::user(question)];
        let (reply, _usage) = self
            .provider
            .complete(
                &self.config.model,
                &messages,
                &[],
                Some(self.config.search_terms_max_tokens),
            )
            .await?;

        let terms = parse_search_terms(reply.text())?;
        info!(?terms, "extracted search terms");
        Ok(terms)
    }

    async fn fetch_pages(&self, terms: &[String]) -> ExplainResult<Vec<Page>> {
        let mut titles = Vec::new();
        for term in dedup_in_order(terms.iter().cloned()) {
            let first = self
                .page_store
                .search(&term)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ExplainError::NotFound(term.clone()))?;
            titles.push(first);
        }

        let mut pages = Vec::new();
        for title in dedup_in_order(titles).into_iter().take(self.config.n_pages) {
            pages.push(self.page_store.fetch(&title).await?);
        }
        Ok(pages)
    }

    /// Render the system prompt and make sure it fits under the token limit
    fn system_message(&self) -> ExplainResult<String> {
        let data = prompt_data(&self.pages)?;
        let system_message = build_system_prompt(
            &self.config.system_template,
            &data,
            self.profile.age,
            &self.profile.experience,
            self.config.n_sections,
        )?;

        let tokens = self
            .token_counter
            .count_tokens(&system_message, &self.config.model);
        debug!(tokens, limit = self.config.token_limit, "system message size");
        if tokens >= self.config.token_limit {
            return Err(ExplainError::PromptTooLarge {
                tokens,
                limit: self.config.token_limit,
            });
        }
        Ok(system_message)
    }

    /// Call the model until it stops asking for sections, returning its final text
    async fn converse(&mut self) -> ExplainResult<String> {
        let tools = [section_tool()];
        let mut round = 0;

        loop {
            let (reply, usage) = self
                .provider
                .complete(
                    &self.config.model,
                    &self.messages,
                    &tools,
                    Some(self.config.max_tokens),
                )
                .await?;
            debug!(round, ?usage, tool_calls = reply.tool_calls.len(), "model reply");

            let requests = reply.tool_calls.clone();
            self.messages.push(reply);

            if requests.is_empty() {
                break;
            }
            if round == self.config.max_tool_rounds {
                return Err(ExplainError::ToolLoopExceeded(round));
            }

            for request in requests {
                let section_request = parse_section_request(&request.tool_call)?;
                info!(
                    title = %section_request.title,
                    section = %section_request.section,
                    "getting page section"
                );
                let content =
                    resolve_section(&section_request.title, &section_request.section, &self.pages)?;
                self.consulted
                    .push((section_request.title, section_request.section));
                self.messages
                    .push(Message::tool(request.id, request.tool_call.name, content));
            }
            round += 1;
        }

        let last = self.messages.last().map(|m| m.text()).unwrap_or_default();
        if last.is_empty() {
            warn!("final model reply carried no content");
        }
        Ok(last.to_string())
    }

    async fn export_answer(&self, question: &str, markdown: &str) -> ExplainResult<()> {
        let path = answer_path(&self.config.answers_dir, question);
        tokio::fs::create_dir_all(&self.config.answers_dir).await?;
        tokio::fs::write(&path, markdown).await?;
        info!(path = %path.display(), "exported answer");
        Ok(())
    }

    fn answer(&self, markdown: String) -> Answer {
        let engine = self.page_store.engine();
        let resources = self
            .pages
            .iter()
            .map(|page| ResourceUsed {
                url: page.url.clone(),
                sections: dedup_in_order(
                    self.consulted
                        .iter()
                        .filter(|(title, _)| *title == page.title)
                        .map(|(_, section)| section.clone()),
                ),
                references: Vec::new(),
                engine,
            })
            .collect();

        Answer {
            markdown,
            references: self.pages.iter().map(|page| page.url.clone()).collect(),
            resources,
        }
    }
}

/// Serialized `{title, images, sections, url}` entries, one per page, in fetch order
pub fn prompt_data(pages: &[Page]) -> ExplainResult<String> {
    let summaries: Vec<PageSummary> = pages
        .iter()
        .map(|page| PageSummary {
            title: &page.title,
            images: &page.image_captions,
            sections: page.section_names(),
            url: &page.url,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&summaries)?)
}

/// Parse the model's search-term reply. An empty list is an error too.
pub fn parse_search_terms(reply: &str) -> ExplainResult<Vec<String>> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let terms: Vec<String> = serde_json::from_str(body.trim()).map_err(|e| {
        ExplainError::TermExtraction(format!("expected a JSON array of strings, got {:?}: {}", reply, e))
    })?;

    let terms: Vec<String> = terms
        .into_iter()
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
        .collect();
    if terms.is_empty() {
        return Err(ExplainError::TermExtraction(
            "the model returned no search terms".to_string(),
        ));
    }
    Ok(terms)
}

/// Longest file name most filesystems accept, in bytes
const MAX_ANSWER_NAME_BYTES: usize = 255;

const FALLBACK_ANSWER_NAME: &str = "answer";

/// `<answers_dir>/<question lowercased, spaces and path separators replaced by '-'>`
///
/// The name is cut to [`MAX_ANSWER_NAME_BYTES`] on a char boundary. Names that
/// would not be a plain file (`""`, `.`, `..`) become `answer`.
pub fn answer_path(answers_dir: &Path, question: &str) -> PathBuf {
    let mut name = String::new();
    for c in question.to_lowercase().chars() {
        let c = match c {
            ' ' | '/' | '\\' => '-',
            c => c,
        };
        if name.len() + c.len_utf8() > MAX_ANSWER_NAME_BYTES {
            break;
        }
        name.push(c);
    }

    match name.as_str() {
        "" | "." | ".." => answers_dir.join(FALLBACK_ANSWER_NAME),
        _ => answers_dir.join(name),
    }
}

fn dedup_in_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

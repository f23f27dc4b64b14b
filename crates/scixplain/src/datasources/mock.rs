use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{DatasourceEngine, Page, PageStore, Section};
use crate::errors::{ExplainError, ExplainResult};

/// In-memory page store keyed by search term and title
#[derive(Default)]
pub struct MockPageStore {
    results: HashMap<String, Vec<String>>,
    pages: HashMap<String, Page>,
    fetched: Mutex<Vec<String>>,
}

impl MockPageStore {
    pub fn with_search(mut self, term: &str, titles: &[&str]) -> Self {
        self.results.insert(
            term.to_string(),
            titles.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.insert(page.title.clone(), page);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

pub fn page(title: &str, sections: &[(&str, &str)]) -> Page {
    Page {
        title: title.to_string(),
        url: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
        image_captions: vec![format!("An image of {}", title)],
        sections: sections
            .iter()
            .map(|(name, content)| Section {
                name: name.to_string(),
                content: content.to_string(),
            })
            .collect(),
    }
}

#[async_trait]
impl PageStore for MockPageStore {
    fn engine(&self) -> DatasourceEngine {
        DatasourceEngine::Wiki
    }

    async fn search(&self, term: &str) -> ExplainResult<Vec<String>> {
        Ok(self.results.get(term).cloned().unwrap_or_default())
    }

    async fn fetch(&self, title: &str) -> ExplainResult<Page> {
        self.fetched.lock().unwrap().push(title.to_string());
        self.pages
            .get(title)
            .cloned()
            .ok_or_else(|| ExplainError::NotFound(title.to_string()))
    }
}

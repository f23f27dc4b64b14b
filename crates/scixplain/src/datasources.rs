//! Encyclopedia sources the communicator can pull pages from

pub mod wiki;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ExplainResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceEngine {
    Wiki,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub content: String,
}

/// A fetched encyclopedia page. Sections keep the order they have on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub url: String,
    pub image_captions: Vec<String>,
    pub sections: Vec<Section>,
}

impl Page {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Describes a page the answer drew on, and which of its sections the model read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsed {
    pub url: String,
    pub sections: Vec<String>,
    pub references: Vec<String>,
    #[serde(rename = "type")]
    pub engine: DatasourceEngine,
}

/// Title search and page retrieval against an encyclopedia
#[async_trait]
pub trait PageStore: Send + Sync {
    fn engine(&self) -> DatasourceEngine;

    /// Candidate titles for a search term, in the source's own ranking order
    async fn search(&self, term: &str) -> ExplainResult<Vec<String>>;

    /// Fetch a page by title. Fails with `NotFound` or `AmbiguousTitle`.
    async fn fetch(&self, title: &str) -> ExplainResult<Page>;
}

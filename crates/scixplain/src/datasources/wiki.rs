use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{DatasourceEngine, Page, PageStore, Section};
use crate::errors::{ExplainError, ExplainResult};

/// Name given to the text that comes before the first heading
pub const INTRODUCTION: &str = "Introduction";

pub const WIKIPEDIA_HOST: &str = "https://en.wikipedia.org";

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^={2,6}\s*(.+?)\s*={2,6}$").unwrap();
}

#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub host: String,
    pub search_limit: usize,
    pub user_agent: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            host: WIKIPEDIA_HOST.to_string(),
            search_limit: 10,
            user_agent: format!("scixplain/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Page store over the MediaWiki action API
pub struct WikiPageStore {
    client: Client,
    config: WikiConfig,
}

impl WikiPageStore {
    pub fn new(config: WikiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/w/api.php", self.config.host.trim_end_matches('/'));

        let response: Value = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .context("Wikipedia request failed")?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Wikipedia API error: {}", error));
        }
        Ok(response)
    }

    async fn image_captions(&self, title: &str) -> Result<Vec<String>> {
        let response = self
            .get_json(&[("action", "parse"), ("page", title), ("prop", "text")])
            .await?;
        let html = response["parse"]["text"].as_str().unwrap_or_default();
        parse_image_captions(html)
    }
}

#[async_trait]
impl PageStore for WikiPageStore {
    fn engine(&self) -> DatasourceEngine {
        DatasourceEngine::Wiki
    }

    async fn search(&self, term: &str) -> ExplainResult<Vec<String>> {
        let limit = self.config.search_limit.to_string();
        let response = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", term),
                ("srlimit", limit.as_str()),
            ])
            .await?;

        let titles: Vec<String> = response["query"]["search"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter_map(|result| result["title"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        debug!(term, results = titles.len(), "wikipedia search");
        Ok(titles)
    }

    async fn fetch(&self, title: &str) -> ExplainResult<Page> {
        let response = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts|info|pageprops"),
                ("explaintext", "1"),
                ("exsectionformat", "wiki"),
                ("inprop", "url"),
                ("ppprop", "disambiguation"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        let page = response["query"]["pages"]
            .get(0)
            .ok_or_else(|| ExplainError::NotFound(title.to_string()))?;

        if page.get("missing").is_some() || page.get("invalid").is_some() {
            return Err(ExplainError::NotFound(title.to_string()));
        }
        if page
            .get("pageprops")
            .and_then(|props| props.get("disambiguation"))
            .is_some()
        {
            return Err(ExplainError::AmbiguousTitle(title.to_string()));
        }

        let canonical = page["title"].as_str().unwrap_or(title).to_string();
        let url = page["fullurl"]
            .as_str()
            .ok_or_else(|| anyhow!("No url for page {}", canonical))?
            .to_string();
        let sections = parse_sections(page["extract"].as_str().unwrap_or_default());
        let image_captions = self.image_captions(&canonical).await?;

        info!(title = %canonical, sections = sections.len(), "fetched wikipedia page");
        Ok(Page {
            title: canonical,
            url,
            image_captions,
            sections,
        })
    }
}

/// Split a plain-text extract into sections on `== Heading ==` lines of any level.
///
/// Empty sections are dropped and a repeated heading keeps its first occurrence.
pub fn parse_sections(extract: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut name = INTRODUCTION.to_string();
    let mut body: Vec<&str> = Vec::new();

    for line in extract.lines() {
        if let Some(captures) = HEADING.captures(line.trim()) {
            push_section(&mut sections, name, &body);
            name = captures[1].to_string();
            body.clear();
        } else {
            body.push(line);
        }
    }
    push_section(&mut sections, name, &body);

    sections
}

fn push_section(sections: &mut Vec<Section>, name: String, body: &[&str]) {
    let content = body.join("\n").trim().to_string();
    if content.is_empty() || sections.iter().any(|s| s.name == name) {
        return;
    }
    sections.push(Section { name, content });
}

/// Captions of the figures in rendered page html, in document order
pub fn parse_image_captions(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_fragment(html);
    let selector = Selector::parse("figcaption, .thumbcaption")
        .map_err(|e| anyhow!("Invalid caption selector: {:?}", e))?;

    Ok(document
        .select(&selector)
        .map(|el| {
            el.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|caption| !caption.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EXTRACT: &str = "A neutron star is the collapsed core of a massive supergiant star.\n\n\n\
== Formation ==\nAny main-sequence star with an initial mass above 8 times the mass of the Sun can become one.\n\n\n\
== Structure ==\nCurrent understanding of the structure is defined by existing mathematical models.\n\n\n\
=== Crust ===\nThe surface is composed of ordinary atomic nuclei.\n\n\n\
== See also ==\n\n\n\
== References ==\n";

    const HTML: &str = r#"<div class="mw-parser-output">
        <figure><img src="a.png"><figcaption>Radiation from the pulsar
            <a href="/wiki/PSR">PSR B1509-58</a></figcaption></figure>
        <div class="thumb"><div class="thumbinner"><div class="thumbcaption">Neutron star structure</div></div></div>
        <figure><img src="b.png"><figcaption>   </figcaption></figure>
    </div>"#;

    async fn setup_store() -> (MockServer, WikiPageStore) {
        let mock_server = MockServer::start().await;
        let store = WikiPageStore::new(WikiConfig {
            host: mock_server.uri(),
            ..WikiConfig::default()
        })
        .unwrap();
        (mock_server, store)
    }

    async fn mount_query(server: &MockServer, title: &str, page: Value) {
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "query"))
            .and(query_param("titles", title))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "batchcomplete": true,
                "query": {"pages": [page]}
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_sections() {
        let sections = parse_sections(EXTRACT);
        let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![INTRODUCTION, "Formation", "Structure", "Crust"]);
        assert_eq!(
            sections[3].content,
            "The surface is composed of ordinary atomic nuclei."
        );
    }

    #[test]
    fn test_parse_sections_duplicate_heading() {
        let sections = parse_sections("== Notes ==\nfirst\n== Notes ==\nsecond");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "first");
    }

    #[test]
    fn test_parse_image_captions() {
        let captions = parse_image_captions(HTML).unwrap();
        assert_eq!(
            captions,
            vec![
                "Radiation from the pulsar PSR B1509-58".to_string(),
                "Neutron star structure".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_search() {
        let (server, store) = setup_store().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "neutron star"))
            .and(query_param("srlimit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"search": [
                    {"ns": 0, "title": "Neutron star", "pageid": 1},
                    {"ns": 0, "title": "Neutron star merger", "pageid": 2}
                ]}
            })))
            .mount(&server)
            .await;

        let titles = store.search("neutron star").await.unwrap();
        assert_eq!(titles, vec!["Neutron star", "Neutron star merger"]);
    }

    #[tokio::test]
    async fn test_fetch_page() {
        let (server, store) = setup_store().await;
        mount_query(
            &server,
            "neutron star",
            json!({
                "pageid": 21764,
                "ns": 0,
                "title": "Neutron star",
                "extract": EXTRACT,
                "fullurl": "https://en.wikipedia.org/wiki/Neutron_star"
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "parse"))
            .and(query_param("page", "Neutron star"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parse": {"title": "Neutron star", "pageid": 21764, "text": HTML}
            })))
            .mount(&server)
            .await;

        let page = store.fetch("neutron star").await.unwrap();
        assert_eq!(page.title, "Neutron star");
        assert_eq!(page.url, "https://en.wikipedia.org/wiki/Neutron_star");
        assert_eq!(page.image_captions.len(), 2);
        assert_eq!(
            page.section_names(),
            vec![INTRODUCTION, "Formation", "Structure", "Crust"]
        );
    }

    #[tokio::test]
    async fn test_fetch_missing_page() {
        let (server, store) = setup_store().await;
        mount_query(
            &server,
            "Nonexistent thing",
            json!({"ns": 0, "title": "Nonexistent thing", "missing": true}),
        )
        .await;

        let err = store.fetch("Nonexistent thing").await.unwrap_err();
        assert!(matches!(err, ExplainError::NotFound(title) if title == "Nonexistent thing"));
    }

    #[tokio::test]
    async fn test_fetch_disambiguation_page() {
        let (server, store) = setup_store().await;
        mount_query(
            &server,
            "Mercury",
            json!({
                "pageid": 19694,
                "ns": 0,
                "title": "Mercury",
                "extract": "Mercury may refer to:",
                "fullurl": "https://en.wikipedia.org/wiki/Mercury",
                "pageprops": {"disambiguation": ""}
            }),
        )
        .await;

        let err = store.fetch("Mercury").await.unwrap_err();
        assert!(matches!(err, ExplainError::AmbiguousTitle(_)));
    }

    #[tokio::test]
    async fn test_api_error_is_upstream() {
        let (server, store) = setup_store().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "badvalue", "info": "Unrecognized value"}
            })))
            .mount(&server)
            .await;

        let err = store.search("anything").await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
    }
}

//! Literature search proxy.
//!
//! Endpoint: https://www.ebi.ac.uk/europepmc/webservices/rest/search

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Articles returned per search when the caller does not say otherwise
pub const DEFAULT_MAX_RESULTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub url: Vec<String>,
}

/// Search terms as sent by callers: either one query string or a list of keywords
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Keywords {
    /// A single query string, or `None` when there is nothing to search for.
    ///
    /// Keyword lists are trimmed and joined with `AND`.
    pub fn to_query(&self) -> Option<String> {
        let query = match self {
            Keywords::One(q) => q.trim().to_string(),
            Keywords::Many(terms) => terms
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" AND "),
        };
        (!query.is_empty()).then_some(query)
    }
}

#[async_trait]
pub trait LiteratureSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Article>>;
}

/// Map a Europe PMC search response onto [`Article`]s.
pub fn parse_search_response(data: &Value) -> Vec<Article> {
    let Some(results) = data["resultList"]["result"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .map(|item| Article {
            title: item["title"].as_str().map(String::from),
            abstract_text: item["abstractText"].as_str().map(String::from),
            doi: item["doi"].as_str().map(String::from),
            url: item["fullTextUrlList"]["fullTextUrl"]
                .as_array()
                .map(|urls| {
                    urls.iter()
                        .filter_map(|u| u["url"].as_str())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

fn normalized(field: Option<&str>) -> Option<String> {
    field
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

/// Drop repeated articles, keeping the first occurrence.
///
/// Two articles are the same if they share a DOI; articles without a DOI are
/// compared by title.
pub fn deduplicate_articles(articles: Vec<Article>) -> Vec<Article> {
    let mut seen_dois = HashSet::new();
    let mut seen_titles = HashSet::new();

    articles
        .into_iter()
        .filter(|article| match normalized(article.doi.as_deref()) {
            Some(doi) => seen_dois.insert(doi),
            None => match normalized(article.title.as_deref()) {
                Some(title) => seen_titles.insert(title),
                None => true,
            },
        })
        .collect()
}

#[cfg(feature = "europepmc")]
pub use europepmc::EuropePmcClient;

#[cfg(feature = "europepmc")]
mod europepmc {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;
    use tracing::{debug, instrument};

    use super::{Article, LiteratureSource, deduplicate_articles, parse_search_response};
    use crate::error::{FlowError, Result};

    const EPMC_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

    pub struct EuropePmcClient {
        client: reqwest::Client,
        base_url: String,
    }

    impl EuropePmcClient {
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| FlowError::Config(format!("failed to build HTTP client: {}", e)))?;
            Ok(Self {
                client,
                base_url: EPMC_SEARCH_URL.to_string(),
            })
        }

        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into();
            self
        }
    }

    #[async_trait]
    impl LiteratureSource for EuropePmcClient {
        fn name(&self) -> &str {
            "EuropePMC"
        }

        #[instrument(skip(self))]
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Article>> {
            let url = format!(
                "{}?query={}&format=json&resultType=core&pageSize={}",
                self.base_url,
                urlencoding::encode(query),
                max_results
            );

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FlowError::Upstream(format!("Europe PMC request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FlowError::Upstream(format!(
                    "Europe PMC returned status {}",
                    status
                )));
            }

            let data: Value = response.json().await.map_err(|e| {
                FlowError::Upstream(format!("Failed to parse Europe PMC response: {}", e))
            })?;

            let articles = deduplicate_articles(parse_search_response(&data));
            debug!(count = articles.len(), "Europe PMC search returned articles");
            Ok(articles)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article(title: Option<&str>, doi: Option<&str>) -> Article {
        Article {
            title: title.map(String::from),
            abstract_text: None,
            doi: doi.map(String::from),
            url: Vec::new(),
        }
    }

    #[test]
    fn keywords_become_one_query() {
        let many = Keywords::Many(vec![
            " Meningitis ".to_string(),
            String::new(),
            "complete blood count".to_string(),
        ]);
        assert_eq!(
            many.to_query().as_deref(),
            Some("Meningitis AND complete blood count")
        );
        assert_eq!(
            Keywords::One("sepsis".to_string()).to_query().as_deref(),
            Some("sepsis")
        );
        assert_eq!(Keywords::Many(vec!["  ".to_string()]).to_query(), None);
        assert_eq!(Keywords::One(String::new()).to_query(), None);
    }

    #[test]
    fn keywords_deserialize_from_string_or_list() {
        let one: Keywords = serde_json::from_value(json!("flu")).unwrap();
        assert_eq!(one, Keywords::One("flu".to_string()));
        let many: Keywords = serde_json::from_value(json!(["flu", "cough"])).unwrap();
        assert_eq!(many, Keywords::Many(vec!["flu".to_string(), "cough".to_string()]));
        assert!(serde_json::from_value::<Keywords>(json!(42)).is_err());
    }

    #[test]
    fn parses_europe_pmc_results() {
        let data = json!({
            "hitCount": 2,
            "resultList": {
                "result": [
                    {
                        "title": "Bacterial meningitis in adults",
                        "abstractText": "A review.",
                        "doi": "10.1000/abc",
                        "fullTextUrlList": {
                            "fullTextUrl": [
                                { "documentStyle": "html", "url": "https://example.org/a" },
                                { "documentStyle": "pdf", "url": "https://example.org/a.pdf" },
                                { "documentStyle": "doi" }
                            ]
                        }
                    },
                    { "title": "No extras" }
                ]
            }
        });

        let articles = parse_search_response(&data);

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(
            articles[0].url,
            ["https://example.org/a", "https://example.org/a.pdf"]
        );
        assert_eq!(articles[1].abstract_text, None);
        assert!(articles[1].url.is_empty());
        assert!(parse_search_response(&json!({})).is_empty());
    }

    #[test]
    fn article_serializes_with_abstract_key() {
        let value = serde_json::to_value(article(Some("T"), None)).unwrap();
        assert_eq!(
            value,
            json!({ "title": "T", "abstract": null, "doi": null, "url": [] })
        );
    }

    #[test]
    fn deduplicates_by_doi_then_title() {
        let articles = vec![
            article(Some("First"), Some("10.1/X")),
            article(Some("First, reprinted"), Some("10.1/x")),
            article(Some("Untitled DOI-less"), None),
            article(Some("  untitled doi-less "), None),
            article(None, None),
            article(None, None),
        ];

        let kept = deduplicate_articles(articles);

        let titles: Vec<_> = kept.iter().map(|a| a.title.as_deref()).collect();
        assert_eq!(titles, [Some("First"), Some("Untitled DOI-less"), None, None]);
    }
}

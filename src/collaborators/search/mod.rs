//! Discovery Engine search with an LLM-written summary of the top hits.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{SearchResult, SearchService, post_json};
use crate::config::{GoogleConfig, SearchConfig};
use crate::errors::ShiftlineResult;

const SERVICE: &str = "search";
const PAGE_SIZE: u32 = 3;
const SUMMARY_RESULT_COUNT: u32 = 3;
const MAX_EXTRACTIVE_ANSWERS: u32 = 1;

pub struct DiscoveryEngineSearch {
    access_token: String,
    base_url: String,
    serving_config_path: String,
    client: Client,
}

impl DiscoveryEngineSearch {
    pub fn new(config: &SearchConfig, google: &GoogleConfig) -> Self {
        Self::with_base_url(config, google, endpoint_for(&config.location))
    }

    fn with_base_url(config: &SearchConfig, google: &GoogleConfig, base_url: String) -> Self {
        Self {
            access_token: google.access_token.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            serving_config_path: format!(
                "projects/{}/locations/{}/collections/default_collection/dataStores/{}/servingConfigs/{}",
                config.project_id, config.location, config.data_store_id, config.serving_config
            ),
            client: crate::utils::http::default_http_client(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/v1/{}:search", self.base_url, self.serving_config_path)
    }

    fn request_body(query: &str) -> Value {
        json!({
            "query": query,
            "pageSize": PAGE_SIZE,
            "contentSearchSpec": {
                "summarySpec": {
                    "summaryResultCount": SUMMARY_RESULT_COUNT,
                    "ignoreNonSummarySeekingQuery": true,
                    "ignoreAdversarialQuery": true,
                },
                "extractiveContentSpec": {
                    "maxExtractiveAnswerCount": MAX_EXTRACTIVE_ANSWERS,
                },
            },
        })
    }

    fn parse_response(json: &Value) -> SearchResult {
        let summary_text = json["summary"]["summaryText"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        SearchResult { summary_text }
    }
}

/// Regional data stores are served from a location-prefixed host.
pub(crate) fn endpoint_for(location: &str) -> String {
    if location == "global" {
        "https://discoveryengine.googleapis.com".to_string()
    } else {
        format!("https://{}-discoveryengine.googleapis.com", location)
    }
}

#[async_trait]
impl SearchService for DiscoveryEngineSearch {
    async fn search(&self, query: &str) -> ShiftlineResult<SearchResult> {
        debug!("searching data store: {} chars", query.chars().count());
        let json = post_json(
            SERVICE,
            &self.client,
            &self.search_url(),
            &self.access_token,
            &Self::request_body(query),
        )
        .await?;
        let result = Self::parse_response(&json);
        info!(
            "search returned {} result(s), summary={}",
            json["results"].as_array().map_or(0, Vec::len),
            result.summary_text.is_some()
        );
        Ok(result)
    }
}

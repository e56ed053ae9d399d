//! Elasticsearch backend over its REST API.
//!
//! Writes use `refresh=true` so a record is searchable as soon as the call
//! returns. Updates are guarded by `if_seq_no`/`if_primary_term`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::backend::{
    DocVersion, QueryScope, SearchBackend, SearchHits, SearchQuery, SortOrder, StoreError,
    StoreResult, StoredRecipe,
};
use crate::models::Recipe;

/// Connection settings for the Elasticsearch backend.
#[derive(Debug, Clone)]
pub struct EsConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    pub index: String,
    /// Attempts made by [`EsBackend::connect`] before giving up.
    pub connect_attempts: u32,
    pub connect_delay: Duration,
    pub timeout: Duration,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "recipes".to_string(),
            connect_attempts: 5,
            connect_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(30),
        }
    }
}

/// `SearchBackend` for a single Elasticsearch index.
#[derive(Debug, Clone)]
pub struct EsBackend {
    client: Client,
    base: String,
    index: String,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Recipe,
    #[serde(rename = "_seq_no", default)]
    seq_no: i64,
    #[serde(rename = "_primary_term", default)]
    primary_term: i64,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
}

impl Hit {
    fn into_stored(self) -> StoredRecipe {
        StoredRecipe {
            recipe: self.source,
            version: DocVersion {
                seq_no: self.seq_no,
                primary_term: self.primary_term,
            },
            score: self.score,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Recipe>,
    #[serde(rename = "_seq_no", default)]
    seq_no: i64,
    #[serde(rename = "_primary_term", default)]
    primary_term: i64,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(rename = "_seq_no")]
    seq_no: i64,
    #[serde(rename = "_primary_term")]
    primary_term: i64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchResponseHits,
}

#[derive(Debug, Deserialize)]
struct SearchResponseHits {
    total: Option<Total>,
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Total {
    value: u64,
}

impl EsBackend {
    pub fn new(config: &EsConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            base: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        })
    }

    /// Build a backend and wait for the cluster to answer, retrying a few
    /// times while it starts up.
    pub async fn connect(config: &EsConfig) -> StoreResult<Self> {
        let backend = Self::new(config)?;
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match backend.ping().await {
                Ok(()) => {
                    info!("Connected to Elasticsearch at {}", backend.base);
                    return Ok(backend);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Elasticsearch isn't ready ({}), {} attempts left",
                        e,
                        attempts - attempt
                    );
                    tokio::time::sleep(config.connect_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base, urlencoding::encode(&self.index))
    }

    fn doc_url(&self, endpoint: &str, id: &str) -> String {
        format!("{}/{}/{}", self.index_url(), endpoint, urlencoding::encode(id))
    }

    async fn search_body(&self, body: Value) -> StoreResult<SearchHits> {
        let resp = self
            .client
            .post(format!("{}/_search", self.index_url()))
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;
        let resp = check(resp).await?;
        let parsed: SearchResponse = resp.json().await.map_err(serialization)?;

        Ok(SearchHits {
            total: parsed
                .hits
                .total
                .map_or(parsed.hits.hits.len() as u64, |t| t.value),
            hits: parsed.hits.hits.into_iter().map(Hit::into_stored).collect(),
        })
    }
}

fn unavailable(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn serialization(e: reqwest::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}

/// Map non-success statuses to errors.
async fn check(resp: Response) -> StoreResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::CONFLICT => StoreError::Conflict(body),
        StatusCode::NOT_FOUND => StoreError::NotFound(body),
        s if s.is_server_error() => StoreError::Unavailable(format!("HTTP {}: {}", s, body)),
        s => StoreError::Backend(format!("HTTP {}: {}", s, body)),
    })
}

/// Index settings and mappings.
pub fn index_definition() -> Value {
    let text = json!({ "type": "text", "analyzer": "recipe_analyzer" });
    let text_with_keyword = |ignore_above: u32| {
        json!({
            "type": "text",
            "analyzer": "recipe_analyzer",
            "fields": { "keyword": { "type": "keyword", "ignore_above": ignore_above } }
        })
    };
    // No ignore_above on the url keyword: `find_by_url` must match URLs of
    // any length.
    let url_field = json!({
        "type": "text",
        "fields": { "keyword": { "type": "keyword" } }
    });
    let image_field = json!({
        "type": "text",
        "fields": { "keyword": { "type": "keyword", "ignore_above": 2048 } }
    });

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "analysis": {
                "analyzer": {
                    "recipe_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "char_filter": ["html_strip"],
                        "filter": ["lowercase", "asciifolding", "stop", "snowball"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "title": text_with_keyword(256),
                "name": text_with_keyword(256),
                "description": text,
                "body": text,
                "url": url_field,
                "image": image_field,
                "prep_time": { "type": "text" },
                "cook_time": { "type": "text" },
                "total_time": { "type": "text" },
                "calories": { "type": "text" },
                "servings": { "type": "text" },
                "ingredients": text,
                "instructions": text,
                "categories": { "type": "keyword" },
                "source_site": { "type": "keyword" },
                "crawl_date": { "type": "date" }
            }
        }
    })
}

/// Translate a [`SearchQuery`] into a request body.
pub fn query_body(query: &SearchQuery) -> Value {
    let text = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let must = match (text, query.scope) {
        (None, _) => json!({ "match_all": {} }),
        (Some(t), QueryScope::Title) => json!({
            "bool": {
                "should": [
                    { "match_phrase": { "title": { "query": t, "boost": 2.0 } } },
                    { "match": { "title": { "query": t, "fuzziness": "AUTO" } } }
                ],
                "minimum_should_match": 1
            }
        }),
        (Some(t), QueryScope::AllFields) => json!({
            "multi_match": {
                "query": t,
                "fields": ["title^3", "name^3", "description^2", "ingredients", "instructions", "body"],
                "type": "most_fields",
                "fuzziness": "AUTO"
            }
        }),
    };

    let mut filter = Vec::new();
    if let Some(category) = &query.category {
        filter.push(json!({
            "bool": {
                "should": [
                    { "term": { "categories": category } },
                    { "term": { "source_site": category } }
                ],
                "minimum_should_match": 1
            }
        }));
    }
    if let Some(since) = query.since {
        filter.push(json!({ "range": { "crawl_date": { "gte": since.to_rfc3339() } } }));
    }

    let sort = match query.sort {
        SortOrder::Relevance => json!(["_score", { "crawl_date": { "order": "desc" } }]),
        SortOrder::CrawlDateDesc => json!([{ "crawl_date": { "order": "desc" } }]),
    };

    json!({
        "query": { "bool": { "must": [must], "filter": filter } },
        "from": query.from,
        "size": query.size,
        "sort": sort,
        "seq_no_primary_term": true,
        "track_total_hits": true
    })
}

#[async_trait]
impl SearchBackend for EsBackend {
    async fn ping(&self) -> StoreResult<()> {
        let resp = self.client.get(&self.base).send().await.map_err(unavailable)?;
        check(resp).await.map(|_| ())
    }

    async fn index_exists(&self) -> StoreResult<bool> {
        let resp = self
            .client
            .head(self.index_url())
            .send()
            .await
            .map_err(unavailable)?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StoreError::Backend(format!("HTTP {}", s))),
        }
    }

    async fn create_index(&self) -> StoreResult<()> {
        let resp = self
            .client
            .put(self.index_url())
            .json(&index_definition())
            .send()
            .await
            .map_err(unavailable)?;
        check(resp).await?;
        info!("Created index {}", self.index);
        Ok(())
    }

    async fn delete_index(&self) -> StoreResult<bool> {
        let resp = self
            .client
            .delete(self.index_url())
            .send()
            .await
            .map_err(unavailable)?;
        match check(resp).await {
            Ok(_) => {
                info!("Deleted index {}", self.index);
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, id: &str) -> StoreResult<Option<StoredRecipe>> {
        let resp = self
            .client
            .get(self.doc_url("_doc", id))
            .send()
            .await
            .map_err(unavailable)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let parsed: GetResponse = check(resp).await?.json().await.map_err(serialization)?;
        if !parsed.found {
            return Ok(None);
        }
        Ok(parsed.source.map(|recipe| StoredRecipe {
            recipe,
            version: DocVersion {
                seq_no: parsed.seq_no,
                primary_term: parsed.primary_term,
            },
            score: None,
        }))
    }

    async fn insert(&self, recipe: &Recipe) -> StoreResult<DocVersion> {
        let resp = self
            .client
            .put(self.doc_url("_create", &recipe.id))
            .query(&[("refresh", "true")])
            .json(recipe)
            .send()
            .await
            .map_err(unavailable)?;
        let written: WriteResponse = check(resp).await?.json().await.map_err(serialization)?;
        debug!("Indexed {} at seq {}", recipe.id, written.seq_no);
        Ok(DocVersion {
            seq_no: written.seq_no,
            primary_term: written.primary_term,
        })
    }

    async fn replace(&self, recipe: &Recipe, expected: DocVersion) -> StoreResult<DocVersion> {
        let resp = self
            .client
            .put(self.doc_url("_doc", &recipe.id))
            .query(&[
                ("if_seq_no", expected.seq_no.to_string()),
                ("if_primary_term", expected.primary_term.to_string()),
                ("refresh", "true".to_string()),
            ])
            .json(recipe)
            .send()
            .await
            .map_err(unavailable)?;
        let written: WriteResponse = check(resp).await?.json().await.map_err(serialization)?;
        Ok(DocVersion {
            seq_no: written.seq_no,
            primary_term: written.primary_term,
        })
    }

    async fn find_by_url(&self, url: &str) -> StoreResult<Option<StoredRecipe>> {
        let body = json!({
            "query": { "term": { "url.keyword": url } },
            "size": 1,
            "seq_no_primary_term": true
        });
        let hits = self.search_body(body).await?;
        Ok(hits.hits.into_iter().next())
    }

    async fn search(&self, query: &SearchQuery) -> StoreResult<SearchHits> {
        self.search_body(query_body(query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_index_definition_fields() {
        let def = index_definition();
        let props = &def["mappings"]["properties"];
        assert_eq!(props["url"]["fields"]["keyword"]["type"], "keyword");
        assert!(props["url"]["fields"]["keyword"].get("ignore_above").is_none());
        assert_eq!(props["title"]["analyzer"], "recipe_analyzer");
        assert_eq!(props["source_site"]["type"], "keyword");
        assert_eq!(props["crawl_date"]["type"], "date");
        assert_eq!(
            def["settings"]["analysis"]["analyzer"]["recipe_analyzer"]["tokenizer"],
            "standard"
        );
    }

    #[test]
    fn test_match_all_query() {
        let body = query_body(&SearchQuery::default());
        assert_eq!(body["query"]["bool"]["must"][0], json!({ "match_all": {} }));
        assert_eq!(body["size"], 10);
        assert_eq!(body["query"]["bool"]["filter"], json!([]));
    }

    #[test]
    fn test_title_query_is_phrase_boosted() {
        let body = query_body(&SearchQuery::title_candidates("Chocolate Cake", 5));
        let should = &body["query"]["bool"]["must"][0]["bool"]["should"];
        assert_eq!(should[0]["match_phrase"]["title"]["boost"], 2.0);
        assert_eq!(should[1]["match"]["title"]["fuzziness"], "AUTO");
        assert_eq!(body["size"], 5);
    }

    #[test]
    fn test_filters_and_sort() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let query = SearchQuery::text("soup")
            .with_category("Dinner")
            .since(since)
            .sorted(SortOrder::CrawlDateDesc)
            .page(20, 10);
        let body = query_body(&query);

        let filter = &body["query"]["bool"]["filter"];
        assert_eq!(filter[0]["bool"]["should"][0]["term"]["categories"], "Dinner");
        assert_eq!(filter[1]["range"]["crawl_date"]["gte"], since.to_rfc3339());
        assert_eq!(body["sort"][0]["crawl_date"]["order"], "desc");
        assert_eq!(body["from"], 20);
    }

    #[test]
    fn test_doc_urls_are_encoded() {
        let backend = EsBackend::new(&EsConfig {
            url: "http://localhost:9200/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.doc_url("_doc", "a/b"),
            "http://localhost:9200/recipes/_doc/a%2Fb"
        );
    }
}

//! Vector Index Coordinator.
//!
//! The sole interface between the engine and the external vector store.
//! Speaks Qdrant's REST API directly over `reqwest` (not the gRPC
//! `qdrant_client` crate), manages collection lifecycle, translates
//! fragment identifiers into the UUID shape Qdrant requires, and enforces
//! rate limits, a circuit breaker, and a cooperative throttle signal
//! around every batch.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::QdrantConfig;
use crate::error::{EngineError, Result};
use crate::models::{Fragment, PayloadValue, RankedResult};
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::throttle::ThrottleSignal;

const BATCH_SIZE: usize = 10;
const UPSERT_RATE: usize = 100;
const SEARCH_RATE: usize = 30;
const RATE_WINDOW: Duration = Duration::from_secs(60);
const MAX_CONTENT_CHARS: usize = 32_000;
const MAX_TITLE_CHARS: usize = 1_000;
const MAX_ARRAY_ITEMS: usize = 100;

/// Fixed namespace used to derive deterministic point UUIDs from fragment
/// identifiers (UUID v5).
const NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0xfa, 0x1d, 0x90, 0x5f, 0x2b, 0x4a, 0x33, 0x9d, 0x71, 0x4e, 0x2a, 0x7c, 0x88, 0x10, 0x02,
]);

#[derive(Debug, Default, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub score_threshold: f64,
    pub filters: HashMap<String, Vec<String>>,
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, score_threshold: 0.5, filters: HashMap::new() }
    }
}

#[derive(Debug, Default, Clone)]
pub struct UpsertSummary {
    pub batches_total: usize,
    pub batches_failed: usize,
    pub fragments_written: usize,
    pub fragments_skipped: usize,
}

pub struct VectorStoreCoordinator {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dims: usize,
    upsert_limiter: RateLimiter,
    search_limiter: RateLimiter,
    breaker: CircuitBreaker,
    pub throttle: ThrottleSignal,
}

impl VectorStoreCoordinator {
    pub fn new(config: &QdrantConfig, dims: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| EngineError::VectorStore(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection_name.clone(),
            dims,
            upsert_limiter: RateLimiter::new(UPSERT_RATE, RATE_WINDOW),
            search_limiter: RateLimiter::new(SEARCH_RATE, RATE_WINDOW),
            breaker: CircuitBreaker::new(),
            throttle: ThrottleSignal::new(),
        })
    }

    /// List collections; create ours with cosine distance if absent.
    pub async fn ensure_collection(&self) -> Result<()> {
        let collections = self.list_collections().await?;
        if collections.iter().any(|c| c == &self.collection) {
            return Ok(());
        }

        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let body = json!({
            "vectors": { "size": self.dims, "distance": "Cosine" }
        });
        let resp = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::VectorStore(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(EngineError::VectorStore(format!("failed to create collection: {}", resp.status())));
        }

        for field in ["repository", "document_id", "filepath", "kind", "priority"] {
            let index_url = format!("{}/collections/{}/index", self.base_url, self.collection);
            let _ = self
                .client
                .put(&index_url)
                .json(&json!({ "field_name": field, "field_schema": "keyword" }))
                .send()
                .await;
        }

        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| EngineError::VectorStore(format!("health probe failed: {}", e)))?;
        let json: serde_json::Value = resp.json().await.map_err(|e| EngineError::VectorStore(e.to_string()))?;
        let names = json["result"]["collections"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|c| c["name"].as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Ok(names)
    }

    fn point_id(fragment_id: &str) -> Uuid {
        Uuid::new_v5(&NAMESPACE, fragment_id.as_bytes())
    }

    /// Upsert fragments in bounded batches, honoring the rate limiter,
    /// throttle signal, circuit breaker, and retry policy.
    pub async fn upsert(&self, fragments: &[Fragment]) -> Result<UpsertSummary> {
        let eligible: Vec<&Fragment> = fragments
            .iter()
            .filter(|f| f.embedding.as_ref().is_some_and(|v| v.len() == self.dims))
            .collect();

        let skipped = fragments.len() - eligible.len();

        if eligible.is_empty() {
            return Ok(UpsertSummary { fragments_skipped: skipped, ..Default::default() });
        }

        if self.breaker.should_skip().await {
            return Ok(UpsertSummary { fragments_skipped: fragments.len(), ..Default::default() });
        }

        if self.list_collections().await.is_err() && self.ensure_collection().await.is_err() {
            return Err(EngineError::VectorStore("vector store unavailable: health probe and collection check both failed".into()));
        }

        let batches: Vec<&[&Fragment]> = eligible.chunks(BATCH_SIZE).collect();
        let total_batches = batches.len();
        let mut batches_failed = 0usize;
        let mut written = 0usize;

        for batch in batches {
            self.upsert_limiter.acquire().await;
            self.throttle.wait().await;

            let points: Vec<serde_json::Value> = batch.iter().map(|f| self.point_payload(f)).collect();
            let url = format!("{}/collections/{}/points", self.base_url, self.collection);
            let body = json!({ "points": points });

            let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(5));
            let result = retry_with_backoff(
                policy,
                || async {
                    let resp = self
                        .client
                        .put(&url)
                        .json(&body)
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;
                    if resp.status().is_success() {
                        Ok(())
                    } else {
                        Err(format!("upsert batch failed: {}", resp.status()))
                    }
                },
                |_| true,
            )
            .await;

            match result {
                Ok(()) => {
                    written += batch.len();
                    self.breaker.record_success();
                }
                Err(_) => {
                    batches_failed += 1;
                    self.breaker.record_failure().await;
                }
            }

            if should_abort(batches_failed, total_batches) {
                break;
            }
        }

        if should_abort(batches_failed, total_batches) {
            return Err(EngineError::VectorStore(format!(
                "upsert aborted: {}/{} batches failed",
                batches_failed, total_batches
            )));
        }

        Ok(UpsertSummary { batches_total: total_batches, batches_failed, fragments_written: written, fragments_skipped: skipped })
    }

    fn point_payload(&self, fragment: &Fragment) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        payload.insert("fragment_id".into(), json!(fragment.id));
        payload.insert("document_id".into(), json!(fragment.document_id));
        payload.insert("repository".into(), json!(fragment.repository));
        payload.insert("filepath".into(), json!(fragment.path));
        payload.insert("kind".into(), json!(format!("{:?}", fragment.kind)));
        payload.insert("content".into(), json!(truncate(&fragment.content, MAX_CONTENT_CHARS)));
        payload.insert("content_hash".into(), json!(fragment.content_hash));
        payload.insert("start_line".into(), json!(fragment.start_line));
        payload.insert("end_line".into(), json!(fragment.end_line));
        payload.insert("parent_id".into(), json!(fragment.parent_id));
        payload.insert(
            "child_ids".into(),
            json!(fragment.child_ids.iter().take(MAX_ARRAY_ITEMS).cloned().collect::<Vec<_>>()),
        );

        for (key, value) in &fragment.metadata {
            let sanitized = sanitize_payload_value(value);
            payload.insert(key.clone(), sanitized);
        }

        json!({
            "id": Self::point_id(&fragment.id).to_string(),
            "vector": fragment.embedding,
            "payload": payload,
        })
    }

    /// Vector similarity search with an optional equality/any-of metadata filter.
    pub async fn search(&self, query_vector: &[f32], options: &SearchOptions) -> Result<Vec<RankedResult>> {
        self.search_limiter.acquire().await;
        self.throttle.wait().await;

        let url = format!("{}/collections/{}/points/search", self.base_url, self.collection);
        let body = json!({
            "vector": query_vector,
            "limit": options.limit,
            "score_threshold": options.score_threshold,
            "with_payload": true,
            "filter": build_filter(&options.filters),
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::VectorStore(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EngineError::VectorStore(format!("search failed: {}", resp.status())));
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| EngineError::VectorStore(e.to_string()))?;
        parse_search_results(&json)
    }

    /// Search by metadata only: a zero vector with a zero score threshold
    /// so ranking falls purely out of the filter and the store's id order.
    pub async fn search_by_metadata(&self, filters: &HashMap<String, Vec<String>>, limit: usize) -> Result<Vec<RankedResult>> {
        let zero_vector = vec![0.0f32; self.dims];
        let options = SearchOptions { limit, score_threshold: 0.0, filters: filters.clone() };
        self.search(&zero_vector, &options).await
    }

    pub async fn stats(&self) -> Result<(u64, u64)> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let resp = self.client.get(&url).send().await.map_err(|e| EngineError::VectorStore(e.to_string()))?;
        let json: serde_json::Value = resp.json().await.map_err(|e| EngineError::VectorStore(e.to_string()))?;
        let points = json["result"]["points_count"].as_u64().unwrap_or(0);
        let indexed = json["result"]["indexed_vectors_count"].as_u64().unwrap_or(0);
        Ok((points, indexed))
    }

    pub fn estimated_document_count(points_count: u64) -> u64 {
        points_count / 10
    }

    pub async fn delete_by_repository(&self, repository: &str) -> Result<()> {
        self.delete_by_filter(&HashMap::from([("repository".to_string(), vec![repository.to_string()])])).await
    }

    pub async fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.delete_by_filter(&HashMap::from([("document_id".to_string(), vec![document_id.to_string()])])).await
    }

    async fn delete_by_filter(&self, filters: &HashMap<String, Vec<String>>) -> Result<()> {
        let url = format!("{}/collections/{}/points/delete", self.base_url, self.collection);
        let body = json!({ "filter": build_filter(filters) });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::VectorStore(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(EngineError::VectorStore(format!("delete failed: {}", resp.status())));
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let _ = self.client.delete(&url).send().await;
        self.ensure_collection().await
    }
}

/// More than half of batches failed, or two absolute failures have
/// accumulated, whichever comes first.
fn should_abort(batches_failed: usize, total_batches: usize) -> bool {
    batches_failed * 2 > total_batches || batches_failed >= 2
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        content.chars().take(max_chars).collect()
    }
}

fn sanitize_payload_value(value: &PayloadValue) -> serde_json::Value {
    match value {
        PayloadValue::Str(s) => json!(truncate(s, MAX_TITLE_CHARS)),
        PayloadValue::StrArray(items) => json!(items.iter().take(MAX_ARRAY_ITEMS).cloned().collect::<Vec<_>>()),
        other => other.to_json(),
    }
}

fn build_filter(filters: &HashMap<String, Vec<String>>) -> serde_json::Value {
    if filters.is_empty() {
        return serde_json::Value::Null;
    }
    let must: Vec<serde_json::Value> = filters
        .iter()
        .map(|(key, values)| {
            if values.len() == 1 {
                json!({ "key": key, "match": { "value": values[0] } })
            } else {
                json!({ "key": key, "match": { "any": values } })
            }
        })
        .collect();
    json!({ "must": must })
}

fn parse_search_results(json: &serde_json::Value) -> Result<Vec<RankedResult>> {
    let results = json["result"]
        .as_array()
        .ok_or_else(|| EngineError::VectorStore("malformed search response".into()))?;

    let mut out = Vec::with_capacity(results.len());
    for point in results {
        let score = point["score"].as_f64().unwrap_or(0.0);
        let payload = &point["payload"];
        let fragment = fragment_from_payload(payload)?;
        out.push(RankedResult { fragment, score, explanation: String::new() });
    }
    Ok(out)
}

fn fragment_from_payload(payload: &serde_json::Value) -> Result<Fragment> {
    use crate::models::FragmentKind;

    let kind_str = payload["kind"].as_str().unwrap_or("Other");
    let kind = match kind_str {
        "Heading" => FragmentKind::Heading,
        "Code" => FragmentKind::Code,
        "Paragraph" => FragmentKind::Paragraph,
        "List" => FragmentKind::List,
        "Table" => FragmentKind::Table,
        "Blockquote" => FragmentKind::Blockquote,
        "StructuredNode" => FragmentKind::StructuredNode,
        _ => FragmentKind::Other,
    };

    let mut metadata = HashMap::new();
    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            if matches!(
                key.as_str(),
                "fragment_id" | "document_id" | "repository" | "filepath" | "kind" | "content" | "content_hash"
                    | "start_line" | "end_line" | "parent_id" | "child_ids"
            ) {
                continue;
            }
            if let Some(s) = value.as_str() {
                metadata.insert(key.clone(), PayloadValue::Str(s.to_string()));
            }
        }
    }

    Ok(Fragment {
        id: payload["fragment_id"].as_str().unwrap_or_default().to_string(),
        document_id: payload["document_id"].as_str().unwrap_or_default().to_string(),
        repository: payload["repository"].as_str().unwrap_or_default().to_string(),
        path: payload["filepath"].as_str().unwrap_or_default().to_string(),
        kind,
        content: payload["content"].as_str().unwrap_or_default().to_string(),
        start_line: payload["start_line"].as_u64().map(|v| v as usize),
        end_line: payload["end_line"].as_u64().map(|v| v as usize),
        parent_id: payload["parent_id"].as_str().map(str::to_string),
        child_ids: payload["child_ids"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        metadata,
        content_hash: payload["content_hash"].as_str().unwrap_or_default().to_string(),
        embedding: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic() {
        let a = VectorStoreCoordinator::point_id("doc1_0001");
        let b = VectorStoreCoordinator::point_id("doc1_0001");
        assert_eq!(a, b);
    }

    #[test]
    fn different_fragments_get_different_ids() {
        let a = VectorStoreCoordinator::point_id("doc1_0001");
        let b = VectorStoreCoordinator::point_id("doc1_0002");
        assert_ne!(a, b);
    }

    #[test]
    fn estimate_divides_by_ten() {
        assert_eq!(VectorStoreCoordinator::estimated_document_count(57), 5);
    }

    #[test]
    fn single_value_filter_uses_match_value() {
        let mut filters = HashMap::new();
        filters.insert("repository".to_string(), vec!["docs".to_string()]);
        let filter = build_filter(&filters);
        assert_eq!(filter["must"][0]["match"]["value"], json!("docs"));
    }

    #[test]
    fn empty_filters_produce_null() {
        assert!(build_filter(&HashMap::new()).is_null());
    }

    #[test]
    fn abort_triggers_on_majority_failure() {
        assert!(should_abort(3, 5));
        assert!(!should_abort(2, 5));
    }

    #[test]
    fn abort_triggers_on_two_absolute_failures_even_with_few_batches() {
        assert!(should_abort(2, 10));
        assert!(!should_abort(1, 10));
    }
}

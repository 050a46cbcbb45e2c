//! Context Generator.
//!
//! Turns a user task into one or more retrieval calls against the vector
//! store, blends semantic and keyword signals, ranks the merged set, and
//! shapes it into a progressive (overview/details/related) view. Score
//! normalization and hybrid merge-by-id are adapted from the keyword/vector
//! blending in the search module this replaces, generalized from a single
//! alpha blend into the weighted ranking described below.

use std::collections::HashMap;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::{FragmentKind, OverviewItem, Priority, ProgressiveContext, RankedResult};
use crate::vector_store::{SearchOptions, VectorStoreCoordinator};

const CODE_TOKEN_HINTS: &[&str] = &["(", ")", "::", "->", "=>", "import ", "def ", "class ", "fn ", "/api/", "."];
const CONCEPTUAL_HINTS: &[&str] =
    &["how to", "how do", "what is", "explain", "pattern", "architecture", "best practice", "why "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Keyword,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, Default)]
pub struct ContextQuery {
    pub task: String,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub context_text: Option<String>,
    pub repositories: Vec<String>,
    pub categories: Vec<String>,
    pub limit: Option<usize>,
}

const DEFAULT_LIMIT: usize = 20;
const DEFAULT_EXPANSION_THRESHOLD: f64 = 0.7;

/// Chooses a retrieval strategy from the shape of the task text.
pub fn select_strategy(task: &str) -> Strategy {
    let lower = task.to_lowercase();
    if CODE_TOKEN_HINTS.iter().any(|hint| lower.contains(hint)) {
        Strategy::Keyword
    } else if CONCEPTUAL_HINTS.iter().any(|hint| lower.contains(hint)) {
        Strategy::Semantic
    } else {
        Strategy::Hybrid
    }
}

pub struct ContextGenerator<'a> {
    store: &'a VectorStoreCoordinator,
    embedder: &'a dyn EmbeddingProvider,
    expansion_threshold: f64,
}

impl<'a> ContextGenerator<'a> {
    pub fn new(store: &'a VectorStoreCoordinator, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self { store, embedder, expansion_threshold: DEFAULT_EXPANSION_THRESHOLD }
    }

    pub fn with_expansion_threshold(mut self, threshold: f64) -> Self {
        self.expansion_threshold = threshold;
        self
    }

    pub async fn generate(&self, query: &ContextQuery) -> Result<ProgressiveContext> {
        let strategy = select_strategy(&query.task);
        let cap = query.limit.unwrap_or(DEFAULT_LIMIT);

        let results = match strategy {
            Strategy::Semantic => self.run_semantic(query, cap).await?,
            Strategy::Keyword => self.run_keyword(query, cap).await?,
            Strategy::Hybrid => self.run_hybrid(query, cap).await?,
        };

        let ranked = self.post_process(results, cap);
        Ok(self.build_progressive_view(ranked))
    }

    fn composite_query(&self, query: &ContextQuery) -> String {
        let mut parts = vec![query.task.clone()];
        if let Some(language) = &query.language {
            parts.push(language.clone());
        }
        if let Some(framework) = &query.framework {
            parts.push(framework.clone());
        }
        if let Some(context) = &query.context_text {
            parts.push(context.clone());
        }
        parts.join(" ")
    }

    fn metadata_filter(&self, query: &ContextQuery) -> HashMap<String, Vec<String>> {
        let mut filters = HashMap::new();
        if !query.repositories.is_empty() {
            filters.insert("repository".to_string(), query.repositories.clone());
        }
        if !query.categories.is_empty() {
            filters.insert("category".to_string(), query.categories.clone());
        }
        if let Some(language) = &query.language {
            filters.insert("language".to_string(), vec![language.clone()]);
        }
        if let Some(framework) = &query.framework {
            filters.insert("framework".to_string(), vec![framework.clone()]);
        }
        filters
    }

    async fn run_semantic(&self, query: &ContextQuery, cap: usize) -> Result<Vec<RankedResult>> {
        let composite = self.composite_query(query);
        let vectors = self.embedder.embed(&[composite]).await?;
        let vector = vectors.into_iter().next().unwrap_or_default();

        let options = SearchOptions {
            limit: cap * 2,
            score_threshold: 0.5,
            filters: self.metadata_filter(query),
        };
        self.store.search(&vector, &options).await
    }

    /// Keyword retrieval has no implementation here; an empty result set is
    /// a valid outcome and lets hybrid mode fall back to semantic alone.
    async fn run_keyword(&self, _query: &ContextQuery, _cap: usize) -> Result<Vec<RankedResult>> {
        Ok(Vec::new())
    }

    async fn run_hybrid(&self, query: &ContextQuery, cap: usize) -> Result<Vec<RankedResult>> {
        let semantic = self.run_semantic(query, cap).await;
        let keyword = self.run_keyword(query, cap).await;

        let (semantic, keyword) = match (semantic, keyword) {
            (Ok(s), Ok(k)) => (s, k),
            (Ok(s), Err(_)) => (s, Vec::new()),
            (Err(_), Ok(k)) => (Vec::new(), k),
            (Err(e), Err(_)) => return Err(e),
        };

        let mut merged: HashMap<String, RankedResult> = HashMap::new();
        let mut semantic_scores: HashMap<String, f64> = HashMap::new();

        for result in semantic {
            semantic_scores.insert(result.fragment.id.clone(), result.score);
            merged.insert(result.fragment.id.clone(), result);
        }
        for result in keyword {
            match semantic_scores.get(&result.fragment.id) {
                Some(semantic_score) => {
                    if let Some(existing) = merged.get_mut(&result.fragment.id) {
                        existing.score = (semantic_score + result.score) / 2.0;
                    }
                }
                None => {
                    merged.insert(result.fragment.id.clone(), result);
                }
            }
        }

        Ok(merged.into_values().collect())
    }

    fn post_process(&self, mut results: Vec<RankedResult>, cap: usize) -> Vec<RankedResult> {
        for result in &mut results {
            let priority = priority_from_metadata(&result.fragment);
            result.score *= priority.weight();
            result.explanation = explain(result, priority);
        }

        let now_nanos = most_recent_nanos(&results);

        results.sort_by(|a, b| {
            let score_a = weighted_rank(a, now_nanos);
            let score_b = weighted_rank(b, now_nanos);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });

        results.truncate(cap);
        results
    }

    fn build_progressive_view(&self, ranked: Vec<RankedResult>) -> ProgressiveContext {
        let confidence = aggregate_confidence(&ranked);

        let mut by_document: HashMap<String, Vec<&RankedResult>> = HashMap::new();
        for result in &ranked {
            by_document.entry(result.fragment.document_id.clone()).or_default().push(result);
        }

        let mut overview = Vec::new();
        let mut details: HashMap<String, Vec<String>> = HashMap::new();
        let mut related: HashMap<String, Vec<String>> = HashMap::new();

        let low = self.expansion_threshold * 0.7;

        for (document_id, fragments) in &by_document {
            let heading = top_scoring(fragments, FragmentKind::Heading, self.expansion_threshold);
            let paragraph = top_scoring(fragments, FragmentKind::Paragraph, self.expansion_threshold)
                .map(|r| summarize_paragraph(&r.fragment.content));
            let code = top_scoring(fragments, FragmentKind::Code, self.expansion_threshold)
                .map(|r| summarize_code(&r.fragment.content));

            overview.push(OverviewItem {
                document_id: document_id.clone(),
                heading: heading.and_then(|r| r.fragment.heading_path().map(str::to_string)),
                paragraph_summary: paragraph,
                code_preview: code,
            });

            let mut detail_ids: Vec<&&RankedResult> =
                fragments.iter().filter(|r| r.score >= self.expansion_threshold).collect();
            detail_ids.sort_by(|a, b| parent_before_child(a, b));
            details.insert(
                document_id.clone(),
                detail_ids.into_iter().map(|r| r.fragment.id.clone()).collect(),
            );
        }

        let mut related_groups: HashMap<String, Vec<(f64, String)>> = HashMap::new();
        for result in &ranked {
            if result.score >= low && result.score < self.expansion_threshold {
                let group = related_group_key(result);
                related_groups.entry(group).or_default().push((result.score, result.fragment.id.clone()));
            }
        }
        for (group, mut items) in related_groups {
            items.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            items.truncate(3);
            related.insert(group, items.into_iter().map(|(_, id)| id).collect());
        }

        ProgressiveContext { overview, details, related, confidence }
    }
}

fn priority_from_metadata(fragment: &crate::models::Fragment) -> Priority {
    match fragment.metadata.get("priority") {
        Some(crate::models::PayloadValue::Str(s)) => match s.as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        },
        _ => Priority::Medium,
    }
}

fn explain(result: &RankedResult, priority: Priority) -> String {
    let band = if result.score >= 0.8 {
        "strong match"
    } else if result.score >= 0.5 {
        "moderate match"
    } else {
        "weak match"
    };

    let mut matches = Vec::new();
    if result.fragment.metadata.contains_key("framework") {
        matches.push("framework");
    }
    if result.fragment.metadata.contains_key("language") {
        matches.push("language");
    }
    matches.push(match priority {
        Priority::High => "high-priority repository",
        Priority::Medium => "medium-priority repository",
        Priority::Low => "low-priority repository",
    });

    format!("{} ({})", band, matches.join(", "))
}

fn most_recent_nanos(results: &[RankedResult]) -> i64 {
    results
        .iter()
        .filter_map(|r| match r.fragment.metadata.get("last_modified_nanos") {
            Some(crate::models::PayloadValue::Str(s)) => s.parse::<i64>().ok(),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

fn recency_score(result: &RankedResult, newest_nanos: i64) -> f64 {
    if newest_nanos <= 0 {
        return 0.0;
    }
    match result.fragment.metadata.get("last_modified_nanos") {
        Some(crate::models::PayloadValue::Str(s)) => s.parse::<i64>().map(|n| n as f64 / newest_nanos as f64).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn weighted_rank(result: &RankedResult, newest_nanos: i64) -> f64 {
    result.score * 0.6 + recency_score(result, newest_nanos) * 0.2 + result.fragment.kind.affinity() * 0.2
}

fn aggregate_confidence(results: &[RankedResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let mean = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
    let mut confidence = mean * 0.5;
    if results.iter().any(|r| r.score > 0.8) {
        confidence += 0.3;
    }
    let distinct_repos = results.iter().map(|r| r.fragment.repository.as_str()).collect::<std::collections::HashSet<_>>().len();
    if distinct_repos > 1 {
        confidence += 0.2;
    }
    confidence.min(1.0)
}

fn top_scoring<'a>(fragments: &[&'a RankedResult], kind: FragmentKind, threshold: f64) -> Option<&'a RankedResult> {
    fragments
        .iter()
        .filter(|r| r.fragment.kind == kind && r.score > threshold)
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        .copied()
}

fn summarize_paragraph(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= 3 {
        content.to_string()
    } else {
        format!("{}...", lines[..3].join("\n"))
    }
}

fn summarize_code(content: &str) -> String {
    let signatures: Vec<&str> = content
        .lines()
        .filter(|l| {
            let trimmed = l.trim_start();
            trimmed.starts_with("fn ")
                || trimmed.starts_with("pub fn ")
                || trimmed.starts_with("def ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("function ")
        })
        .take(3)
        .collect();

    if !signatures.is_empty() {
        signatures.join("\n")
    } else {
        content.lines().take(5).collect::<Vec<_>>().join("\n")
    }
}

fn parent_before_child(a: &&RankedResult, b: &&RankedResult) -> std::cmp::Ordering {
    if a.fragment.parent_id.as_deref() == Some(b.fragment.id.as_str()) {
        return std::cmp::Ordering::Greater;
    }
    if b.fragment.parent_id.as_deref() == Some(a.fragment.id.as_str()) {
        return std::cmp::Ordering::Less;
    }
    a.fragment.start_line.cmp(&b.fragment.start_line)
}

fn related_group_key(result: &RankedResult) -> String {
    match result.fragment.metadata.get("category") {
        Some(crate::models::PayloadValue::Str(s)) => s.clone(),
        _ => match result.fragment.metadata.get("framework") {
            Some(crate::models::PayloadValue::Str(s)) => s.clone(),
            _ => "general".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_like_task_selects_keyword() {
        assert_eq!(select_strategy("fix the foo.bar() call"), Strategy::Keyword);
    }

    #[test]
    fn conceptual_task_selects_semantic() {
        assert_eq!(select_strategy("how to structure a retry loop"), Strategy::Semantic);
    }

    #[test]
    fn plain_task_selects_hybrid() {
        assert_eq!(select_strategy("improve onboarding docs"), Strategy::Hybrid);
    }

    fn sample_fragment(id: &str, kind: FragmentKind, repository: &str) -> crate::models::Fragment {
        crate::models::Fragment {
            id: id.to_string(),
            document_id: format!("{}-doc", id),
            repository: repository.to_string(),
            path: format!("{}.md", id),
            kind,
            content: "line one\nline two".to_string(),
            start_line: Some(1),
            end_line: Some(2),
            parent_id: None,
            child_ids: Vec::new(),
            metadata: HashMap::new(),
            content_hash: "hash".to_string(),
            embedding: None,
        }
    }

    #[test]
    fn confidence_rewards_high_scores_and_repo_diversity() {
        let results = vec![
            RankedResult { fragment: sample_fragment("a", FragmentKind::Code, "repo-a"), score: 0.9, explanation: String::new() },
            RankedResult { fragment: sample_fragment("b", FragmentKind::Paragraph, "repo-b"), score: 0.6, explanation: String::new() },
        ];
        let confidence = aggregate_confidence(&results);
        assert!(confidence > 0.5);
    }

    #[test]
    fn empty_results_have_zero_confidence() {
        assert_eq!(aggregate_confidence(&[]), 0.0);
    }

    #[test]
    fn paragraph_summary_truncates_after_three_lines() {
        let content = "a\nb\nc\nd\ne";
        let summary = summarize_paragraph(content);
        assert!(summary.ends_with("..."));
        assert!(summary.starts_with("a\nb\nc"));
    }

    #[test]
    fn short_paragraph_is_untouched() {
        assert_eq!(summarize_paragraph("a\nb"), "a\nb");
    }
}

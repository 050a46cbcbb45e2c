//! End-to-end tests against the library surface directly (no external git
//! server or vector store — those are exercised by the relevant unit tests
//! behind trait boundaries).

use ctx_engine::chunk::{chunk_document, content_hash};
use ctx_engine::config::load_config;
use ctx_engine::models::FragmentKind;
use ctx_engine::path_security::{confine, repository_dir, sanitize_name};

use std::io::Write;

#[test]
fn markdown_heading_path_nests_across_levels() {
    let content = "# Intro\n\nText.\n\n## Details\n\nMore text.\n";
    let fragments = chunk_document("a.md", "a.md", content);

    let headings: Vec<_> = fragments.iter().filter(|f| f.kind == FragmentKind::Heading).collect();
    assert_eq!(headings.len(), 2);

    let paragraphs: Vec<_> = fragments.iter().filter(|f| f.kind == FragmentKind::Paragraph).collect();
    assert_eq!(paragraphs.len(), 2);
    assert_eq!(paragraphs[0].heading_path(), Some("Intro"));
    assert_eq!(paragraphs[1].heading_path(), Some("Intro > Details"));

    for paragraph in &paragraphs {
        let nearest_heading = fragments.iter().find(|h| h.id == paragraph.parent_id.clone().unwrap()).unwrap();
        assert_eq!(nearest_heading.kind, FragmentKind::Heading);
    }
}

#[test]
fn oversize_plain_text_without_spaces_overlaps_consecutive_windows() {
    let content = "x".repeat(5000);
    let fragments = chunk_document("doc", "notes.txt", &content);

    assert!(fragments.len() > 1);
    for pair in fragments.windows(2) {
        let tail = &pair[0].content[pair[0].content.len().saturating_sub(50)..];
        assert!(pair[1].content.starts_with(tail) || pair[1].content.len() < 50);
    }
}

#[test]
fn chunking_the_same_content_twice_is_deterministic() {
    let content = "# Title\n\nBody text here.\n";
    let first = chunk_document("doc-1", "a.md", content);
    let second = chunk_document("doc-1", "a.md", content);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.start_line, b.start_line);
        assert_eq!(a.end_line, b.end_line);
        assert_eq!(a.content_hash, b.content_hash);
    }
}

#[test]
fn rehashing_identical_content_yields_the_same_hash() {
    let content = "stable content for hashing";
    assert_eq!(content_hash(content), content_hash(content));
}

#[test]
fn every_fragment_parent_appears_earlier_in_the_list() {
    let content = "# A\n\nPara under A.\n\n## B\n\nPara under B.\n";
    let fragments = chunk_document("doc", "a.md", content);

    let position_of = |id: &str| fragments.iter().position(|f| f.id == id).unwrap();
    for (i, fragment) in fragments.iter().enumerate() {
        if let Some(parent_id) = &fragment.parent_id {
            assert!(position_of(parent_id) < i, "parent must precede its child in fragment order");
        }
    }
}

#[test]
fn a_repository_working_directory_stays_confined_under_its_root() {
    let root = std::env::temp_dir().join("ctxeng_integration_repos_root");
    let dir = repository_dir(&root, "docs-repo").unwrap();
    assert!(dir.starts_with(&root));

    let escape_attempt = root.join("..").join("elsewhere");
    assert!(confine(&root, &escape_attempt).is_err());
}

#[test]
fn repository_names_sanitize_to_filesystem_safe_strings() {
    assert_eq!(sanitize_name("docs/weird name!"), "docs_weird_name_");
}

#[test]
fn a_malformed_structured_document_falls_back_to_plain_text_without_panicking() {
    let fragments = chunk_document("doc", "broken.json", "{not valid json at all");
    assert!(!fragments.is_empty());
}

#[test]
fn config_rejects_a_vector_store_missing_its_qdrant_section() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "project": {{ "name": "demo" }},
            "repositories": [{{ "name": "docs", "url": "https://example.com/docs.git" }}],
            "vectorStore": {{ "type": "qdrant" }}
        }}"#
    )
    .unwrap();

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("qdrant"));
}

#[test]
fn config_accepts_a_full_repository_and_vector_store_shape() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "project": {{ "name": "demo", "version": "1.0" }},
            "repositories": [
                {{ "name": "docs", "url": "https://example.com/docs.git", "authType": "token", "credentials": "tok", "priority": "high", "syncInterval": 30 }}
            ],
            "contextGeneration": {{ "maxChunks": 10, "expansionThreshold": 0.8 }},
            "vectorStore": {{ "type": "qdrant", "qdrant": {{ "url": "http://localhost:6333", "collectionName": "docs" }} }}
        }}"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.repositories[0].sync_interval, 30);
    assert_eq!(config.context_generation.max_chunks, 10);
    assert!((config.context_generation.expansion_threshold - 0.8).abs() < 1e-9);
    assert_eq!(config.vector_store.qdrant.unwrap().collection_name, "docs");
}

use tempfile::Builder;

use blockdex::corpus::read_jsonl;
use blockdex::prelude::*;
use blockdex::storage::IndexDirectory;

const CORPUS: &str = r#"{"url": "http://example.com/nyc", "title": "New York", "tokens": ["the", "new", "york", "city", "guide"]}
{"url": "http://example.com/jersey", "title": "New Jersey", "tokens": ["the", "new", "jersey", "shore"]}
this line is not a document
{"url": "http://example.com/nyc", "title": "Duplicate", "tokens": ["ignored"]}
{"url": "http://example.com/york", "title": "York", "tokens": ["the", "old", "york", "minster", "york"]}
{"url": "http://example.com/empty", "tokens": []}
"#;

#[test]
fn test_jsonl_corpus_to_queries() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = Builder::new().prefix("test_pipeline").tempdir().unwrap();
    let index_dir = dir.path().join("index");

    // 1. Inputs on disk
    let corpus_path = dir.path().join("corpus.jsonl");
    std::fs::write(&corpus_path, CORPUS).unwrap();

    let ranks_path = dir.path().join("pagerank.json");
    std::fs::write(&ranks_path, r#"{"1": 0.4, "2": 0.3, "4": 0.2, "5": 0.1}"#).unwrap();

    let config_path = dir.path().join("config.json");
    let config_json = serde_json::json!({
        "index_dir": index_dir,
        "docs_per_shard": 3,
        "worker_threads": 2,
        "block_bytes_threshold": 4
    });
    std::fs::write(&config_path, config_json.to_string()).unwrap();

    // 2. Load everything
    let config = IndexConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.token_cache_capacity, 10);

    let load = read_jsonl(&corpus_path).unwrap();
    assert_eq!(load.documents.len(), 5);
    assert_eq!(load.skipped, 1);

    let page_ranks = PageRankTable::from_json_file(&ranks_path).unwrap();

    // 3. Build
    let summary = IndexBuilder::new(config.clone())
        .unwrap()
        .build_from_raw(load.documents, &page_ranks)
        .unwrap();
    assert_eq!(summary.documents_indexed, 4);
    assert_eq!(summary.partial_files, 2);
    assert_eq!(summary.total_term_frequency, 14);

    // 4. Query
    let mut reader = QueryIndexReader::open(&config).unwrap();
    assert_eq!(reader.num_docs(), 4);
    assert_eq!(reader.total_term_frequency(), 14);
    assert_eq!(
        reader
            .document_term_frequency_by_url("york", "http://example.com/york")
            .unwrap(),
        2
    );

    let doc = reader
        .next_document_satisfying(&Query::parse("\"new york\" city"), 0)
        .unwrap()
        .unwrap();
    assert_eq!(doc.title, "New York");
    assert_eq!(doc.page_rank, 0.4);

    let filtered = reader
        .filter_stop_terms(&Query::parse("the york"), 0.5)
        .unwrap();
    assert_eq!(filtered.terms(), &["york"]);

    // 5. Side artifacts
    let directory = IndexDirectory::open(&index_dir).unwrap();
    let dictionary = std::fs::read_to_string(directory.dictionary_path()).unwrap();
    assert!(dictionary.lines().any(|line| line == "minster"));

    let lookup_n = std::fs::read_to_string(directory.lookup_dir().join("lookup_n_.json")).unwrap();
    let completions: Vec<String> = serde_json::from_str(&lookup_n).unwrap();
    assert_eq!(completions, vec!["new"]);
}

#[test]
fn test_missing_page_rank_aborts_before_writing() {
    let dir = Builder::new().prefix("test_missing_rank").tempdir().unwrap();
    let config = IndexConfig::new(dir.path().join("index"));

    let load = {
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, CORPUS).unwrap();
        read_jsonl(&path).unwrap()
    };
    let page_ranks: PageRankTable = [(1u64, 0.5)].into_iter().collect();

    let builder = IndexBuilder::new(config).unwrap();
    let err = builder.build_from_raw(load.documents, &page_ranks).unwrap_err();
    assert!(matches!(err, BlockdexError::Config(_)));

    let directory = builder.directory();
    assert!(directory.list_files(&directory.blocks_dir()).unwrap().is_empty());
    assert!(!directory.document_map_path().exists());
}

mod common;

use common::{essay_corpus, EchoModel, FailingModel, KeywordEmbedder};
use essayrag_core::types::{ChatMessage, RankedResult};
use essayrag_core::traits::LanguageModel;
use essayrag_core::{build_chunker, Chunk, ChunkStrategy, Error, TokenCounter};
use essayrag_vector::PersistedIndex;
use essayrag_embed::FakeEmbedder;
use essayrag_retrieve::{
    build_prompt, combine_chunks, sources, ChatModelConfig, ChunkHit, ContextAssembler, OpenAiChatModel, Persona,
    RetrievalSession, Summarizer, CHUNK_SEPARATOR, TRUNCATION_MARKER, stage_corpus,
};
use tempfile::TempDir;

fn hit(title: &str, id: &str, index: usize, text: &str) -> RankedResult<ChunkHit> {
    RankedResult::new(
        index + 1,
        index as f32,
        ChunkHit {
            title: title.into(),
            source_link: format!("https://paulgraham.com/{id}.html"),
            chunk: Chunk { parent_id: id.into(), index, token_count: 3, text: text.into() },
        },
    )
}

#[test]
fn combined_text_cites_every_chunk() {
    let chunks = vec![hit("Wealth", "wealth", 0, "Make money."), hit("Wealth", "wealth", 2, "Create value.")];
    let combined = combine_chunks(&chunks);
    assert_eq!(
        combined,
        format!(
            "From \"Wealth\" (https://paulgraham.com/wealth.html, Chunk 1):\nMake money.{CHUNK_SEPARATOR}\
             From \"Wealth\" (https://paulgraham.com/wealth.html, Chunk 3):\nCreate value."
        )
    );
    assert_eq!(
        sources(&chunks),
        vec!["\"Wealth\" (https://paulgraham.com/wealth.html)", "\"Wealth\" (https://paulgraham.com/wealth.html)"],
        "repeated sources are not deduplicated"
    );
}

#[test]
fn summarizer_failure_degrades_to_bounded_truncation() {
    let summarizer = Summarizer::new(Some(Box::new(FailingModel)), "Paul Graham").with_limits(10, 0.3);
    let text = "x".repeat(1000);
    let out = summarizer.summarize(&text, "Summarize.");
    assert!(out.ends_with(TRUNCATION_MARKER));
    assert!(out.chars().count() <= 10 * 4 + TRUNCATION_MARKER.chars().count());
    assert!(out.starts_with(&"x".repeat(40)));
}

#[test]
fn offline_summarizer_truncates_without_calling_out() {
    let summarizer = Summarizer::new(None, "Paul Graham");
    assert!(summarizer.is_offline());
    assert_eq!(summarizer.summarize("short", "Summarize."), format!("short{TRUNCATION_MARKER}"));
}

#[test]
fn assembler_reports_tokens_of_the_rendered_block() {
    let counter = TokenCounter::cl100k().unwrap();
    let summarizer = Summarizer::new(Some(Box::new(EchoModel)), "Paul Graham");
    let chunks = vec![hit("Wealth", "wealth", 0, "Make money.")];
    let block = ContextAssembler::new(&summarizer, &counter).assemble(&chunks, "how to get rich");
    assert_eq!(block.summary_text, "SUMMARY(2 messages)");
    assert_eq!(block.sources, vec!["\"Wealth\" (https://paulgraham.com/wealth.html)"]);
    assert_eq!(block.token_count, counter.count(&block.render()));
}

#[test]
fn prompt_embeds_context_query_and_example_citation() {
    let session = RetrievalSession::builder(Box::new(KeywordEmbedder::essays()))
        .chunking(20, 5)
        .persona(Persona { name: "Paul Graham".into(), bio: "founder of Y Combinator and essayist".into() })
        .build()
        .unwrap();
    let outcome = session.build_prompt_for("How do startups grow?", &essay_corpus()).unwrap();

    let expected_source = "\"How Startups Grow\" (https://paulgraham.com/startups.html)";
    assert!(outcome.context.sources.iter().filter(|s| *s == expected_source).count() >= 2);
    assert!(outcome.context.summary_text.ends_with(TRUNCATION_MARKER), "no model configured");
    assert!(outcome.rendered_context.starts_with("Sources:\n    \"How Startups Grow\""));
    assert!(outcome.prompt.starts_with(&outcome.rendered_context));
    assert!(outcome.prompt.contains("\n\nQuery: How do startups grow?\n\n"));
    assert!(outcome.prompt.contains("You are Paul Graham, founder of Y Combinator and essayist."));
    assert!(outcome.prompt.contains("'which I talked about in \"How Startups Grow\"...'"));
    assert_eq!(outcome.context.token_count, session.token_counter().count(&outcome.rendered_context));
}

#[test]
fn build_prompt_uses_the_persona() {
    let counter = TokenCounter::cl100k().unwrap();
    let block = essayrag_core::ContextBlock::new(vec!["\"A\" (l)".into()], "S".into(), &counter);
    let persona = Persona { name: "Ada".into(), bio: "a mathematician".into() };
    let prompt = build_prompt(&block, "q?", "Notes", &persona);
    assert!(prompt.contains("You are Ada, a mathematician."));
    assert!(prompt.contains("Provide an authentically Ada response"));
}

#[test]
fn chat_model_reads_first_choice() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(mockito::Matcher::PartialJsonString(r#"{"model":"gpt-4o","max_tokens":400}"#.into()))
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  Work on hard problems. "}}]}"#)
        .create();
    let model = OpenAiChatModel::new(ChatModelConfig {
        api_key: Some("sk-test".into()),
        base_url: server.url(),
        ..Default::default()
    })
    .unwrap();

    let summarizer = Summarizer::new(Some(Box::new(model)), "Paul Graham");
    assert_eq!(summarizer.summarize("text", "Summarize."), "Work on hard problems.");
    mock.assert();
}

#[test]
fn chat_model_errors_are_contained_by_the_summarizer() {
    let mut server = mockito::Server::new();
    let _mock = server.mock("POST", "/chat/completions").with_status(503).with_body("overloaded").create();
    let model = OpenAiChatModel::new(ChatModelConfig {
        api_key: Some("sk-test".into()),
        base_url: server.url(),
        ..Default::default()
    })
    .unwrap();
    let err = model.complete(&[ChatMessage::user("hi")], 10, 0.0).unwrap_err();
    assert!(err.to_string().contains("503"));

    let summarizer = Summarizer::new(Some(Box::new(model)), "Paul Graham");
    assert!(summarizer.summarize("text", "Summarize.").ends_with(TRUNCATION_MARKER));
}

#[test]
fn staging_then_flat_search_round_trips() {
    let tmp = TempDir::new().unwrap();
    let corpus = essay_corpus();

    let mut session = RetrievalSession::builder(Box::new(KeywordEmbedder::essays())).batch_size(2).build().unwrap();
    assert!(matches!(session.search_flat("startups", 3), Err(Error::IndexNotBuilt(_))));

    let report = session.stage(&corpus, tmp.path()).unwrap();
    assert_eq!(report.documents, 3);
    assert_eq!(report.embedded, report.chunks);
    assert_eq!(report.skipped_batches, 0);

    let hits = session.search_flat("painters paint", 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].item.title, "Hackers and Painters");
    assert_eq!(hits[0].item.filename, "painting.txt");
    assert_eq!(hits[0].item.id, "painting_chunk_0");

    let mut reloaded = RetrievalSession::builder(Box::new(KeywordEmbedder::essays())).build().unwrap();
    reloaded.load_index(tmp.path()).unwrap();
    let again = reloaded.search_flat("painters paint", 2).unwrap();
    assert_eq!(again[0].item.id, hits[0].item.id);
    assert!((again[0].distance - hits[0].distance).abs() < 1e-6);

    let mut foreign = RetrievalSession::builder(Box::new(FakeEmbedder::new(4))).build().unwrap();
    assert!(matches!(foreign.load_index(tmp.path()), Err(Error::Store(_))));
}

#[test]
fn staging_with_a_dead_provider_fails_as_empty() {
    let tmp = TempDir::new().unwrap();
    let mut session = RetrievalSession::builder(Box::new(common::FailingEmbedder)).build().unwrap();
    assert!(matches!(session.stage(&essay_corpus(), tmp.path()), Err(Error::EmptyCorpus(_))));
    assert!(session.index().is_none());
}

#[test]
fn failed_restage_keeps_the_previous_index() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("index");
    let corpus = essay_corpus();

    let mut session = RetrievalSession::builder(Box::new(KeywordEmbedder::essays())).batch_size(2).build().unwrap();
    let first = session.stage(&corpus, &dir).unwrap();
    let before = session.search_flat("painters paint", 1).unwrap();

    let counter = std::sync::Arc::new(TokenCounter::cl100k().unwrap());
    let chunker = build_chunker(ChunkStrategy::Paragraph { max_chars: 4000 }, counter).unwrap();
    let err = stage_corpus(&corpus, chunker.as_ref(), &common::FailingEmbedder, &dir, 2).err().unwrap();
    assert!(matches!(err, Error::EmptyCorpus(_)));

    let on_disk = PersistedIndex::load(&dir, "keyword:d4").unwrap();
    assert_eq!(on_disk.len(), first.embedded);
    let after = session.search_flat("painters paint", 1).unwrap();
    assert_eq!(after[0].item.id, before[0].item.id);

    let again = session.stage(&corpus, &dir).unwrap();
    assert_eq!(again.embedded, first.embedded);
    assert_eq!(session.search_flat("painters paint", 1).unwrap()[0].item.id, before[0].item.id);
    let names: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(names, vec![std::ffi::OsString::from("index")]);
}

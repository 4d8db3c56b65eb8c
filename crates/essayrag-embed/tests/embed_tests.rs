use std::sync::atomic::{AtomicUsize, Ordering};

use essayrag_core::config::{EmbeddingBackend, EmbeddingSettings};
use essayrag_core::traits::Embedder;
use essayrag_embed::{build_embedder, ApiEmbedder, ApiEmbedderConfig, CachedEmbedder, FakeEmbedder};

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Fake, cache: false, ..Default::default() };
    let embedder = build_embedder(&settings).expect("embedder");
    assert_eq!(embedder.embedder_id(), "fake:xxhash:d1024");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);
    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn fake_embedder_places_shared_words_closer() {
    let e = FakeEmbedder::new(256);
    let q = e.embed_text("startup founders");
    let near = e.embed_text("advice for startup founders");
    let far = e.embed_text("gardening tomatoes in summer");
    assert!(dot(&q, &near) > dot(&q, &far));
}

struct CountingEmbedder {
    calls: AtomicUsize,
    texts_seen: AtomicUsize,
    fail: bool,
}

impl CountingEmbedder {
    fn new(fail: bool) -> Self {
        Self { calls: AtomicUsize::new(0), texts_seen: AtomicUsize::new(0), fail }
    }
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str { "counting:d2" }
    fn dim(&self) -> usize { 2 }
    fn max_len(&self) -> usize { 64 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("provider down");
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

#[test]
fn cache_only_embeds_unseen_texts() {
    let cached = CachedEmbedder::new(CountingEmbedder::new(false));
    let first = cached.embed_batch(&["a".into(), "bbb".into()]).unwrap();
    assert_eq!(first, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);

    let second = cached.embed_batch(&["bbb".into(), "cc".into(), "a".into()]).unwrap();
    assert_eq!(second, vec![vec![3.0, 1.0], vec![2.0, 1.0], vec![1.0, 1.0]]);
    assert_eq!(cached.inner().texts_seen.load(Ordering::SeqCst), 3, "only `cc` was new");

    cached.embed_batch(&["a".into()]).unwrap();
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2, "fully cached batch skips the provider");
    assert_eq!(cached.cached_len(), 3);
    assert_eq!(cached.embedder_id(), "counting:d2");
}

#[test]
fn cache_does_not_remember_failures() {
    let cached = CachedEmbedder::new(CountingEmbedder::new(true));
    assert!(cached.embed_batch(&["x".into()]).is_err());
    assert!(cached.embed_batch(&["x".into()]).is_err());
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    assert_eq!(cached.cached_len(), 0);
}

fn api_config(server: &mockito::Server, dimension: usize, max_batch_size: usize) -> ApiEmbedderConfig {
    ApiEmbedderConfig {
        api_key: Some("sk-test".into()),
        base_url: server.url(),
        model: "text-embedding-3-small".into(),
        dimension,
        timeout_secs: 5,
        max_batch_size,
    }
}

#[test]
fn api_embedder_reorders_by_index() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/embeddings")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#)
        .create();

    let embedder = ApiEmbedder::new(api_config(&server, 2, 16)).unwrap();
    let out = embedder.embed_batch(&["first".into(), "second".into()]).unwrap();
    assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(embedder.embedder_id(), "api:text-embedding-3-small:d2");
    mock.assert();
}

#[test]
fn api_embedder_splits_large_inputs_into_batches() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_body(r#"{"data":[{"index":0,"embedding":[1.0]},{"index":1,"embedding":[2.0]}]}"#)
        .expect(2)
        .create();

    let embedder = ApiEmbedder::new(api_config(&server, 1, 2)).unwrap();
    let texts: Vec<String> = (0..4).map(|i| format!("t{i}")).collect();
    let out = embedder.embed_batch(&texts).unwrap();
    assert_eq!(out.len(), 4);
    mock.assert();
}

#[test]
fn api_embedder_surfaces_http_errors_and_bad_shapes() {
    let mut server = mockito::Server::new();
    let _err = server.mock("POST", "/embeddings").with_status(500).with_body("boom").create();
    let embedder = ApiEmbedder::new(api_config(&server, 2, 8)).unwrap();
    let err = embedder.embed_batch(&["x".into()]).unwrap_err();
    assert!(format!("{err:#}").contains("500"));

    let mut server = mockito::Server::new();
    let _short = server
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_body(r#"{"data":[{"index":0,"embedding":[1.0,2.0,3.0]}]}"#)
        .create();
    let embedder = ApiEmbedder::new(api_config(&server, 2, 8)).unwrap();
    let err = embedder.embed_batch(&["x".into()]).unwrap_err();
    assert!(err.to_string().contains("dimension"));
}

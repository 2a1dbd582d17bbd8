#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use raglens::{Config, EmbedderCache, IngestRequest, RagSession, ReductionMethod};

fn cache() -> Arc<EmbedderCache> {
    static CACHE: OnceLock<Arc<EmbedderCache>> = OnceLock::new();
    Arc::clone(CACHE.get_or_init(|| Arc::new(EmbedderCache::default())))
}

fuzz_target!(|input: (&str, &str, u8, u8)| {
    let (text, query, chunk_size, overlap) = input;
    let mut session = RagSession::new(Config::default(), cache()).unwrap();

    let request = IngestRequest::new(text)
        .chunk_size(chunk_size as usize)
        .overlap(overlap as usize)
        .collection("fuzz");
    if session.ingest(request).is_err() {
        assert!(!session.is_indexed());
        return;
    }

    let n = session.chunks().len();
    if let Ok(result) = session.query(query, 3) {
        assert_eq!(result.len(), n.min(3));
    }

    let vis = session.visualize(ReductionMethod::Linear, true).unwrap();
    assert_eq!(vis.points.len(), n);
    assert!(vis.points.iter().all(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite()));
});

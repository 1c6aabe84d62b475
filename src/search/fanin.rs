use crate::search::vector::VectorHit;

/// Top-k results from one document's store.
pub struct StoreResults {
    pub document_id: u64,
    pub hits: Vec<VectorHit>,
}

/// Union per-document results into one list.
///
/// 1. Concatenate every store's hits (each already holds at most `k`).
/// 2. Stable-sort by cosine score, highest first. Scores come from the same
///    embedding model, so they are comparable across stores. Ties keep
///    the order the documents were requested in.
/// 3. Truncate to `k * requested`, where `requested` counts every asked-for
///    document, including ones with no store on disk.
///
/// No score normalization and no deduplication across stores.
pub fn merge_store_results(
    results: Vec<StoreResults>,
    k: usize,
    requested: usize,
) -> Vec<VectorHit> {
    let mut merged: Vec<VectorHit> = results.into_iter().flat_map(|r| r.hits).collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(k.saturating_mul(requested));
    merged
}

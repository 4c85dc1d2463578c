//! Index repair - detect and heal store/index divergence.
//!
//! The knowledge store is the source of truth; both indexes are derived
//! state. A record present in the store but absent from either index is a
//! detectable inconsistency, healed by re-indexing from the store without
//! touching the stored fields.

use tracing::info;

use crate::error::Result;
use crate::traits::{index::SearchIndex, store::KnowledgeStore};

/// Ids present in the store but missing from at least one index.
pub async fn find_unindexed<K, Sem, Lex>(
    store: &K,
    semantic: &Sem,
    lexical: &Lex,
) -> Result<Vec<String>>
where
    K: KnowledgeStore,
    Sem: SearchIndex,
    Lex: SearchIndex,
{
    let mut missing = Vec::new();
    for record in store.all().await? {
        if !semantic.contains(&record.id).await? || !lexical.contains(&record.id).await? {
            missing.push(record.id);
        }
    }
    missing.sort();
    Ok(missing)
}

/// Re-index the given ids from the store.
///
/// Ids with no stored record are skipped (nothing to repair from). Returns
/// the number of records re-indexed.
pub async fn repair_pass<K, Sem, Lex>(
    store: &K,
    semantic: &Sem,
    lexical: &Lex,
    ids: &[String],
) -> Result<usize>
where
    K: KnowledgeStore,
    Sem: SearchIndex,
    Lex: SearchIndex,
{
    let mut repaired = 0;
    for id in ids {
        let Some(record) = store.get(id).await? else {
            continue;
        };
        let text = record.index_text();
        semantic.index(id, &text).await?;
        lexical.index(id, &text).await?;
        repaired += 1;
    }
    info!(repaired, requested = ids.len(), "repair pass complete");
    Ok(repaired)
}

/// Rebuild both indexes from the store alone.
///
/// Returns the number of records indexed.
pub async fn rebuild_indexes<K, Sem, Lex>(
    store: &K,
    semantic: &Sem,
    lexical: &Lex,
) -> Result<usize>
where
    K: KnowledgeStore,
    Sem: SearchIndex,
    Lex: SearchIndex,
{
    let records = store.all().await?;
    let count = records.len();
    for record in records {
        let text = record.index_text();
        semantic.index(&record.id, &text).await?;
        lexical.index(&record.id, &text).await?;
    }
    info!(records = count, "indexes rebuilt from store");
    Ok(count)
}

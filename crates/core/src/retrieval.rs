use std::collections::HashMap;
use tracing::debug;

use crate::models::{ChunkHit, ChunkKey};

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub source_id: String,
    pub chunk_ids: Vec<String>,
    pub texts: Vec<String>,
}

impl CandidateGroup {
    pub fn aggregated_text(&self) -> String {
        self.texts.join("\n")
    }
}

// Group order follows the first hit seen for each source; the
// reranker relies on that as its tie-break. Unparseable ids are
// skipped.
pub fn aggregate_hits(hits: &[ChunkHit]) -> Vec<CandidateGroup> {
    let mut groups: Vec<CandidateGroup> = Vec::new();
    let mut index_by_source: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        let Some(key) = ChunkKey::parse(&hit.chunk_id) else {
            debug!(chunk_id = %hit.chunk_id, "skipping hit with malformed chunk id");
            continue;
        };

        let index = match index_by_source.get(&key.source_id) {
            Some(&index) => index,
            None => {
                groups.push(CandidateGroup {
                    source_id: key.source_id.clone(),
                    chunk_ids: Vec::new(),
                    texts: Vec::new(),
                });
                index_by_source.insert(key.source_id, groups.len() - 1);
                groups.len() - 1
            }
        };

        groups[index].chunk_ids.push(hit.chunk_id.clone());
        groups[index].texts.push(hit.text.clone());
    }

    groups
}

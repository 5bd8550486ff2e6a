//! Acronym-based candidate pruning.
//!
//! When the document carries strong acronyms and at least one objective
//! shares one, only those objectives are scored. Otherwise the full catalog
//! is scored. A non-empty subset is never widened back to the full catalog.

use goalmap_ingest::Document;
use goalmap_store::CandidateFilter;
use tracing::debug;

use crate::catalog::{Objective, ObjectiveCatalog};

/// Candidates chosen for one document.
#[derive(Debug, Clone)]
pub struct PrunedCandidates<'a> {
    pub candidates: Vec<&'a Objective>,
    pub filter: CandidateFilter,
}

#[derive(Debug, Clone, Copy)]
pub struct CandidatePruner {
    strong_max_len: usize,
}

impl CandidatePruner {
    pub fn new(strong_max_len: usize) -> Self {
        Self { strong_max_len }
    }

    pub fn prune<'a>(&self, document: &Document, catalog: &'a ObjectiveCatalog) -> PrunedCandidates<'a> {
        let strong = document.strong_acronyms(self.strong_max_len);
        if !strong.is_empty() {
            let subset: Vec<&Objective> = catalog
                .objectives()
                .iter()
                .filter(|o| o.acronyms.iter().any(|a| strong.contains(a.as_str())))
                .collect();
            if !subset.is_empty() {
                debug!(
                    "Acronym filter for {}: {:?} -> {}/{} objectives",
                    document.source_id,
                    strong,
                    subset.len(),
                    catalog.len()
                );
                return PrunedCandidates {
                    candidates: subset,
                    filter: CandidateFilter::Acronym,
                };
            }
        }

        PrunedCandidates {
            candidates: catalog.objectives().iter().collect(),
            filter: CandidateFilter::None,
        }
    }
}

impl Default for CandidatePruner {
    fn default() -> Self {
        Self::new(8)
    }
}

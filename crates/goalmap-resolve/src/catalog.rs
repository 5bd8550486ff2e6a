//! Per-user objective catalog.
//!
//! Built once per user per run: objective texts, their acronym and keyword
//! sets, and (with the embedding strategy) one normalized vector each from a
//! single batch call. Read-only afterwards.

use std::collections::BTreeSet;

use goalmap_core::{Error, Result};
use goalmap_infer::Usage;
use goalmap_ingest::{extract_acronyms, extract_keywords};
use goalmap_store::ObjectiveRef;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::similarity::SimilarityProvider;

/// One objective row as supplied by an objective source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub child_item: String,
}

impl ObjectiveInput {
    pub fn new(title: &str, child_item: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            child_item: child_item.to_string(),
        }
    }

    /// `"{title} | {child_item}"`, or whichever half is present.
    pub fn display_text(&self) -> String {
        let title = self.title.trim();
        let child = self.child_item.trim();
        match (title.is_empty(), child.is_empty()) {
            (false, false) => format!("{} | {}", title, child),
            (false, true) => title.to_string(),
            (true, false) => child.to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Fill blank titles from the previous row (merged title cells) and drop
/// rows with neither a title nor a child item.
pub fn forward_fill(rows: Vec<ObjectiveInput>) -> Vec<ObjectiveInput> {
    let mut last_title = String::new();
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        if row.title.trim().is_empty() {
            if row.child_item.trim().is_empty() {
                continue;
            }
            row.title = last_title.clone();
        } else {
            last_title = row.title.trim().to_string();
        }
        out.push(row);
    }
    out
}

/// A loaded objective.
#[derive(Debug, Clone)]
pub struct Objective {
    pub id: String,
    pub index: usize,
    pub text: String,
    /// L2-normalized; `None` under the lexical strategy.
    pub embedding: Option<Array1<f32>>,
    pub acronyms: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
}

impl Objective {
    pub fn to_ref(&self) -> ObjectiveRef {
        ObjectiveRef {
            id: self.id.clone(),
            index: self.index,
            text: self.text.clone(),
        }
    }
}

/// Objectives for one user.
#[derive(Debug, Clone)]
pub struct ObjectiveCatalog {
    user: String,
    objectives: Vec<Objective>,
    usage: Usage,
}

impl ObjectiveCatalog {
    /// Build the catalog for `user`. Fails with `NoObjectives` when no usable row remains.
    pub fn build(
        user: &str,
        rows: Vec<ObjectiveInput>,
        similarity: &dyn SimilarityProvider,
    ) -> Result<Self> {
        let rows = forward_fill(rows);
        if rows.is_empty() {
            return Err(Error::NoObjectives(user.to_string()));
        }

        let mut objectives: Vec<Objective> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let text = row.display_text();
                Objective {
                    id: row
                        .id
                        .clone()
                        .filter(|id| !id.trim().is_empty())
                        .unwrap_or_else(|| format!("{}-okr-{}", user, index)),
                    index,
                    acronyms: extract_acronyms(&text),
                    keywords: extract_keywords(&text),
                    embedding: None,
                    text,
                }
            })
            .collect();

        let texts: Vec<&str> = objectives.iter().map(|o| o.text.as_str()).collect();
        let encoded = similarity.encode_objectives(&texts)?;
        if let Some(vectors) = encoded.vectors {
            if vectors.len() != objectives.len() {
                return Err(Error::Provider(format!(
                    "Expected {} objective embeddings, got {}",
                    objectives.len(),
                    vectors.len()
                )));
            }
            for (objective, vector) in objectives.iter_mut().zip(vectors) {
                objective.embedding = Some(vector);
            }
        }

        info!(
            "Objective catalog for {}: {} objectives ({} tokens, ${:.6})",
            user,
            objectives.len(),
            encoded.usage.tokens,
            encoded.usage.cost_usd
        );
        for o in &objectives {
            debug!("  [{}] {} acronyms={:?}", o.index, o.text, o.acronyms);
        }

        Ok(Self {
            user: user.to_string(),
            objectives,
            usage: encoded.usage,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn get(&self, index: usize) -> Option<&Objective> {
        self.objectives.get(index)
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    /// Tokens and cost of building the catalog.
    pub fn usage(&self) -> Usage {
        self.usage
    }
}

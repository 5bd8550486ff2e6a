//! Checkpointed batch runner.
//!
//! Per (user, task_type): not_started → in_progress → completed. Each
//! invocation resumes at the checkpoint's `current_row`, persists the
//! checkpoint after every document, and stops once the per-user cap of new
//! classifications is used up. Re-invoke until every task is completed.

use goalmap_core::{BatchConfig, Error, FeatureLimits, GoalMapConfig, Result};
use goalmap_infer::FallbackMethod;
use goalmap_ingest::Document;
use goalmap_resolve::{forward_fill, Decision, ObjectiveCatalog, ObjectiveInput};
use goalmap_store::{
    now_millis, CandidateFilter, Checkpoint, CheckpointStatus, MatchMethod, MatchOutcome,
    MatchResult,
};
use tracing::{debug, error, info, warn};

use crate::providers::{Providers, Sources, Stores};
use crate::types::*;

/// A user's objective rows and, once a document needs it, their catalog.
struct LazyCatalog {
    rows: Vec<ObjectiveInput>,
    built: Option<ObjectiveCatalog>,
}

/// Drives classification for a list of users.
pub struct BatchRunner {
    providers: Providers,
    stores: Stores,
    sources: Sources,
    limits: FeatureLimits,
    batch: BatchConfig,
}

impl BatchRunner {
    pub fn new(config: &GoalMapConfig, providers: Providers, stores: Stores, sources: Sources) -> Self {
        info!(
            "BatchRunner initialized: task_types={:?}, cap={}, force_recalculate={}, method={}",
            config.batch.task_types,
            config.batch.max_documents_per_user,
            config.batch.force_recalculate,
            providers.matcher.method().as_str()
        );
        Self {
            providers,
            stores,
            sources,
            limits: config.features.clone(),
            batch: config.batch.clone(),
        }
    }

    /// Process every user in order. Never fails: per-user and per-task
    /// errors are logged and reported.
    pub fn run(&self, users: &[String]) -> RunReport {
        let mut report = RunReport::default();
        for user in users {
            report.users.push(self.run_user(user));
        }

        info!(
            "Run complete: {} users, {} classified ({} objective, {} fallback, {} errors), {} skipped, {} tokens, ${:.6}",
            report.users.len(),
            report.classified(),
            report.objective_matches(),
            report.fallbacks(),
            report.errors(),
            report.skipped(),
            report.tokens(),
            report.cost_usd()
        );
        report
    }

    /// Process every task type for one user under a shared cap.
    ///
    /// A user without usable objectives is skipped before any checkpoint or
    /// result is touched. The catalog itself is built on first use.
    pub fn run_user(&self, user: &str) -> UserReport {
        let mut report = UserReport::new(user);
        let rows = match self.sources.objectives.objectives(user) {
            Ok(rows) => forward_fill(rows),
            Err(e) => {
                error!("Could not load objectives for {}: {}", user, e);
                report.skipped_reason = Some(format!("objectives unavailable: {}", e));
                return report;
            }
        };
        if rows.is_empty() {
            warn!("No objectives for user {}, skipping", user);
            report.skipped_reason = Some("no objectives".to_string());
            return report;
        }

        let mut catalog = LazyCatalog { rows, built: None };
        let mut remaining = self.batch.max_documents_per_user;

        for task_type in &self.batch.task_types {
            match self.run_task(user, task_type, &mut catalog, &mut remaining, &mut report) {
                Ok(task) => report.tasks.push(task),
                Err(Error::NoObjectives(_)) => {
                    warn!("No objectives for user {}, skipping", user);
                    report.skipped_reason = Some("no objectives".to_string());
                    break;
                }
                Err(e) => {
                    error!("Task {}/{} failed: {}", user, task_type, e);
                    let mut task = TaskReport::new(task_type, 0, 0, CheckpointStatus::NotStarted);
                    task.error = Some(e.to_string());
                    report.tasks.push(task);
                }
            }
        }

        if let Some(catalog) = &catalog.built {
            debug!("Dropping objective catalog for {} ({} objectives)", catalog.user(), catalog.len());
        }
        report
    }

    fn load_checkpoint(&self, user: &str, task_type: &str) -> Checkpoint {
        match self.stores.checkpoints.load_checkpoint(user, task_type) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => Checkpoint::new(user, task_type),
            Err(e) => {
                warn!("Unreadable checkpoint {}/{}, starting over: {}", user, task_type, e);
                Checkpoint::new(user, task_type)
            }
        }
    }

    fn save_checkpoint(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.updated_at = now_millis();
        self.stores.checkpoints.save_checkpoint(checkpoint)
    }

    fn run_task(
        &self,
        user: &str,
        task_type: &str,
        catalog: &mut LazyCatalog,
        remaining: &mut usize,
        user_report: &mut UserReport,
    ) -> Result<TaskReport> {
        let documents = self.sources.documents.list_documents(user, task_type)?;
        let total = documents.len();
        let mut checkpoint = self.load_checkpoint(user, task_type);
        let mut report = TaskReport::new(task_type, total, checkpoint.current_row, checkpoint.status);

        if checkpoint.is_completed() {
            debug!("{}/{} already completed", user, task_type);
            return Ok(report);
        }

        if checkpoint.current_row >= total {
            checkpoint.current_row = total;
            checkpoint.status = CheckpointStatus::Completed;
            self.save_checkpoint(&mut checkpoint)?;
            info!("{}/{}: nothing to process ({} documents), completed", user, task_type, total);
            report.end_row = total;
            report.status = CheckpointStatus::Completed;
            return Ok(report);
        }

        if *remaining == 0 {
            debug!("{}/{}: per-user cap already used", user, task_type);
            report.cap_reached = true;
            return Ok(report);
        }

        info!(
            "{}/{}: resuming at row {}/{}",
            user, task_type, checkpoint.current_row, total
        );
        checkpoint.status = CheckpointStatus::InProgress;

        while checkpoint.current_row < total {
            if *remaining == 0 {
                report.cap_reached = true;
                break;
            }
            let document_id = &documents[checkpoint.current_row];

            if !self.batch.force_recalculate && self.stores.results.has_result(user, document_id)? {
                debug!("{}: already classified, skipping", document_id);
                checkpoint.skipped_count += 1;
                report.skipped += 1;
            } else {
                match self.sources.documents.document_fragments(document_id) {
                    Ok(Some(fragments)) => {
                        let document = Document::build(document_id, &fragments, &self.limits);
                        let result =
                            self.classify(user, &document, catalog, &mut checkpoint, user_report)?;
                        self.stores.results.put_result(&result)?;

                        checkpoint.matched_count += 1;
                        checkpoint.cumulative_cost_usd += result.cost_usd;
                        report.record(&result);
                        *remaining -= 1;
                    }
                    Ok(None) => {
                        info!("{}: text not available yet, skipping", document_id);
                        report.unavailable += 1;
                    }
                    Err(e) => {
                        warn!("{}: could not read document: {}", document_id, e);
                        let document = Document::from_text(document_id, String::new());
                        let result = self.error_result(user, &document);
                        self.stores.results.put_result(&result)?;

                        checkpoint.matched_count += 1;
                        report.record(&result);
                        *remaining -= 1;
                    }
                }
            }

            checkpoint.current_row += 1;
            self.save_checkpoint(&mut checkpoint)?;
        }

        if checkpoint.current_row >= total {
            checkpoint.status = CheckpointStatus::Completed;
            self.save_checkpoint(&mut checkpoint)?;
        }

        report.end_row = checkpoint.current_row;
        report.status = checkpoint.status;
        info!(
            "{}/{}: rows {}..{} of {}, {} classified, {} skipped, status={}",
            user,
            task_type,
            report.start_row,
            report.end_row,
            total,
            report.classified,
            report.skipped,
            checkpoint.status.as_str()
        );
        Ok(report)
    }

    /// Build the user's catalog on first use and charge its cost to `checkpoint`.
    fn ensure_catalog(
        &self,
        user: &str,
        catalog: &mut LazyCatalog,
        checkpoint: &mut Checkpoint,
        user_report: &mut UserReport,
    ) -> Result<()> {
        if catalog.built.is_some() {
            return Ok(());
        }
        let built = self.providers.matcher.build_catalog(user, catalog.rows.clone())?;
        let usage = built.usage();
        checkpoint.cumulative_cost_usd += usage.cost_usd;
        user_report.catalog_tokens += usage.tokens;
        user_report.catalog_cost_usd += usage.cost_usd;
        catalog.built = Some(built);
        Ok(())
    }

    /// Classify one document. Provider failures become low-confidence
    /// fallback results; only catalog and storage errors propagate.
    fn classify(
        &self,
        user: &str,
        document: &Document,
        catalog: &mut LazyCatalog,
        checkpoint: &mut Checkpoint,
        user_report: &mut UserReport,
    ) -> Result<MatchResult> {
        let fallback = &self.providers.fallback;

        if document.is_empty() {
            debug!("{}: empty text, default label", document.source_id);
            let outcome = fallback.default_outcome();
            return Ok(self.fallback_result(
                user,
                document,
                outcome.label,
                outcome.confidence,
                MatchMethod::Default,
                (0, 0.0),
                CandidateFilter::None,
            ));
        }

        match self.ensure_catalog(user, catalog, checkpoint, user_report) {
            Ok(()) => {}
            Err(Error::NoObjectives(u)) => return Err(Error::NoObjectives(u)),
            Err(e) if e.is_provider() => {
                // Catalog embedding failed; the next document will try again.
                warn!("Objective catalog for {} unavailable: {}", user, e);
                return Ok(self.error_result(user, document));
            }
            Err(e) => return Err(e),
        }
        let Some(catalog) = catalog.built.as_ref() else {
            return Err(Error::Internal("objective catalog missing after build".into()));
        };

        let decision = match self.providers.matcher.match_document(document, catalog) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("{}: similarity failed: {}", document.source_id, e);
                return Ok(self.error_result(user, document));
            }
        };
        let usage = (decision.usage.tokens, decision.usage.cost_usd);

        if let Decision::Accept {
            index,
            confidence,
            margin,
        } = decision.decision
        {
            let Some(objective) = catalog.get(index) else {
                warn!("{}: matched objective {} not in catalog", document.source_id, index);
                return Ok(self.error_result(user, document));
            };
            debug!(
                "{} → {} (confidence {:.3}, margin {:.3})",
                document.source_id, objective.id, confidence, margin
            );
            return Ok(MatchResult {
                user: user.to_string(),
                document_id: document.source_id.clone(),
                outcome: MatchOutcome::ObjectiveMatch {
                    objective: objective.to_ref(),
                    confidence,
                    margin,
                },
                method: self.providers.matcher.method(),
                tokens: usage.0,
                cost_usd: usage.1,
                candidate_filter: decision.filter,
                created_at: now_millis(),
            });
        }

        let outcome = fallback.classify(&document.text);
        let fallback_usage = self.providers.meter.record(outcome.tokens);
        let method = match outcome.method {
            FallbackMethod::ZeroShot => MatchMethod::ZeroShot,
            FallbackMethod::Default => MatchMethod::Default,
        };
        debug!(
            "{} → fallback {} ({:.3}, {:?})",
            document.source_id, outcome.label, outcome.confidence, decision.decision
        );
        Ok(self.fallback_result(
            user,
            document,
            outcome.label,
            outcome.confidence,
            method,
            (usage.0 + fallback_usage.tokens, usage.1 + fallback_usage.cost_usd),
            decision.filter,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn fallback_result(
        &self,
        user: &str,
        document: &Document,
        label: String,
        confidence: f64,
        method: MatchMethod,
        (tokens, cost_usd): (usize, f64),
        candidate_filter: CandidateFilter,
    ) -> MatchResult {
        MatchResult {
            user: user.to_string(),
            document_id: document.source_id.clone(),
            outcome: MatchOutcome::FallbackCategory { label, confidence },
            method,
            tokens,
            cost_usd,
            candidate_filter,
            created_at: now_millis(),
        }
    }

    /// Low-confidence default label recorded when a provider call fails.
    fn error_result(&self, user: &str, document: &Document) -> MatchResult {
        self.fallback_result(
            user,
            document,
            self.providers.fallback.default_label().to_string(),
            0.0,
            MatchMethod::Error,
            (0, 0.0),
            CandidateFilter::None,
        )
    }
}

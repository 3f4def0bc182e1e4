//! Fan-out of workspace policy changes to dependent resources

use crate::config::PropagationConfig;
use crate::domain::{PropagationUnit, ResourceKind, ResourceRef};
use crate::error::{AppError, PartialPropagation, Result};
use crate::repository::ResourceRepository;
use crate::telemetry::metrics::{PROPAGATION_DURATION_SECONDS, PROPAGATION_RESOURCES_TOTAL};
use metrics::{counter, histogram};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of a completed propagation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Dependents whose policy set changed and was saved
    pub updated: usize,
    /// Dependents already in the target state
    pub unchanged: usize,
}

#[derive(Default)]
struct Progress {
    completed: BTreeSet<ResourceRef>,
    failures: Vec<String>,
    report: PropagationReport,
}

/// Applies a [`PropagationUnit`] to every dependent of its workspace.
///
/// Siblings are updated concurrently, bounded by `max_concurrency`, and the
/// whole fan-out is bounded by `timeout`. Already-saved siblings are not rolled
/// back on failure; the returned error carries the unit so it can be re-applied.
pub struct ResourcePropagator<R: ResourceRepository + 'static> {
    resource_repo: Arc<R>,
    config: PropagationConfig,
}

impl<R: ResourceRepository + 'static> ResourcePropagator<R> {
    pub fn new(resource_repo: Arc<R>, config: PropagationConfig) -> Self {
        Self {
            resource_repo,
            config,
        }
    }

    pub async fn propagate(&self, unit: &PropagationUnit) -> Result<PropagationReport> {
        if unit.is_noop() {
            return Ok(PropagationReport::default());
        }

        let start = Instant::now();
        let result = self.run(unit).await;
        histogram!(PROPAGATION_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, unit: &PropagationUnit) -> Result<PropagationReport> {
        let workspace_id = unit.workspace_id;
        let mut all: Vec<ResourceRef> = Vec::new();
        let mut progress = Progress::default();
        let mut set = JoinSet::new();

        // Loading and updating share one deadline
        let finished = tokio::time::timeout(self.config.timeout(), async {
            let mut dependents = Vec::new();
            for kind in ResourceKind::DEPENDENTS {
                let loaded = self
                    .resource_repo
                    .find_by_workspace(workspace_id, kind)
                    .await
                    .map_err(|e| format!("loading dependents: {}", e))?;
                dependents.extend(loaded);
            }
            all.extend(dependents.iter().map(|r| r.reference()));

            let shared = Arc::new(unit.clone());
            let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
            for mut resource in dependents {
                let repo = self.resource_repo.clone();
                let unit = shared.clone();
                let semaphore = semaphore.clone();
                set.spawn(async move {
                    let reference = resource.reference();
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return (reference, Err(AppError::Internal(e.into()))),
                    };
                    if !unit.apply_to(resource.kind, &mut resource.policies) {
                        return (reference, Ok(false));
                    }
                    let saved = repo.save(&resource).await.map(|_| true);
                    (reference, saved)
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((reference, Ok(changed))) => {
                        debug!(%workspace_id, resource = %reference, changed, "Dependent updated");
                        let result = if changed { "updated" } else { "unchanged" };
                        counter!(PROPAGATION_RESOURCES_TOTAL, "result" => result).increment(1);
                        if changed {
                            progress.report.updated += 1;
                        } else {
                            progress.report.unchanged += 1;
                        }
                        progress.completed.insert(reference);
                    }
                    Ok((reference, Err(e))) => {
                        counter!(PROPAGATION_RESOURCES_TOTAL, "result" => "failed").increment(1);
                        progress.failures.push(format!("{}: {}", reference, e));
                    }
                    Err(e) => {
                        counter!(PROPAGATION_RESOURCES_TOTAL, "result" => "failed").increment(1);
                        progress.failures.push(format!("task failed: {}", e));
                    }
                }
            }
            Ok::<(), String>(())
        })
        .await;

        let reason = match finished {
            Err(_) => {
                set.abort_all();
                Some(format!(
                    "timed out after {}ms",
                    self.config.timeout_ms
                ))
            }
            Ok(Err(load_error)) => Some(load_error),
            Ok(Ok(())) if !progress.failures.is_empty() => Some(progress.failures.join("; ")),
            Ok(Ok(())) => None,
        };

        if let Some(reason) = reason {
            let pending: Vec<ResourceRef> = all
                .into_iter()
                .filter(|r| !progress.completed.contains(r))
                .collect();
            warn!(
                %workspace_id,
                pending = pending.len(),
                reason = %reason,
                "Propagation incomplete"
            );
            return Err(partial_failure(unit, pending, reason));
        }

        info!(
            %workspace_id,
            updated = progress.report.updated,
            unchanged = progress.report.unchanged,
            "Propagation complete"
        );
        Ok(progress.report)
    }
}

fn partial_failure(unit: &PropagationUnit, pending: Vec<ResourceRef>, reason: String) -> AppError {
    AppError::PropagationPartialFailure(Box::new(PartialPropagation {
        workspace_id: unit.workspace_id,
        pending,
        reason,
        unit: unit.clone(),
    }))
}

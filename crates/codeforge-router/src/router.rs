use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use codeforge_config::{Config, ModelConfig, RouterConfig};
use codeforge_utils::RouterError;

use crate::{ModelDescriptor, ModelStatus, ModelUsage, Outcome};

#[derive(Debug)]
struct Entry {
    descriptor: ModelDescriptor,
    usage: ModelUsage,
}

/// Ranked, health-aware model selection.
///
/// Shared by every in-flight request behind an `Arc`. The table sits behind a
/// synchronous lock that is only held for bookkeeping, never across a call.
#[derive(Debug)]
pub struct ModelRouter {
    table: RwLock<Vec<Entry>>,
    failure_threshold: u32,
    backoff_schedule: Vec<Duration>,
}

impl ModelRouter {
    /// Build a router over `models`, kept in configuration order for tie-breaks
    #[must_use]
    pub fn new(models: &[ModelConfig], router: &RouterConfig) -> Self {
        let table = models
            .iter()
            .map(|model| Entry {
                descriptor: ModelDescriptor::new(&model.name, model.priority, model.max_tokens),
                usage: ModelUsage::default(),
            })
            .collect();

        Self {
            table: RwLock::new(table),
            failure_threshold: router.failure_threshold.max(1),
            backoff_schedule: router.backoff_schedule(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.models, &config.router)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the preferred eligible model not in `exclude`.
    ///
    /// Lower priority rank wins; ties go to the model with fewer consecutive
    /// failures, then to configuration order.
    ///
    /// # Errors
    ///
    /// [`RouterError::NotAvailable`] when every model is excluded or unhealthy.
    pub fn select(&self, exclude: &HashSet<String>) -> Result<ModelDescriptor, RouterError> {
        let now = Instant::now();
        let table = self.read();

        let chosen = table
            .iter()
            .enumerate()
            .filter(|(_, e)| !exclude.contains(&e.descriptor.name))
            .filter(|(_, e)| e.descriptor.is_eligible_at(now))
            .min_by_key(|(order, e)| {
                (
                    e.descriptor.priority_rank,
                    e.descriptor.consecutive_failures,
                    *order,
                )
            })
            .map(|(_, e)| Self::as_eligible(&e.descriptor));

        match chosen {
            Some(descriptor) => {
                debug!(model = %descriptor.name, excluded = exclude.len(), "Selected model");
                Ok(descriptor)
            }
            None => {
                let excluded = table
                    .iter()
                    .filter(|e| exclude.contains(&e.descriptor.name))
                    .count();
                let unhealthy = table.len() - excluded;
                warn!(excluded, unhealthy, "No model available");
                Err(RouterError::NotAvailable {
                    excluded,
                    unhealthy,
                })
            }
        }
    }

    /// Like [`select`](Self::select), but returns `hint` when it is eligible
    pub fn select_preferring(
        &self,
        hint: Option<&str>,
        exclude: &HashSet<String>,
    ) -> Result<ModelDescriptor, RouterError> {
        if let Some(hint) = hint
            && !exclude.contains(hint)
        {
            let now = Instant::now();
            let table = self.read();
            if let Some(entry) = table
                .iter()
                .find(|e| e.descriptor.name == hint && e.descriptor.is_eligible_at(now))
            {
                debug!(model = hint, "Selected hinted model");
                return Ok(Self::as_eligible(&entry.descriptor));
            }
            debug!(model = hint, "Hinted model not eligible, falling back to ranking");
        }
        self.select(exclude)
    }

    /// A descriptor whose window has elapsed is reported healthy again
    fn as_eligible(descriptor: &ModelDescriptor) -> ModelDescriptor {
        let mut descriptor = descriptor.clone();
        if !descriptor.is_healthy {
            descriptor.is_healthy = true;
            descriptor.rate_limited_until = None;
        }
        descriptor
    }

    /// Record the outcome of a call to `model`.
    ///
    /// Unknown names are ignored.
    pub fn report(&self, model: &str, outcome: Outcome) {
        let now = Instant::now();
        let mut table = self.write();
        let Some(entry) = table.iter_mut().find(|e| e.descriptor.name == model) else {
            warn!(model, "Outcome reported for unknown model");
            return;
        };

        entry.usage.record(outcome);
        let descriptor = &mut entry.descriptor;

        match outcome {
            Outcome::Success => {
                if !descriptor.is_healthy || descriptor.consecutive_failures > 0 {
                    info!(
                        model,
                        previous_failures = descriptor.consecutive_failures,
                        "Model recovered"
                    );
                }
                descriptor.consecutive_failures = 0;
                descriptor.is_healthy = true;
                descriptor.rate_limited_until = None;
            }
            Outcome::TransientError { retry_after } => {
                descriptor.consecutive_failures = descriptor.consecutive_failures.saturating_add(1);
                let window = match retry_after {
                    Some(hint) => Some(hint),
                    None if descriptor.consecutive_failures >= self.failure_threshold => {
                        Some(self.backoff_for(descriptor.consecutive_failures))
                    }
                    None => None,
                };

                if let Some(window) = window {
                    descriptor.is_healthy = false;
                    descriptor.rate_limited_until = Some(now + window);
                    info!(
                        model,
                        consecutive_failures = descriptor.consecutive_failures,
                        window_secs = window.as_secs_f64(),
                        "Model marked unhealthy"
                    );
                } else {
                    debug!(
                        model,
                        consecutive_failures = descriptor.consecutive_failures,
                        "Transient failure recorded"
                    );
                }
            }
            Outcome::FatalError => {
                debug!(model, "Fatal failure recorded; health unchanged");
            }
        }
    }

    /// Re-eligibility window after `failures` consecutive transient failures
    fn backoff_for(&self, failures: u32) -> Duration {
        let trip = failures.saturating_sub(self.failure_threshold) as usize;
        let last = self.backoff_schedule.len().saturating_sub(1);
        self.backoff_schedule
            .get(trip.min(last))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Current descriptor for `model`
    #[must_use]
    pub fn descriptor(&self, model: &str) -> Option<ModelDescriptor> {
        self.read()
            .iter()
            .find(|e| e.descriptor.name == model)
            .map(|e| e.descriptor.clone())
    }

    /// Configured model names in configuration order
    #[must_use]
    pub fn model_names(&self) -> Vec<String> {
        self.read()
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    /// Health and usage of every model, in configuration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<ModelStatus> {
        let now = Instant::now();
        self.read()
            .iter()
            .map(|e| {
                let d = &e.descriptor;
                let eligible = d.is_eligible_at(now);
                let unhealthy_for_secs = if eligible {
                    None
                } else {
                    d.rate_limited_until.map(|until| {
                        let left = until.saturating_duration_since(now);
                        left.as_secs() + u64::from(left.subsec_nanos() > 0)
                    })
                };
                ModelStatus {
                    name: d.name.clone(),
                    priority_rank: d.priority_rank,
                    max_tokens: d.max_tokens,
                    is_healthy: eligible,
                    consecutive_failures: d.consecutive_failures,
                    unhealthy_for_secs,
                    usage: e.usage,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::advance;

    fn router() -> ModelRouter {
        let models = vec![
            ModelConfig::new("alpha", 1000, 1),
            ModelConfig::new("beta", 1000, 1),
            ModelConfig::new("gamma", 1000, 2),
        ];
        let config = RouterConfig {
            failure_threshold: 2,
            unhealthy_backoff_secs: vec![10, 20],
        };
        ModelRouter::new(&models, &config)
    }

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    fn excluding(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    const TRANSIENT: Outcome = Outcome::TransientError { retry_after: None };

    #[tokio::test(start_paused = true)]
    async fn test_priority_then_failures_then_order() {
        let router = router();
        assert_eq!(router.select(&none()).unwrap().name, "alpha");

        // One failure is below threshold but loses the tie against beta
        router.report("alpha", TRANSIENT);
        assert_eq!(router.select(&none()).unwrap().name, "beta");

        router.report("alpha", Outcome::Success);
        assert_eq!(router.select(&none()).unwrap().name, "alpha");
        assert_eq!(router.select(&excluding(&["alpha", "beta"])).unwrap().name, "gamma");
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_marks_unhealthy_until_window_elapses() {
        let router = router();
        router.report("alpha", TRANSIENT);
        router.report("alpha", TRANSIENT);

        let alpha = router.descriptor("alpha").unwrap();
        assert!(!alpha.is_healthy);
        assert_eq!(alpha.consecutive_failures, 2);

        // Even with nothing excluded, alpha is skipped
        assert_eq!(router.select(&excluding(&["beta", "gamma"])).unwrap_err(),
            RouterError::NotAvailable { excluded: 2, unhealthy: 1 });

        advance(Duration::from_secs(9)).await;
        assert!(router.select(&excluding(&["beta", "gamma"])).is_err());

        advance(Duration::from_secs(1)).await;
        let selected = router.select(&excluding(&["beta", "gamma"])).unwrap();
        assert_eq!(selected.name, "alpha");
        assert!(selected.is_healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_trips_walk_the_schedule() {
        let router = router();
        router.report("alpha", TRANSIENT);
        router.report("alpha", TRANSIENT);
        advance(Duration::from_secs(10)).await;

        // Third consecutive failure uses the second (and last) window
        router.report("alpha", TRANSIENT);
        advance(Duration::from_secs(19)).await;
        assert!(router.select(&excluding(&["beta", "gamma"])).is_err());
        advance(Duration::from_secs(1)).await;
        assert!(router.select(&excluding(&["beta", "gamma"])).is_ok());

        // Clamped at the end of the schedule
        router.report("alpha", TRANSIENT);
        let until = router.descriptor("alpha").unwrap().rate_limited_until.unwrap();
        assert_eq!(until - Instant::now(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_authoritative() {
        let router = router();
        router.report(
            "alpha",
            Outcome::TransientError {
                retry_after: Some(Duration::from_secs(3)),
            },
        );
        let alpha = router.descriptor("alpha").unwrap();
        assert!(!alpha.is_healthy);
        assert_eq!(alpha.consecutive_failures, 1);

        advance(Duration::from_secs(3)).await;
        assert_eq!(router.select(&excluding(&["beta"])).unwrap().name, "alpha");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_does_not_touch_health() {
        let router = router();
        for _ in 0..5 {
            router.report("alpha", Outcome::FatalError);
        }
        let alpha = router.descriptor("alpha").unwrap();
        assert!(alpha.is_healthy);
        assert_eq!(alpha.consecutive_failures, 0);
        assert_eq!(router.select(&none()).unwrap().name, "alpha");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_unhealthy() {
        let router = router();
        router.report("alpha", TRANSIENT);
        router.report("alpha", TRANSIENT);
        router.report("alpha", Outcome::Success);
        let alpha = router.descriptor("alpha").unwrap();
        assert!(alpha.is_healthy);
        assert_eq!(alpha.consecutive_failures, 0);
        assert!(alpha.rate_limited_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_preferring_hint() {
        let router = router();
        assert_eq!(router.select_preferring(Some("gamma"), &none()).unwrap().name, "gamma");
        assert_eq!(
            router.select_preferring(Some("gamma"), &excluding(&["gamma"])).unwrap().name,
            "alpha"
        );
        assert_eq!(router.select_preferring(Some("unknown"), &none()).unwrap().name, "alpha");

        router.report("gamma", TRANSIENT);
        router.report("gamma", TRANSIENT);
        assert_eq!(router.select_preferring(Some("gamma"), &none()).unwrap().name, "alpha");
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_usage_and_window() {
        let router = router();
        router.report("beta", Outcome::Success);
        router.report("beta", Outcome::FatalError);
        router.report("gamma", TRANSIENT);
        router.report("gamma", TRANSIENT);
        router.report("nobody", Outcome::Success);

        let snapshot = router.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1].usage.calls, 2);
        assert_eq!(snapshot[1].usage.fatal_failures, 1);
        assert!(snapshot[1].is_healthy);
        assert!(!snapshot[2].is_healthy);
        assert_eq!(snapshot[2].unhealthy_for_secs, Some(10));

        let json = serde_json::to_value(&snapshot[0]).unwrap();
        assert!(json.get("unhealthy_for_secs").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_select_and_report() {
        let router = Arc::new(router());
        let mut handles = Vec::new();
        for i in 0..16 {
            let router = Arc::clone(&router);
            handles.push(tokio::spawn(async move {
                let selected = router.select(&HashSet::new()).unwrap();
                let outcome = if i % 2 == 0 { Outcome::Success } else { TRANSIENT };
                router.report(&selected.name, outcome);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let calls: u64 = router.snapshot().iter().map(|s| s.usage.calls).sum();
        assert_eq!(calls, 16);
    }
}

//! Endpoint lifecycle: discover, provision, warm up, account, tear down.
//!
//! ```text
//! NONE ─► DISCOVERED ─┬─► REUSED
//!                     └─► PROVISIONING ─► PROVISIONED ─► WAITING ─► READY ─► TORN_DOWN
//! ```
//!
//! Each CLI invocation runs one operation. The only state shared between
//! invocations is the [`SessionLedger`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::PodConfig;
use crate::providers::{ControlPlane, CreateEndpointRequest, EndpointSummary, PodError};
use crate::session::{CostReport, SessionLedger, SessionRecord};
use crate::template::ensure_template;
use crate::tier::{select_tier, GpuTier};

/// Lifecycle states, used to label log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing known yet.
    None,
    /// Endpoints with the reserved name were found.
    Discovered,
    /// An existing endpoint was handed back.
    Reused,
    /// A new endpoint is being created.
    Provisioning,
    /// A new endpoint exists and its session is recorded.
    Provisioned,
    /// Polling for a ready worker.
    Waiting,
    /// A worker can serve requests.
    Ready,
    /// The endpoint was deleted and the session closed.
    TornDown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Discovered => write!(f, "discovered"),
            Self::Reused => write!(f, "reused"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Provisioned => write!(f, "provisioned"),
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::TornDown => write!(f, "torn_down"),
        }
    }
}

/// What to do when endpoints with the reserved name already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseChoice {
    /// Reuse the endpoint at this index of the discovered list.
    Reuse(usize),
    /// Ignore them and create a new endpoint.
    CreateNew,
}

/// Decisions `up` delegates to the caller (a prompt, flags, or a test).
#[cfg_attr(test, mockall::automock)]
pub trait ReuseDecider: Send + Sync {
    /// Pick between the discovered endpoints and a new one.
    ///
    /// # Errors
    /// Returns an error if the decision cannot be obtained.
    fn choose(&self, existing: &[EndpointSummary]) -> Result<ReuseChoice, PodError>;

    /// Confirm launching a billable endpoint on `tier`.
    ///
    /// # Errors
    /// Returns an error if the decision cannot be obtained.
    fn confirm_launch(&self, model_id: &str, tier: GpuTier) -> Result<bool, PodError>;
}

/// Result of [`LifecycleManager::up`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpOutcome {
    /// An existing endpoint was chosen. No session is recorded.
    Reused { endpoint_id: String },
    /// A new endpoint was created and its session recorded.
    Provisioned { endpoint_id: String, tier: GpuTier },
    /// The launch was not confirmed; nothing was created.
    Declined,
}

impl UpOutcome {
    /// Endpoint ID to hand to the caller, if any.
    #[must_use]
    pub fn endpoint_id(&self) -> Option<&str> {
        match self {
            Self::Reused { endpoint_id } | Self::Provisioned { endpoint_id, .. } => {
                Some(endpoint_id.as_str())
            }
            Self::Declined => None,
        }
    }
}

/// Result of [`LifecycleManager::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A worker is idle or running.
    Ready { elapsed: Duration },
    /// The cancellation token fired first.
    Cancelled { elapsed: Duration },
}

/// Result of [`LifecycleManager::down`].
#[derive(Debug)]
pub struct DownReport {
    /// Endpoint that was torn down.
    pub endpoint_id: String,
    /// Cost accrued up to teardown.
    pub cost: CostReport,
    /// Remote delete failure, if any. Local state is cleared regardless.
    pub delete_error: Option<PodError>,
    /// Whether a session record was removed.
    pub session_cleared: bool,
    /// Failure to remove the session record, if any.
    pub clear_error: Option<PodError>,
}

impl DownReport {
    /// Whether both the remote delete and the local cleanup succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.delete_error.is_none() && self.clear_error.is_none()
    }
}

/// Drives one endpoint through its lifecycle.
pub struct LifecycleManager {
    client: Arc<dyn ControlPlane>,
    decider: Arc<dyn ReuseDecider>,
    ledger: SessionLedger,
    config: PodConfig,
}

impl LifecycleManager {
    /// Create a lifecycle manager.
    #[must_use]
    pub fn new(
        client: Arc<dyn ControlPlane>,
        decider: Arc<dyn ReuseDecider>,
        ledger: SessionLedger,
        config: PodConfig,
    ) -> Self {
        Self {
            client,
            decider,
            ledger,
            config,
        }
    }

    /// Reuse an endpoint with the reserved name or provision a new one.
    ///
    /// # Errors
    /// Returns an error if listing, template reconciliation or creation fails,
    /// if the decider fails or picks an index out of range, or if the session
    /// record cannot be saved. Provisioning is never retried.
    pub async fn up(&self) -> Result<UpOutcome, PodError> {
        self.config.validate()?;
        info!(state = %LifecycleState::None, name = %self.config.endpoint_name, "Looking for existing endpoints");

        let existing: Vec<EndpointSummary> = self
            .client
            .list_endpoints()
            .await?
            .into_iter()
            .filter(|e| e.name == self.config.endpoint_name)
            .collect();

        if !existing.is_empty() {
            info!(
                state = %LifecycleState::Discovered,
                count = existing.len(),
                "Found existing endpoints"
            );

            if let ReuseChoice::Reuse(index) = self.decider.choose(&existing)? {
                let chosen = existing.get(index).ok_or_else(|| {
                    PodError::State(format!(
                        "reuse index {index} out of range ({} endpoints found)",
                        existing.len()
                    ))
                })?;
                info!(state = %LifecycleState::Reused, endpoint_id = %chosen.id, "Reusing endpoint");
                return Ok(UpOutcome::Reused {
                    endpoint_id: chosen.id.clone(),
                });
            }
        }

        let tier = select_tier(&self.config.model_id);
        if !self.decider.confirm_launch(&self.config.model_id, tier)? {
            info!(tier = %tier, "Launch declined");
            return Ok(UpOutcome::Declined);
        }

        info!(
            state = %LifecycleState::Provisioning,
            model = %self.config.model_id,
            tier = %tier,
            gpu = tier.provider_gpu_id(),
            hourly_usd = tier.hourly_rate(),
            "Provisioning endpoint"
        );

        let template_id = match &self.config.template_id {
            Some(id) => id.clone(),
            None => {
                ensure_template(
                    self.client.as_ref(),
                    &self.config.template,
                    &self.config.model_id,
                    self.config.hf_token.as_deref(),
                )
                .await?
            }
        };

        let endpoint_id = self
            .client
            .create_endpoint(CreateEndpointRequest {
                name: self.config.endpoint_name.clone(),
                template_id,
                gpu_type_ids: vec![tier.provider_gpu_id().to_string()],
                workers_min: self.config.workers_min,
                workers_max: self.config.workers_max,
                idle_timeout_secs: self.config.idle_timeout_secs,
            })
            .await?;

        let record = SessionRecord::start(&endpoint_id, tier.rate_per_second());
        self.ledger.save(&record).map_err(|e| {
            PodError::State(format!(
                "endpoint {endpoint_id} was created but its session could not be recorded: {e}"
            ))
        })?;

        info!(state = %LifecycleState::Provisioned, endpoint_id = %endpoint_id, "Endpoint provisioned");
        Ok(UpOutcome::Provisioned { endpoint_id, tier })
    }

    /// Poll until the endpoint has a ready worker or `cancel` fires.
    ///
    /// Poll failures of any kind are logged and retried after the shorter
    /// retry interval. There is no timeout; bound it with `cancel`.
    pub async fn wait(&self, endpoint_id: &str, cancel: &CancellationToken) -> WaitOutcome {
        let start = Instant::now();
        info!(state = %LifecycleState::Waiting, endpoint_id = %endpoint_id, "Waiting for a ready worker");

        loop {
            if cancel.is_cancelled() {
                return Self::cancelled(endpoint_id, start);
            }

            let polled = tokio::select! {
                () = cancel.cancelled() => return Self::cancelled(endpoint_id, start),
                polled = self.client.get_endpoint(endpoint_id) => polled,
            };

            let delay = match polled {
                Ok(endpoint) => {
                    if let Some(worker) = endpoint.ready_worker() {
                        let elapsed = start.elapsed();
                        info!(
                            state = %LifecycleState::Ready,
                            endpoint_id = %endpoint_id,
                            worker_id = %worker.id,
                            worker_state = %worker.state,
                            elapsed_secs = elapsed.as_secs(),
                            "Endpoint is ready"
                        );
                        return WaitOutcome::Ready { elapsed };
                    }

                    if endpoint.is_initializing() {
                        info!(
                            endpoint_id = %endpoint_id,
                            elapsed_secs = start.elapsed().as_secs(),
                            "Worker initializing (pulling image / loading weights)"
                        );
                    } else {
                        info!(
                            endpoint_id = %endpoint_id,
                            workers = endpoint.workers.len(),
                            elapsed_secs = start.elapsed().as_secs(),
                            "No ready worker yet"
                        );
                    }
                    self.config.poll_interval
                }
                Err(e) => {
                    warn!(
                        endpoint_id = %endpoint_id,
                        error = %e,
                        transport = e.is_transport(),
                        retry_secs = self.config.retry_interval.as_secs(),
                        "Readiness poll failed, retrying"
                    );
                    self.config.retry_interval
                }
            };

            tokio::select! {
                () = cancel.cancelled() => return Self::cancelled(endpoint_id, start),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled(endpoint_id: &str, start: Instant) -> WaitOutcome {
        let elapsed = start.elapsed();
        info!(endpoint_id = %endpoint_id, elapsed_secs = elapsed.as_secs(), "Wait cancelled");
        WaitOutcome::Cancelled { elapsed }
    }

    /// Estimated cost of the recorded session, zero when there is none.
    ///
    /// # Errors
    /// Returns [`PodError::State`] if the ledger holds a malformed record.
    pub fn cost(&self) -> Result<CostReport, PodError> {
        self.ledger.cost()
    }

    /// Like [`cost`](Self::cost), evaluated at `now` (seconds since the epoch).
    ///
    /// # Errors
    /// Returns [`PodError::State`] if the ledger holds a malformed record.
    pub fn cost_at(&self, now: f64) -> Result<CostReport, PodError> {
        self.ledger.cost_at(now)
    }

    /// Report cost, delete the endpoint, and close the session.
    ///
    /// Neither step short-circuits the other: a failed delete still clears
    /// the session, and both failures are returned in the report.
    pub async fn down(&self, endpoint_id: &str) -> DownReport {
        let cost = self.cost().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read session record");
            CostReport::none()
        });

        if let Some(session) = cost.session.as_ref().filter(|s| s.endpoint_id != endpoint_id) {
            warn!(
                endpoint_id = %endpoint_id,
                session_endpoint_id = %session.endpoint_id,
                "Session record belongs to a different endpoint"
            );
        }
        info!(endpoint_id = %endpoint_id, cost = %cost, "Tearing down endpoint");

        let delete_error = match self.client.delete_endpoint(endpoint_id).await {
            Ok(()) => None,
            Err(e) => {
                error!(endpoint_id = %endpoint_id, error = %e, "Failed to delete endpoint");
                Some(e)
            }
        };

        let (session_cleared, clear_error) = match self.ledger.clear() {
            Ok(cleared) => (cleared, None),
            Err(e) => {
                error!(
                    path = %self.ledger.path().display(),
                    error = %e,
                    "Failed to remove session record"
                );
                (false, Some(e))
            }
        };
        info!(
            state = %LifecycleState::TornDown,
            endpoint_id = %endpoint_id,
            session_cleared,
            deleted = delete_error.is_none(),
            "Teardown finished"
        );

        DownReport {
            endpoint_id: endpoint_id.to_string(),
            cost,
            delete_error,
            session_cleared,
            clear_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::Sequence;
    use tempfile::TempDir;

    use super::*;
    use crate::providers::traits::MockControlPlane;
    use crate::providers::{Endpoint, Template, Worker, WorkerState};

    fn summary(id: &str, name: &str) -> EndpointSummary {
        EndpointSummary {
            id: id.to_string(),
            name: name.to_string(),
            template_id: "tpl-1".to_string(),
        }
    }

    fn endpoint(states: &[WorkerState]) -> Endpoint {
        Endpoint {
            id: "ep-1".to_string(),
            name: "Claude-Code-Qwen3".to_string(),
            template_id: "tpl-1".to_string(),
            gpu_type_ids: vec!["AMPERE_80".to_string()],
            workers_min: 0,
            workers_max: 1,
            idle_timeout_secs: 120,
            env: HashMap::new(),
            workers: states
                .iter()
                .enumerate()
                .map(|(i, state)| Worker {
                    id: format!("w-{i}"),
                    state: state.clone(),
                })
                .collect(),
        }
    }

    fn manager(
        client: MockControlPlane,
        decider: MockReuseDecider,
        config: PodConfig,
    ) -> (TempDir, LifecycleManager) {
        let temp_dir = TempDir::new().unwrap();
        let ledger = SessionLedger::new(temp_dir.path().join("session.json"));
        let manager = LifecycleManager::new(Arc::new(client), Arc::new(decider), ledger, config);
        (temp_dir, manager)
    }

    fn ledger_of(dir: &TempDir) -> SessionLedger {
        SessionLedger::new(dir.path().join("session.json"))
    }

    #[tokio::test]
    async fn test_up_reuses_existing_endpoint() {
        let mut client = MockControlPlane::new();
        client.expect_list_endpoints().times(1).returning(|| {
            Ok(vec![
                summary("other", "someone-else"),
                summary("ep-a", "Claude-Code-Qwen3"),
                summary("ep-b", "Claude-Code-Qwen3"),
            ])
        });
        client.expect_create_endpoint().never();
        client.expect_list_templates().never();

        let mut decider = MockReuseDecider::new();
        decider
            .expect_choose()
            .withf(|existing| existing.len() == 2 && existing[1].id == "ep-b")
            .times(1)
            .returning(|_| Ok(ReuseChoice::Reuse(1)));
        decider.expect_confirm_launch().never();

        let (dir, manager) = manager(client, decider, PodConfig::new("Qwen/Qwen3-Coder-Next"));
        let outcome = manager.up().await.unwrap();

        assert_eq!(
            outcome,
            UpOutcome::Reused {
                endpoint_id: "ep-b".to_string()
            }
        );
        assert_eq!(ledger_of(&dir).load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_up_reuse_index_out_of_range() {
        let mut client = MockControlPlane::new();
        client
            .expect_list_endpoints()
            .returning(|| Ok(vec![summary("ep-a", "Claude-Code-Qwen3")]));
        client.expect_create_endpoint().never();

        let mut decider = MockReuseDecider::new();
        decider
            .expect_choose()
            .returning(|_| Ok(ReuseChoice::Reuse(3)));

        let (_dir, manager) = manager(client, decider, PodConfig::new("tiny-7b"));
        let err = manager.up().await.unwrap_err();
        assert!(matches!(err, PodError::State(_)));
    }

    #[tokio::test]
    async fn test_up_provisions_and_records_session() {
        let mut client = MockControlPlane::new();
        client.expect_list_endpoints().returning(|| Ok(Vec::new()));
        client.expect_list_templates().times(1).returning(|| {
            Ok(vec![Template {
                id: "tpl-qwen".to_string(),
                name: "vLLM-Qwen3-Coder-Next".to_string(),
                image_name: "runpod/worker-v1-vllm".to_string(),
                is_serverless: true,
                env: HashMap::new(),
            }])
        });
        client.expect_create_template().never();
        client
            .expect_create_endpoint()
            .withf(|req| {
                req.name == "Claude-Code-Qwen3"
                    && req.template_id == "tpl-qwen"
                    && req.gpu_type_ids == vec!["AMPERE_80".to_string()]
                    && req.workers_min == 0
                    && req.workers_max == 1
                    && req.idle_timeout_secs == 120
            })
            .times(1)
            .returning(|_| Ok("ep-new".to_string()));

        let mut decider = MockReuseDecider::new();
        decider.expect_choose().never();
        decider
            .expect_confirm_launch()
            .withf(|_, tier| *tier == GpuTier::Large)
            .returning(|_, _| Ok(true));

        let (dir, manager) = manager(client, decider, PodConfig::new("Qwen/Qwen3-Coder-Next"));
        let outcome = manager.up().await.unwrap();

        assert_eq!(
            outcome,
            UpOutcome::Provisioned {
                endpoint_id: "ep-new".to_string(),
                tier: GpuTier::Large
            }
        );
        let record = ledger_of(&dir).load().unwrap().unwrap();
        assert_eq!(record.endpoint_id, "ep-new");
        assert!((record.rate_per_second - GpuTier::Large.rate_per_second()).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_up_new_after_discovery_uses_configured_template() {
        let mut client = MockControlPlane::new();
        client
            .expect_list_endpoints()
            .returning(|| Ok(vec![summary("ep-a", "Claude-Code-Qwen3")]));
        client.expect_list_templates().never();
        client
            .expect_create_endpoint()
            .withf(|req| req.template_id == "fixed-tpl" && req.gpu_type_ids == vec!["ADA_24"])
            .times(1)
            .returning(|_| Ok("ep-new".to_string()));

        let mut decider = MockReuseDecider::new();
        decider
            .expect_choose()
            .returning(|_| Ok(ReuseChoice::CreateNew));
        decider.expect_confirm_launch().returning(|_, _| Ok(true));

        let mut config = PodConfig::new("tiny-7b");
        config.template_id = Some("fixed-tpl".to_string());
        let (_dir, manager) = manager(client, decider, config);

        let outcome = manager.up().await.unwrap();
        assert_eq!(outcome.endpoint_id(), Some("ep-new"));
    }

    #[tokio::test]
    async fn test_up_declined_creates_nothing() {
        let mut client = MockControlPlane::new();
        client.expect_list_endpoints().returning(|| Ok(Vec::new()));
        client.expect_list_templates().never();
        client.expect_create_endpoint().never();

        let mut decider = MockReuseDecider::new();
        decider.expect_confirm_launch().returning(|_, _| Ok(false));

        let (dir, manager) = manager(client, decider, PodConfig::new("tiny-7b"));
        assert_eq!(manager.up().await.unwrap(), UpOutcome::Declined);
        assert_eq!(ledger_of(&dir).load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_up_create_failure_is_fatal() {
        let mut client = MockControlPlane::new();
        client.expect_list_endpoints().returning(|| Ok(Vec::new()));
        client.expect_list_templates().returning(|| Ok(Vec::new()));
        client
            .expect_create_template()
            .returning(|_| Ok("tpl-1".to_string()));
        client.expect_create_endpoint().times(1).returning(|_| {
            Err(PodError::Api {
                status: 400,
                message: "unknown gpu id".to_string(),
            })
        });

        let mut decider = MockReuseDecider::new();
        decider.expect_confirm_launch().returning(|_, _| Ok(true));

        let (dir, manager) = manager(client, decider, PodConfig::new("tiny-7b"));
        let err = manager.up().await.unwrap_err();

        assert!(matches!(err, PodError::Api { status: 400, .. }));
        assert_eq!(ledger_of(&dir).load().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_until_ready() {
        let mut client = MockControlPlane::new();
        let mut seq = Sequence::new();
        client
            .expect_get_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(PodError::Timeout(30)));
        client
            .expect_get_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(endpoint(&[])));
        client
            .expect_get_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(endpoint(&[WorkerState::Initializing])));
        client
            .expect_get_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(PodError::Api {
                    status: 502,
                    message: "bad gateway".to_string(),
                })
            });
        client
            .expect_get_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(endpoint(&[WorkerState::Initializing, WorkerState::Idle])));

        let (_dir, manager) = manager(client, MockReuseDecider::new(), PodConfig::new("tiny-7b"));
        let outcome = manager.wait("ep-1", &CancellationToken::new()).await;

        // Two failed polls at 5s each, two pending polls at 20s each.
        let WaitOutcome::Ready { elapsed } = outcome else {
            panic!("expected ready, got {outcome:?}");
        };
        assert!(elapsed >= Duration::from_secs(50));
        assert!(elapsed < Duration::from_secs(51));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_running_worker_is_ready() {
        let mut client = MockControlPlane::new();
        client
            .expect_get_endpoint()
            .times(1)
            .returning(|_| Ok(endpoint(&[WorkerState::Running])));

        let (_dir, manager) = manager(client, MockReuseDecider::new(), PodConfig::new("tiny-7b"));
        let outcome = manager.wait("ep-1", &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            WaitOutcome::Ready {
                elapsed: Duration::ZERO
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let polls = Arc::new(AtomicUsize::new(0));

        let mut client = MockControlPlane::new();
        let trigger = cancel.clone();
        let counter = Arc::clone(&polls);
        client.expect_get_endpoint().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                trigger.cancel();
            }
            Ok(endpoint(&[WorkerState::Initializing]))
        });

        let (_dir, manager) = manager(client, MockReuseDecider::new(), PodConfig::new("tiny-7b"));
        let outcome = manager.wait("ep-1", &cancel).await;

        assert!(matches!(outcome, WaitOutcome::Cancelled { .. }));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cost_without_session_is_zero() {
        let (_dir, manager) = manager(
            MockControlPlane::new(),
            MockReuseDecider::new(),
            PodConfig::new("tiny-7b"),
        );
        let report = manager.cost().unwrap();
        assert_eq!(report.session, None);
        assert!(report.amount_usd.abs() < f64::EPSILON);
        assert_eq!(report.to_string(), "$0.00");
    }

    #[test]
    fn test_cost_after_one_hour() {
        let (dir, manager) = manager(
            MockControlPlane::new(),
            MockReuseDecider::new(),
            PodConfig::new("tiny-7b"),
        );
        let record = SessionRecord {
            endpoint_id: "ep-1".to_string(),
            start_timestamp: 1_700_000_000.0,
            rate_per_second: 0.000_76,
        };
        ledger_of(&dir).save(&record).unwrap();

        let report = manager.cost_at(1_700_003_600.0).unwrap();
        assert!((report.elapsed_secs - 3600.0).abs() < 1e-6);
        assert!((report.amount_usd - 0.000_76 * 3600.0).abs() < 1e-9);
        assert_eq!(report.to_string(), "$2.74");
    }

    #[tokio::test]
    async fn test_down_clears_session_when_delete_fails() {
        let mut client = MockControlPlane::new();
        client
            .expect_delete_endpoint()
            .withf(|id| id == "ep-1")
            .times(1)
            .returning(|_| {
                Err(PodError::Api {
                    status: 500,
                    message: "internal error".to_string(),
                })
            });

        let (dir, manager) = manager(client, MockReuseDecider::new(), PodConfig::new("tiny-7b"));
        ledger_of(&dir)
            .save(&SessionRecord::start("ep-1", 0.000_31))
            .unwrap();

        let report = manager.down("ep-1").await;

        assert!(matches!(
            report.delete_error,
            Some(PodError::Api { status: 500, .. })
        ));
        assert!(report.session_cleared);
        assert!(report.clear_error.is_none());
        assert_eq!(report.cost.session.map(|s| s.endpoint_id), Some("ep-1".to_string()));
        assert_eq!(ledger_of(&dir).load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_down_with_malformed_session_still_clears() {
        let mut client = MockControlPlane::new();
        client.expect_delete_endpoint().returning(|_| Ok(()));

        let (dir, manager) = manager(client, MockReuseDecider::new(), PodConfig::new("tiny-7b"));
        std::fs::write(dir.path().join("session.json"), "garbage").unwrap();

        let report = manager.down("ep-1").await;

        assert!(report.is_clean());
        assert!(report.session_cleared);
        assert_eq!(report.cost, CostReport::none());
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_down_reports_both_failures() {
        let mut client = MockControlPlane::new();
        client.expect_delete_endpoint().times(1).returning(|_| {
            Err(PodError::Api {
                status: 500,
                message: "internal error".to_string(),
            })
        });

        let (dir, manager) = manager(client, MockReuseDecider::new(), PodConfig::new("tiny-7b"));
        // A directory where the record should be cannot be removed as a file.
        std::fs::create_dir(dir.path().join("session.json")).unwrap();

        let report = manager.down("ep-1").await;

        assert!(!report.is_clean());
        assert!(matches!(
            report.delete_error,
            Some(PodError::Api { status: 500, .. })
        ));
        assert!(matches!(report.clear_error, Some(PodError::Io(_))));
        assert!(!report.session_cleared);
        assert_eq!(report.cost, CostReport::none());
    }

    #[tokio::test]
    async fn test_up_list_failure_is_fatal() {
        let mut client = MockControlPlane::new();
        client
            .expect_list_endpoints()
            .times(1)
            .returning(|| Err(PodError::Timeout(30)));
        client.expect_list_templates().never();
        client.expect_create_template().never();
        client.expect_create_endpoint().never();

        let mut decider = MockReuseDecider::new();
        decider.expect_choose().never();
        decider.expect_confirm_launch().never();

        let (dir, manager) = manager(client, decider, PodConfig::new("Qwen/Qwen3-Coder-Next"));
        let err = manager.up().await.unwrap_err();

        assert!(matches!(err, PodError::Timeout(30)));
        assert_eq!(ledger_of(&dir).load().unwrap(), None);
    }
}

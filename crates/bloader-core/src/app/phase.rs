//! PhaseRunner - 1 フェーズ分の並行実行 + barrier
//!
//! - 各 module の hook は独立した tokio task で走る
//! - 全 task の終了を待ってから返る（barrier）
//! - 失敗があっても他の task は止めない。最初のエラーを返す
//!
//! With a deadline set, the barrier gives up after `timeout` and returns
//! `PhaseTimeout`. Tasks still running are detached, not aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::context::LifecycleContext;
use crate::domain::{BootError, Phase};
use crate::registry::ModuleWrapper;

pub struct PhaseRunner {
    timeout: Option<Duration>,
}

impl PhaseRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn run(
        &self,
        phase: Phase,
        modules: Vec<Arc<ModuleWrapper>>,
        ctx: &LifecycleContext,
    ) -> Result<(), BootError> {
        let mut set = JoinSet::new();
        let mut labels = HashMap::with_capacity(modules.len());

        for module in modules {
            let ctx = ctx.clone();
            let label = module.label();
            let handle = set.spawn(async move { module.run(phase, &ctx).await });
            labels.insert(handle.id(), label);
        }
        debug!(%phase, tasks = set.len(), "phase barrier armed");

        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, join_all(phase, &mut set, &labels)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%phase, pending = set.len(), "phase barrier timed out");
                    set.detach_all();
                    Err(BootError::PhaseTimeout { phase, timeout })
                }
            },
            None => join_all(phase, &mut set, &labels).await,
        }
    }
}

/// Wait for every task; keep the first error seen.
async fn join_all(
    phase: Phase,
    set: &mut JoinSet<Result<(), BootError>>,
    labels: &HashMap<tokio::task::Id, String>,
) -> Result<(), BootError> {
    let mut first: Option<BootError> = None;

    while let Some(joined) = set.join_next_with_id().await {
        let err = match joined {
            Ok((_, Ok(()))) => continue,
            Ok((_, Err(err))) => err,
            Err(join_err) => BootError::HookPanicked {
                module: labels
                    .get(&join_err.id())
                    .cloned()
                    .unwrap_or_else(|| "<unknown>".to_string()),
                phase,
            },
        };
        debug!(%phase, error = %err, "phase task failed");
        first.get_or_insert(err);
    }

    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HookError, LifecycleState};
    use crate::typed::{Module, OnCreate, OnStart, Registration};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Slow {
        delay: Duration,
        done: Arc<AtomicUsize>,
    }

    impl Module for Slow {
        fn as_on_create(&self) -> Option<&dyn OnCreate> {
            Some(self)
        }
    }

    #[async_trait]
    impl OnCreate for Slow {
        async fn on_create(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
            tokio::time::sleep(self.delay).await;
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken {
        panic: bool,
    }

    impl Module for Broken {
        fn as_on_create(&self) -> Option<&dyn OnCreate> {
            Some(self)
        }

        fn as_on_start(&self) -> Option<&dyn OnStart> {
            Some(self)
        }
    }

    #[async_trait]
    impl OnCreate for Broken {
        async fn on_create(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
            if self.panic {
                panic!("hook blew up");
            }
            Err("refused".into())
        }
    }

    #[async_trait]
    impl OnStart for Broken {
        async fn on_start(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
            Ok(())
        }
    }

    fn wrap<M: Module>(name: &str, module: M) -> Arc<ModuleWrapper> {
        Arc::new(ModuleWrapper::named(name, Registration::new(module).into_entry()))
    }

    #[tokio::test]
    async fn barrier_waits_for_every_module() {
        let done = Arc::new(AtomicUsize::new(0));
        let modules: Vec<_> = (0..4u64)
            .map(|i| {
                wrap(
                    &format!("slow-{i}"),
                    Slow {
                        delay: Duration::from_millis(5 * i),
                        done: done.clone(),
                    },
                )
            })
            .collect();

        PhaseRunner::new(None)
            .run(Phase::Create, modules.clone(), &LifecycleContext::detached())
            .await
            .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert!(modules.iter().all(|m| m.state() == LifecycleState::Created));
    }

    #[tokio::test]
    async fn failure_does_not_cancel_siblings() {
        let done = Arc::new(AtomicUsize::new(0));
        let slow = wrap(
            "slow",
            Slow {
                delay: Duration::from_millis(20),
                done: done.clone(),
            },
        );
        let broken = wrap("broken", Broken { panic: false });

        let err = PhaseRunner::new(None)
            .run(Phase::Create, vec![broken.clone(), slow.clone()], &LifecycleContext::detached())
            .await
            .unwrap_err();

        assert!(matches!(err, BootError::Hook { phase: Phase::Create, .. }));
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(slow.state(), LifecycleState::Created);
        assert_eq!(broken.state(), LifecycleState::Creating);
    }

    #[tokio::test]
    async fn panicking_hook_is_reported_with_its_module() {
        let broken = wrap("boom", Broken { panic: true });
        let err = PhaseRunner::new(None)
            .run(Phase::Create, vec![broken], &LifecycleContext::detached())
            .await
            .unwrap_err();

        match err {
            BootError::HookPanicked { module, phase } => {
                assert!(module.contains("boom"));
                assert_eq!(phase, Phase::Create);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn deadline_turns_into_phase_timeout() {
        let done = Arc::new(AtomicUsize::new(0));
        let stuck = wrap(
            "stuck",
            Slow {
                delay: Duration::from_secs(30),
                done,
            },
        );

        let err = PhaseRunner::new(Some(Duration::from_millis(20)))
            .run(Phase::Create, vec![stuck.clone()], &LifecycleContext::detached())
            .await
            .unwrap_err();

        assert!(matches!(err, BootError::PhaseTimeout { phase: Phase::Create, .. }));
        assert_eq!(stuck.state(), LifecycleState::Creating);
    }

    #[tokio::test]
    async fn empty_phase_is_a_no_op() {
        PhaseRunner::new(Some(Duration::from_millis(1)))
            .run(Phase::Destroy, Vec::new(), &LifecycleContext::detached())
            .await
            .unwrap();
    }
}

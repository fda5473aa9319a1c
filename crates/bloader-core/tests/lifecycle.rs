//! Phase ordering, barriers and shutdown through the public `Bootloader` API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bloader_core::{
    BootError, Bootloader, HookError, LifecycleContext, LifecycleState, Module, OnCreate,
    OnDestroy, OnMount, OnStart, Phase, Registration,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Begin,
    End,
}

type Journal = Arc<Mutex<Vec<(Phase, Edge, &'static str)>>>;

/// Sleeps `delay` inside every hook and journals begin/end.
struct Tracer {
    name: &'static str,
    delay: Duration,
    journal: Journal,
    fail_on: Option<Phase>,
}

impl Tracer {
    fn new(name: &'static str, delay_ms: u64, journal: &Journal) -> Self {
        Self {
            name,
            delay: Duration::from_millis(delay_ms),
            journal: journal.clone(),
            fail_on: None,
        }
    }

    async fn hook(&self, phase: Phase) -> Result<(), HookError> {
        self.journal.lock().push((phase, Edge::Begin, self.name));
        tokio::time::sleep(self.delay).await;
        self.journal.lock().push((phase, Edge::End, self.name));
        if self.fail_on == Some(phase) {
            return Err(format!("{} refused to {phase}", self.name).into());
        }
        Ok(())
    }
}

impl Module for Tracer {
    fn as_on_create(&self) -> Option<&dyn OnCreate> {
        Some(self)
    }
    fn as_on_mount(&self) -> Option<&dyn OnMount> {
        Some(self)
    }
    fn as_on_start(&self) -> Option<&dyn OnStart> {
        Some(self)
    }
    fn as_on_destroy(&self) -> Option<&dyn OnDestroy> {
        Some(self)
    }
}

#[async_trait]
impl OnCreate for Tracer {
    async fn on_create(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        self.hook(Phase::Create).await
    }
}

#[async_trait]
impl OnMount for Tracer {
    async fn on_mount(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        self.hook(Phase::Mount).await
    }
}

#[async_trait]
impl OnStart for Tracer {
    async fn on_start(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        self.hook(Phase::Start).await
    }
}

#[async_trait]
impl OnDestroy for Tracer {
    async fn on_destroy(&self, _ctx: &LifecycleContext) -> Result<(), HookError> {
        self.hook(Phase::Destroy).await
    }
}

fn position(entries: &[(Phase, Edge, &'static str)], phase: Phase, edge: Edge) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, (p, e, _))| *p == phase && *e == edge)
        .map(|(i, _)| i)
        .collect()
}

fn quiet() -> Arc<Bootloader> {
    Arc::new(Bootloader::builder().log(false).build())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_phase_is_a_barrier() {
    let journal = Journal::default();
    let loader = quiet();
    loader.add("slow", Registration::new(Tracer::new("slow", 30, &journal))).unwrap();
    loader.add("medium", Registration::new(Tracer::new("medium", 10, &journal))).unwrap();
    loader.add("fast", Registration::new(Tracer::new("fast", 0, &journal))).unwrap();

    loader.launch().await.unwrap();
    loader.shutdown();
    loader.wait().await.unwrap();

    let entries = journal.lock().clone();
    assert_eq!(entries.len(), 3 * 2 * Phase::ORDER.len());

    for pair in Phase::ORDER.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let last_end = position(&entries, prev, Edge::End).into_iter().max().unwrap();
        let first_begin = position(&entries, next, Edge::Begin).into_iter().min().unwrap();
        assert!(last_end < first_begin, "{next} began before {prev} finished");
    }

    // hooks inside one phase overlap: every create began before "slow" ended
    let create_begins = position(&entries, Phase::Create, Edge::Begin);
    let slow_end = entries
        .iter()
        .position(|e| *e == (Phase::Create, Edge::End, "slow"))
        .unwrap();
    assert!(create_begins.iter().all(|&b| b < slow_end));

    assert!(
        loader
            .modules()
            .iter()
            .all(|m| m.state() == LifecycleState::Destroyed)
    );
}

#[tokio::test]
async fn failing_hook_stops_launch_after_the_barrier() {
    let journal = Journal::default();
    let loader = quiet();
    let mut broken = Tracer::new("broken", 0, &journal);
    broken.fail_on = Some(Phase::Create);
    loader.add("broken", Registration::new(broken)).unwrap();
    loader.add("slow", Registration::new(Tracer::new("slow", 20, &journal))).unwrap();

    let err = loader.launch().await.unwrap_err();
    assert!(matches!(err, BootError::Hook { phase: Phase::Create, .. }));
    assert_eq!(err.module().map(|m| m.contains("broken")), Some(true));

    let entries = journal.lock().clone();
    // the sibling still ran to completion, nothing was mounted
    assert!(entries.contains(&(Phase::Create, Edge::End, "slow")));
    assert!(position(&entries, Phase::Mount, Edge::Begin).is_empty());

    let status = loader.status();
    assert_eq!(status.counts.created, 1);
    assert_eq!(status.counts.creating, 1);
    assert!(status.completed(Phase::Create).is_none());
}

#[tokio::test]
async fn run_blocks_until_shutdown() {
    let journal = Journal::default();
    let loader = quiet();
    loader.add("svc", Registration::new(Tracer::new("svc", 0, &journal))).unwrap();

    let running = {
        let loader = loader.clone();
        tokio::spawn(async move { loader.run().await })
    };

    // started but not destroyed until asked
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!running.is_finished());
    assert!(position(&journal.lock(), Phase::Destroy, Edge::Begin).is_empty());

    loader.shutdown();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(loader.is_shutdown());
    assert_eq!(loader.status().counts.destroyed, 1);
}

#[tokio::test]
async fn hooks_can_wait_for_shutdown() {
    struct Listener {
        stopped: Arc<Mutex<bool>>,
    }

    impl Module for Listener {
        fn as_on_start(&self) -> Option<&dyn OnStart> {
            Some(self)
        }
    }

    #[async_trait]
    impl OnStart for Listener {
        async fn on_start(&self, ctx: &LifecycleContext) -> Result<(), HookError> {
            // a serve loop would run here until asked to stop
            let ctx = ctx.clone();
            let stopped = self.stopped.clone();
            tokio::spawn(async move {
                ctx.shutdown_requested().await;
                *stopped.lock() = true;
            });
            Ok(())
        }
    }

    let stopped = Arc::new(Mutex::new(false));
    let loader = quiet();
    loader
        .add_by_type(Registration::new(Listener {
            stopped: stopped.clone(),
        }))
        .unwrap();

    loader.launch().await.unwrap();
    assert!(!*stopped.lock());
    loader.shutdown();
    loader.wait().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(*stopped.lock());
}

#[tokio::test]
async fn stuck_phase_times_out() {
    let journal = Journal::default();
    let loader = Bootloader::builder()
        .log(false)
        .phase_timeout(Duration::from_millis(20))
        .build();
    loader.add("stuck", Registration::new(Tracer::new("stuck", 5_000, &journal))).unwrap();

    let err = loader.launch().await.unwrap_err();
    assert!(matches!(err, BootError::PhaseTimeout { phase: Phase::Create, .. }));
}

#[tokio::test]
async fn launching_twice_is_an_order_violation() {
    let journal = Journal::default();
    let loader = quiet();
    loader.add("svc", Registration::new(Tracer::new("svc", 0, &journal))).unwrap();

    loader.launch().await.unwrap();
    let err = loader.launch().await.unwrap_err();
    assert!(matches!(
        err,
        BootError::LifecycleOrderViolation {
            phase: Phase::Create,
            expected: LifecycleState::Initial,
            actual: LifecycleState::Started,
            ..
        }
    ));
    assert!(matches!(loader.remove("svc"), Err(BootError::LifecycleOrderViolation { .. })));
}

//! # PollActor: the per-task polling loop.
//!
//! Each task gets one actor, spawned by the registry. The actor owns the task's attempt
//! number exclusively; nothing else reads or writes it.
//!
//! ## Round
//! ```text
//! loop {
//!   ├─► wait = delay.delay(attempt)      (panic ─► FALLBACK_WAIT)
//!   ├─► sleep(wait)                      (cancellable; zero wait = yield)
//!   ├─► cancelled? ─────────────────────► exit
//!   ├─► active = source.active_instructions(task)
//!   │     └─ Err ──► publish Error(ActiveLookupFailed), attempt unchanged, next round
//!   ├─► len(active) >= concurrency ─────► skip, attempt per SaturationPolicy
//!   ├─► limit = limit_for(spec, active)
//!   │     └─ Err ──► publish Error(InvalidLimit | LimitPanicked), attempt unchanged, next round
//!   ├─► cancelled? ─────────────────────► skip schedule, exit on next check
//!   ├─► batch = schedule(cfg)
//!   │     └─ Err ──► publish Error(ScheduleFailed), batch = []
//!   ├─► instructions = accept(batch, limit)
//!   │     └─ Err ──► publish Error(contract violation), instructions = []
//!   └─► instructions.is_empty()
//!         ├─ yes ──► attempt += 1
//!         └─ no  ──► attempt = 0, publish Task event per instruction (in order)
//! }
//! ```
//!
//! ## Rules
//! - Rounds run **sequentially** within one actor (never parallel).
//! - Cancellation is checked at **safe points** only: during the wait, before a round, and
//!   before `schedule`. In-flight caller calls always run to completion.
//! - Panics inside caller code are caught and reported like errors; the loop survives.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    core::round,
    error::{BoxError, PollError},
    events::{Bus, Event},
    policies::SaturationPolicy,
    tasks::{ActiveInstructions, Batch, ScheduleConfiguration, TaskSpec},
};

/// Wait used when the task's delay policy panics.
pub(crate) const FALLBACK_WAIT: Duration = Duration::from_secs(1);

/// How an actor's `run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActorExit {
    /// Termination was requested and the loop drained.
    Cancelled,
    /// The actor task itself panicked (outside of caller code).
    Panicked,
}

/// What a single round amounted to, for attempt bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    /// At least one instruction was emitted.
    Produced(usize),
    /// Schedule ran and nothing was emitted (empty, failed, or discarded batch).
    Empty,
    /// The concurrency ceiling was already met; schedule did not run.
    Saturated,
    /// The limit function returned an unusable value or panicked; schedule did not run.
    InvalidLimit,
    /// The active-instruction lookup failed; schedule did not run.
    LookupFailed,
    /// Termination arrived before schedule could start.
    Abandoned,
}

/// Polls one task until cancelled.
pub(crate) struct PollActor {
    spec: TaskSpec,
    name: Arc<str>,
    source: Arc<dyn ActiveInstructions>,
    bus: Bus,
    saturation: SaturationPolicy,
    attempt: u32,
}

impl PollActor {
    pub(crate) fn new(
        spec: TaskSpec,
        source: Arc<dyn ActiveInstructions>,
        bus: Bus,
        saturation: SaturationPolicy,
    ) -> Self {
        Self {
            name: spec.name_arc(),
            spec,
            source,
            bus,
            saturation,
            attempt: 0,
        }
    }

    /// Current attempt number (consecutive empty rounds).
    #[cfg(test)]
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Runs rounds until `token` is cancelled.
    pub(crate) async fn run(mut self, token: CancellationToken) -> ActorExit {
        info!(concurrency = self.spec.concurrency(), "polling loop started");

        loop {
            let wait = self.next_wait();
            if !Self::pause(wait, self.attempt, &token).await {
                break;
            }
            if token.is_cancelled() {
                break;
            }

            let outcome = self.round(&token).await;
            self.record(outcome);
        }

        info!(attempt = self.attempt, "polling loop stopped");
        ActorExit::Cancelled
    }

    /// Wait before the next round; a panicking delay policy falls back to [`FALLBACK_WAIT`].
    fn next_wait(&self) -> Duration {
        let delay = self.spec.delay();
        match catch_unwind(AssertUnwindSafe(|| delay.delay(self.attempt))) {
            Ok(wait) => wait,
            Err(payload) => {
                error!(
                    attempt = self.attempt,
                    panic = %round::panic_message(payload.as_ref()),
                    fallback = ?FALLBACK_WAIT,
                    "delay policy panicked"
                );
                FALLBACK_WAIT
            }
        }
    }

    /// Sleeps for `wait`, returning `false` if cancelled meanwhile.
    async fn pause(wait: Duration, attempt: u32, token: &CancellationToken) -> bool {
        if wait.is_zero() {
            tokio::task::yield_now().await;
            return !token.is_cancelled();
        }

        trace!(?wait, attempt, "waiting before next round");
        let sleep = time::sleep(wait);
        tokio::pin!(sleep);
        select! {
            biased;
            _ = token.cancelled() => false,
            _ = &mut sleep => true,
        }
    }

    /// Executes one round after the wait.
    pub(crate) async fn round(&self, token: &CancellationToken) -> RoundOutcome {
        let lookup = guarded(self.source.active_instructions(&self.name)).await;
        let active = match lookup {
            Ok(active) => active,
            Err(e) => {
                self.report(PollError::ActiveLookupFailed(e));
                return RoundOutcome::LookupFailed;
            }
        };

        let concurrency = self.spec.concurrency();
        if active.len() >= concurrency {
            debug!(active = active.len(), concurrency, "at concurrency ceiling, round skipped");
            return RoundOutcome::Saturated;
        }

        let limit = match round::limit_for(&self.spec, &active) {
            Ok(limit) => limit,
            Err(e) => {
                self.report(e);
                return RoundOutcome::InvalidLimit;
            }
        };

        if token.is_cancelled() {
            debug!("termination requested, schedule not started");
            return RoundOutcome::Abandoned;
        }

        let cfg = ScheduleConfiguration {
            active_task_instructions: active,
            concurrency,
            limit,
            task_name: Arc::clone(&self.name),
        };
        let batch = match guarded(self.spec.schedule().schedule(cfg)).await {
            Ok(batch) => batch,
            Err(e) => {
                self.report(PollError::ScheduleFailed(e));
                Batch::empty()
            }
        };

        let instructions = match round::accept(batch, limit) {
            Ok(instructions) => instructions,
            Err(e) => {
                self.report(e);
                Vec::new()
            }
        };

        if instructions.is_empty() {
            return RoundOutcome::Empty;
        }

        let produced = instructions.len();
        debug!(produced, limit, "publishing instructions");
        for instruction in instructions {
            self.bus
                .publish(Event::task(Arc::clone(&self.name), instruction));
        }
        RoundOutcome::Produced(produced)
    }

    /// Applies a round's outcome to the attempt number.
    pub(crate) fn record(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::Produced(_) => self.attempt = 0,
            RoundOutcome::Empty => self.attempt = self.attempt.saturating_add(1),
            RoundOutcome::Saturated => self.attempt = self.saturation.next_attempt(self.attempt),
            RoundOutcome::InvalidLimit | RoundOutcome::LookupFailed | RoundOutcome::Abandoned => {}
        }
    }

    fn report(&self, err: PollError) {
        warn!(error = %err, label = err.as_label(), "round failed");
        self.bus.publish(Event::error(Arc::clone(&self.name), err));
    }
}

/// Awaits caller code, turning a panic into an error.
async fn guarded<T, F>(fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(format!("panicked: {}", round::panic_message(payload.as_ref())).into()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::policies::DelayPolicy;
    use crate::tasks::{ActiveFn, Instruction, ScheduleFn, free_slots};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<Event>>>;

    fn collect(bus: &Bus) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Task, EventKind::Error] {
            let sink = Arc::clone(&log);
            bus.subscribe(kind, move |ev| sink.lock().unwrap().push(ev.clone()));
        }
        log
    }

    fn active(items: &'static [&'static str]) -> Arc<dyn ActiveInstructions> {
        ActiveFn::arc(move |_task: String| async move {
            Ok::<_, BoxError>(items.iter().map(|s| s.to_string()).collect::<Vec<Instruction>>())
        })
    }

    fn returning(batch: Batch, calls: Arc<AtomicUsize>) -> TaskSpec {
        TaskSpec::new(
            "t",
            ScheduleFn::arc(move |_cfg: ScheduleConfiguration| {
                calls.fetch_add(1, Ordering::SeqCst);
                let batch = batch.clone();
                async move { Ok::<_, BoxError>(batch) }
            }),
        )
    }

    fn actor(spec: TaskSpec, source: Arc<dyn ActiveInstructions>, bus: &Bus) -> PollActor {
        PollActor::new(spec, source, bus.clone(), SaturationPolicy::Hold)
    }

    #[tokio::test]
    async fn test_produced_round_resets_attempt_and_keeps_order() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(vec!["a", "b"]), calls.clone()).with_concurrency(2);
        let mut actor = actor(spec, active(&[]), &bus);
        actor.attempt = 4;

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::Produced(2));
        assert_eq!(actor.attempt(), 0);
        let got: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.instruction().map(str::to_string))
            .collect();
        assert_eq!(got, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_round_increments_attempt() {
        let bus = Bus::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut actor = actor(returning(Batch::empty(), calls.clone()), active(&[]), &bus);

        for expected in 1..=3 {
            let outcome = actor.round(&CancellationToken::new()).await;
            actor.record(outcome);
            assert_eq!(actor.attempt(), expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_saturated_round_skips_schedule() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(vec!["a"]), calls.clone());
        let mut actor = actor(spec, active(&["x"]), &bus);
        actor.attempt = 2;

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::Saturated);
        assert_eq!(actor.attempt(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_saturated_round_advances_when_configured() {
        let bus = Bus::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::empty(), calls);
        let mut actor = PollActor::new(spec, active(&["x"]), bus, SaturationPolicy::Advance);

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);
        assert_eq!(actor.attempt(), 1);
    }

    #[tokio::test]
    async fn test_invalid_limit_reports_and_skips_schedule() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(vec!["a"]), calls.clone()).with_limit(|_, _| -3);
        let mut actor = actor(spec, active(&[]), &bus);

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::InvalidLimit);
        assert_eq!(actor.attempt(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            log[0].poll_error(),
            Some(PollError::InvalidLimit { limit: -3 })
        ));
    }

    #[tokio::test]
    async fn test_panicking_limit_reports_and_skips_schedule() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(vec!["a"]), calls.clone())
            .with_limit(|_, _| panic!("quota service down"));
        let mut actor = actor(spec, active(&[]), &bus);
        actor.attempt = 2;

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::InvalidLimit);
        assert_eq!(actor.attempt(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            log[0].poll_error(),
            Some(PollError::LimitPanicked { message }) if message == "quota service down"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_panicking_limit() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let limit_calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&limit_calls);
        let spec = returning(Batch::from(vec!["a"]), calls.clone())
            .with_delay(Duration::from_millis(10))
            .with_limit(move |concurrency, active| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first call");
                }
                free_slots(concurrency, active)
            });
        let token = CancellationToken::new();
        let handle = tokio::spawn(actor(spec, active(&[]), &bus).run(token.clone()));

        time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.is_finished());
        token.cancel();
        assert_eq!(handle.await.unwrap(), ActorExit::Cancelled);

        assert!(calls.load(Ordering::SeqCst) >= 10);
        let log = log.lock().unwrap();
        let errors: Vec<&PollError> = log.iter().filter_map(Event::poll_error).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PollError::LimitPanicked { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_delay_falls_back_and_keeps_polling() {
        let bus = Bus::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let delays = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&delays);
        let spec = returning(Batch::empty(), calls.clone()).with_delay(DelayPolicy::custom(
            move |_attempt| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("bad delay");
                }
                Duration::from_millis(10)
            },
        ));
        let token = CancellationToken::new();
        let handle = tokio::spawn(actor(spec, active(&[]), &bus).run(token.clone()));

        time::sleep(FALLBACK_WAIT - Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        token.cancel();
        assert_eq!(handle.await.unwrap(), ActorExit::Cancelled);

        assert!(calls.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test]
    async fn test_raw_non_sequence_counts_as_empty() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(json!({"id": "x"})), calls).with_concurrency(3);
        let mut actor = actor(spec, active(&[]), &bus);
        actor.attempt = 1;

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::Empty);
        assert_eq!(actor.attempt(), 2);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.iter().all(|e| e.kind() == EventKind::Error));
        assert!(matches!(
            log[0].poll_error(),
            Some(PollError::NotASequence { found: "object" })
        ));
    }

    #[tokio::test]
    async fn test_raw_non_string_member_discards_batch() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(json!(["a", 1])), calls).with_concurrency(3);
        let mut actor = actor(spec, active(&[]), &bus);

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::Empty);
        assert_eq!(actor.attempt(), 1);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].instruction().is_none());
        assert!(matches!(
            log[0].poll_error(),
            Some(PollError::NonStringInstruction { index: 1 })
        ));
    }

    #[tokio::test]
    async fn test_schedule_error_counts_as_empty() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let spec = TaskSpec::new(
            "t",
            ScheduleFn::arc(|_cfg: ScheduleConfiguration| async {
                Err::<Batch, BoxError>("db unavailable".into())
            }),
        );
        let mut actor = actor(spec, active(&[]), &bus);

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::Empty);
        assert_eq!(actor.attempt(), 1);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind(), EventKind::Error);
        assert_eq!(
            log[0].poll_error().map(ToString::to_string).as_deref(),
            Some("schedule failed: db unavailable")
        );
    }

    #[tokio::test]
    async fn test_schedule_panic_is_reported() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let spec = TaskSpec::new(
            "t",
            ScheduleFn::arc(|_cfg: ScheduleConfiguration| async {
                if true {
                    panic!("bad schedule");
                }
                Ok::<_, BoxError>(Batch::empty())
            }),
        );
        let actor = actor(spec, active(&[]), &bus);

        let outcome = actor.round(&CancellationToken::new()).await;

        assert_eq!(outcome, RoundOutcome::Empty);
        let log = log.lock().unwrap();
        assert!(matches!(
            log[0].poll_error(),
            Some(PollError::ScheduleFailed(e)) if e.to_string() == "panicked: bad schedule"
        ));
    }

    #[tokio::test]
    async fn test_over_limit_batch_discarded() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::from(vec!["1", "2", "3"]), calls).with_limit(|_, _| 1);
        let mut actor = actor(spec, active(&[]), &bus);

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::Empty);
        assert_eq!(actor.attempt(), 1);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].poll_error().is_some_and(PollError::is_contract_violation));
    }

    #[tokio::test]
    async fn test_lookup_failure_reported() {
        let bus = Bus::new(8);
        let log = collect(&bus);
        let calls = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn ActiveInstructions> = ActiveFn::arc(|_task: String| async {
            Err::<Vec<Instruction>, BoxError>("timeout".into())
        });
        let mut actor = actor(returning(Batch::from(vec!["a"]), calls.clone()), source, &bus);

        let outcome = actor.round(&CancellationToken::new()).await;
        actor.record(outcome);

        assert_eq!(outcome, RoundOutcome::LookupFailed);
        assert_eq!(actor.attempt(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            log.lock().unwrap()[0].poll_error(),
            Some(PollError::ActiveLookupFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_schedule_receives_configuration() {
        let bus = Bus::new(8);
        let seen: Arc<Mutex<Option<ScheduleConfiguration>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let spec = TaskSpec::new(
            "reports",
            ScheduleFn::arc(move |cfg: ScheduleConfiguration| {
                *sink.lock().unwrap() = Some(cfg);
                async { Ok::<_, BoxError>(Batch::empty()) }
            }),
        )
        .with_concurrency(3);
        let actor = actor(spec, active(&["r-1"]), &bus);

        actor.round(&CancellationToken::new()).await;

        let cfg = seen.lock().unwrap().clone().unwrap();
        assert_eq!(cfg.task_name.as_ref(), "reports");
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.limit, 2);
        assert_eq!(cfg.active_task_instructions, vec!["r-1".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_before_schedule_abandons_round() {
        let bus = Bus::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let actor = actor(returning(Batch::from(vec!["a"]), calls.clone()), active(&[]), &bus);
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(actor.round(&token).await, RoundOutcome::Abandoned);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_long_wait() {
        let bus = Bus::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = returning(Batch::empty(), calls.clone()).with_delay(Duration::from_secs(3600));
        let token = CancellationToken::new();
        let handle = tokio::spawn(actor(spec, active(&[]), &bus).run(token.clone()));

        time::sleep(Duration::from_millis(10)).await;
        let started = time::Instant::now();
        token.cancel();
        let exit = handle.await.unwrap();

        assert_eq!(exit, ActorExit::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

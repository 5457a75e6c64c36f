//! Attestation loop: build payload, submit, wait, repeat.
//!
//! Hardware facts are detected once and reused for every cycle; only the
//! nonce changes between payloads. Nothing is persisted, so the loop can be
//! dropped or cancelled at any await point.

use crate::anti_spoof::{self, SpoofWarning};
use crate::client::{classify, AttestTransport, SubmitOutcome};
use crate::config::{MinerConfig, RunMode};
use crate::host::Host;
use crate::identity::{self, HardwareFingerprint};
use crate::payload::{AttestationRecord, ReportBlock};
use crate::processor::ProcessorDescription;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Wall-clock source for nonces.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Waits between cycles.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`. Returns `true` if `cancel` was raised meanwhile.
    async fn sleep(&self, duration: Duration, cancel: &AtomicBool) -> bool;
}

/// Tokio sleep, checking the cancel flag every second.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration, cancel: &AtomicBool) -> bool {
        let start = Instant::now();
        while start.elapsed() < duration {
            if cancel.load(Ordering::Relaxed) {
                return true;
            }
            let left = duration.saturating_sub(start.elapsed());
            tokio::time::sleep(left.min(Duration::from_secs(1))).await;
        }
        cancel.load(Ordering::Relaxed)
    }
}

/// Everything detected about the machine at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareFacts {
    pub processor: ProcessorDescription,
    pub fingerprint: HardwareFingerprint,
    pub os_version: String,
}

impl HardwareFacts {
    /// Run every probe once. Never fails.
    pub fn detect<H: Host + ?Sized>(host: &H) -> Self {
        Self {
            processor: ProcessorDescription::probe(host),
            fingerprint: HardwareFingerprint::collect(host),
            os_version: identity::os_version(host),
        }
    }

    pub fn warnings(&self) -> Vec<SpoofWarning> {
        anti_spoof::evaluate(&self.fingerprint)
    }
}

/// Scheduler states.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerState {
    Idle,
    BuildingPayload,
    Submitting(AttestationRecord),
    Waiting(Duration),
    Finished,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Payloads built for submission (or for a dry run).
    pub cycles: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub unreachable: u64,
    pub last_outcome: Option<SubmitOutcome>,
    /// The payload built in preview or dry-run mode.
    pub preview: Option<AttestationRecord>,
}

impl RunSummary {
    fn record(&mut self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Accepted { .. } => self.accepted += 1,
            SubmitOutcome::Rejected { .. } => self.rejected += 1,
            SubmitOutcome::Unreachable { .. } => self.unreachable += 1,
        }
        self.last_outcome = Some(outcome);
    }
}

/// Drives attestation cycles for one process run.
pub struct Scheduler<T, S, C> {
    config: MinerConfig,
    facts: HardwareFacts,
    report: ReportBlock,
    transport: T,
    sleeper: S,
    clock: C,
    last_nonce: u64,
}

impl<T: AttestTransport, S: Sleeper, C: Clock> Scheduler<T, S, C> {
    pub fn new(
        config: MinerConfig,
        facts: HardwareFacts,
        transport: T,
        sleeper: S,
        clock: C,
    ) -> Self {
        let report = ReportBlock::new(&config.client_version, &facts.os_version);
        Self {
            config,
            facts,
            report,
            transport,
            sleeper,
            clock,
            last_nonce: 0,
        }
    }

    /// Build a fresh record. The nonce never goes backwards within a run.
    pub fn build_record(&mut self) -> AttestationRecord {
        self.last_nonce = self.last_nonce.max(self.clock.now_millis());
        AttestationRecord::build(
            &self.config.wallet,
            &self.facts.processor,
            &self.facts.fingerprint,
            &self.report,
            self.last_nonce,
        )
    }

    /// Run until the mode says stop or `cancel` is raised.
    pub async fn run(&mut self, cancel: &AtomicBool) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut state = SchedulerState::Idle;

        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Attestation loop cancelled");
                break;
            }

            state = match state {
                SchedulerState::Idle => {
                    info!(
                        mode = ?self.config.mode,
                        interval_s = self.config.interval.as_secs(),
                        "Starting attestation loop"
                    );
                    SchedulerState::BuildingPayload
                }
                SchedulerState::BuildingPayload => {
                    let record = self.build_record();
                    debug!(nonce = record.nonce, "Built attestation payload");
                    match self.config.mode {
                        RunMode::ShowPayload => {
                            summary.preview = Some(record);
                            SchedulerState::Finished
                        }
                        RunMode::DryRun => {
                            summary.cycles += 1;
                            info!(
                                miner_id = %record.miner_id,
                                nonce = record.nonce,
                                "DRY RUN - would submit attestation"
                            );
                            summary.preview = Some(record);
                            SchedulerState::Finished
                        }
                        RunMode::Loop | RunMode::Once => SchedulerState::Submitting(record),
                    }
                }
                SchedulerState::Submitting(record) => {
                    summary.cycles += 1;
                    info!(
                        cycle = summary.cycles,
                        miner_id = %record.miner_id,
                        "Submitting attestation"
                    );
                    let outcome = classify(self.transport.submit(&record).await);
                    log_outcome(&outcome);
                    summary.record(outcome);
                    if self.config.mode == RunMode::Once {
                        SchedulerState::Finished
                    } else {
                        SchedulerState::Waiting(self.config.interval)
                    }
                }
                SchedulerState::Waiting(interval) => {
                    info!("Sleeping {}s", interval.as_secs());
                    if self.sleeper.sleep(interval, cancel).await {
                        info!("Attestation loop cancelled");
                        break;
                    }
                    SchedulerState::BuildingPayload
                }
                SchedulerState::Finished => break,
            };
        }

        summary
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }
}

fn log_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Accepted { next_window } => {
            info!("Attestation accepted");
            if let Some(window) = next_window {
                info!(next_window = %window, "Next window");
            }
        }
        SubmitOutcome::Rejected { reason } => warn!(reason = %reason, "Attestation rejected"),
        SubmitOutcome::Unreachable { detail } => {
            error!(error = %detail, "Could not reach node")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AttestResponse;
    use crate::config::{CliOverrides, FileConfig};
    use crate::error::{MinerError, MinerResult};
    use crate::host::fake::FakeHost;
    use crate::processor::SparcFamily;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    /// Replays scripted responses; `Err` strings become HTTP failures.
    #[derive(Default)]
    struct FakeTransport {
        script: Mutex<VecDeque<Result<AttestResponse, String>>>,
        nonces: Mutex<Vec<u64>>,
    }

    impl FakeTransport {
        fn new(script: Vec<Result<AttestResponse, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                nonces: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.nonces.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AttestTransport for FakeTransport {
        async fn submit(&self, record: &AttestationRecord) -> MinerResult<AttestResponse> {
            self.nonces.lock().unwrap().push(record.nonce);
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(resp)) => Ok(resp),
                Some(Err(e)) => Err(MinerError::NodeApi(e)),
                None => Err(MinerError::Network("script exhausted".into())),
            }
        }
    }

    /// Returns immediately; raises the cancel flag on the `stop_after`-th sleep.
    struct FakeSleeper {
        stop_after: usize,
        slept: Mutex<Vec<Duration>>,
    }

    impl FakeSleeper {
        fn new(stop_after: usize) -> Self {
            Self {
                stop_after,
                slept: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Sleeper for FakeSleeper {
        async fn sleep(&self, duration: Duration, cancel: &AtomicBool) -> bool {
            let mut slept = self.slept.lock().unwrap();
            slept.push(duration);
            if slept.len() >= self.stop_after {
                cancel.store(true, Ordering::Relaxed);
                return true;
            }
            false
        }
    }

    /// Steps through fixed timestamps, repeating the last one.
    struct FakeClock {
        times: Vec<u64>,
        next: AtomicU64,
    }

    impl FakeClock {
        fn new(times: Vec<u64>) -> Self {
            Self {
                times,
                next: AtomicU64::new(0),
            }
        }
    }

    impl Clock for FakeClock {
        fn now_millis(&self) -> u64 {
            let i = self.next.fetch_add(1, Ordering::Relaxed) as usize;
            self.times[i.min(self.times.len() - 1)]
        }
    }

    fn ok() -> Result<AttestResponse, String> {
        Ok(AttestResponse {
            ok: true,
            next_window: None,
            error: None,
        })
    }

    fn rejected(reason: &str) -> Result<AttestResponse, String> {
        Ok(AttestResponse {
            ok: false,
            next_window: None,
            error: Some(reason.into()),
        })
    }

    fn config(mode: RunMode) -> MinerConfig {
        let cli = CliOverrides {
            wallet: "alice".into(),
            mode,
            ..Default::default()
        };
        MinerConfig::resolve(cli, FileConfig::default()).unwrap()
    }

    fn facts() -> HardwareFacts {
        let host = FakeHost::new()
            .with_output("/usr/sbin/prtconf -v", "value='SUNW,UltraSPARC-II'\n")
            .with_output(
                "/usr/sbin/psrinfo -v",
                "Status of virtual processor 0\n  operates at 296 MHz,\n",
            )
            .with_output("/usr/bin/hostid", "8f3c2a11\n")
            .with_output("/usr/sbin/prtconf", "Memory size: 512 Megabytes\n")
            .with_output("/usr/sbin/prtconf -V", "OBP 3.11.1 1997/12/03 15:53\n");
        HardwareFacts::detect(&host)
    }

    fn scheduler(
        mode: RunMode,
        script: Vec<Result<AttestResponse, String>>,
        stop_after: usize,
    ) -> Scheduler<FakeTransport, FakeSleeper, FakeClock> {
        Scheduler::new(
            config(mode),
            facts(),
            FakeTransport::new(script),
            FakeSleeper::new(stop_after),
            FakeClock::new(vec![1_000, 2_000, 3_000]),
        )
    }

    #[test]
    fn test_detected_facts() {
        let facts = facts();
        assert_eq!(facts.processor.family, SparcFamily::UltraSparcII);
        assert_eq!(facts.processor.family.multiplier(), 1.6);
        assert_eq!(facts.processor.clock_mhz, 296);
        assert_eq!(facts.fingerprint.memory_mb, 512);
        assert_eq!(facts.os_version, "Solaris");
        assert!(facts.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_once_submits_exactly_once() {
        let mut s = scheduler(RunMode::Once, vec![ok()], usize::MAX);
        let summary = s.run(&AtomicBool::new(false)).await;
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(s.transport().calls(), 1);
        assert!(s.sleeper().slept.lock().unwrap().is_empty());
        assert!(matches!(
            summary.last_outcome,
            Some(SubmitOutcome::Accepted { .. })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let mut s = scheduler(RunMode::DryRun, vec![], usize::MAX);
        let summary = s.run(&AtomicBool::new(false)).await;
        assert_eq!(s.transport().calls(), 0);
        assert_eq!(summary.cycles, 1);
        let preview = summary.preview.unwrap();
        assert_eq!(preview.miner_id, "alice-8f3c2a11");
        assert!(preview.fingerprint.all_passed);
    }

    #[test]
    fn test_show_payload_makes_no_calls() {
        let mut s = scheduler(RunMode::ShowPayload, vec![], usize::MAX);
        let summary = tokio_test::block_on(s.run(&AtomicBool::new(false)));
        assert_eq!(s.transport().calls(), 0);
        assert_eq!(summary.cycles, 0);
        assert_eq!(summary.preview.unwrap().device.family, SparcFamily::UltraSparcII);
    }

    #[tokio::test]
    async fn test_http_500_keeps_looping() {
        let mut s = scheduler(RunMode::Loop, vec![Err("HTTP 500".into()), ok()], 2);
        let summary = s.run(&AtomicBool::new(false)).await;
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.unreachable, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(
            *s.sleeper().slept.lock().unwrap(),
            vec![Duration::from_secs(300), Duration::from_secs(300)]
        );
    }

    #[tokio::test]
    async fn test_rejection_keeps_looping() {
        let mut s = scheduler(
            RunMode::Loop,
            vec![rejected("epoch closed"), rejected("too soon"), ok()],
            3,
        );
        let summary = s.run(&AtomicBool::new(false)).await;
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(s.transport().calls(), 3);
    }

    #[tokio::test]
    async fn test_each_cycle_gets_fresh_nonce() {
        let mut s = scheduler(RunMode::Loop, vec![ok(), ok(), ok()], 3);
        s.run(&AtomicBool::new(false)).await;
        assert_eq!(*s.transport().nonces.lock().unwrap(), vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_nonce_never_decreases() {
        let mut s = Scheduler::new(
            config(RunMode::Loop),
            facts(),
            FakeTransport::default(),
            FakeSleeper::new(1),
            FakeClock::new(vec![5_000, 4_000, 6_000]),
        );
        let nonces: Vec<u64> = (0..3).map(|_| s.build_record().nonce).collect();
        assert_eq!(nonces, vec![5_000, 5_000, 6_000]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut s = scheduler(RunMode::Loop, vec![ok()], usize::MAX);
        let summary = s.run(&AtomicBool::new(true)).await;
        assert_eq!(summary, RunSummary::default());
        assert_eq!(s.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_tokio_sleeper_honours_cancel() {
        let cancel = AtomicBool::new(true);
        let started = Instant::now();
        assert!(TokioSleeper.sleep(Duration::from_secs(60), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(5));

        let cancel = AtomicBool::new(false);
        assert!(!TokioSleeper.sleep(Duration::from_millis(10), &cancel).await);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}

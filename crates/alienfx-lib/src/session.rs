//! Device session: coalesces zone updates into transactions and sends them.
//!
//! Producers call [`SessionHandle::set_pending`] from any thread. That
//! stores the color and raises a single "work requested" flag; it never
//! waits on USB I/O. One worker thread per session picks the flag up,
//! drains the zone table, builds a transaction and sends it packet by
//! packet.
//!
//! The transport sits behind a mutex that doubles as the exclusion guard:
//! drain, build and send all happen while holding it, so two runs can
//! never interleave packets and the device always sees colors in the
//! order they were drained.
//!
//! ```text
//!            set_pending              worker picks up
//!   Idle ────────────────► WorkScheduled ──────────────► Sending
//!    ▲                         ▲                           │
//!    │       run done          │  run done, set_pending    │
//!    └─────────────────────────┴───── arrived meanwhile ◄──┘
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::command::ResetMode;
use crate::device::{Transport, TransportError};
use crate::protocol::DEFAULT_SETTLE_DELAY_MS;
use crate::transaction;
use crate::zones::{self, ZoneId, ZoneTable};

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pause after the reset packet before the rest of the transaction.
    pub settle_delay: Duration,
    /// Send nothing when a run finds no pending colors.
    pub skip_empty: bool,
    /// Reset variant opening every transaction.
    pub reset_mode: ResetMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            skip_empty: true,
            reset_mode: ResetMode::AllLightsOn,
        }
    }
}

/// Where the worker currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    WorkScheduled,
    Sending,
}

/// Counters accumulated over the session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Transactions sent completely.
    pub runs: u64,
    /// Runs aborted by a transport error.
    pub failed_runs: u64,
    /// Runs that found nothing to send.
    pub skipped_runs: u64,
    /// Packets accepted by the transport, partial runs included.
    pub packets_sent: u64,
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Whole transaction delivered.
    Sent { zones: usize, packets: usize },
    /// Nothing pending and `skip_empty` set, or the session is shut down.
    Skipped,
    /// Packet `sent` failed; the remaining packets were dropped. The next
    /// run's leading reset returns the device to a known state.
    Aborted { sent: usize, error: TransportError },
}

#[derive(Debug)]
struct Schedule {
    state: SessionState,
    /// A request arrived that no run has picked up yet.
    requested: bool,
    /// Runs in progress, worker and `flush` callers together.
    active: usize,
    shutdown: bool,
}

struct Shared {
    zones: ZoneTable,
    config: SessionConfig,
    schedule: Mutex<Schedule>,
    /// Signalled when work is requested or on shutdown.
    wake: Condvar,
    /// Signalled when the worker returns to `Idle`.
    idle: Condvar,
    /// Exclusion guard: held for the whole drain → build → send sequence.
    transport: Mutex<Box<dyn Transport>>,
    stats: Mutex<SessionStats>,
}

/// Recover the data from a poisoned lock; every critical section here
/// leaves the protected value consistent.
fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    /// Raise the work flag. Returns `false` once shut down.
    fn schedule(&self) -> bool {
        let mut s = lock(&self.schedule);
        if s.shutdown {
            return false;
        }
        s.requested = true;
        if s.state == SessionState::Idle {
            s.state = SessionState::WorkScheduled;
            self.wake.notify_one();
        }
        true
    }

    /// One drain → build → send pass under the exclusion guard.
    fn run(&self) -> RunOutcome {
        let mut transport = lock(&self.transport);

        let drained = self.zones.drain_pending();
        if drained.is_empty() && self.config.skip_empty {
            lock(&self.stats).skipped_runs += 1;
            log::debug!("run: nothing pending, skipped");
            return RunOutcome::Skipped;
        }

        let tx = transaction::build_with(self.config.reset_mode, &drained);
        log::debug!("run: {} zone(s), {} packet(s)", tx.zone_count(), tx.len());

        for (i, packet) in tx.packets().iter().enumerate() {
            if let Err(error) = transport.send(packet) {
                let mut stats = lock(&self.stats);
                stats.failed_runs += 1;
                stats.packets_sent += i as u64;
                log::warn!(
                    "transaction aborted at packet {}/{} ({packet}): {error}",
                    i + 1,
                    tx.len()
                );
                return RunOutcome::Aborted { sent: i, error };
            }
            log::trace!("sent {packet}");
            if i == 0 && !self.config.settle_delay.is_zero() {
                std::thread::sleep(self.config.settle_delay);
            }
        }

        let mut stats = lock(&self.stats);
        stats.runs += 1;
        stats.packets_sent += tx.len() as u64;
        RunOutcome::Sent {
            zones: tx.zone_count(),
            packets: tx.len(),
        }
    }

    /// Enter `Sending` for one run. The run drains everything, so any
    /// outstanding request is consumed by it.
    fn begin_run(s: &mut Schedule) {
        s.requested = false;
        s.active += 1;
        s.state = SessionState::Sending;
    }

    /// Leave `Sending` once the last concurrent run is done.
    fn end_run(&self) {
        let mut s = lock(&self.schedule);
        s.active -= 1;
        if s.active > 0 {
            return;
        }
        if s.requested && !s.shutdown {
            s.state = SessionState::WorkScheduled;
            self.wake.notify_one();
        } else {
            s.state = SessionState::Idle;
            self.idle.notify_all();
        }
    }

    fn worker_loop(&self) {
        loop {
            {
                let mut s = lock(&self.schedule);
                while !s.requested && !s.shutdown {
                    s = self.wake.wait(s).unwrap_or_else(|e| e.into_inner());
                }
                if s.shutdown {
                    if s.active == 0 {
                        s.state = SessionState::Idle;
                    }
                    self.idle.notify_all();
                    return;
                }
                Self::begin_run(&mut s);
            }

            self.run();
            self.end_run();
        }
    }
}

/// Cloneable producer side of a session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Queue `color` for `zone` and request a run.
    ///
    /// Returns once the request is recorded. After shutdown the color is
    /// still stored but no run is scheduled.
    pub fn set_pending(&self, zone: ZoneId, color: u16) -> zones::Result<()> {
        self.shared.zones.set_pending(zone, color)?;
        if !self.shared.schedule() {
            log::debug!("session shut down, zone {zone} update not scheduled");
        }
        Ok(())
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.shared.zones
    }
}

/// Owner of the worker thread. Dropping it shuts the session down.
pub struct Session {
    handle: SessionHandle,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawn the worker and return the running session.
    pub fn start(
        zones: ZoneTable,
        transport: impl Transport + 'static,
        config: SessionConfig,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            zones,
            config,
            schedule: Mutex::new(Schedule {
                state: SessionState::Idle,
                requested: false,
                active: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
            transport: Mutex::new(Box::new(transport)),
            stats: Mutex::new(SessionStats::default()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("alienfx-session".into())
            .spawn(move || worker_shared.worker_loop())?;

        Ok(Session {
            handle: SessionHandle { shared },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.handle.shared.zones
    }

    /// See [`SessionHandle::set_pending`].
    pub fn set_pending(&self, zone: ZoneId, color: u16) -> zones::Result<()> {
        self.handle.set_pending(zone, color)
    }

    /// Run one transaction now, on the calling thread.
    ///
    /// The session reports `Sending` for the duration, so [`wait_idle`]
    /// also waits for flushes. Blocks until any in-flight run finishes.
    /// Returns `Skipped` after shutdown.
    ///
    /// [`wait_idle`]: Session::wait_idle
    pub fn flush(&self) -> RunOutcome {
        let shared = &self.handle.shared;
        {
            let mut s = lock(&shared.schedule);
            if s.shutdown {
                return RunOutcome::Skipped;
            }
            Shared::begin_run(&mut s);
        }
        let outcome = shared.run();
        shared.end_run();
        outcome
    }

    /// Block until no run (worker or `flush`) is in progress and no request
    /// is outstanding.
    pub fn wait_idle(&self) {
        let shared = &self.handle.shared;
        let mut s = lock(&shared.schedule);
        while s.state != SessionState::Idle && !s.shutdown {
            s = shared.idle.wait(s).unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.handle.shared.schedule).state
    }

    pub fn stats(&self) -> SessionStats {
        *lock(&self.handle.shared.stats)
    }

    /// Stop scheduling, wait for the in-flight run, join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        {
            let mut s = lock(&self.handle.shared.schedule);
            s.shutdown = true;
            self.handle.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("session worker panicked");
            }
            if self.handle.shared.zones.has_pending() {
                log::debug!("session stopped with unsent colors");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{self, Command};
    use crate::device::mock::MockTransport;
    use crate::models::ZoneDescriptor;

    const DESCS: [ZoneDescriptor; 3] = [
        ZoneDescriptor {
            name: "keyboard",
            region: 0x0001,
        },
        ZoneDescriptor {
            name: "speaker-left",
            region: 0x0020,
        },
        ZoneDescriptor {
            name: "logo",
            region: 0x0100,
        },
    ];

    fn quick_config() -> SessionConfig {
        SessionConfig {
            settle_delay: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn start(mock: &MockTransport, config: SessionConfig) -> Session {
        let zones = ZoneTable::from_descriptors(&DESCS).unwrap();
        Session::start(zones, mock.clone(), config).unwrap()
    }

    #[test]
    fn default_config_values() {
        let c = SessionConfig::default();
        assert_eq!(c.settle_delay, Duration::from_millis(1));
        assert!(c.skip_empty);
        assert_eq!(c.reset_mode, ResetMode::AllLightsOn);
    }

    #[test]
    fn new_session_is_idle() {
        let mock = MockTransport::new();
        let session = start(&mock, quick_config());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stats(), SessionStats::default());
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn set_pending_triggers_worker_run() {
        let mock = MockTransport::new();
        let session = start(&mock, quick_config());
        session.set_pending(ZoneId(0), 0x0FFF).unwrap();
        session.wait_idle();

        assert_eq!(
            mock.sent_hex(),
            vec![
                "02 07 04 00 00 00 00 00 00",
                "02 03 00 00 00 01 FF F0 00",
                "02 04 00 00 00 00 00 00 00",
                "02 05 00 00 00 00 00 00 00",
            ]
        );
        assert_eq!(session.stats().runs, 1);
        assert_eq!(session.stats().packets_sent, 4);
    }

    #[test]
    fn set_pending_unknown_zone_is_rejected() {
        let mock = MockTransport::new();
        let session = start(&mock, quick_config());
        assert!(session.set_pending(ZoneId(7), 1).is_err());
        session.wait_idle();
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn flush_sends_on_caller_thread() {
        let mock = MockTransport::new();
        let session = start(&mock, quick_config());
        session.zones().set_pending(ZoneId(2), 0x0000).unwrap();
        let outcome = session.flush();
        assert_eq!(
            outcome,
            RunOutcome::Sent {
                zones: 1,
                packets: 4
            }
        );
    }

    #[test]
    fn flush_reports_sending_until_done() {
        let mock = MockTransport::new();
        mock.set_delay(Duration::from_millis(30));
        let session = start(&mock, quick_config());
        session.zones().set_pending(ZoneId(0), 0x0FFF).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| session.flush());
            while mock.attempts() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            assert_eq!(session.state(), SessionState::Sending);
            session.wait_idle();
            assert_eq!(mock.sent().len(), 4, "wait_idle returned mid-flush");
            assert_eq!(session.state(), SessionState::Idle);
        });
    }

    #[test]
    fn set_pending_during_flush_is_picked_up_by_worker() {
        let mock = MockTransport::new();
        mock.set_delay(Duration::from_millis(10));
        let session = start(&mock, quick_config());
        session.zones().set_pending(ZoneId(0), 0x0FFF).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| session.flush());
            while mock.attempts() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            session.set_pending(ZoneId(2), 0x0F00).unwrap();
        });
        session.wait_idle();

        let sent = mock.sent();
        assert_eq!(sent.len(), 8);
        assert_eq!(sent[5], command::encode_set_color(0x0100, 0x0F00));
        assert_eq!(session.stats().runs, 2);
    }

    #[test]
    fn empty_run_skipped_by_default() {
        let mock = MockTransport::new();
        let session = start(&mock, quick_config());
        assert_eq!(session.flush(), RunOutcome::Skipped);
        assert!(mock.sent().is_empty());
        assert_eq!(session.stats().skipped_runs, 1);
    }

    #[test]
    fn empty_run_sends_reset_execute_when_not_skipping() {
        let mock = MockTransport::new();
        let session = start(
            &mock,
            SessionConfig {
                skip_empty: false,
                ..quick_config()
            },
        );
        assert_eq!(
            session.flush(),
            RunOutcome::Sent {
                zones: 0,
                packets: 2
            }
        );
        assert_eq!(
            mock.sent(),
            vec![command::encode_reset(), command::encode_execute()]
        );
    }

    #[test]
    fn reset_mode_applies_to_runs() {
        let mock = MockTransport::new();
        let session = start(
            &mock,
            SessionConfig {
                reset_mode: ResetMode::AllLightsOff,
                ..quick_config()
            },
        );
        session.zones().set_pending(ZoneId(0), 0x0F00).unwrap();
        session.flush();
        assert_eq!(
            Command::decode(&mock.sent()[0]),
            Some(Command::Reset(ResetMode::AllLightsOff))
        );
    }

    #[test]
    fn failure_aborts_rest_of_run_then_recovers() {
        let mock = MockTransport::new();
        // Attempt 1 is the first SET_COLOR of the first run
        mock.fail_attempt(1, TransportError::ShortWrite {
            written: 3,
            expected: 9,
        });
        let session = start(&mock, quick_config());
        session.zones().set_pending(ZoneId(0), 0x0FFF).unwrap();
        session.zones().set_pending(ZoneId(2), 0x0ABC).unwrap();

        let outcome = session.flush();
        assert!(matches!(outcome, RunOutcome::Aborted { sent: 1, .. }));
        assert_eq!(mock.sent(), vec![command::encode_reset()]);
        assert_eq!(session.stats().failed_runs, 1);

        // The session keeps working; the next run starts with its own reset.
        mock.clear();
        session.zones().set_pending(ZoneId(1), 0x0123).unwrap();
        assert!(matches!(session.flush(), RunOutcome::Sent { zones: 1, .. }));
        assert_eq!(mock.sent()[0], command::encode_reset());
        assert_eq!(mock.sent().last(), Some(&command::encode_execute()));
    }

    #[test]
    fn burst_coalesces_into_few_runs() {
        let mock = MockTransport::new();
        mock.set_delay(Duration::from_millis(2));
        let session = start(&mock, quick_config());
        for c in 0..50u16 {
            session.set_pending(ZoneId(0), c).unwrap();
        }
        session.wait_idle();

        // Far fewer runs than requests, and the final value reached the device.
        let stats = session.stats();
        assert!(stats.runs + stats.skipped_runs < 50, "{stats:?}");
        let last_set = mock
            .sent()
            .iter()
            .rev()
            .find_map(|p| match Command::decode(p) {
                Some(Command::SetColor { color, .. }) => Some(color),
                _ => None,
            });
        assert_eq!(last_set, Some(49));
    }

    #[test]
    fn concurrent_sets_land_in_one_run_in_table_order() {
        let mock = MockTransport::new();
        mock.set_delay(Duration::from_millis(10));
        let session = start(&mock, quick_config());
        let handle = session.handle();

        // Keep the worker busy with a first run while both updates arrive.
        handle.set_pending(ZoneId(0), 0x0FFF).unwrap();
        while mock.attempts() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        std::thread::scope(|scope| {
            let logo = handle.clone();
            let speaker = handle.clone();
            scope.spawn(move || logo.set_pending(ZoneId(2), 0x0F00).unwrap());
            scope.spawn(move || speaker.set_pending(ZoneId(1), 0x00F0).unwrap());
        });
        session.wait_idle();

        let sent = mock.sent();
        assert_eq!(sent.len(), 10, "{:?}", mock.sent_hex());
        assert_eq!(
            sent[4..],
            [
                command::encode_reset(),
                command::encode_set_color(0x0020, 0x00F0),
                command::encode_loop_mark(),
                command::encode_set_color(0x0100, 0x0F00),
                command::encode_loop_mark(),
                command::encode_execute(),
            ]
        );
        assert_eq!(session.stats().runs, 2);
    }

    #[test]
    fn concurrent_flushes_never_overlap() {
        let mock = MockTransport::new();
        mock.set_delay(Duration::from_millis(1));
        let session = start(&mock, quick_config());

        std::thread::scope(|scope| {
            for t in 0..4u16 {
                let session = &session;
                scope.spawn(move || {
                    for c in 0..5u16 {
                        session.set_pending(ZoneId((t % 3) as usize), t * 10 + c).unwrap();
                        session.flush();
                    }
                });
            }
        });
        session.wait_idle();

        assert_eq!(mock.overlaps(), 0);
        // Runs are contiguous: every reset is followed by pairs and an execute
        // before the next reset.
        let cmds: Vec<Command> = mock.sent().iter().filter_map(Command::decode).collect();
        let mut open = false;
        for c in cmds {
            match c {
                Command::Reset(_) => {
                    assert!(!open, "reset inside an open transaction");
                    open = true;
                }
                Command::Execute => {
                    assert!(open, "execute without reset");
                    open = false;
                }
                _ => assert!(open, "packet outside a transaction"),
            }
        }
        assert!(!open);
    }

    #[test]
    fn shutdown_stops_scheduling() {
        let mock = MockTransport::new();
        let session = start(&mock, quick_config());
        let handle = session.handle();
        session.shutdown();

        handle.set_pending(ZoneId(0), 0x0FFF).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(mock.sent().is_empty());
        // The value is stored even though nothing will send it.
        assert_eq!(handle.zones().pending(ZoneId(0)), Some(0x0FFF));
    }

    #[test]
    fn shutdown_waits_for_in_flight_run() {
        let mock = MockTransport::new();
        mock.set_delay(Duration::from_millis(10));
        let session = start(&mock, quick_config());
        session.set_pending(ZoneId(0), 0x0FFF).unwrap();
        // Give the worker time to enter Sending
        std::thread::sleep(Duration::from_millis(5));
        session.shutdown();
        // Whatever run started, it ran to completion.
        let n = mock.sent().len();
        assert!(n == 0 || n == 4, "partial transaction after shutdown: {n}");
        assert_eq!(mock.overlaps(), 0);
    }
}

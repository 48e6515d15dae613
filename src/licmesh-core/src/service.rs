//! The validation watchdog.
//!
//! [`ValidationService`] owns the working set of [`ValidationSequence`]s
//! and drives a [`Verifier`] through the phase machine
//! `Idle -> Scheduled -> Verifying -> {Scheduled, Fatal}`. Each tick pings
//! the liveness probe, verifies every due sequence, and reschedules the
//! ones that succeeded. A failed sequence keeps its due time and is
//! retried on the next tick; a tick where every processed sequence failed
//! is systemic and halts the service. Fatal is terminal.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::LicenseError;
use crate::sequence::ValidationSequence;
use crate::verify::Verifier;

/// Liveness probe invoked at the start of every tick.
pub trait Probe: Send + Sync {
    /// Signal that the service is alive at the given instant.
    ///
    /// # Errors
    ///
    /// An error marks the host unhealthy; the watchdog halts on it.
    fn ping(&self, now: DateTime<Utc>) -> Result<(), LicenseError>;
}

/// Where the watchdog currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    /// Constructed but not started; ticks are ignored.
    Idle,
    /// Started and waiting for the next tick.
    Scheduled,
    /// A tick is in progress.
    Verifying,
    /// Halted; no further validation will happen.
    Fatal,
}

struct SequenceSlot {
    sequence: ValidationSequence,
    consecutive_failures: u32,
}

struct PassOutcome {
    processed: usize,
    failures: usize,
}

/// The watchdog scheduler for periodic license validation.
pub struct ValidationService {
    verifier: Arc<dyn Verifier>,
    probe: Arc<dyn Probe>,
    clock: Arc<dyn Clock>,
    phase: RwLock<ServicePhase>,
    slots: Mutex<Vec<SequenceSlot>>,
}

impl ValidationService {
    /// Build a service over an initial working set of sequences.
    pub fn new(
        verifier: Arc<dyn Verifier>,
        probe: Arc<dyn Probe>,
        clock: Arc<dyn Clock>,
        sequences: Vec<ValidationSequence>,
    ) -> Self {
        Self {
            verifier,
            probe,
            clock,
            phase: RwLock::new(ServicePhase::Idle),
            slots: Mutex::new(
                sequences
                    .into_iter()
                    .map(|sequence| SequenceSlot {
                        sequence,
                        consecutive_failures: 0,
                    })
                    .collect(),
            ),
        }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> ServicePhase {
        self.phase
            .read()
            .map(|phase| *phase)
            .unwrap_or(ServicePhase::Fatal)
    }

    /// Snapshot of the tracked sequences.
    #[must_use]
    pub fn sequences(&self) -> Vec<ValidationSequence> {
        self.slots
            .lock()
            .map(|slots| slots.iter().map(|slot| slot.sequence).collect())
            .unwrap_or_default()
    }

    /// Start the watchdog: verify every sequence once, then accept ticks.
    ///
    /// # Errors
    ///
    /// Halts with [`LicenseError::EmptySequenceSet`] if there is nothing
    /// to schedule, with [`LicenseError::AllSequencesFailed`] if the
    /// initial pass fails across the board, and refuses to restart a
    /// halted service.
    pub fn start_validation(&self) -> Result<(), LicenseError> {
        if self.phase() == ServicePhase::Fatal {
            return Err(LicenseError::ServiceHalted);
        }

        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(_) => {
                self.set_phase(ServicePhase::Fatal);
                return Err(LicenseError::StatePoisoned);
            }
        };
        if slots.is_empty() {
            self.set_phase(ServicePhase::Fatal);
            return Err(LicenseError::EmptySequenceSet);
        }

        self.set_phase(ServicePhase::Verifying);
        let now = self.clock.now();
        let outcome = match Self::run_pass(&self.verifier, &mut slots, now, false) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.set_phase(ServicePhase::Fatal);
                return Err(error);
            }
        };
        if outcome.failures >= outcome.processed {
            self.set_phase(ServicePhase::Fatal);
            return Err(LicenseError::AllSequencesFailed {
                processed: outcome.processed,
                failures: outcome.failures,
            });
        }

        tracing::info!(sequences = outcome.processed, "validation service started");
        self.set_phase(ServicePhase::Scheduled);
        Ok(())
    }

    /// Run one watchdog tick.
    ///
    /// Ignored while [`ServicePhase::Idle`]. Pings the probe, verifies
    /// every due sequence, reschedules the successful ones.
    ///
    /// # Errors
    ///
    /// Every error from this method is terminal: the service is in
    /// [`ServicePhase::Fatal`] afterwards and further ticks return
    /// [`LicenseError::ServiceHalted`].
    pub fn tick(&self) -> Result<(), LicenseError> {
        match self.phase() {
            ServicePhase::Idle => return Ok(()),
            ServicePhase::Fatal => return Err(LicenseError::ServiceHalted),
            ServicePhase::Scheduled | ServicePhase::Verifying => {}
        }

        // One lock acquisition for the whole tick keeps ticks serialized.
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(_) => {
                self.set_phase(ServicePhase::Fatal);
                return Err(LicenseError::StatePoisoned);
            }
        };

        self.set_phase(ServicePhase::Verifying);
        let now = self.clock.now();

        if let Err(error) = self.probe.ping(now) {
            tracing::error!(error = %error, "liveness probe failed");
            self.set_phase(ServicePhase::Fatal);
            return Err(LicenseError::ProbeFailed {
                reason: error.to_string(),
            });
        }

        let outcome = match Self::run_pass(&self.verifier, &mut slots, now, true) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.set_phase(ServicePhase::Fatal);
                return Err(error);
            }
        };
        if outcome.processed > 0 && outcome.failures >= outcome.processed {
            tracing::error!(
                processed = outcome.processed,
                "every due sequence failed this tick"
            );
            self.set_phase(ServicePhase::Fatal);
            return Err(LicenseError::AllSequencesFailed {
                processed: outcome.processed,
                failures: outcome.failures,
            });
        }

        self.set_phase(ServicePhase::Scheduled);
        Ok(())
    }

    /// Drive the watchdog until it halts.
    ///
    /// The caller starts the service first; ticks fire at the given
    /// interval, the first one immediately. Resolves to the halting error.
    pub async fn run(self: Arc<Self>, interval: std::time::Duration) -> LicenseError {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(error) = self.tick() {
                tracing::error!(error = %error, "validation service halted");
                return error;
            }
        }
    }

    fn run_pass(
        verifier: &Arc<dyn Verifier>,
        slots: &mut [SequenceSlot],
        now: DateTime<Utc>,
        due_only: bool,
    ) -> Result<PassOutcome, LicenseError> {
        let mut processed = 0;
        let mut failures = 0;
        for slot in slots.iter_mut() {
            if due_only && !slot.sequence.is_due_at(now) {
                continue;
            }
            processed += 1;
            let period = slot.sequence.period();
            match verifier.verify_for(&period) {
                Ok(()) => {
                    let next_due = now
                        .checked_add_signed(period.repeat_after(now))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    slot.sequence = ValidationSequence::new(period, next_due)?;
                    slot.consecutive_failures = 0;
                }
                Err(error) => {
                    // Due time is kept so the sequence is retried next tick.
                    failures += 1;
                    slot.consecutive_failures += 1;
                    tracing::warn!(
                        error = %error,
                        consecutive = slot.consecutive_failures,
                        "sequence verification failed"
                    );
                }
            }
        }
        Ok(PassOutcome {
            processed,
            failures,
        })
    }

    fn set_phase(&self, next: ServicePhase) {
        if let Ok(mut phase) = self.phase.write() {
            *phase = next;
        }
    }
}

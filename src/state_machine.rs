//! State machine for the door of a (snail) mailbox.
//!
//! ```text
//!   Closed --open--> Opened --open (after the quick close hold)--> Ajar
//!     ^                |                                            |
//!     +-----close------+------------------close---------------------+
//! ```
//!
//! Every transition the user cares about is sent as a notification. The
//! ajar state can last indefinitely, so repeated ajar reminders are spaced
//! out with an exponential backoff.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use common::{DoorState, Notification};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{
    backoff::{BackoffStep, ExponentBackoff},
    config::MailboxConfig,
    error::MailboxError,
    notify::Notifier,
};

/// What is written to the state file so an ajar door survives a restart
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct PersistedState {
    pub state: DoorState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_sent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<bool>,
}

pub struct MailboxStateMachine<N> {
    notifier: N,
    state: DoorState,
    ajar_message_sent: bool,
    throttle_events: bool,
    quick_door_close: Duration,
    ajar_since: Option<Instant>,
    backoff_base: u64,
    backoff_start: u32,
    backoff: ExponentBackoff,
    current_step: Option<BackoffStep>,
    state_file: PathBuf,
}

impl<N: Notifier> MailboxStateMachine<N> {
    pub fn new(config: &MailboxConfig, notifier: N) -> Self {
        Self {
            notifier,
            state: DoorState::Closed,
            ajar_message_sent: false,
            throttle_events: false,
            quick_door_close: config.quick_door_close(),
            ajar_since: None,
            backoff_base: config.backoff_timer_base,
            backoff_start: config.backoff_timer_range_start,
            backoff: ExponentBackoff::new(
                config.backoff_timer_base,
                config.backoff_timer_range_start,
            ),
            current_step: None,
            state_file: config.state_file.clone(),
        }
    }

    /// Build a machine from the state file, or a fresh one if there is
    /// nothing usable on disk.
    pub fn restore(config: &MailboxConfig, notifier: N) -> Self {
        let mut machine = Self::new(config, notifier);

        match read_state_file(&config.state_file) {
            Ok(Some(saved)) => {
                info!("MBSM: restored '{}' from {}", saved.state, config.state_file.display());
                machine.apply(saved);
            }
            Ok(None) => {}
            Err(e) => warn!(
                "MBSM: ignoring unreadable state file {}: {}",
                config.state_file.display(),
                e
            ),
        }

        machine
    }

    fn apply(&mut self, saved: PersistedState) {
        self.state = saved.state;
        if saved.state != DoorState::Ajar {
            return;
        }

        let exponent = saved.exponent.unwrap_or(self.backoff_start);
        self.backoff = ExponentBackoff::resume_after(self.backoff_base, self.backoff_start, exponent);
        self.current_step = Some(self.backoff.step(exponent));
        self.ajar_message_sent = saved.message_sent.unwrap_or(true);
        self.throttle_events = saved.throttle.unwrap_or(true);
        self.ajar_since = Some(Instant::now());
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    pub fn ajar_message_sent(&self) -> bool {
        self.ajar_message_sent
    }

    pub fn throttled(&self) -> bool {
        self.throttle_events
    }

    /// Interval until the next ajar reminder may go out
    pub fn current_backoff(&self) -> Option<Duration> {
        self.current_step.map(|step| step.interval())
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// React to a sample of the door. Returns how long the caller should
    /// hold after a fresh opening, giving the door time to shut again.
    ///
    /// A door that is opened and promptly closed produces only the open
    /// notification. One that is left open produces ajar reminders and then
    /// a closed notification once it finally shuts.
    pub async fn handle_event(&mut self, door_closed: bool) -> Result<Option<Duration>, MailboxError> {
        if door_closed {
            if self.state != DoorState::Closed {
                self.state = DoorState::Closed;
                info!("MBSM: 'closed'");
                self.execute_closed_state_actions().await?;
            }
            return Ok(None);
        }

        if self.throttle_events {
            if self.state == DoorState::Ajar && self.ajar_timer_expired() {
                info!("MBSM: 'ajar' update");
                self.execute_ajar_state_actions().await?;
            }
            return Ok(None);
        }

        match self.state {
            DoorState::Opened => {
                self.state = DoorState::Ajar;
                info!("MBSM: 'ajar'");
                self.execute_ajar_state_actions().await?;
                Ok(None)
            }
            DoorState::Ajar => {
                self.state = DoorState::Closed;
                info!("MBSM: 'closed'");
                self.execute_closed_state_actions().await?;
                Ok(None)
            }
            DoorState::Closed => {
                self.state = DoorState::Opened;
                info!("MBSM: 'opened'");
                self.execute_open_state_actions().await?;
                Ok(Some(self.quick_door_close))
            }
        }
    }

    async fn execute_ajar_state_actions(&mut self) -> Result<(), MailboxError> {
        self.notifier.notify(Notification::Ajar).await?;

        self.ajar_since = Some(Instant::now());
        let step = self.backoff.next();
        self.current_step = step;
        if let Some(step) = step {
            debug!(
                "MBSM: ajar timer reset, next reminder in {} minutes",
                step.minutes
            );
        }
        self.ajar_message_sent = true;
        self.throttle_events = true;

        Ok(())
    }

    async fn execute_closed_state_actions(&mut self) -> Result<(), MailboxError> {
        if self.ajar_message_sent {
            self.notifier.notify(Notification::Closed).await?;
            self.ajar_message_sent = false;
            self.backoff.reset();
        }
        self.throttle_events = false;

        Ok(())
    }

    async fn execute_open_state_actions(&mut self) -> Result<(), MailboxError> {
        self.notifier.notify(Notification::Open).await?;
        Ok(())
    }

    /// True once more whole seconds have passed since the last ajar
    /// notification than the current backoff interval allows.
    pub fn ajar_timer_expired(&self) -> bool {
        match (self.ajar_since, self.current_step) {
            (Some(since), Some(step)) => since.elapsed().as_secs() > step.interval().as_secs(),
            _ => false,
        }
    }

    pub fn persisted(&self) -> PersistedState {
        match self.state {
            DoorState::Ajar => PersistedState {
                state: self.state,
                exponent: self.current_step.map(|step| step.exponent),
                message_sent: Some(self.ajar_message_sent),
                throttle: Some(self.throttle_events),
            },
            state => PersistedState {
                state,
                exponent: None,
                message_sent: None,
                throttle: None,
            },
        }
    }

    pub fn save_state(&self) -> Result<(), MailboxError> {
        let data = serde_json::to_string(&self.persisted())?;
        fs::write(&self.state_file, data)?;
        Ok(())
    }

    /// Save before a reset. A failure is logged, since there is nothing
    /// left to do about it. Returns whether the state made it to disk.
    pub fn try_save_state(&self) -> bool {
        match self.save_state() {
            Ok(()) => true,
            Err(e) => {
                error!("MBSM: could not save state to {}: {}", self.state_file.display(), e);
                false
            }
        }
    }
}

fn read_state_file(path: &Path) -> Result<Option<PersistedState>, MailboxError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

//! Channel supervisor state machine.
//!
//! Pure decision logic: every trigger is applied atomically and yields the
//! list of side effects the runtime must perform. No I/O or timers live here.

use std::time::Duration;

use super::types::{Action, ChannelError, ConnectionState, SupervisorStatus, Trigger};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTimings {
    /// Interval between liveness probes while polling.
    pub poll_interval: Duration,
    /// Pause between tearing down and re-establishing the channel.
    pub settle_delay: Duration,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReconnectPhase {
    /// Waiting for the stop request to complete.
    Stopping(u64),
    /// Stop done, settle timer armed.
    Settling(u64),
}

#[derive(Debug)]
pub struct ChannelMachine {
    timings: SupervisorTimings,
    state: ConnectionState,
    last_error: Option<ChannelError>,
    next_id: u64,
    /// Live-channel attempt whose start request has not completed yet.
    in_flight: Option<u64>,
    /// Active polling session.
    polling: Option<u64>,
    probe_in_flight: bool,
    reconnect: Option<ReconnectPhase>,
}

impl ChannelMachine {
    pub fn new(timings: SupervisorTimings) -> Self {
        Self {
            timings,
            state: ConnectionState::Disconnected,
            last_error: None,
            next_id: 0,
            in_flight: None,
            polling: None,
            probe_in_flight: false,
            reconnect: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_error(&self) -> Option<&ChannelError> {
        self.last_error.as_ref()
    }

    pub fn polling_session(&self) -> Option<u64> {
        self.polling
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnect.is_some()
    }

    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            state: self.state,
            last_error: self.last_error.clone(),
        }
    }

    pub fn handle(&mut self, trigger: Trigger) -> Vec<Action> {
        let mut actions = Vec::new();
        match trigger {
            Trigger::Connect => self.connect(&mut actions),
            Trigger::Disconnect => self.disconnect(None, &mut actions),
            Trigger::Reconnect => self.reconnect(&mut actions),
            Trigger::StartPolling => self.request_polling(&mut actions),
            Trigger::ChannelDown(reason) => self.channel_down(reason, &mut actions),
            Trigger::StartCompleted { attempt, result } => {
                self.on_start_completed(attempt, result, &mut actions)
            }
            Trigger::StopCompleted { reconnect, result } => {
                self.on_stop_completed(reconnect, result, &mut actions)
            }
            Trigger::SettleElapsed { reconnect } => {
                self.on_settle_elapsed(reconnect, &mut actions)
            }
            Trigger::PollTick { session } => self.on_poll_tick(session, &mut actions),
            Trigger::ProbeCompleted { session, result } => {
                self.on_probe_completed(session, result, &mut actions)
            }
        }
        actions
    }

    /// Cancel every timer and forget in-flight work. The caller stops the
    /// channel itself.
    pub fn shutdown(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.in_flight = None;
        self.cancel_polling(&mut actions);
        self.cancel_reconnect(&mut actions);
        self.state = ConnectionState::Disconnected;
        actions
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn connect(&mut self, actions: &mut Vec<Action>) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            tracing::debug!(state = %self.state, "Connect ignored, channel already live");
            return;
        }
        if self.reconnect.is_some() {
            tracing::debug!("Connect ignored, reconnect already underway");
            return;
        }
        self.begin_attempt(actions);
    }

    fn begin_attempt(&mut self, actions: &mut Vec<Action>) {
        // polling and a live attempt never overlap
        self.cancel_polling(actions);
        let attempt = self.next_id();
        self.in_flight = Some(attempt);
        self.state = ConnectionState::Connecting;
        tracing::info!(attempt, "Starting live channel");
        actions.push(Action::StartChannel { attempt });
    }

    fn disconnect(&mut self, reconnect: Option<u64>, actions: &mut Vec<Action>) {
        self.in_flight = None;
        self.cancel_polling(actions);
        if reconnect.is_none() {
            self.cancel_reconnect(actions);
        }
        self.state = ConnectionState::Disconnected;
        actions.push(Action::StopChannel { reconnect });
    }

    fn reconnect(&mut self, actions: &mut Vec<Action>) {
        if self.reconnect.is_some() {
            tracing::debug!("Reconnect ignored, one is already pending");
            return;
        }
        let id = self.next_id();
        tracing::info!(reconnect = id, "Reconnecting live channel");
        self.reconnect = Some(ReconnectPhase::Stopping(id));
        self.disconnect(Some(id), actions);
    }

    fn cancel_reconnect(&mut self, actions: &mut Vec<Action>) {
        match self.reconnect.take() {
            Some(ReconnectPhase::Settling(id)) => actions.push(Action::CancelSettle { reconnect: id }),
            // the stop completion will find no matching reconnect and end there
            Some(ReconnectPhase::Stopping(_)) | None => {}
        }
    }

    fn request_polling(&mut self, actions: &mut Vec<Action>) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) || self.reconnect.is_some()
        {
            tracing::debug!(state = %self.state, "Polling request ignored, live channel has priority");
            return;
        }
        self.start_polling(actions);
    }

    fn start_polling(&mut self, actions: &mut Vec<Action>) {
        self.state = ConnectionState::Polling;
        if self.polling.is_some() {
            return;
        }
        let session = self.next_id();
        self.polling = Some(session);
        self.probe_in_flight = false;
        tracing::info!(
            session,
            interval_ms = self.timings.poll_interval.as_millis() as u64,
            "Falling back to polling"
        );
        actions.push(Action::StartPolling {
            session,
            interval: self.timings.poll_interval,
        });
    }

    fn cancel_polling(&mut self, actions: &mut Vec<Action>) {
        if let Some(session) = self.polling.take() {
            self.probe_in_flight = false;
            actions.push(Action::CancelPolling { session });
        }
    }

    /// Live channel lost: record the error and fall back to polling.
    fn fail_live(&mut self, error: ChannelError, actions: &mut Vec<Action>) {
        tracing::warn!(error = %error, "Live channel unavailable");
        self.in_flight = None;
        self.last_error = Some(error);
        self.state = ConnectionState::Disconnected;
        self.start_polling(actions);
    }

    fn channel_down(&mut self, reason: String, actions: &mut Vec<Action>) {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.fail_live(ChannelError::Down(reason), actions);
            }
            ConnectionState::Polling | ConnectionState::Disconnected => {
                tracing::debug!(state = %self.state, reason = %reason, "Channel-down ignored, no live channel");
            }
        }
    }

    fn on_start_completed(
        &mut self,
        attempt: u64,
        result: Result<(), ChannelError>,
        actions: &mut Vec<Action>,
    ) {
        if self.in_flight != Some(attempt) {
            tracing::debug!(attempt, "Ignoring stale channel start result");
            return;
        }
        self.in_flight = None;
        match result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.last_error = None;
                self.cancel_polling(actions);
                tracing::info!(attempt, "Live channel connected");
            }
            Err(e) => self.fail_live(e, actions),
        }
    }

    fn on_stop_completed(
        &mut self,
        reconnect: Option<u64>,
        result: Result<(), ChannelError>,
        actions: &mut Vec<Action>,
    ) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Channel stop failed");
            self.last_error = Some(e);
        }

        let Some(id) = reconnect else {
            return;
        };
        if self.reconnect == Some(ReconnectPhase::Stopping(id)) {
            self.reconnect = Some(ReconnectPhase::Settling(id));
            actions.push(Action::ScheduleSettle {
                reconnect: id,
                delay: self.timings.settle_delay,
            });
        }
    }

    fn on_settle_elapsed(&mut self, reconnect: u64, actions: &mut Vec<Action>) {
        if self.reconnect != Some(ReconnectPhase::Settling(reconnect)) {
            tracing::debug!(reconnect, "Ignoring stale settle timer");
            return;
        }
        self.reconnect = None;
        self.begin_attempt(actions);
    }

    fn on_poll_tick(&mut self, session: u64, actions: &mut Vec<Action>) {
        if self.polling != Some(session) {
            tracing::debug!(session, "Ignoring tick from cancelled polling session");
            return;
        }
        if self.probe_in_flight {
            tracing::debug!(session, "Previous probe still running, skipping tick");
            return;
        }
        self.probe_in_flight = true;
        actions.push(Action::Probe { session });
    }

    fn on_probe_completed(
        &mut self,
        session: u64,
        result: Result<bool, ChannelError>,
        actions: &mut Vec<Action>,
    ) {
        // session and state are checked now, not when the tick fired
        if self.polling != Some(session) {
            tracing::debug!(session, "Ignoring probe result from cancelled polling session");
            return;
        }
        self.probe_in_flight = false;
        match result {
            Ok(true) if self.state != ConnectionState::Connected => {
                tracing::info!(session, "Notification source healthy, leaving polling");
                self.cancel_polling(actions);
                self.reconnect(actions);
            }
            Ok(true) => {}
            Ok(false) => tracing::debug!(session, "Notification source still unhealthy"),
            Err(e) => tracing::debug!(session, error = %e, "Probe failed, retrying next tick"),
        }
    }
}

use tokio::sync::mpsc;

use crate::api::central_event::CentralEvent;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    /// Capacity of the transport event channel.
    pub event_buffer: usize,
    /// Capacity of the command channel of a spawned session.
    pub command_buffer: usize,
    /// Reconnect automatically when the radio powers back on while a
    /// connection is still wanted.
    pub reconnect_on_power_on: bool,
    /// Keep per-request discovery errors for inspection after the walk.
    pub record_discovery_errors: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            event_buffer: 256,
            command_buffer: 32,
            reconnect_on_power_on: true,
            record_discovery_errors: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    pub fn reconnect_on_power_on(mut self, enabled: bool) -> Self {
        self.reconnect_on_power_on = enabled;
        self
    }

    pub fn record_discovery_errors(mut self, enabled: bool) -> Self {
        self.record_discovery_errors = enabled;
        self
    }

    /// The channel a transport delivers its events on. The sender goes to the
    /// transport, the receiver to the session driver.
    pub fn event_channel(&self) -> (mpsc::Sender<CentralEvent>, mpsc::Receiver<CentralEvent>) {
        mpsc::channel(self.event_buffer)
    }
}

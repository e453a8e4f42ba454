use std::collections::VecDeque;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::sync::watch;

use crate::api::central::{CentralTransport, PeripheralId};
use crate::api::central_event::{CentralEvent, CentralState};
use crate::api::characteristic::{Characteristic, CharacteristicWriteType};
use crate::api::descriptor::DescriptorValue;
use crate::api::handle::{AttributeHandle, CharacteristicHandle, DescriptorHandle, WalkId};
use crate::api::service::AttributeTree;
use crate::config::SessionConfig;
use crate::session::discovery::{
    DiscoveryDiagnostic, DiscoveryRequest, DiscoveryResponse, DiscoveryWalker, WalkStep,
};
use crate::session::dispatch::{OperationDispatcher, PendingWrite, WriteRequest};
use crate::{Error, ErrorType, Result};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Discovering,
    Connected,
    Disconnecting,
}

/// What a consumer can observe about a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub name: Option<String>,
    pub attributes: Option<Arc<AttributeTree>>,
    pub pending_write: Option<CharacteristicHandle>,
}

/// The connection to one peripheral, from the connect request through
/// discovery to the link going down.
///
/// All transport events for the peripheral go through
/// [`handle_event`](Self::handle_event), one at a time.
pub struct ConnectionSession<T: CentralTransport> {
    transport: Arc<T>,
    peripheral: PeripheralId,
    config: SessionConfig,
    state: ConnectionState,
    name: Option<String>,
    wants_connection: bool,
    walk: WalkId,
    walker: Option<DiscoveryWalker>,
    live: Option<AttributeTree>,
    published: Option<Arc<AttributeTree>>,
    pending_write: Option<PendingWrite>,
    diagnostics: Vec<DiscoveryDiagnostic>,
    status_tx: watch::Sender<SessionStatus>,
}

impl<T: CentralTransport> ConnectionSession<T> {
    pub fn new(transport: Arc<T>, peripheral: PeripheralId, config: SessionConfig) -> Self {
        let name = transport
            .retrieve_peripheral(&peripheral)
            .and_then(|info| info.name);
        let (status_tx, _) = watch::channel(SessionStatus {
            name: name.clone(),
            ..SessionStatus::default()
        });
        ConnectionSession {
            transport,
            peripheral,
            config,
            state: ConnectionState::Disconnected,
            name,
            wants_connection: false,
            walk: WalkId::default(),
            walker: None,
            live: None,
            published: None,
            pending_write: None,
            diagnostics: Vec::new(),
            status_tx,
        }
    }

    pub fn peripheral(&self) -> &PeripheralId {
        &self.peripheral
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attributes(&self) -> Option<&Arc<AttributeTree>> {
        self.published.as_ref()
    }

    pub fn pending_write(&self) -> Option<&PendingWrite> {
        self.pending_write.as_ref()
    }

    /// Discovery requests of the last walk that failed and were treated as
    /// empty.
    pub fn diagnostics(&self) -> &[DiscoveryDiagnostic] {
        &self.diagnostics
    }

    pub fn status(&self) -> SessionStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Asks for a connection. Returns `false` without doing anything when the
    /// session is not disconnected, the radio is not powered on, or the
    /// peripheral cannot be retrieved; a later power-on retries.
    pub async fn connect(&mut self) -> Result<bool> {
        self.wants_connection = true;
        self.try_connect().await
    }

    async fn try_connect(&mut self) -> Result<bool> {
        if self.state != ConnectionState::Disconnected {
            debug!("{}: connect ignored while {:?}", self.peripheral, self.state);
            return Ok(false);
        }
        let radio = self.transport.state();
        if !radio.is_powered_on() {
            debug!("{}: radio is {radio:?}, connect deferred", self.peripheral);
            return Ok(false);
        }
        let Some(info) = self.transport.retrieve_peripheral(&self.peripheral) else {
            warn!("{}: peripheral cannot be retrieved", self.peripheral);
            return Ok(false);
        };
        if info.name.is_some() {
            self.name = info.name;
        }
        self.transport.connect(&self.peripheral).await?;
        self.set_state(ConnectionState::Connecting);
        Ok(true)
    }

    /// Drops the connection. Any walk in progress is abandoned.
    pub async fn disconnect(&mut self) -> Result<bool> {
        self.wants_connection = false;
        self.request_disconnect().await
    }

    async fn request_disconnect(&mut self) -> Result<bool> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Disconnecting => return Ok(false),
            ConnectionState::Discovering => {
                debug!("{}: abandoning discovery walk", self.peripheral);
            }
            _ => {}
        }
        self.walker = None;
        self.set_state(ConnectionState::Disconnecting);
        if let Err(err) = self.transport.disconnect(&self.peripheral).await {
            warn!("{}: disconnect request failed: {err}", self.peripheral);
            self.reset();
            return Err(err);
        }
        Ok(true)
    }

    /// Folds one transport event into the session.
    ///
    /// Per-request failures are absorbed. An `InvariantViolation` error means
    /// the event stream broke an invariant (a duplicate discovery response, a
    /// response for a walk that already completed) and the session should not be
    /// trusted. Other errors come from a reconnect the event triggered.
    pub async fn handle_event(&mut self, event: CentralEvent) -> Result<()> {
        if let Some(peripheral) = event.peripheral() {
            if *peripheral != self.peripheral {
                trace!("{}: ignoring event for {peripheral}", self.peripheral);
                return Ok(());
            }
        }
        trace!("{}: {event:?}", self.peripheral);

        let result = match event {
            CentralEvent::StateUpdate { state } => self.radio_state_changed(state).await,
            CentralEvent::DeviceConnected { name, .. } => self.link_up(name).await,
            CentralEvent::ConnectionFailed { error, .. } => {
                self.connection_failed(error);
                Ok(())
            }
            CentralEvent::DeviceDisconnected { error, .. } => {
                match error {
                    Some(error) => warn!("{}: link lost: {error}", self.peripheral),
                    None => debug!("{}: disconnected", self.peripheral),
                }
                self.reset();
                Ok(())
            }
            CentralEvent::DiscoveredServices {
                walk,
                services,
                error,
                ..
            } => {
                self.discovered(walk, DiscoveryResponse::Services { services, error })
                    .await
            }
            CentralEvent::DiscoveredIncludedServices {
                walk,
                service,
                included_services,
                error,
                ..
            } => {
                self.discovered(walk, DiscoveryResponse::IncludedServices {
                    service,
                    included_services,
                    error,
                })
                .await
            }
            CentralEvent::DiscoveredCharacteristics {
                walk,
                owner,
                characteristics,
                error,
                ..
            } => {
                self.discovered(walk, DiscoveryResponse::Characteristics {
                    owner,
                    characteristics,
                    error,
                })
                .await
            }
            CentralEvent::DiscoveredDescriptors {
                walk,
                characteristic,
                descriptors,
                error,
                ..
            } => {
                self.discovered(walk, DiscoveryResponse::Descriptors {
                    characteristic,
                    descriptors,
                    error,
                })
                .await
            }
            CentralEvent::CharacteristicValueUpdated {
                characteristic,
                value,
                error,
                ..
            } => {
                self.characteristic_updated(characteristic, error, |c| c.value = value);
                Ok(())
            }
            CentralEvent::CharacteristicWritten {
                characteristic,
                error,
                ..
            } => {
                self.characteristic_updated(characteristic, error, |_| {});
                Ok(())
            }
            CentralEvent::NotificationStateUpdated {
                characteristic,
                enabled,
                error,
                ..
            } => {
                self.characteristic_updated(characteristic, error, |c| c.is_notifying = enabled);
                Ok(())
            }
            CentralEvent::DescriptorValueUpdated {
                descriptor,
                value,
                error,
                ..
            } => {
                self.descriptor_updated(descriptor, error, value);
                Ok(())
            }
            CentralEvent::DescriptorWritten {
                descriptor, error, ..
            } => {
                self.descriptor_updated(descriptor, error, None);
                Ok(())
            }
        };
        if let Err(err) = &result {
            error!("{}: {err}", self.peripheral);
        }
        result
    }

    /// Feeds a whole event stream through the session, stopping at the first
    /// invariant violation. Other errors are logged by
    /// [`handle_event`](Self::handle_event) and the stream continues.
    pub async fn drive<S>(&mut self, events: S) -> Result<()>
    where
        S: Stream<Item = CentralEvent>,
    {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            if let Err(err) = self.handle_event(event).await {
                if err.is_invariant_violation() {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn radio_state_changed(&mut self, radio: CentralState) -> Result<()> {
        debug!("{}: radio {radio:?}", self.peripheral);
        if radio.is_powered_on() {
            if self.wants_connection && self.config.reconnect_on_power_on {
                self.try_connect().await?;
            }
            return Ok(());
        }
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        // No disconnect event follows once the radio is gone.
        if let Err(err) = self.transport.disconnect(&self.peripheral).await {
            debug!("{}: disconnect after radio loss failed: {err}", self.peripheral);
        }
        self.reset();
        Ok(())
    }

    async fn link_up(&mut self, name: Option<String>) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected | ConnectionState::Disconnecting => {
                warn!("{}: late connect while {:?}, ignored", self.peripheral, self.state);
                return Ok(());
            }
            state => {
                return Err(Error::new(
                    ErrorType::InvariantViolation,
                    format!("connected event while {state:?}"),
                ));
            }
        }
        if name.is_some() {
            self.name = name;
        }
        self.walk = self.walk.next();
        let (walker, root) = DiscoveryWalker::start()?;
        self.walker = Some(walker);
        self.diagnostics.clear();
        self.set_state(ConnectionState::Discovering);
        self.advance(WalkStep {
            requests: vec![root],
            complete: false,
        })
        .await
    }

    fn connection_failed(&mut self, error: Option<String>) {
        if self.state != ConnectionState::Connecting {
            debug!("{}: connection failure while {:?}, ignored", self.peripheral, self.state);
            return;
        }
        warn!(
            "{}: connection failed: {}",
            self.peripheral,
            error.as_deref().unwrap_or("unknown error")
        );
        self.reset();
    }

    async fn discovered(&mut self, walk: WalkId, response: DiscoveryResponse) -> Result<()> {
        if walk != self.walk {
            debug!(
                "{}: dropping {:?} from superseded walk {walk:?}",
                self.peripheral,
                response.request()
            );
            return Ok(());
        }
        match self.state {
            ConnectionState::Discovering => {}
            ConnectionState::Connecting
            | ConnectionState::Disconnecting
            | ConnectionState::Disconnected => {
                debug!(
                    "{}: dropping {:?} from an abandoned walk",
                    self.peripheral,
                    response.request()
                );
                return Ok(());
            }
            state => {
                return Err(Error::new(
                    ErrorType::InvariantViolation,
                    format!("{:?} answered while {state:?}", response.request()),
                ));
            }
        }
        let step = self.walker_mut()?.handle(response)?;
        self.advance(step).await
    }

    /// Issues the requests of `step` and of every step that a failed request
    /// causes in turn, finishing the walk when the counter reaches zero.
    async fn advance(&mut self, step: WalkStep) -> Result<()> {
        let mut steps = VecDeque::from([step]);
        while let Some(step) = steps.pop_front() {
            if step.complete {
                self.finish_discovery();
                continue;
            }
            for request in step.requests {
                if let Err(err) = self.send_discovery(request).await {
                    let failed = DiscoveryResponse::failed(request, err.to_string());
                    steps.push_back(self.walker_mut()?.handle(failed)?);
                }
            }
        }
        Ok(())
    }

    async fn send_discovery(&self, request: DiscoveryRequest) -> Result<()> {
        let transport = self.transport.as_ref();
        let peripheral = &self.peripheral;
        let walk = self.walk;
        match request {
            DiscoveryRequest::Services => transport.discover_services(peripheral, walk).await,
            DiscoveryRequest::IncludedServices(service) => {
                transport
                    .discover_included_services(peripheral, walk, service)
                    .await
            }
            DiscoveryRequest::Characteristics(owner) => {
                transport
                    .discover_characteristics(peripheral, walk, owner)
                    .await
            }
            DiscoveryRequest::Descriptors(characteristic) => {
                transport
                    .discover_descriptors(peripheral, walk, characteristic)
                    .await
            }
        }
    }

    fn finish_discovery(&mut self) {
        let Some(walker) = self.walker.take() else {
            return;
        };
        let (tree, diagnostics) = walker.finish();
        let (services, included, characteristics, descriptors) = tree.counts();
        info!(
            "{}: discovered {services} services, {included} included, {characteristics} characteristics, {descriptors} descriptors",
            self.peripheral
        );
        if self.config.record_discovery_errors {
            self.diagnostics = diagnostics;
        }
        self.live = Some(tree);
        self.rebuild_snapshot();
        self.set_state(ConnectionState::Connected);
    }

    fn walker_mut(&mut self) -> Result<&mut DiscoveryWalker> {
        self.walker.as_mut().ok_or_else(|| {
            Error::new(
                ErrorType::InvariantViolation,
                "discovery response with no walk in progress",
            )
        })
    }

    fn characteristic_updated(
        &mut self,
        handle: CharacteristicHandle,
        error: Option<String>,
        apply: impl FnOnce(&mut Characteristic),
    ) {
        if let Some(error) = &error {
            warn!("{}: {handle:?} failed: {error}", self.peripheral);
        }
        let Some(tree) = self.live_tree_mut() else {
            return;
        };
        match tree.characteristic_mut(handle) {
            Some(characteristic) => {
                if error.is_none() {
                    apply(characteristic);
                }
            }
            None => {
                warn!("{}: event for unknown {handle:?}", self.peripheral);
                return;
            }
        }
        self.rebuild_snapshot();
    }

    fn descriptor_updated(
        &mut self,
        handle: DescriptorHandle,
        error: Option<String>,
        value: Option<DescriptorValue>,
    ) {
        if let Some(error) = &error {
            warn!("{}: {handle:?} failed: {error}", self.peripheral);
        }
        let Some(tree) = self.live_tree_mut() else {
            return;
        };
        match tree.descriptor_mut(handle) {
            Some(descriptor) => {
                if error.is_none() && value.is_some() {
                    descriptor.value = value;
                }
            }
            None => {
                warn!("{}: event for unknown {handle:?}", self.peripheral);
                return;
            }
        }
        self.rebuild_snapshot();
    }

    fn live_tree_mut(&mut self) -> Option<&mut AttributeTree> {
        if self.state != ConnectionState::Connected {
            debug!("{}: attribute event while {:?}, ignored", self.peripheral, self.state);
            return None;
        }
        self.live.as_mut()
    }

    pub fn dispatcher(&self) -> Result<OperationDispatcher<'_, T>> {
        if self.state != ConnectionState::Connected {
            return Err(Error::new(
                ErrorType::InvalidState,
                format!("operations need a connected session, not {:?}", self.state),
            ));
        }
        let tree = self.live.as_ref().ok_or_else(|| {
            Error::new(ErrorType::InvalidState, "connected without attributes")
        })?;
        Ok(OperationDispatcher::new(
            self.transport.as_ref(),
            &self.peripheral,
            tree,
        ))
    }

    pub async fn read(&self, attribute: AttributeHandle) -> Result<()> {
        let dispatcher = self.dispatcher()?;
        match attribute {
            AttributeHandle::Characteristic(handle) => dispatcher.read(handle).await,
            AttributeHandle::Descriptor(handle) => dispatcher.read_descriptor(handle).await,
        }
    }

    pub async fn write(
        &self,
        handle: CharacteristicHandle,
        data: &[u8],
        write_type: Option<CharacteristicWriteType>,
    ) -> Result<CharacteristicWriteType> {
        self.dispatcher()?.write(handle, data, write_type).await
    }

    pub async fn toggle_notify(&self, handle: CharacteristicHandle) -> Result<bool> {
        self.dispatcher()?.toggle_notify(handle).await
    }

    pub async fn write_descriptor(&self, handle: DescriptorHandle, data: &[u8]) -> Result<()> {
        self.dispatcher()?.write_descriptor(handle, data).await
    }

    /// Opens a write on `handle` whose payload is supplied later through
    /// [`send_write`](Self::send_write). An unresolved earlier request is
    /// dropped.
    pub fn request_write(&mut self, handle: CharacteristicHandle) -> Result<PendingWrite> {
        let pending = self.dispatcher()?.prepare_write(handle)?;
        if let Some(previous) = self.pending_write.replace(pending.clone()) {
            debug!(
                "{}: write to {:?} superseded",
                self.peripheral, previous.characteristic
            );
        }
        self.publish_status();
        Ok(pending)
    }

    /// Resolves the pending write with `request`. The pending write stays in
    /// place until the transport has accepted the write.
    pub async fn send_write(&mut self, request: WriteRequest) -> Result<CharacteristicWriteType> {
        let pending = self.pending_write.clone().ok_or_else(|| {
            Error::new(ErrorType::NoPendingWrite, "no write is waiting for a payload")
        })?;
        let write_type = self
            .dispatcher()?
            .write(pending.characteristic, &request.data, request.write_type)
            .await?;
        self.pending_write = None;
        self.publish_status();
        Ok(write_type)
    }

    pub fn cancel_write(&mut self) -> bool {
        let cancelled = self.pending_write.take().is_some();
        if cancelled {
            self.publish_status();
        }
        cancelled
    }

    fn reset(&mut self) {
        self.walker = None;
        self.live = None;
        self.published = None;
        self.pending_write = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn rebuild_snapshot(&mut self) {
        self.published = self.live.clone().map(Arc::new);
        self.publish_status();
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("{}: {:?} -> {state:?}", self.peripheral, self.state);
            self.state = state;
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SessionStatus {
            state: self.state,
            name: self.name.clone(),
            attributes: self.published.clone(),
            pending_write: self.pending_write.as_ref().map(|p| p.characteristic),
        });
    }
}

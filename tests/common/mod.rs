#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use gatt_session::api::central::{CentralTransport, PeripheralId, PeripheralInfo};
use gatt_session::api::central_event::{CentralEvent, CentralState, DiscoveredCharacteristic};
use gatt_session::api::characteristic::{CharacteristicProperties, CharacteristicWriteType};
use gatt_session::api::handle::{
    AttributeHandle, CharacteristicHandle, OwnerHandle, ServiceHandle, WalkId,
};
use gatt_session::session::ConnectionSession;
use gatt_session::session::discovery::DiscoveryRequest;
use gatt_session::uuid::{CLIENT_CHARACTERISTIC_CONFIGURATION, ShortUuid};
use gatt_session::{Error, ErrorType, Result, SessionConfig};
use tokio::sync::mpsc;
use uuid::Uuid;

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub fn peripheral_id() -> PeripheralId {
    PeripheralId::new(Uuid::from_u128(0x5f2b_7a10_0000_4000_8000_00805f9b34fb))
}

pub fn other_peripheral_id() -> PeripheralId {
    PeripheralId::new(Uuid::from_u128(0x11))
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Connect,
    Disconnect,
    Discover(WalkId, DiscoveryRequest),
    Read(AttributeHandle),
    Write(AttributeHandle, Vec<u8>, CharacteristicWriteType),
    SetNotify(CharacteristicHandle, bool),
}

#[derive(Clone, Debug)]
pub struct ModelCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub descriptors: Vec<Uuid>,
}

#[derive(Clone, Debug)]
pub struct ModelIncluded {
    pub uuid: Uuid,
    pub characteristics: Vec<ModelCharacteristic>,
}

#[derive(Clone, Debug)]
pub struct ModelService {
    pub uuid: Uuid,
    pub included: Vec<ModelIncluded>,
    pub characteristics: Vec<ModelCharacteristic>,
}

/// The GATT database a fake peripheral answers discovery from.
#[derive(Clone, Debug, Default)]
pub struct ModelPeripheral {
    pub services: Vec<ModelService>,
}

pub fn short(value: u16) -> Uuid {
    Uuid::from_u16(value)
}

pub fn characteristic(
    uuid: u16,
    properties: CharacteristicProperties,
    descriptors: &[u16],
) -> ModelCharacteristic {
    ModelCharacteristic {
        uuid: short(uuid),
        properties,
        descriptors: descriptors.iter().copied().map(short).collect(),
    }
}

/// Service A (0x180A) with two characteristics, the first carrying a CCCD,
/// and service B (0x180F) with no characteristics of its own and one included
/// service (0x1801) holding a single characteristic.
///
/// Walking it takes nine discovery responses.
pub fn two_service_model() -> ModelPeripheral {
    ModelPeripheral {
        services: vec![
            ModelService {
                uuid: short(0x180A),
                included: Vec::new(),
                characteristics: vec![
                    characteristic(
                        0x2A29,
                        CharacteristicProperties::READ | CharacteristicProperties::NOTIFY,
                        &[CLIENT_CHARACTERISTIC_CONFIGURATION],
                    ),
                    characteristic(
                        0x2A24,
                        CharacteristicProperties::WRITE
                            | CharacteristicProperties::WRITE_WITHOUT_RESPONSE,
                        &[],
                    ),
                ],
            },
            ModelService {
                uuid: short(0x180F),
                included: vec![ModelIncluded {
                    uuid: short(0x1801),
                    characteristics: vec![characteristic(
                        0x2A05,
                        CharacteristicProperties::WRITE_WITHOUT_RESPONSE,
                        &[],
                    )],
                }],
                characteristics: Vec::new(),
            },
        ],
    }
}

impl ModelPeripheral {
    fn characteristics(&self, owner: OwnerHandle) -> Vec<ModelCharacteristic> {
        let service = self.services.get(owner.service().service);
        let list = match owner {
            OwnerHandle::Service(_) => service.map(|s| &s.characteristics),
            OwnerHandle::Included { included, .. } => service
                .and_then(|s| s.included.get(included))
                .map(|i| &i.characteristics),
        };
        list.cloned().unwrap_or_default()
    }

    /// The event a real peripheral would send back for `request`, issued
    /// under `walk`.
    pub fn respond(
        &self,
        peripheral: PeripheralId,
        walk: WalkId,
        request: DiscoveryRequest,
    ) -> CentralEvent {
        match request {
            DiscoveryRequest::Services => CentralEvent::DiscoveredServices {
                peripheral,
                walk,
                services: self.services.iter().map(|s| s.uuid).collect(),
                error: None,
            },
            DiscoveryRequest::IncludedServices(service) => {
                CentralEvent::DiscoveredIncludedServices {
                    peripheral,
                    walk,
                    service,
                    included_services: self
                        .services
                        .get(service.service)
                        .map(|s| s.included.iter().map(|i| i.uuid).collect())
                        .unwrap_or_default(),
                    error: None,
                }
            }
            DiscoveryRequest::Characteristics(owner) => CentralEvent::DiscoveredCharacteristics {
                peripheral,
                walk,
                owner,
                characteristics: self
                    .characteristics(owner)
                    .iter()
                    .map(|c| DiscoveredCharacteristic {
                        uuid: c.uuid,
                        properties: c.properties,
                    })
                    .collect(),
                error: None,
            },
            DiscoveryRequest::Descriptors(characteristic) => CentralEvent::DiscoveredDescriptors {
                peripheral,
                walk,
                characteristic,
                descriptors: self
                    .characteristics(characteristic.owner)
                    .get(characteristic.characteristic)
                    .map(|c| c.descriptors.clone())
                    .unwrap_or_default(),
                error: None,
            },
        }
    }
}

/// Records every request. With a responder attached it also answers
/// connects, disconnects and discovery from a [`ModelPeripheral`] on the
/// session's event channel.
pub struct FakeTransport {
    state: Mutex<CentralState>,
    peripherals: Mutex<HashMap<PeripheralId, PeripheralInfo>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<DiscoveryRequest>>,
    refuse_connect: Mutex<bool>,
    responder: Option<(ModelPeripheral, mpsc::Sender<CentralEvent>)>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let mut peripherals = HashMap::new();
        peripherals.insert(
            peripheral_id(),
            PeripheralInfo {
                name: Some("Thermometer".to_string()),
            },
        );
        FakeTransport {
            state: Mutex::new(CentralState::PoweredOn),
            peripherals: Mutex::new(peripherals),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            refuse_connect: Mutex::new(false),
            responder: None,
        }
    }

    pub fn with_responder(model: ModelPeripheral, events: mpsc::Sender<CentralEvent>) -> Self {
        FakeTransport {
            responder: Some((model, events)),
            ..Self::new()
        }
    }

    pub fn set_state(&self, state: CentralState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn forget_peripheral(&self, peripheral: &PeripheralId) {
        self.peripherals.lock().unwrap().remove(peripheral);
    }

    pub fn fail(&self, request: DiscoveryRequest) {
        self.failing.lock().unwrap().insert(request);
    }

    /// Makes every later connect request fail before reaching the radio.
    pub fn refuse_connect(&self, refuse: bool) {
        *self.refuse_connect.lock().unwrap() = refuse;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Removes and returns the discovery requests recorded so far, each with
    /// the walk it was issued under.
    pub fn take_discovery(&self) -> Vec<(WalkId, DiscoveryRequest)> {
        let mut calls = self.calls.lock().unwrap();
        let mut requests = Vec::new();
        calls.retain(|call| match call {
            Call::Discover(walk, request) => {
                requests.push((*walk, *request));
                false
            }
            _ => true,
        });
        requests
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Write(..)))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn reply(&self, event: impl FnOnce(&ModelPeripheral) -> CentralEvent) {
        if let Some((model, events)) = &self.responder {
            // The session task is the reader, so never wait on it here.
            let _ = events.try_send(event(model));
        }
    }

    fn discover(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        request: DiscoveryRequest,
    ) -> Result<()> {
        if self.failing.lock().unwrap().contains(&request) {
            return Err(Error::from_string(format!("{request:?} rejected"), ErrorType::Transport));
        }
        self.record(Call::Discover(walk, request));
        self.reply(|model| model.respond(*peripheral, walk, request));
        Ok(())
    }
}

#[async_trait]
impl CentralTransport for FakeTransport {
    fn state(&self) -> CentralState {
        *self.state.lock().unwrap()
    }

    fn retrieve_peripheral(&self, peripheral: &PeripheralId) -> Option<PeripheralInfo> {
        self.peripherals.lock().unwrap().get(peripheral).cloned()
    }

    async fn connect(&self, peripheral: &PeripheralId) -> Result<()> {
        self.record(Call::Connect);
        if *self.refuse_connect.lock().unwrap() {
            return Err(Error::new(ErrorType::Transport, "connect refused"));
        }
        self.reply(|_| CentralEvent::DeviceConnected {
            peripheral: *peripheral,
            name: Some("Thermometer".to_string()),
        });
        Ok(())
    }

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<()> {
        self.record(Call::Disconnect);
        self.reply(|_| CentralEvent::DeviceDisconnected {
            peripheral: *peripheral,
            error: None,
        });
        Ok(())
    }

    async fn discover_services(&self, peripheral: &PeripheralId, walk: WalkId) -> Result<()> {
        self.discover(peripheral, walk, DiscoveryRequest::Services)
    }

    async fn discover_included_services(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        service: ServiceHandle,
    ) -> Result<()> {
        self.discover(peripheral, walk, DiscoveryRequest::IncludedServices(service))
    }

    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        owner: OwnerHandle,
    ) -> Result<()> {
        self.discover(peripheral, walk, DiscoveryRequest::Characteristics(owner))
    }

    async fn discover_descriptors(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        characteristic: CharacteristicHandle,
    ) -> Result<()> {
        self.discover(peripheral, walk, DiscoveryRequest::Descriptors(characteristic))
    }

    async fn read(&self, _peripheral: &PeripheralId, attribute: AttributeHandle) -> Result<()> {
        self.record(Call::Read(attribute));
        Ok(())
    }

    async fn write(
        &self,
        _peripheral: &PeripheralId,
        attribute: AttributeHandle,
        data: &[u8],
        write_type: CharacteristicWriteType,
    ) -> Result<()> {
        self.record(Call::Write(attribute, data.to_vec(), write_type));
        Ok(())
    }

    async fn set_notify(
        &self,
        _peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
    ) -> Result<()> {
        self.record(Call::SetNotify(characteristic, enabled));
        Ok(())
    }
}

/// Answers every outstanding discovery request from `model`, breadth first,
/// until the walk stops asking. Returns the number of responses delivered.
pub async fn answer_discovery(
    session: &mut ConnectionSession<FakeTransport>,
    transport: &FakeTransport,
    model: &ModelPeripheral,
) -> Result<usize> {
    let mut delivered = 0;
    loop {
        let requests = transport.take_discovery();
        if requests.is_empty() {
            return Ok(delivered);
        }
        for (walk, request) in requests {
            session
                .handle_event(model.respond(*session.peripheral(), walk, request))
                .await?;
            delivered += 1;
        }
    }
}

/// The id a fresh session gives its first discovery walk.
pub fn first_walk() -> WalkId {
    WalkId::default().next()
}

pub fn connected_event() -> CentralEvent {
    CentralEvent::DeviceConnected {
        peripheral: peripheral_id(),
        name: None,
    }
}

pub fn new_session(transport: std::sync::Arc<FakeTransport>) -> ConnectionSession<FakeTransport> {
    ConnectionSession::new(transport, peripheral_id(), SessionConfig::new())
}

/// Drives a fresh session through connect and a complete walk of `model`.
pub async fn connected_session(
    model: &ModelPeripheral,
) -> (std::sync::Arc<FakeTransport>, ConnectionSession<FakeTransport>) {
    let transport = std::sync::Arc::new(FakeTransport::new());
    let mut session = new_session(transport.clone());
    assert!(session.connect().await.unwrap());
    session.handle_event(connected_event()).await.unwrap();
    answer_discovery(&mut session, &transport, model)
        .await
        .unwrap();
    transport.clear_calls();
    (transport, session)
}

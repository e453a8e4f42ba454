use std::sync::Arc;

use async_trait::async_trait;
use gatt_session::api::central::{CentralTransport, PeripheralId, PeripheralInfo};
use gatt_session::api::central_event::{CentralEvent, CentralState, DiscoveredCharacteristic};
use gatt_session::api::characteristic::{CharacteristicProperties, CharacteristicWriteType};
use gatt_session::api::handle::{
    AttributeHandle, CharacteristicHandle, OwnerHandle, ServiceHandle, WalkId,
};
use gatt_session::session::WriteRequest;
use gatt_session::uuid::ShortUuid;
use gatt_session::{
    ConnectionSession, ConnectionState, Error, ErrorType, Result, SessionConfig, spawn_session,
};
use log::LevelFilter;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

/// A heart rate sensor that answers every request straight away.
struct SimulatedSensor {
    events: Sender<CentralEvent>,
}

impl SimulatedSensor {
    fn send(&self, event: CentralEvent) -> Result<()> {
        self.events
            .try_send(event)
            .map_err(|err| Error::from_string(err.to_string(), ErrorType::Transport))
    }
}

#[async_trait]
impl CentralTransport for SimulatedSensor {
    fn state(&self) -> CentralState {
        CentralState::PoweredOn
    }

    fn retrieve_peripheral(&self, _peripheral: &PeripheralId) -> Option<PeripheralInfo> {
        Some(PeripheralInfo {
            name: Some("HRM-42".to_string()),
        })
    }

    async fn connect(&self, peripheral: &PeripheralId) -> Result<()> {
        self.send(CentralEvent::DeviceConnected {
            peripheral: *peripheral,
            name: None,
        })
    }

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<()> {
        self.send(CentralEvent::DeviceDisconnected {
            peripheral: *peripheral,
            error: None,
        })
    }

    async fn discover_services(&self, peripheral: &PeripheralId, walk: WalkId) -> Result<()> {
        self.send(CentralEvent::DiscoveredServices {
            peripheral: *peripheral,
            walk,
            services: vec![Uuid::from_u16(0x180D), Uuid::from_u16(0x180F)],
            error: None,
        })
    }

    async fn discover_included_services(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        service: ServiceHandle,
    ) -> Result<()> {
        self.send(CentralEvent::DiscoveredIncludedServices {
            peripheral: *peripheral,
            walk,
            service,
            included_services: Vec::new(),
            error: None,
        })
    }

    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        owner: OwnerHandle,
    ) -> Result<()> {
        let characteristics = match owner.service().service {
            0 => vec![
                DiscoveredCharacteristic {
                    uuid: Uuid::from_u16(0x2A37),
                    properties: CharacteristicProperties::NOTIFY,
                },
                DiscoveredCharacteristic {
                    uuid: Uuid::from_u16(0x2A39),
                    properties: CharacteristicProperties::WRITE,
                },
            ],
            _ => vec![DiscoveredCharacteristic {
                uuid: Uuid::from_u16(0x2A19),
                properties: CharacteristicProperties::READ | CharacteristicProperties::NOTIFY,
            }],
        };
        self.send(CentralEvent::DiscoveredCharacteristics {
            peripheral: *peripheral,
            walk,
            owner,
            characteristics,
            error: None,
        })
    }

    async fn discover_descriptors(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        characteristic: CharacteristicHandle,
    ) -> Result<()> {
        self.send(CentralEvent::DiscoveredDescriptors {
            peripheral: *peripheral,
            walk,
            characteristic,
            descriptors: vec![Uuid::from_u16(0x2902)],
            error: None,
        })
    }

    async fn read(&self, peripheral: &PeripheralId, attribute: AttributeHandle) -> Result<()> {
        if let AttributeHandle::Characteristic(characteristic) = attribute {
            self.send(CentralEvent::CharacteristicValueUpdated {
                peripheral: *peripheral,
                characteristic,
                value: Some(vec![87]),
                error: None,
            })?;
        }
        Ok(())
    }

    async fn write(
        &self,
        peripheral: &PeripheralId,
        attribute: AttributeHandle,
        _data: &[u8],
        _write_type: CharacteristicWriteType,
    ) -> Result<()> {
        if let AttributeHandle::Characteristic(characteristic) = attribute {
            self.send(CentralEvent::CharacteristicWritten {
                peripheral: *peripheral,
                characteristic,
                error: None,
            })?;
        }
        Ok(())
    }

    async fn set_notify(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
    ) -> Result<()> {
        self.send(CentralEvent::NotificationStateUpdated {
            peripheral: *peripheral,
            characteristic,
            enabled,
            error: None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .init();

    let config = SessionConfig::new();
    let (events_tx, events_rx) = config.event_channel();
    let transport = Arc::new(SimulatedSensor { events: events_tx });
    let peripheral = PeripheralId::new(Uuid::from_u128(0x42));
    let session = ConnectionSession::new(transport, peripheral, config);
    let (handle, task) = spawn_session(session, events_rx);

    let mut status = handle.subscribe();
    handle.connect().await?;
    let connected = status
        .wait_for(|s| s.state == ConnectionState::Connected)
        .await
        .map_err(|err| Error::from_string(err.to_string(), ErrorType::ChannelClosed))?
        .clone();

    if let Some(tree) = &connected.attributes {
        for service in &tree.services {
            log::info!("service {}", service.uuid.to_short_string());
            for characteristic in &service.characteristics {
                log::info!(
                    "  characteristic {} {:?}",
                    characteristic.uuid.to_short_string(),
                    characteristic.actions()
                );
            }
        }
    }

    let battery = ServiceHandle::new(1).owner().characteristic(0);
    handle.read(battery).await?;
    handle.toggle_notify(battery).await?;

    let control_point = ServiceHandle::new(0).owner().characteristic(1);
    handle.request_write(control_point).await?;
    handle.send_write(WriteRequest::from_hex("0x01")?).await?;

    handle.disconnect().await?;
    status
        .wait_for(|s| s.state == ConnectionState::Disconnected)
        .await
        .map_err(|err| Error::from_string(err.to_string(), ErrorType::ChannelClosed))?;
    handle.shutdown().await?;
    task.await
        .map_err(|err| Error::from_string(err.to_string(), ErrorType::ChannelClosed))?
}

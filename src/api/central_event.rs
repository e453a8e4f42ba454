use uuid::Uuid;

use crate::api::central::PeripheralId;
use crate::api::characteristic::CharacteristicProperties;
use crate::api::descriptor::DescriptorValue;
use crate::api::handle::{
    CharacteristicHandle, DescriptorHandle, OwnerHandle, ServiceHandle, WalkId,
};

/// Everything the transport reports back, delivered in order on a single
/// channel per session.
#[derive(Debug, Clone, PartialEq)]
pub enum CentralEvent {
    StateUpdate {
        state: CentralState,
    },
    DeviceConnected {
        peripheral: PeripheralId,
        name: Option<String>,
    },
    ConnectionFailed {
        peripheral: PeripheralId,
        error: Option<String>,
    },
    DeviceDisconnected {
        peripheral: PeripheralId,
        error: Option<String>,
    },
    DiscoveredServices {
        peripheral: PeripheralId,
        walk: WalkId,
        services: Vec<Uuid>,
        error: Option<String>,
    },
    DiscoveredIncludedServices {
        peripheral: PeripheralId,
        walk: WalkId,
        service: ServiceHandle,
        included_services: Vec<Uuid>,
        error: Option<String>,
    },
    DiscoveredCharacteristics {
        peripheral: PeripheralId,
        walk: WalkId,
        owner: OwnerHandle,
        characteristics: Vec<DiscoveredCharacteristic>,
        error: Option<String>,
    },
    DiscoveredDescriptors {
        peripheral: PeripheralId,
        walk: WalkId,
        characteristic: CharacteristicHandle,
        descriptors: Vec<Uuid>,
        error: Option<String>,
    },
    CharacteristicValueUpdated {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        value: Option<Vec<u8>>,
        error: Option<String>,
    },
    CharacteristicWritten {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        error: Option<String>,
    },
    NotificationStateUpdated {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
        error: Option<String>,
    },
    DescriptorValueUpdated {
        peripheral: PeripheralId,
        descriptor: DescriptorHandle,
        value: Option<DescriptorValue>,
        error: Option<String>,
    },
    DescriptorWritten {
        peripheral: PeripheralId,
        descriptor: DescriptorHandle,
        error: Option<String>,
    },
}

impl CentralEvent {
    /// The peripheral the event belongs to; radio state updates belong to
    /// every session.
    pub fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            CentralEvent::StateUpdate { .. } => None,
            CentralEvent::DeviceConnected { peripheral, .. }
            | CentralEvent::ConnectionFailed { peripheral, .. }
            | CentralEvent::DeviceDisconnected { peripheral, .. }
            | CentralEvent::DiscoveredServices { peripheral, .. }
            | CentralEvent::DiscoveredIncludedServices { peripheral, .. }
            | CentralEvent::DiscoveredCharacteristics { peripheral, .. }
            | CentralEvent::DiscoveredDescriptors { peripheral, .. }
            | CentralEvent::CharacteristicValueUpdated { peripheral, .. }
            | CentralEvent::CharacteristicWritten { peripheral, .. }
            | CentralEvent::NotificationStateUpdated { peripheral, .. }
            | CentralEvent::DescriptorValueUpdated { peripheral, .. }
            | CentralEvent::DescriptorWritten { peripheral, .. } => Some(peripheral),
        }
    }
}

/// A characteristic as reported by characteristic discovery, before any of
/// its descriptors are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CentralState {
    Unknown = 0,
    Resetting = 1,
    Unsupported = 2,
    Unauthorized = 3,
    PoweredOff = 4,
    PoweredOn = 5,
}

impl CentralState {
    pub fn is_powered_on(self) -> bool {
        self == CentralState::PoweredOn
    }
}

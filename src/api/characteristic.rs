use bitflags::bitflags;
use uuid::Uuid;

use crate::api::descriptor::Descriptor;
use crate::{Error, ErrorType, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub value: Option<Vec<u8>>,
    pub descriptors: Vec<Descriptor>,
    pub is_notifying: bool,
}

impl Characteristic {
    pub fn new(uuid: Uuid, properties: CharacteristicProperties) -> Self {
        Characteristic {
            uuid,
            properties,
            value: None,
            descriptors: Vec::new(),
            is_notifying: false,
        }
    }

    /// Last known value as `0x`-prefixed upper-case hex, empty when the
    /// value has never been read.
    pub fn value_string(&self) -> String {
        match &self.value {
            Some(value) => format!("0x{}", hex::encode_upper(value)),
            None => String::new(),
        }
    }

    /// User actions offered for this characteristic, in display order.
    pub fn actions(&self) -> Vec<ActionType> {
        let mut actions = Vec::new();
        if self.properties.contains(CharacteristicProperties::READ) {
            actions.push(ActionType::Read);
        }
        if self.properties.intersects(CharacteristicProperties::WRITABLE) {
            actions.push(ActionType::Write);
        }
        if self.properties.intersects(CharacteristicProperties::NOTIFIABLE) {
            if self.is_notifying {
                actions.push(ActionType::Disable);
            } else {
                actions.push(ActionType::Enable);
            }
        }
        actions
    }
}

bitflags! {
    /// Characteristic properties, using the bit values of the
    /// Characteristic Declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharacteristicProperties {
    pub const WRITABLE: Self = Self::WRITE
        .union(Self::WRITE_WITHOUT_RESPONSE)
        .union(Self::AUTHENTICATED_SIGNED_WRITES);
    pub const NOTIFIABLE: Self = Self::NOTIFY.union(Self::INDICATE);
}

#[derive(Debug, Clone, Copy, PartialOrd, Ord, Eq, PartialEq, Hash)]
pub enum CharacteristicWriteType {
    WriteWithResponse,
    WriteWithoutResponse,
}

impl CharacteristicWriteType {
    /// Picks the write type for a characteristic. With no explicit request,
    /// a write with response is preferred whenever the characteristic
    /// supports it.
    pub fn resolve(
        properties: CharacteristicProperties,
        requested: Option<CharacteristicWriteType>,
    ) -> Result<Self> {
        let with_response = properties.contains(CharacteristicProperties::WRITE);
        let without_response = properties.intersects(
            CharacteristicProperties::WRITE_WITHOUT_RESPONSE
                | CharacteristicProperties::AUTHENTICATED_SIGNED_WRITES,
        );
        match requested {
            Some(Self::WriteWithResponse) if with_response => Ok(Self::WriteWithResponse),
            Some(Self::WriteWithoutResponse) if without_response => {
                Ok(Self::WriteWithoutResponse)
            }
            Some(other) => Err(Error::new(
                ErrorType::OperationNotPermitted,
                format!("characteristic does not support {other:?}"),
            )),
            None if with_response => Ok(Self::WriteWithResponse),
            None if without_response => Ok(Self::WriteWithoutResponse),
            None => Err(Error::new(
                ErrorType::OperationNotPermitted,
                "characteristic is not writable",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Read,
    Write,
    Enable,
    Disable,
}

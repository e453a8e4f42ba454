use log::{debug, trace};

use crate::api::central::{CentralTransport, PeripheralId};
use crate::api::characteristic::{Characteristic, CharacteristicProperties, CharacteristicWriteType};
use crate::api::descriptor::Descriptor;
use crate::api::handle::{AttributeHandle, CharacteristicHandle, DescriptorHandle};
use crate::api::service::AttributeTree;
use crate::{Error, ErrorType, Result};

/// A payload supplied for a pending write. `write_type` of `None` lets the
/// characteristic's properties decide.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteRequest {
    pub data: Vec<u8>,
    pub write_type: Option<CharacteristicWriteType>,
}

impl WriteRequest {
    pub fn new(data: Vec<u8>) -> Self {
        WriteRequest {
            data,
            write_type: None,
        }
    }

    pub fn with_type(mut self, write_type: CharacteristicWriteType) -> Self {
        self.write_type = Some(write_type);
        self
    }

    /// Parses a hex string such as `"0x01FF"` or `"01 ff"`.
    pub fn from_hex(input: &str) -> Result<Self> {
        let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits.as_str());
        Ok(WriteRequest::new(hex::decode(digits)?))
    }
}

/// A write waiting for its payload. A session holds at most one; asking for
/// another write replaces it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingWrite {
    pub characteristic: CharacteristicHandle,
    pub properties: CharacteristicProperties,
}

impl PendingWrite {
    /// True when the caller should be offered a choice of write type.
    pub fn offers_both_types(&self) -> bool {
        self.properties.contains(CharacteristicProperties::WRITE)
            && self
                .properties
                .contains(CharacteristicProperties::WRITE_WITHOUT_RESPONSE)
    }
}

/// Turns reads, writes and notification toggles on a published tree into
/// transport requests. Results come back as events.
pub struct OperationDispatcher<'a, T: CentralTransport + ?Sized> {
    transport: &'a T,
    peripheral: &'a PeripheralId,
    tree: &'a AttributeTree,
}

impl<'a, T: CentralTransport + ?Sized> OperationDispatcher<'a, T> {
    pub fn new(transport: &'a T, peripheral: &'a PeripheralId, tree: &'a AttributeTree) -> Self {
        OperationDispatcher {
            transport,
            peripheral,
            tree,
        }
    }

    pub async fn read(&self, handle: CharacteristicHandle) -> Result<()> {
        let characteristic = self.characteristic(handle)?;
        require(characteristic, CharacteristicProperties::READ, "read")?;
        trace!("read {handle:?} on {}", self.peripheral);
        self.transport
            .read(self.peripheral, AttributeHandle::Characteristic(handle))
            .await
    }

    pub async fn write(
        &self,
        handle: CharacteristicHandle,
        data: &[u8],
        write_type: Option<CharacteristicWriteType>,
    ) -> Result<CharacteristicWriteType> {
        let characteristic = self.characteristic(handle)?;
        let write_type = CharacteristicWriteType::resolve(characteristic.properties, write_type)?;
        debug!(
            "write {} bytes to {handle:?} on {} ({write_type:?})",
            data.len(),
            self.peripheral
        );
        self.transport
            .write(
                self.peripheral,
                AttributeHandle::Characteristic(handle),
                data,
                write_type,
            )
            .await?;
        Ok(write_type)
    }

    /// Requests the opposite of the current notification state. The new state
    /// is only reflected once the transport confirms it.
    pub async fn toggle_notify(&self, handle: CharacteristicHandle) -> Result<bool> {
        let characteristic = self.characteristic(handle)?;
        require(characteristic, CharacteristicProperties::NOTIFIABLE, "subscribe")?;
        let enable = !characteristic.is_notifying;
        trace!("set notify {enable} for {handle:?} on {}", self.peripheral);
        self.transport
            .set_notify(self.peripheral, handle, enable)
            .await?;
        Ok(enable)
    }

    pub async fn read_descriptor(&self, handle: DescriptorHandle) -> Result<()> {
        self.descriptor(handle)?;
        trace!("read {handle:?} on {}", self.peripheral);
        self.transport
            .read(self.peripheral, AttributeHandle::Descriptor(handle))
            .await
    }

    pub async fn write_descriptor(&self, handle: DescriptorHandle, data: &[u8]) -> Result<()> {
        self.descriptor(handle)?;
        debug!("write {} bytes to {handle:?} on {}", data.len(), self.peripheral);
        self.transport
            .write(
                self.peripheral,
                AttributeHandle::Descriptor(handle),
                data,
                CharacteristicWriteType::WriteWithResponse,
            )
            .await
    }

    /// Checks that `handle` can take a write and captures what the caller
    /// needs to pick a write type.
    pub fn prepare_write(&self, handle: CharacteristicHandle) -> Result<PendingWrite> {
        let characteristic = self.characteristic(handle)?;
        require(characteristic, CharacteristicProperties::WRITABLE, "write")?;
        Ok(PendingWrite {
            characteristic: handle,
            properties: characteristic.properties,
        })
    }

    fn characteristic(&self, handle: CharacteristicHandle) -> Result<&'a Characteristic> {
        self.tree.characteristic(handle).ok_or_else(|| {
            Error::new(
                ErrorType::UnknownAttribute,
                format!("no characteristic at {handle:?}"),
            )
        })
    }

    fn descriptor(&self, handle: DescriptorHandle) -> Result<&'a Descriptor> {
        self.tree.descriptor(handle).ok_or_else(|| {
            Error::new(
                ErrorType::UnknownAttribute,
                format!("no descriptor at {handle:?}"),
            )
        })
    }
}

fn require(
    characteristic: &Characteristic,
    needed: CharacteristicProperties,
    action: &str,
) -> Result<()> {
    if characteristic.properties.intersects(needed) {
        return Ok(());
    }
    Err(Error::new(
        ErrorType::OperationNotPermitted,
        format!(
            "cannot {action} characteristic {} with properties {:?}",
            characteristic.uuid, characteristic.properties
        ),
    ))
}

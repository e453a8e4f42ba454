use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::api::central_event::CentralState;
use crate::api::characteristic::CharacteristicWriteType;
use crate::api::handle::{
    AttributeHandle, CharacteristicHandle, OwnerHandle, ServiceHandle, WalkId,
};

/// The radio stack a session talks through.
///
/// Every request is fire-and-forget: `Ok(())` means the request was handed
/// to the radio, and its outcome arrives later as a
/// [`CentralEvent`](crate::api::central_event::CentralEvent) tagged with the
/// peripheral id. Discovery events also carry back the [`WalkId`] the request
/// was issued under. An `Err` means the request never left, and the session
/// treats it like a response that carried that error.
///
/// Attribute handles name positions in the tree the session is building; an
/// implementation keeps its own mapping from handles to native objects.
#[async_trait]
pub trait CentralTransport: Send + Sync {
    fn state(&self) -> CentralState;

    fn retrieve_peripheral(&self, peripheral: &PeripheralId) -> Option<PeripheralInfo>;

    async fn connect(&self, peripheral: &PeripheralId) -> Result<()>;

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<()>;

    async fn discover_services(&self, peripheral: &PeripheralId, walk: WalkId) -> Result<()>;

    async fn discover_included_services(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        service: ServiceHandle,
    ) -> Result<()>;

    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        owner: OwnerHandle,
    ) -> Result<()>;

    async fn discover_descriptors(
        &self,
        peripheral: &PeripheralId,
        walk: WalkId,
        characteristic: CharacteristicHandle,
    ) -> Result<()>;

    async fn read(&self, peripheral: &PeripheralId, attribute: AttributeHandle) -> Result<()>;

    async fn write(
        &self,
        peripheral: &PeripheralId,
        attribute: AttributeHandle,
        data: &[u8],
        write_type: CharacteristicWriteType,
    ) -> Result<()>;

    async fn set_notify(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
    ) -> Result<()>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PeripheralInfo {
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PeripheralId(Uuid);

impl PeripheralId {
    pub fn new(uuid: Uuid) -> Self {
        PeripheralId(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for PeripheralId {
    fn from(uuid: Uuid) -> Self {
        PeripheralId(uuid)
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

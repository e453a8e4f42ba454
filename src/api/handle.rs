// UUIDs repeat across a GATT database, so attributes are addressed by their
// position in the discovered tree. Handles are only meaningful for the walk
// that produced them.

/// Generation of a discovery walk. Every reconnect starts a new walk, and the
/// transport echoes the id back on each discovery event so answers to an
/// abandoned walk can be told apart.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct WalkId(pub u32);

impl WalkId {
    pub fn next(self) -> Self {
        WalkId(self.0.wrapping_add(1))
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ServiceHandle {
    pub service: usize,
}

/// The node a characteristic list hangs off: a top-level service or one of
/// its included services.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum OwnerHandle {
    Service(ServiceHandle),
    Included {
        service: ServiceHandle,
        included: usize,
    },
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CharacteristicHandle {
    pub owner: OwnerHandle,
    pub characteristic: usize,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DescriptorHandle {
    pub characteristic: CharacteristicHandle,
    pub descriptor: usize,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttributeHandle {
    Characteristic(CharacteristicHandle),
    Descriptor(DescriptorHandle),
}

impl ServiceHandle {
    pub fn new(service: usize) -> Self {
        Self { service }
    }

    pub fn owner(self) -> OwnerHandle {
        OwnerHandle::Service(self)
    }

    pub fn included(self, included: usize) -> OwnerHandle {
        OwnerHandle::Included {
            service: self,
            included,
        }
    }
}

impl OwnerHandle {
    pub fn service(&self) -> ServiceHandle {
        match *self {
            OwnerHandle::Service(service) => service,
            OwnerHandle::Included { service, .. } => service,
        }
    }

    pub fn characteristic(self, characteristic: usize) -> CharacteristicHandle {
        CharacteristicHandle {
            owner: self,
            characteristic,
        }
    }
}

impl CharacteristicHandle {
    pub fn descriptor(self, descriptor: usize) -> DescriptorHandle {
        DescriptorHandle {
            characteristic: self,
            descriptor,
        }
    }
}

impl From<CharacteristicHandle> for AttributeHandle {
    fn from(handle: CharacteristicHandle) -> Self {
        AttributeHandle::Characteristic(handle)
    }
}

impl From<DescriptorHandle> for AttributeHandle {
    fn from(handle: DescriptorHandle) -> Self {
        AttributeHandle::Descriptor(handle)
    }
}

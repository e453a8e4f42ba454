use uuid::Uuid;

use crate::api::central_event::DiscoveredCharacteristic;
use crate::api::characteristic::Characteristic;
use crate::api::descriptor::Descriptor;
use crate::api::handle::{CharacteristicHandle, DescriptorHandle, OwnerHandle, ServiceHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub characteristics: Vec<Characteristic>,
    pub included_services: Vec<IncludedService>,
}

/// A service referenced from another service. Included services of included
/// services are not walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedService {
    pub uuid: Uuid,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(uuid: Uuid) -> Self {
        Service {
            uuid,
            characteristics: Vec::new(),
            included_services: Vec::new(),
        }
    }
}

impl IncludedService {
    pub fn new(uuid: Uuid) -> Self {
        IncludedService {
            uuid,
            characteristics: Vec::new(),
        }
    }
}

/// Every service, included service, characteristic and descriptor of one
/// peripheral, in discovery order.
///
/// Consumers only ever see complete snapshots of this tree. The session keeps
/// a private live copy that discovery and value events mutate, and publishes a
/// fresh clone after each change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeTree {
    pub services: Vec<Service>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(&self, handle: ServiceHandle) -> Option<&Service> {
        self.services.get(handle.service)
    }

    pub fn characteristics(&self, owner: OwnerHandle) -> Option<&[Characteristic]> {
        match owner {
            OwnerHandle::Service(service) => {
                self.service(service).map(|s| s.characteristics.as_slice())
            }
            OwnerHandle::Included { service, included } => self
                .service(service)
                .and_then(|s| s.included_services.get(included))
                .map(|i| i.characteristics.as_slice()),
        }
    }

    pub fn characteristic(&self, handle: CharacteristicHandle) -> Option<&Characteristic> {
        self.characteristics(handle.owner)?
            .get(handle.characteristic)
    }

    pub fn descriptor(&self, handle: DescriptorHandle) -> Option<&Descriptor> {
        self.characteristic(handle.characteristic)?
            .descriptors
            .get(handle.descriptor)
    }

    /// Handles of every characteristic in the tree, depth first.
    pub fn characteristic_handles(&self) -> Vec<CharacteristicHandle> {
        let mut handles = Vec::new();
        for (index, service) in self.services.iter().enumerate() {
            let service_handle = ServiceHandle::new(index);
            for (included, included_service) in service.included_services.iter().enumerate() {
                let owner = service_handle.included(included);
                handles.extend(
                    (0..included_service.characteristics.len()).map(|c| owner.characteristic(c)),
                );
            }
            let owner = service_handle.owner();
            handles.extend((0..service.characteristics.len()).map(|c| owner.characteristic(c)));
        }
        handles
    }

    /// Counts of (services, included services, characteristics, descriptors).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let included = self
            .services
            .iter()
            .map(|s| s.included_services.len())
            .sum();
        let handles = self.characteristic_handles();
        let descriptors = handles
            .iter()
            .filter_map(|h| self.characteristic(*h))
            .map(|c| c.descriptors.len())
            .sum();
        (self.services.len(), included, handles.len(), descriptors)
    }

    pub(crate) fn set_services(&mut self, services: &[Uuid]) {
        self.services = services.iter().copied().map(Service::new).collect();
    }

    pub(crate) fn set_included_services(&mut self, handle: ServiceHandle, included: &[Uuid]) -> bool {
        match self.services.get_mut(handle.service) {
            Some(service) => {
                service.included_services =
                    included.iter().copied().map(IncludedService::new).collect();
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_characteristics(
        &mut self,
        owner: OwnerHandle,
        characteristics: &[DiscoveredCharacteristic],
    ) -> bool {
        match self.characteristics_mut(owner) {
            Some(list) => {
                *list = characteristics
                    .iter()
                    .map(|c| Characteristic::new(c.uuid, c.properties))
                    .collect();
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_descriptors(&mut self, handle: CharacteristicHandle, descriptors: &[Uuid]) -> bool {
        match self.characteristic_mut(handle) {
            Some(characteristic) => {
                characteristic.descriptors = descriptors.iter().copied().map(Descriptor::new).collect();
                true
            }
            None => false,
        }
    }

    pub(crate) fn characteristic_mut(
        &mut self,
        handle: CharacteristicHandle,
    ) -> Option<&mut Characteristic> {
        self.characteristics_mut(handle.owner)?
            .get_mut(handle.characteristic)
    }

    pub(crate) fn descriptor_mut(&mut self, handle: DescriptorHandle) -> Option<&mut Descriptor> {
        self.characteristic_mut(handle.characteristic)?
            .descriptors
            .get_mut(handle.descriptor)
    }

    fn characteristics_mut(&mut self, owner: OwnerHandle) -> Option<&mut Vec<Characteristic>> {
        match owner {
            OwnerHandle::Service(service) => self
                .services
                .get_mut(service.service)
                .map(|s| &mut s.characteristics),
            OwnerHandle::Included { service, included } => self
                .services
                .get_mut(service.service)
                .and_then(|s| s.included_services.get_mut(included))
                .map(|i| &mut i.characteristics),
        }
    }
}

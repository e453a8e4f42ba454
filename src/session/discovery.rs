use std::collections::HashSet;

use log::{debug, warn};
use uuid::Uuid;

use crate::api::central_event::DiscoveredCharacteristic;
use crate::api::handle::{CharacteristicHandle, OwnerHandle, ServiceHandle};
use crate::api::service::AttributeTree;
use crate::session::counter::PendingOperationCounter;
use crate::{Error, ErrorType, Result};

/// One discovery request the walker wants issued.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DiscoveryRequest {
    Services,
    IncludedServices(ServiceHandle),
    Characteristics(OwnerHandle),
    Descriptors(CharacteristicHandle),
}

/// The answer to a [`DiscoveryRequest`]. A failed request carries whatever
/// children were returned (usually none) together with the error.
#[derive(Clone, Debug, PartialEq)]
pub enum DiscoveryResponse {
    Services {
        services: Vec<Uuid>,
        error: Option<String>,
    },
    IncludedServices {
        service: ServiceHandle,
        included_services: Vec<Uuid>,
        error: Option<String>,
    },
    Characteristics {
        owner: OwnerHandle,
        characteristics: Vec<DiscoveredCharacteristic>,
        error: Option<String>,
    },
    Descriptors {
        characteristic: CharacteristicHandle,
        descriptors: Vec<Uuid>,
        error: Option<String>,
    },
}

impl DiscoveryResponse {
    /// The empty response standing in for a request that could not be issued.
    pub fn failed(request: DiscoveryRequest, error: String) -> Self {
        let error = Some(error);
        match request {
            DiscoveryRequest::Services => DiscoveryResponse::Services {
                services: Vec::new(),
                error,
            },
            DiscoveryRequest::IncludedServices(service) => DiscoveryResponse::IncludedServices {
                service,
                included_services: Vec::new(),
                error,
            },
            DiscoveryRequest::Characteristics(owner) => DiscoveryResponse::Characteristics {
                owner,
                characteristics: Vec::new(),
                error,
            },
            DiscoveryRequest::Descriptors(characteristic) => DiscoveryResponse::Descriptors {
                characteristic,
                descriptors: Vec::new(),
                error,
            },
        }
    }

    pub fn request(&self) -> DiscoveryRequest {
        match self {
            DiscoveryResponse::Services { .. } => DiscoveryRequest::Services,
            DiscoveryResponse::IncludedServices { service, .. } => {
                DiscoveryRequest::IncludedServices(*service)
            }
            DiscoveryResponse::Characteristics { owner, .. } => {
                DiscoveryRequest::Characteristics(*owner)
            }
            DiscoveryResponse::Descriptors { characteristic, .. } => {
                DiscoveryRequest::Descriptors(*characteristic)
            }
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            DiscoveryResponse::Services { error, .. }
            | DiscoveryResponse::IncludedServices { error, .. }
            | DiscoveryResponse::Characteristics { error, .. }
            | DiscoveryResponse::Descriptors { error, .. } => error.as_deref(),
        }
    }
}

/// A discovery request that failed and was treated as empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveryDiagnostic {
    pub request: DiscoveryRequest,
    pub error: String,
}

/// What to do after a response was folded in.
#[derive(Debug, Default, PartialEq)]
pub struct WalkStep {
    pub requests: Vec<DiscoveryRequest>,
    pub complete: bool,
}

/// Walks services, then included services and characteristics, then
/// descriptors, joining on a [`PendingOperationCounter`].
///
/// The walker issues nothing itself; it hands back the requests each response
/// causes and the caller sends them. Responses may arrive in any order as long
/// as a parent's response precedes its children's.
#[derive(Debug)]
pub struct DiscoveryWalker {
    counter: PendingOperationCounter,
    outstanding: HashSet<DiscoveryRequest>,
    tree: AttributeTree,
    diagnostics: Vec<DiscoveryDiagnostic>,
}

impl DiscoveryWalker {
    /// Starts a walk at the root. The returned request must be issued.
    pub fn start() -> Result<(Self, DiscoveryRequest)> {
        let mut outstanding = HashSet::new();
        outstanding.insert(DiscoveryRequest::Services);
        let walker = DiscoveryWalker {
            counter: PendingOperationCounter::begin(1)?,
            outstanding,
            tree: AttributeTree::new(),
            diagnostics: Vec::new(),
        };
        Ok((walker, DiscoveryRequest::Services))
    }

    pub fn handle(&mut self, response: DiscoveryResponse) -> Result<WalkStep> {
        let request = response.request();
        if !self.outstanding.remove(&request) {
            return Err(Error::new(
                ErrorType::InvariantViolation,
                format!("response to {request:?} was not awaited"),
            ));
        }
        self.counter.complete_one()?;

        if let Some(error) = response.error() {
            warn!("discovery of {request:?} failed, continuing with partial result: {error}");
            self.diagnostics.push(DiscoveryDiagnostic {
                request,
                error: error.to_string(),
            });
        }

        let requests = self.fold(response)?;
        self.counter.fan_out(requests.len())?;
        self.outstanding.extend(requests.iter().copied());
        let complete = self.counter.check_complete();
        debug_assert_eq!(self.counter.pending(), self.outstanding.len());
        debug!(
            "discovery {request:?} settled, {} new, {} pending",
            requests.len(),
            self.counter.pending()
        );
        Ok(WalkStep { requests, complete })
    }

    fn fold(&mut self, response: DiscoveryResponse) -> Result<Vec<DiscoveryRequest>> {
        let requests = match response {
            DiscoveryResponse::Services { services, .. } => {
                self.tree.set_services(&services);
                (0..services.len())
                    .map(ServiceHandle::new)
                    .flat_map(|service| {
                        [
                            DiscoveryRequest::IncludedServices(service),
                            DiscoveryRequest::Characteristics(service.owner()),
                        ]
                    })
                    .collect()
            }
            DiscoveryResponse::IncludedServices {
                service,
                included_services,
                ..
            } => {
                if !self.tree.set_included_services(service, &included_services) {
                    return Err(unknown_parent(DiscoveryRequest::IncludedServices(service)));
                }
                (0..included_services.len())
                    .map(|included| DiscoveryRequest::Characteristics(service.included(included)))
                    .collect()
            }
            DiscoveryResponse::Characteristics {
                owner,
                characteristics,
                ..
            } => {
                if !self.tree.set_characteristics(owner, &characteristics) {
                    return Err(unknown_parent(DiscoveryRequest::Characteristics(owner)));
                }
                (0..characteristics.len())
                    .map(|c| DiscoveryRequest::Descriptors(owner.characteristic(c)))
                    .collect()
            }
            DiscoveryResponse::Descriptors {
                characteristic,
                descriptors,
                ..
            } => {
                if !self.tree.set_descriptors(characteristic, &descriptors) {
                    return Err(unknown_parent(DiscoveryRequest::Descriptors(characteristic)));
                }
                Vec::new()
            }
        };
        Ok(requests)
    }

    pub fn is_complete(&self) -> bool {
        self.counter.is_finished()
    }

    pub fn pending(&self) -> usize {
        self.counter.pending()
    }

    pub fn diagnostics(&self) -> &[DiscoveryDiagnostic] {
        &self.diagnostics
    }

    /// Consumes a finished walk, yielding the discovered tree and the
    /// requests that failed along the way.
    pub fn finish(self) -> (AttributeTree, Vec<DiscoveryDiagnostic>) {
        (self.tree, self.diagnostics)
    }
}

fn unknown_parent(request: DiscoveryRequest) -> Error {
    Error::new(
        ErrorType::InvariantViolation,
        format!("{request:?} refers to a node the walk never created"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::characteristic::CharacteristicProperties;
    use crate::uuid::ShortUuid;

    fn chars(n: usize) -> Vec<DiscoveredCharacteristic> {
        (0..n)
            .map(|i| DiscoveredCharacteristic {
                uuid: Uuid::from_u16(0x2A00 + i as u16),
                properties: CharacteristicProperties::READ,
            })
            .collect()
    }

    #[test]
    fn empty_service_completes_without_fan_out() {
        let (mut walker, _) = DiscoveryWalker::start().unwrap();
        let step = walker
            .handle(DiscoveryResponse::Services {
                services: vec![Uuid::from_u16(0x1800)],
                error: None,
            })
            .unwrap();
        assert_eq!(step.requests.len(), 2);

        let service = ServiceHandle::new(0);
        let step = walker
            .handle(DiscoveryResponse::Characteristics {
                owner: service.owner(),
                characteristics: Vec::new(),
                error: None,
            })
            .unwrap();
        assert!(step.requests.is_empty());
        assert!(!step.complete);

        let step = walker
            .handle(DiscoveryResponse::IncludedServices {
                service,
                included_services: Vec::new(),
                error: None,
            })
            .unwrap();
        assert!(step.complete);
        assert_eq!(walker.pending(), 0);
    }

    #[test]
    fn no_services_completes_at_root() {
        let (mut walker, root) = DiscoveryWalker::start().unwrap();
        assert_eq!(root, DiscoveryRequest::Services);
        let step = walker
            .handle(DiscoveryResponse::Services {
                services: Vec::new(),
                error: None,
            })
            .unwrap();
        assert!(step.complete);
        let (tree, diagnostics) = walker.finish();
        assert!(tree.services.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn failed_request_still_settles() {
        let (mut walker, root) = DiscoveryWalker::start().unwrap();
        let step = walker
            .handle(DiscoveryResponse::failed(root, "timeout".into()))
            .unwrap();
        assert!(step.complete);
        assert_eq!(
            walker.diagnostics(),
            &[DiscoveryDiagnostic {
                request: DiscoveryRequest::Services,
                error: "timeout".into()
            }]
        );
    }

    #[test]
    fn errored_response_keeps_returned_children() {
        let (mut walker, _) = DiscoveryWalker::start().unwrap();
        let step = walker
            .handle(DiscoveryResponse::Services {
                services: vec![Uuid::from_u16(0x180D)],
                error: Some("partial".into()),
            })
            .unwrap();
        assert_eq!(step.requests.len(), 2);
        assert_eq!(walker.diagnostics().len(), 1);
    }

    #[test]
    fn duplicate_response_is_rejected() {
        let (mut walker, _) = DiscoveryWalker::start().unwrap();
        walker
            .handle(DiscoveryResponse::Services {
                services: vec![Uuid::from_u16(0x180D)],
                error: None,
            })
            .unwrap();
        let owner = ServiceHandle::new(0).owner();
        walker
            .handle(DiscoveryResponse::Characteristics {
                owner,
                characteristics: chars(1),
                error: None,
            })
            .unwrap();
        let pending = walker.pending();

        let err = walker
            .handle(DiscoveryResponse::Characteristics {
                owner,
                characteristics: chars(1),
                error: None,
            })
            .unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(walker.pending(), pending);
    }

    #[test]
    fn unrequested_child_is_rejected() {
        let (mut walker, _) = DiscoveryWalker::start().unwrap();
        let err = walker
            .handle(DiscoveryResponse::Descriptors {
                characteristic: ServiceHandle::new(0).owner().characteristic(0),
                descriptors: Vec::new(),
                error: None,
            })
            .unwrap_err();
        assert_eq!(err.kind, ErrorType::InvariantViolation);
        assert_eq!(walker.pending(), 1);
    }

    #[test]
    fn included_service_characteristics_are_walked() {
        let (mut walker, _) = DiscoveryWalker::start().unwrap();
        walker
            .handle(DiscoveryResponse::Services {
                services: vec![Uuid::from_u16(0x1812)],
                error: None,
            })
            .unwrap();
        let service = ServiceHandle::new(0);
        let step = walker
            .handle(DiscoveryResponse::IncludedServices {
                service,
                included_services: vec![Uuid::from_u16(0x180F)],
                error: None,
            })
            .unwrap();
        assert_eq!(
            step.requests,
            vec![DiscoveryRequest::Characteristics(service.included(0))]
        );
        let step = walker
            .handle(DiscoveryResponse::Characteristics {
                owner: service.included(0),
                characteristics: chars(1),
                error: None,
            })
            .unwrap();
        assert_eq!(
            step.requests,
            vec![DiscoveryRequest::Descriptors(
                service.included(0).characteristic(0)
            )]
        );
    }
}

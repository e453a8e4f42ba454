pub mod central;
pub mod central_event;
pub mod characteristic;
pub mod descriptor;
pub mod handle;
pub mod service;

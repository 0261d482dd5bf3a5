//! Domain layer: entities, value objects and the ports the coordinator
//! depends on. Nothing here knows about storage engines or transports.

pub mod code;
pub mod event;
pub mod party;
pub mod ports;
pub mod request;

#![allow(dead_code)]

use gridshare::application::coordinator::RequestCoordinator;
use gridshare::domain::event::Notification;
use gridshare::domain::party::{Coordinates, Holder, PartyId, Requester};
use gridshare::domain::ports::PartyDirectory;
use gridshare::infrastructure::channel_registry::{ChannelRegistry, SessionReceiver};
use gridshare::infrastructure::dispatcher::RegistryDispatcher;
use gridshare::infrastructure::in_memory::{InMemoryPartyDirectory, InMemoryRequestStore};
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const PARTIES_HEADER: &str =
    "role,id,name,phone,location,lat,lng,price_per_unit,available_capacity,status,settlement_handle";
pub const COMMANDS_HEADER: &str = "op,request,actor,holder,units,code,method,amount,reference";

/// Coordinator over in-memory storage with requester R1 and holder H1
/// (price 8.5, capacity 40) seeded, dispatching through `registry`.
pub async fn coordinator() -> (RequestCoordinator, Arc<ChannelRegistry>) {
    let parties = InMemoryPartyDirectory::new();
    parties
        .store_requester(Requester::new("R1", "Asha", "555-0101"))
        .await
        .unwrap();
    let mut holder = Holder::new(PartyId::from("H1"), "Solar Shed", dec!(8.5), dec!(40));
    holder.location = "4 Elm St".into();
    holder.coordinates = Some(Coordinates {
        lat: 12.97,
        lng: 77.59,
    });
    holder.settlement_handle = Some("shed@upi".into());
    parties.store_holder(holder).await.unwrap();

    let registry = Arc::new(ChannelRegistry::new());
    let coordinator = RequestCoordinator::new(
        Box::new(InMemoryRequestStore::new()),
        Box::new(parties),
        Box::new(RegistryDispatcher::new(registry.clone())),
    );
    (coordinator, registry)
}

/// Connects and registers one session for `party`.
pub async fn join(registry: &ChannelRegistry, party: &str) -> SessionReceiver {
    let (handle, receiver) = registry.connect();
    registry.register(PartyId::from(party), handle).await;
    receiver
}

pub fn drain(receiver: &mut SessionReceiver) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        received.push(notification);
    }
    received
}

pub fn parties_csv() -> NamedTempFile {
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "{PARTIES_HEADER}").unwrap();
    writeln!(csv, "requester, R1, Asha, 555-0101,,,,,,,").unwrap();
    writeln!(csv, "requester, R2, Ben, 555-0102,,,,,,,").unwrap();
    writeln!(csv, "holder, H1, Solar Shed, 555-0201, 4 Elm St, 12.97, 77.59, 8.5, 40, AVAILABLE, shed@upi").unwrap();
    writeln!(csv, "holder, H2, Roof Bank, 555-0202, 9 Oak Rd,,, 7, 5, AVAILABLE,").unwrap();
    csv
}

pub fn commands_csv(rows: &[&str]) -> NamedTempFile {
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "{COMMANDS_HEADER}").unwrap();
    for row in rows {
        writeln!(csv, "{row}").unwrap();
    }
    csv
}

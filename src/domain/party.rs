use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a requester or a holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Availability {
    #[default]
    Available,
    Busy,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// The party consuming the resource.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Requester {
    pub id: PartyId,
    pub name: String,
    pub phone: String,
}

impl Requester {
    pub fn new(id: impl Into<PartyId>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
        }
    }
}

/// The party supplying the resource.
///
/// Holds the exclusivity flag and the capacity counter, both of which are
/// written only under the coordinator's per-holder lock.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Holder {
    pub id: PartyId,
    pub name: String,
    pub phone: String,
    /// Textual address shown to the requester.
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub price_per_unit: Decimal,
    pub available_capacity: Decimal,
    pub availability: Availability,
    /// Payment identifier shown at settlement time.
    pub settlement_handle: Option<String>,
}

impl Holder {
    pub fn new(
        id: impl Into<PartyId>,
        name: impl Into<String>,
        price_per_unit: Decimal,
        available_capacity: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: String::new(),
            location: String::new(),
            coordinates: None,
            price_per_unit,
            available_capacity,
            availability: Availability::Available,
            settlement_handle: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.availability == Availability::Busy
    }

    pub fn lock(&mut self) {
        self.availability = Availability::Busy;
    }

    /// Removes consumed units from the capacity counter, flooring at zero.
    pub fn consume(&mut self, units: Decimal) {
        self.available_capacity = (self.available_capacity - units).max(Decimal::ZERO);
    }

    pub fn contact(&self) -> HolderContact {
        HolderContact {
            name: self.name.clone(),
            phone: self.phone.clone(),
            address: self.location.clone(),
            lat: self.coordinates.map(|c| c.lat),
            lng: self.coordinates.map(|c| c.lng),
        }
    }

    pub fn settlement_info(&self) -> HolderSettlementInfo {
        HolderSettlementInfo {
            holder_id: self.id.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            settlement_handle: self.settlement_handle.clone(),
        }
    }
}

/// What the requester learns about the holder once accepted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HolderContact {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HolderSettlementInfo {
    pub holder_id: PartyId,
    pub name: String,
    pub phone: String,
    pub settlement_handle: Option<String>,
}

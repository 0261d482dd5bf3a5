use crate::domain::party::{Availability, Coordinates, Holder, PartyId, Requester};
use crate::error::{BrokerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Requester,
    Holder,
}

#[derive(Debug, Deserialize, Clone)]
struct PartyRecord {
    role: PartyRole,
    id: String,
    name: String,
    phone: Option<String>,
    location: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    price_per_unit: Option<Decimal>,
    available_capacity: Option<Decimal>,
    status: Option<Availability>,
    settlement_handle: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Party {
    Requester(Requester),
    Holder(Holder),
}

impl TryFrom<PartyRecord> for Party {
    type Error = BrokerError;

    fn try_from(record: PartyRecord) -> Result<Self> {
        let phone = record.phone.unwrap_or_default();
        match record.role {
            PartyRole::Requester => Ok(Party::Requester(Requester::new(
                record.id.as_str(),
                record.name,
                phone,
            ))),
            PartyRole::Holder => {
                let price = record.price_per_unit.ok_or_else(|| {
                    BrokerError::ValidationError(format!("holder {} has no price_per_unit", record.id))
                })?;
                let capacity = record.available_capacity.unwrap_or(Decimal::ZERO);
                if capacity < Decimal::ZERO {
                    return Err(BrokerError::ValidationError(format!(
                        "holder {} has negative capacity",
                        record.id
                    )));
                }
                let coordinates = match (record.lat, record.lng) {
                    (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
                    (None, None) => None,
                    _ => {
                        return Err(BrokerError::ValidationError(format!(
                            "holder {} needs both lat and lng",
                            record.id
                        )));
                    }
                };
                let mut holder = Holder::new(PartyId::new(record.id), record.name, price, capacity);
                holder.phone = phone;
                holder.coordinates = coordinates;
                holder.location = record.location.unwrap_or_default();
                holder.availability = record.status.unwrap_or_default();
                holder.settlement_handle = record.settlement_handle;
                Ok(Party::Holder(holder))
            }
        }
    }
}

/// Reads the party directory seed from a CSV source.
pub struct PartyReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PartyReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn parties(self) -> impl Iterator<Item = Result<Party>> {
        self.reader
            .into_deserialize::<PartyRecord>()
            .map(|result| result.map_err(BrokerError::from).and_then(Party::try_from))
    }
}

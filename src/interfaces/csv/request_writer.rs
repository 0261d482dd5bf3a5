use crate::domain::party::PartyId;
use crate::domain::request::{Request, SettlementMethod, Status};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct RequestRow<'a> {
    request: &'a str,
    requester: &'a PartyId,
    holder: &'a PartyId,
    units: Decimal,
    status: Status,
    amount_paid: Option<Decimal>,
    method: Option<SettlementMethod>,
    reference: Option<&'a str>,
}

/// Writes final request snapshots as CSV, one row per labelled request.
pub struct RequestWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RequestWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_requests<'a>(
        &mut self,
        requests: impl IntoIterator<Item = (&'a str, &'a Request)>,
    ) -> Result<()> {
        for (label, request) in requests {
            let payment = request.payment.as_ref();
            self.writer.serialize(RequestRow {
                request: label,
                requester: &request.requester,
                holder: &request.holder,
                units: request.units_requested.value(),
                status: request.status,
                amount_paid: payment.map(|p| p.amount_paid),
                method: request.settlement_method,
                reference: payment.and_then(|p| p.transaction_ref.as_deref()),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

use super::code::VerificationCode;
use super::party::PartyId;
use crate::error::{BrokerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A strictly positive quantity of units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Units(Decimal);

impl Units {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(BrokerError::InvalidUnits)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Units {
    type Error = BrokerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Units> for Decimal {
    fn from(units: Units) -> Self {
        units.0
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle states. `Rejected` and `Paid` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Accepted,
    Verified,
    Delivering,
    Delivered,
    Paid,
    Rejected,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Paid | Status::Rejected)
    }

    /// The only states reachable in one step from `self`.
    pub fn successors(self) -> &'static [Status] {
        match self {
            Status::Pending => &[Status::Accepted, Status::Rejected],
            Status::Accepted => &[Status::Verified],
            Status::Verified => &[Status::Delivering],
            Status::Delivering => &[Status::Delivered],
            Status::Delivered => &[Status::Paid],
            Status::Paid | Status::Rejected => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Accepted => "ACCEPTED",
            Status::Verified => "VERIFIED",
            Status::Delivering => "DELIVERING",
            Status::Delivered => "DELIVERED",
            Status::Paid => "PAID",
            Status::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementMethod {
    Cash,
    Upi,
}

impl fmt::Display for SettlementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementMethod::Cash => f.write_str("CASH"),
            SettlementMethod::Upi => f.write_str("UPI"),
        }
    }
}

impl std::str::FromStr for SettlementMethod {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CASH" => Ok(SettlementMethod::Cash),
            "UPI" => Ok(SettlementMethod::Upi),
            other => Err(BrokerError::ValidationError(format!(
                "unknown settlement method {other:?}"
            ))),
        }
    }
}

/// Payment acknowledgment, written once when the request becomes `Paid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub method: SettlementMethod,
    pub amount_paid: Decimal,
    pub transaction_ref: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// One energy transaction between a requester and a holder.
///
/// The transition methods check the current status and mutate only when the
/// precondition holds; a failed check leaves the request untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub requester: PartyId,
    pub holder: PartyId,
    pub units_requested: Units,
    pub status: Status,
    pub code: VerificationCode,
    pub settlement_method: Option<SettlementMethod>,
    pub payment: Option<Settlement>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn new(
        requester: PartyId,
        holder: PartyId,
        units_requested: Units,
        code: VerificationCode,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::new(),
            requester,
            holder,
            units_requested,
            status: Status::Pending,
            code,
            settlement_method: None,
            payment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_holder(&self, party: &PartyId) -> bool {
        &self.holder == party
    }

    pub fn is_requester(&self, party: &PartyId) -> bool {
        &self.requester == party
    }

    pub fn accept(&mut self) -> Result<()> {
        self.advance(Status::Pending, Status::Accepted)
    }

    pub fn reject(&mut self) -> Result<()> {
        self.advance(Status::Pending, Status::Rejected)
    }

    /// Mismatch returns `InvalidCode` and leaves the request `Accepted`.
    pub fn verify(&mut self, submitted: &str) -> Result<()> {
        self.expect(Status::Accepted)?;
        if !self.code.matches(submitted) {
            return Err(BrokerError::InvalidCode);
        }
        self.advance(Status::Accepted, Status::Verified)
    }

    pub fn start_delivery(&mut self) -> Result<()> {
        self.advance(Status::Verified, Status::Delivering)
    }

    pub fn complete_delivery(&mut self) -> Result<()> {
        self.advance(Status::Delivering, Status::Delivered)
    }

    pub fn choose_settlement_method(&mut self, method: SettlementMethod) -> Result<()> {
        self.expect(Status::Delivered)?;
        self.settlement_method = Some(method);
        self.touch();
        Ok(())
    }

    pub fn settle(
        &mut self,
        method: SettlementMethod,
        amount_paid: Decimal,
        transaction_ref: Option<String>,
    ) -> Result<()> {
        self.expect(Status::Delivered)?;
        if amount_paid < Decimal::ZERO {
            return Err(BrokerError::ValidationError(
                "amount paid cannot be negative".to_string(),
            ));
        }
        let now = Utc::now();
        self.payment = Some(Settlement {
            method,
            amount_paid,
            transaction_ref,
            paid_at: now,
        });
        self.settlement_method = Some(method);
        self.status = Status::Paid;
        self.updated_at = now;
        Ok(())
    }

    fn expect(&self, expected: Status) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(BrokerError::InvalidTransition {
                request: self.id,
                expected,
                actual: self.status,
            })
        }
    }

    fn advance(&mut self, from: Status, to: Status) -> Result<()> {
        self.expect(from)?;
        debug_assert!(from.successors().contains(&to));
        self.status = to;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

use super::code::VerificationCode;
use super::party::{HolderContact, HolderSettlementInfo};
use super::request::{RequestId, SettlementMethod, Units};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Events pushed to a party when a request changes state.
///
/// Serialized as `{"event": "<name>", ...fields}` with camelCase names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum LifecycleEvent {
    /// To the holder.
    RequestCreated {
        transaction_id: RequestId,
        requester_name: String,
        units_requested: Units,
    },
    /// To the requester; carries the code to hand over at fulfillment.
    RequestAccepted {
        code: VerificationCode,
        holder_contact: HolderContact,
    },
    RequestRejected {},
    CodeVerified {},
    DeliveryStarted {},
    DeliveryCompleted {
        units_consumed: Units,
        amount_due: Decimal,
        holder_settlement_info: HolderSettlementInfo,
    },
    /// To the holder.
    SettlementMethodChosen { method: SettlementMethod },
    PaymentAcknowledged {},
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::RequestCreated { .. } => "requestCreated",
            LifecycleEvent::RequestAccepted { .. } => "requestAccepted",
            LifecycleEvent::RequestRejected {} => "requestRejected",
            LifecycleEvent::CodeVerified {} => "codeVerified",
            LifecycleEvent::DeliveryStarted {} => "deliveryStarted",
            LifecycleEvent::DeliveryCompleted { .. } => "deliveryCompleted",
            LifecycleEvent::SettlementMethodChosen { .. } => "settlementMethodChosen",
            LifecycleEvent::PaymentAcknowledged {} => "paymentAcknowledged",
        }
    }
}

/// What a session actually receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

impl Notification {
    pub fn new(request_id: RequestId, event: LifecycleEvent) -> Self {
        Self { request_id, event }
    }
}

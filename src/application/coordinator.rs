use super::config::CoordinatorConfig;
use super::locks::KeyedLocks;
use crate::domain::code::CodeGenerator;
use crate::domain::event::{LifecycleEvent, Notification};
use crate::domain::party::{Availability, Holder, PartyId};
use crate::domain::ports::{EventDispatcherBox, PartyDirectoryBox, RequestStoreBox};
use crate::domain::request::{Request, RequestId, SettlementMethod, Status, Units};
use crate::error::{BrokerError, Result};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
enum Role {
    Requester,
    Holder,
}

/// Drives requests through their lifecycle.
///
/// Every operation runs under the request's lock: the guard checks, the
/// writes and the resulting notification happen as one unit with respect to
/// other operations on the same request, so the counterparty sees events in
/// commit order. Holder state (availability, capacity) is additionally
/// serialized per holder. Locks are always taken request first, then holder.
pub struct RequestCoordinator {
    requests: RequestStoreBox,
    parties: PartyDirectoryBox,
    dispatcher: EventDispatcherBox,
    codes: CodeGenerator,
    request_locks: KeyedLocks<RequestId>,
    holder_locks: KeyedLocks<PartyId>,
}

impl RequestCoordinator {
    /// Creates a coordinator with the default configuration.
    pub fn new(
        requests: RequestStoreBox,
        parties: PartyDirectoryBox,
        dispatcher: EventDispatcherBox,
    ) -> Self {
        Self {
            requests,
            parties,
            dispatcher,
            codes: CodeGenerator::default(),
            request_locks: KeyedLocks::new(),
            holder_locks: KeyedLocks::new(),
        }
    }

    pub fn with_config(
        requests: RequestStoreBox,
        parties: PartyDirectoryBox,
        dispatcher: EventDispatcherBox,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        let mut coordinator = Self::new(requests, parties, dispatcher);
        coordinator.codes = config.code_generator()?;
        Ok(coordinator)
    }

    /// Opens a request from `requester_id` to `holder_id`.
    ///
    /// The holder is told about it; the verification code stays on the
    /// request and is only revealed to the requester on acceptance.
    pub async fn create(
        &self,
        requester_id: &PartyId,
        holder_id: &PartyId,
        units: Decimal,
    ) -> Result<RequestId> {
        let units = Units::new(units)?;
        let requester = self
            .parties
            .requester(requester_id)
            .await?
            .ok_or_else(|| BrokerError::party_not_found(requester_id))?;

        // Held through the notification so an accept cannot overtake it.
        let _holder_guard = self.holder_locks.lock(holder_id.clone()).await;
        let holder = self.load_holder(holder_id).await?;
        if requester.id == holder.id {
            return Err(BrokerError::Forbidden {
                actor: requester.id,
                target: format!("a request to holder {holder_id}"),
            });
        }
        if holder.is_busy() {
            return Err(BrokerError::HolderUnavailable(holder.id));
        }
        // Rejected up front so completion can always be charged.
        Self::amount_due(units, holder.price_per_unit)?;

        let request = Request::new(requester.id, holder.id, units, self.codes.generate());
        let id = request.id;
        self.requests.store(request).await?;
        info!(
            request = %id,
            requester = %requester_id,
            holder = %holder_id,
            units = %units,
            "request created"
        );

        self.notify(
            holder_id,
            id,
            LifecycleEvent::RequestCreated {
                transaction_id: id,
                requester_name: requester.name,
                units_requested: units,
            },
        )
        .await;
        Ok(id)
    }

    /// Holder takes the request; the holder becomes busy.
    pub async fn accept(&self, id: RequestId, actor: &PartyId) -> Result<Request> {
        let _guard = self.request_locks.lock(id).await;
        let mut request = self.load(id).await?;
        Self::authorize(&request, actor, Role::Holder)?;
        request.accept()?;

        let _holder_guard = self.holder_locks.lock(request.holder.clone()).await;
        let previous = self.load_holder(&request.holder).await?;
        if previous.is_busy() {
            return Err(BrokerError::HolderUnavailable(previous.id));
        }
        let mut holder = previous.clone();
        holder.lock();
        self.commit_with_holder(&request, &previous, &holder).await?;
        info!(request = %id, holder = %holder.id, "request accepted");

        self.notify(
            &request.requester,
            id,
            LifecycleEvent::RequestAccepted {
                code: request.code.clone(),
                holder_contact: holder.contact(),
            },
        )
        .await;
        Ok(request)
    }

    /// Holder declines the request. Availability is left as it is.
    pub async fn reject(&self, id: RequestId, actor: &PartyId) -> Result<Request> {
        self.transition(id, actor, Role::Holder, Request::reject, || {
            LifecycleEvent::RequestRejected {}
        })
        .await
    }

    /// Checks the code the requester handed over at fulfillment.
    ///
    /// A wrong code changes nothing and may be retried.
    pub async fn verify_code(
        &self,
        id: RequestId,
        actor: &PartyId,
        submitted: &str,
    ) -> Result<Request> {
        self.transition(
            id,
            actor,
            Role::Holder,
            |request| request.verify(submitted),
            || LifecycleEvent::CodeVerified {},
        )
        .await
    }

    pub async fn start_delivery(&self, id: RequestId, actor: &PartyId) -> Result<Request> {
        self.transition(id, actor, Role::Holder, Request::start_delivery, || {
            LifecycleEvent::DeliveryStarted {}
        })
        .await
    }

    /// Finishes delivery, charges `units x price` and draws down capacity.
    pub async fn complete_delivery(&self, id: RequestId, actor: &PartyId) -> Result<Request> {
        let _guard = self.request_locks.lock(id).await;
        let mut request = self.load(id).await?;
        Self::authorize(&request, actor, Role::Holder)?;
        request.complete_delivery()?;

        let _holder_guard = self.holder_locks.lock(request.holder.clone()).await;
        let previous = self.load_holder(&request.holder).await?;
        let consumed = request.units_requested;
        let amount_due = Self::amount_due(consumed, previous.price_per_unit)?;
        let mut holder = previous.clone();
        holder.consume(consumed.value());
        self.commit_with_holder(&request, &previous, &holder).await?;
        info!(
            request = %id,
            units = %consumed,
            amount_due = %amount_due,
            capacity = %holder.available_capacity,
            "delivery completed"
        );

        self.notify(
            &request.requester,
            id,
            LifecycleEvent::DeliveryCompleted {
                units_consumed: consumed,
                amount_due,
                holder_settlement_info: holder.settlement_info(),
            },
        )
        .await;
        Ok(request)
    }

    /// Requester announces how they intend to pay. Not a status change.
    pub async fn choose_settlement_method(
        &self,
        id: RequestId,
        actor: &PartyId,
        method: SettlementMethod,
    ) -> Result<Request> {
        let _guard = self.request_locks.lock(id).await;
        let mut request = self.load(id).await?;
        Self::authorize(&request, actor, Role::Requester)?;
        request.choose_settlement_method(method)?;
        self.requests.store(request.clone()).await?;
        info!(request = %id, method = %method, "settlement method chosen");

        self.notify(
            &request.holder,
            id,
            LifecycleEvent::SettlementMethodChosen { method },
        )
        .await;
        Ok(request)
    }

    /// Holder confirms the payment was received. No money moves here.
    pub async fn acknowledge_payment(
        &self,
        id: RequestId,
        actor: &PartyId,
        method: SettlementMethod,
        amount_paid: Decimal,
        transaction_ref: Option<String>,
    ) -> Result<Request> {
        self.transition(
            id,
            actor,
            Role::Holder,
            |request| request.settle(method, amount_paid, transaction_ref),
            || LifecycleEvent::PaymentAcknowledged {},
        )
        .await
    }

    pub async fn status(&self, id: RequestId) -> Result<Request> {
        self.load(id).await
    }

    /// Requests still waiting on `holder`, oldest first.
    pub async fn pending_for_holder(&self, holder: &PartyId) -> Result<Vec<Request>> {
        let mut pending: Vec<Request> = self
            .requests
            .by_holder(holder)
            .await?
            .into_iter()
            .filter(|request| request.status == Status::Pending)
            .collect();
        pending.sort_by_key(|request| request.created_at);
        Ok(pending)
    }

    /// Entry point for the external online/offline collaborator; the only
    /// way a busy holder becomes available again.
    pub async fn set_availability(
        &self,
        holder_id: &PartyId,
        availability: Availability,
    ) -> Result<Holder> {
        let _holder_guard = self.holder_locks.lock(holder_id.clone()).await;
        let mut holder = self.load_holder(holder_id).await?;
        holder.availability = availability;
        self.parties.store_holder(holder.clone()).await?;
        info!(holder = %holder_id, availability = ?availability, "holder availability set");
        Ok(holder)
    }

    /// Shared body of the transitions that touch only the request.
    async fn transition<F, E>(
        &self,
        id: RequestId,
        actor: &PartyId,
        role: Role,
        apply: F,
        event: E,
    ) -> Result<Request>
    where
        F: FnOnce(&mut Request) -> Result<()>,
        E: FnOnce() -> LifecycleEvent,
    {
        let _guard = self.request_locks.lock(id).await;
        let mut request = self.load(id).await?;
        Self::authorize(&request, actor, role)?;
        apply(&mut request)?;
        self.requests.store(request.clone()).await?;
        info!(request = %id, actor = %actor, status = %request.status, "request advanced");

        let recipient = match role {
            Role::Holder => &request.requester,
            Role::Requester => &request.holder,
        };
        self.notify(recipient, id, event()).await;
        Ok(request)
    }

    /// Writes the holder, then the request. If the request write fails the
    /// holder is put back so neither write is left behind on its own.
    async fn commit_with_holder(
        &self,
        request: &Request,
        previous: &Holder,
        holder: &Holder,
    ) -> Result<()> {
        self.parties.store_holder(holder.clone()).await?;
        if let Err(e) = self.requests.store(request.clone()).await {
            if let Err(restore) = self.parties.store_holder(previous.clone()).await {
                error!(
                    request = %request.id,
                    holder = %holder.id,
                    error = %restore,
                    "failed to restore holder after request write failure"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn authorize(request: &Request, actor: &PartyId, role: Role) -> Result<()> {
        let allowed = match role {
            Role::Holder => request.is_holder(actor),
            Role::Requester => request.is_requester(actor),
        };
        if allowed {
            Ok(())
        } else {
            Err(BrokerError::Forbidden {
                actor: actor.clone(),
                target: format!("request {}", request.id),
            })
        }
    }

    fn amount_due(units: Units, price_per_unit: Decimal) -> Result<Decimal> {
        units.value().checked_mul(price_per_unit).ok_or_else(|| {
            BrokerError::ValidationError(format!(
                "amount due for {units} units at {price_per_unit} per unit overflows"
            ))
        })
    }

    async fn load(&self, id: RequestId) -> Result<Request> {
        self.requests
            .get(id)
            .await?
            .ok_or_else(|| BrokerError::request_not_found(id))
    }

    async fn load_holder(&self, id: &PartyId) -> Result<Holder> {
        self.parties
            .holder(id)
            .await?
            .ok_or_else(|| BrokerError::party_not_found(id))
    }

    async fn notify(&self, recipient: &PartyId, id: RequestId, event: LifecycleEvent) {
        let name = event.name();
        let delivered = self
            .dispatcher
            .dispatch(recipient, Notification::new(id, event))
            .await;
        if delivered == 0 {
            debug!(request = %id, recipient = %recipient, event = name, "no live session, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::party::{Holder, Requester};
    use crate::domain::ports::{EventDispatcher, PartyDirectory, RequestStore};
    use crate::infrastructure::in_memory::{InMemoryPartyDirectory, InMemoryRequestStore};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingDispatcher {
        sent: Arc<Mutex<Vec<(PartyId, Notification)>>>,
    }

    impl RecordingDispatcher {
        fn sent(&self) -> Vec<(PartyId, Notification)> {
            self.sent.lock().unwrap().clone()
        }

        fn names_for(&self, party: &str) -> Vec<&'static str> {
            self.sent()
                .iter()
                .filter(|(to, _)| to.as_str() == party)
                .map(|(_, n)| n.event.name())
                .collect()
        }
    }

    #[async_trait]
    impl EventDispatcher for RecordingDispatcher {
        async fn dispatch(&self, recipient: &PartyId, notification: Notification) -> usize {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.clone(), notification));
            1
        }
    }

    /// Request store whose writes can be switched off.
    #[derive(Default, Clone)]
    struct FlakyRequestStore {
        inner: InMemoryRequestStore,
        failing: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl RequestStore for FlakyRequestStore {
        async fn store(&self, request: Request) -> Result<()> {
            if *self.failing.lock().unwrap() {
                return Err(BrokerError::InternalError("disk full".into()));
            }
            self.inner.store(request).await
        }

        async fn get(&self, id: RequestId) -> Result<Option<Request>> {
            self.inner.get(id).await
        }

        async fn by_holder(&self, holder: &PartyId) -> Result<Vec<Request>> {
            self.inner.by_holder(holder).await
        }

        async fn get_all(&self) -> Result<Vec<Request>> {
            self.inner.get_all().await
        }
    }

    struct Fixture {
        coordinator: RequestCoordinator,
        parties: InMemoryPartyDirectory,
        requests: InMemoryRequestStore,
        events: RecordingDispatcher,
    }

    async fn fixture() -> Fixture {
        let parties = InMemoryPartyDirectory::new();
        parties
            .store_requester(Requester::new("R1", "Asha", "555-0101"))
            .await
            .unwrap();
        parties
            .store_requester(Requester::new("R2", "Ben", "555-0102"))
            .await
            .unwrap();
        let mut holder = Holder::new("H1", "Solar Shed", dec!(8.5), dec!(40));
        holder.settlement_handle = Some("shed@upi".into());
        parties.store_holder(holder).await.unwrap();
        parties
            .store_holder(Holder::new("H2", "Wind Barn", dec!(7), dec!(5)))
            .await
            .unwrap();

        let requests = InMemoryRequestStore::new();
        let events = RecordingDispatcher::default();
        let coordinator = RequestCoordinator::new(
            Box::new(requests.clone()),
            Box::new(parties.clone()),
            Box::new(events.clone()),
        );
        Fixture {
            coordinator,
            parties,
            requests,
            events,
        }
    }

    fn party(id: &str) -> PartyId {
        PartyId::from(id)
    }

    #[tokio::test]
    async fn test_create_notifies_holder_without_code() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();

        let request = f.coordinator.status(id).await.unwrap();
        assert_eq!(request.status, Status::Pending);
        assert_eq!(request.code.as_str().len(), 4);

        let sent = f.events.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, party("H1"));
        match &sent[0].1.event {
            LifecycleEvent::RequestCreated {
                transaction_id,
                requester_name,
                units_requested,
            } => {
                assert_eq!(*transaction_id, id);
                assert_eq!(requester_name, "Asha");
                assert_eq!(units_requested.value(), dec!(10));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_unknown_parties() {
        let f = fixture().await;
        assert!(matches!(
            f.coordinator
                .create(&party("nobody"), &party("H1"), dec!(1))
                .await,
            Err(BrokerError::NotFound(_))
        ));
        assert!(matches!(
            f.coordinator
                .create(&party("R1"), &party("nobody"), dec!(1))
                .await,
            Err(BrokerError::NotFound(_))
        ));
        assert!(f.events.sent().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_units() {
        let f = fixture().await;
        assert!(matches!(
            f.coordinator.create(&party("R1"), &party("H1"), dec!(0)).await,
            Err(BrokerError::InvalidUnits)
        ));
    }

    #[tokio::test]
    async fn test_create_against_busy_holder() {
        let f = fixture().await;
        f.coordinator
            .set_availability(&party("H1"), Availability::Busy)
            .await
            .unwrap();
        assert!(matches!(
            f.coordinator.create(&party("R1"), &party("H1"), dec!(1)).await,
            Err(BrokerError::HolderUnavailable(_))
        ));
        assert!(f.requests.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_never_sets_busy() {
        let f = fixture().await;
        f.coordinator
            .create(&party("R1"), &party("H1"), dec!(3))
            .await
            .unwrap();
        let holder = f.parties.holder(&party("H1")).await.unwrap().unwrap();
        assert_eq!(holder.availability, Availability::Available);
    }

    #[tokio::test]
    async fn test_accept_locks_holder_and_sends_code() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();
        let accepted = f.coordinator.accept(id, &party("H1")).await.unwrap();
        assert_eq!(accepted.status, Status::Accepted);

        let holder = f.parties.holder(&party("H1")).await.unwrap().unwrap();
        assert!(holder.is_busy());

        let (to, notification) = f.events.sent().pop().unwrap();
        assert_eq!(to, party("R1"));
        match notification.event {
            LifecycleEvent::RequestAccepted {
                code,
                holder_contact,
            } => {
                assert_eq!(code, accepted.code);
                assert_eq!(holder_contact.name, "Solar Shed");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_accept_by_other_party_is_forbidden() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();
        assert!(matches!(
            f.coordinator.accept(id, &party("H2")).await,
            Err(BrokerError::Forbidden { .. })
        ));
        assert!(matches!(
            f.coordinator.accept(id, &party("R1")).await,
            Err(BrokerError::Forbidden { .. })
        ));
        assert_eq!(
            f.coordinator.status(id).await.unwrap().status,
            Status::Pending
        );
    }

    #[tokio::test]
    async fn test_accept_unknown_request() {
        let f = fixture().await;
        assert!(matches!(
            f.coordinator.accept(RequestId::new(), &party("H1")).await,
            Err(BrokerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_double_accept_does_not_renotify() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();
        f.coordinator.accept(id, &party("H1")).await.unwrap();
        let before = f.events.sent().len();

        assert!(matches!(
            f.coordinator.accept(id, &party("H1")).await,
            Err(BrokerError::InvalidTransition { .. })
        ));
        assert_eq!(f.events.sent().len(), before);
    }

    #[tokio::test]
    async fn test_accept_second_request_while_busy() {
        let f = fixture().await;
        let first = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();
        let second = f
            .coordinator
            .create(&party("R2"), &party("H1"), dec!(4))
            .await
            .unwrap();
        f.coordinator.accept(first, &party("H1")).await.unwrap();

        assert!(matches!(
            f.coordinator.accept(second, &party("H1")).await,
            Err(BrokerError::HolderUnavailable(_))
        ));
        assert_eq!(
            f.coordinator.status(second).await.unwrap().status,
            Status::Pending
        );
    }

    #[tokio::test]
    async fn test_reject_leaves_availability() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();
        let rejected = f.coordinator.reject(id, &party("H1")).await.unwrap();
        assert_eq!(rejected.status, Status::Rejected);

        let holder = f.parties.holder(&party("H1")).await.unwrap().unwrap();
        assert_eq!(holder.availability, Availability::Available);
        assert_eq!(f.events.names_for("R1"), vec!["requestRejected"]);

        assert!(matches!(
            f.coordinator.accept(id, &party("H1")).await,
            Err(BrokerError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_code_then_right_code() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(10))
            .await
            .unwrap();
        // Pin a known code through the store, as the persistence layer would hold it.
        let mut request = f.requests.get(id).await.unwrap().unwrap();
        request.code = crate::domain::code::VerificationCode::new("4821");
        f.requests.store(request).await.unwrap();
        f.coordinator.accept(id, &party("H1")).await.unwrap();

        assert!(matches!(
            f.coordinator.verify_code(id, &party("H1"), "0000").await,
            Err(BrokerError::InvalidCode)
        ));
        assert_eq!(
            f.coordinator.status(id).await.unwrap().status,
            Status::Accepted
        );

        let verified = f
            .coordinator
            .verify_code(id, &party("H1"), "4821")
            .await
            .unwrap();
        assert_eq!(verified.status, Status::Verified);
        assert!(matches!(
            f.coordinator.verify_code(id, &party("H1"), "4821").await,
            Err(BrokerError::InvalidTransition { .. })
        ));
        assert_eq!(
            f.events
                .names_for("R1")
                .iter()
                .filter(|name| **name == "codeVerified")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_complete_delivery_floors_capacity() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H2"), dec!(7))
            .await
            .unwrap();
        let code = f.coordinator.status(id).await.unwrap().code;
        f.coordinator.accept(id, &party("H2")).await.unwrap();
        f.coordinator
            .verify_code(id, &party("H2"), code.as_str())
            .await
            .unwrap();
        f.coordinator.start_delivery(id, &party("H2")).await.unwrap();
        f.coordinator
            .complete_delivery(id, &party("H2"))
            .await
            .unwrap();

        let holder = f.parties.holder(&party("H2")).await.unwrap().unwrap();
        assert_eq!(holder.available_capacity, Decimal::ZERO);

        let (_, notification) = f.events.sent().pop().unwrap();
        match notification.event {
            LifecycleEvent::DeliveryCompleted { amount_due, .. } => {
                assert_eq!(amount_due, dec!(49));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_unchargeable_units() {
        let f = fixture().await;
        assert!(matches!(
            f.coordinator
                .create(&party("R1"), &party("H1"), Decimal::MAX)
                .await,
            Err(BrokerError::ValidationError(_))
        ));
        assert!(f.requests.get_all().await.unwrap().is_empty());
        assert!(f.events.sent().is_empty());
    }

    #[tokio::test]
    async fn test_complete_delivery_overflow_leaves_state() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(1000))
            .await
            .unwrap();
        let code = f.coordinator.status(id).await.unwrap().code;
        f.coordinator.accept(id, &party("H1")).await.unwrap();
        f.coordinator
            .verify_code(id, &party("H1"), code.as_str())
            .await
            .unwrap();
        f.coordinator.start_delivery(id, &party("H1")).await.unwrap();

        let mut repriced = f.parties.holder(&party("H1")).await.unwrap().unwrap();
        repriced.price_per_unit = Decimal::MAX;
        f.parties.store_holder(repriced).await.unwrap();
        let sent = f.events.sent().len();

        assert!(matches!(
            f.coordinator.complete_delivery(id, &party("H1")).await,
            Err(BrokerError::ValidationError(_))
        ));
        assert_eq!(
            f.coordinator.status(id).await.unwrap().status,
            Status::Delivering
        );
        let holder = f.parties.holder(&party("H1")).await.unwrap().unwrap();
        assert_eq!(holder.available_capacity, dec!(40));
        assert_eq!(f.events.sent().len(), sent);
    }

    #[tokio::test]
    async fn test_create_to_self_is_forbidden() {
        let f = fixture().await;
        f.parties
            .store_requester(Requester::new("X", "Dual", "555-0199"))
            .await
            .unwrap();
        f.parties
            .store_holder(Holder::new("X", "Dual", dec!(5), dec!(10)))
            .await
            .unwrap();

        assert!(matches!(
            f.coordinator.create(&party("X"), &party("X"), dec!(1)).await,
            Err(BrokerError::Forbidden { .. })
        ));
        assert!(f.requests.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_method_goes_to_holder() {
        let f = fixture().await;
        let id = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(2))
            .await
            .unwrap();
        let code = f.coordinator.status(id).await.unwrap().code;
        f.coordinator.accept(id, &party("H1")).await.unwrap();
        f.coordinator
            .verify_code(id, &party("H1"), code.as_str())
            .await
            .unwrap();
        f.coordinator.start_delivery(id, &party("H1")).await.unwrap();

        assert!(matches!(
            f.coordinator
                .choose_settlement_method(id, &party("R1"), SettlementMethod::Upi)
                .await,
            Err(BrokerError::InvalidTransition { .. })
        ));

        f.coordinator
            .complete_delivery(id, &party("H1"))
            .await
            .unwrap();
        assert!(matches!(
            f.coordinator
                .choose_settlement_method(id, &party("H1"), SettlementMethod::Upi)
                .await,
            Err(BrokerError::Forbidden { .. })
        ));
        let request = f
            .coordinator
            .choose_settlement_method(id, &party("R1"), SettlementMethod::Upi)
            .await
            .unwrap();
        assert_eq!(request.settlement_method, Some(SettlementMethod::Upi));
        assert_eq!(
            f.events.names_for("H1"),
            vec!["requestCreated", "settlementMethodChosen"]
        );
    }

    #[tokio::test]
    async fn test_failed_request_write_restores_holder() {
        let parties = InMemoryPartyDirectory::new();
        parties
            .store_requester(Requester::new("R1", "Asha", "555-0101"))
            .await
            .unwrap();
        parties
            .store_holder(Holder::new("H1", "Solar Shed", dec!(8), dec!(40)))
            .await
            .unwrap();
        let store = FlakyRequestStore::default();
        let coordinator = RequestCoordinator::new(
            Box::new(store.clone()),
            Box::new(parties.clone()),
            Box::new(RecordingDispatcher::default()),
        );
        let id = coordinator
            .create(&party("R1"), &party("H1"), dec!(1))
            .await
            .unwrap();

        *store.failing.lock().unwrap() = true;
        assert!(matches!(
            coordinator.accept(id, &party("H1")).await,
            Err(BrokerError::InternalError(_))
        ));

        let holder = parties.holder(&party("H1")).await.unwrap().unwrap();
        assert_eq!(holder.availability, Availability::Available);
        assert_eq!(coordinator.status(id).await.unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn test_pending_for_holder_oldest_first() {
        let f = fixture().await;
        let first = f
            .coordinator
            .create(&party("R1"), &party("H1"), dec!(1))
            .await
            .unwrap();
        let second = f
            .coordinator
            .create(&party("R2"), &party("H1"), dec!(2))
            .await
            .unwrap();
        let third = f
            .coordinator
            .create(&party("R2"), &party("H1"), dec!(3))
            .await
            .unwrap();
        f.coordinator.reject(second, &party("H1")).await.unwrap();

        let pending = f
            .coordinator
            .pending_for_holder(&party("H1"))
            .await
            .unwrap();
        assert!(pending.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        let ids: Vec<RequestId> = pending.iter().map(|request| request.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first));
        assert!(ids.contains(&third));
    }

    #[tokio::test]
    async fn test_config_controls_code_length() {
        let parties = InMemoryPartyDirectory::new();
        parties
            .store_requester(Requester::new("R1", "Asha", "555-0101"))
            .await
            .unwrap();
        parties
            .store_holder(Holder::new("H1", "Solar Shed", dec!(8), dec!(40)))
            .await
            .unwrap();
        let coordinator = RequestCoordinator::with_config(
            Box::new(InMemoryRequestStore::new()),
            Box::new(parties),
            Box::new(RecordingDispatcher::default()),
            CoordinatorConfig { code_digits: 6 },
        )
        .unwrap();
        assert_eq!(
            CoordinatorConfig { code_digits: 6 }
                .code_generator()
                .unwrap()
                .digits(),
            6
        );
        let id = coordinator
            .create(&party("R1"), &party("H1"), dec!(1))
            .await
            .unwrap();
        assert_eq!(coordinator.status(id).await.unwrap().code.as_str().len(), 6);
    }
}

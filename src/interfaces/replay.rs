//! Drives a [`RequestCoordinator`] from a script of commands, with one live
//! session per known party standing in for connected clients.

use super::csv::command_reader::{Command, CommandType};
use crate::application::coordinator::RequestCoordinator;
use crate::domain::code::VerificationCode;
use crate::domain::event::LifecycleEvent;
use crate::domain::party::{Availability, PartyId};
use crate::domain::request::{Request, RequestId};
use crate::error::{BrokerError, Result};
use crate::infrastructure::channel_registry::{ChannelRegistry, SessionReceiver};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Replay {
    coordinator: RequestCoordinator,
    registry: Arc<ChannelRegistry>,
    inboxes: Vec<(PartyId, SessionReceiver)>,
    /// Script labels in creation order.
    labels: Vec<(String, RequestId)>,
    /// Codes requesters were handed on acceptance.
    handed_codes: HashMap<RequestId, VerificationCode>,
}

impl Replay {
    pub fn new(coordinator: RequestCoordinator, registry: Arc<ChannelRegistry>) -> Self {
        Self {
            coordinator,
            registry,
            inboxes: Vec::new(),
            labels: Vec::new(),
            handed_codes: HashMap::new(),
        }
    }

    /// Connects a session for `party` and keeps its receiving end.
    pub async fn join(&mut self, party: PartyId) {
        let (handle, receiver) = self.registry.connect();
        self.registry.register(party.clone(), handle).await;
        self.inboxes.push((party, receiver));
    }

    pub async fn apply(&mut self, command: &Command) -> Result<()> {
        let result = self.execute(command).await;
        self.drain();
        result
    }

    async fn execute(&mut self, command: &Command) -> Result<()> {
        let actor = PartyId::from(command.actor()?);

        let request = match command.op {
            CommandType::Create => {
                let label = command.label()?;
                if self.labels.iter().any(|(known, _)| known == label) {
                    return Err(BrokerError::ValidationError(format!(
                        "request label {label} already used"
                    )));
                }
                let holder = command
                    .holder
                    .as_deref()
                    .map(PartyId::from)
                    .ok_or_else(|| missing("holder"))?;
                let units = command.units.ok_or_else(|| missing("units"))?;
                let id = self.coordinator.create(&actor, &holder, units).await?;
                self.labels.push((label.to_string(), id));
                return Ok(());
            }
            CommandType::SetAvailable => {
                self.coordinator
                    .set_availability(&actor, Availability::Available)
                    .await?;
                return Ok(());
            }
            CommandType::SetBusy => {
                self.coordinator
                    .set_availability(&actor, Availability::Busy)
                    .await?;
                return Ok(());
            }
            CommandType::Accept => self.coordinator.accept(self.resolve(command)?, &actor).await?,
            CommandType::Reject => self.coordinator.reject(self.resolve(command)?, &actor).await?,
            CommandType::Verify => {
                let id = self.resolve(command)?;
                let code = match &command.code {
                    Some(code) => code.clone(),
                    None => self
                        .handed_codes
                        .get(&id)
                        .map(|code| code.as_str().to_string())
                        .ok_or_else(|| {
                            BrokerError::ValidationError(format!(
                                "no code was handed over for request {id}"
                            ))
                        })?,
                };
                self.coordinator.verify_code(id, &actor, &code).await?
            }
            CommandType::StartDelivery => {
                self.coordinator
                    .start_delivery(self.resolve(command)?, &actor)
                    .await?
            }
            CommandType::CompleteDelivery => {
                self.coordinator
                    .complete_delivery(self.resolve(command)?, &actor)
                    .await?
            }
            CommandType::ChooseMethod => {
                let id = self.resolve(command)?;
                let method = command.method.ok_or_else(|| missing("method"))?;
                self.coordinator
                    .choose_settlement_method(id, &actor, method)
                    .await?
            }
            CommandType::AcknowledgePayment => {
                let id = self.resolve(command)?;
                let method = command.method.ok_or_else(|| missing("method"))?;
                let amount = command.amount.ok_or_else(|| missing("amount"))?;
                self.coordinator
                    .acknowledge_payment(id, &actor, method, amount, command.reference.clone())
                    .await?
            }
        };
        debug!(request = %request.id, status = %request.status, "command applied");
        Ok(())
    }

    /// Final snapshot of every labelled request, in creation order.
    pub async fn snapshots(&self) -> Result<Vec<(String, Request)>> {
        let mut snapshots = Vec::with_capacity(self.labels.len());
        for (label, id) in &self.labels {
            snapshots.push((label.clone(), self.coordinator.status(*id).await?));
        }
        Ok(snapshots)
    }

    fn resolve(&self, command: &Command) -> Result<RequestId> {
        let label = command.label()?;
        self.labels
            .iter()
            .find(|(known, _)| known == label)
            .map(|(_, id)| *id)
            .ok_or_else(|| BrokerError::NotFound(format!("request label {label}")))
    }

    fn drain(&mut self) {
        for (party, inbox) in &mut self.inboxes {
            while let Ok(notification) = inbox.try_recv() {
                info!(
                    party = %party,
                    request = %notification.request_id,
                    event = notification.event.name(),
                    "notification received"
                );
                if let LifecycleEvent::RequestAccepted { code, .. } = notification.event {
                    self.handed_codes.insert(notification.request_id, code);
                }
            }
        }
    }
}

fn missing(column: &str) -> BrokerError {
    BrokerError::ValidationError(format!("missing {column} column"))
}

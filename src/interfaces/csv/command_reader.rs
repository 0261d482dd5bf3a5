use crate::domain::request::SettlementMethod;
use crate::error::{BrokerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Create,
    Accept,
    Reject,
    Verify,
    StartDelivery,
    CompleteDelivery,
    ChooseMethod,
    AcknowledgePayment,
    SetAvailable,
    SetBusy,
}

/// One row of a replay script.
///
/// `request` is a label local to the script; the replay maps it to the id
/// returned by `create`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: CommandType,
    pub request: Option<String>,
    pub actor: Option<String>,
    pub holder: Option<String>,
    pub units: Option<Decimal>,
    pub code: Option<String>,
    pub method: Option<SettlementMethod>,
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
}

impl Command {
    pub fn label(&self) -> Result<&str> {
        required(self.request.as_deref(), "request")
    }

    pub fn actor(&self) -> Result<&str> {
        required(self.actor.as_deref(), "actor")
    }
}

fn required<'a>(value: Option<&'a str>, column: &str) -> Result<&'a str> {
    value.ok_or_else(|| BrokerError::ValidationError(format!("missing {column} column")))
}

/// Reads replay commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BrokerError::from))
    }
}

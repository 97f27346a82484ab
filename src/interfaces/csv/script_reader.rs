use crate::error::{EconomyError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The player comes online.
    Join,
    /// The player goes offline.
    Quit,
    /// Deposits `value` into the player's account.
    Grant,
    /// Gives the player the permission named in `target`.
    Give,
    /// With a `value`, pays `target` directly; without, starts the
    /// interactive pay flow.
    Pay,
    Charge,
    /// Free text typed by the player.
    Chat,
    Cancel,
    Balance,
    /// Looks at `target`'s balance.
    View,
    /// Prints the answer to the balance query key in `value`.
    Query,
}

/// One row of an event script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptEvent {
    pub player: String,
    pub action: Action,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Reads script events from a CSV source with a
/// `player,action,target,value` header.
///
/// Fields are trimmed and trailing empty columns may be left out.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes events; a malformed row yields an error and the
    /// rest of the stream is still read.
    pub fn events(self) -> impl Iterator<Item = Result<ScriptEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(|e| EconomyError::MalformedEvent(e.to_string())))
    }
}

//! A console host for driving the economy from an event script.

use crate::application::service::{InputDisposition, PayService};
use crate::domain::account::{Amount, Balance, PlayerId};
use crate::domain::notice::Notice;
use crate::domain::ports::{Host, MainTask, Player};
use crate::error::{EconomyError, Result};
use crate::infrastructure::scheduler::MainThreadHandle;
use crate::interfaces::csv::script_reader::{Action, ScriptEvent};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Default)]
struct Roster {
    /// Every player seen, by lower-cased name.
    known: HashMap<String, Player>,
    online: HashSet<String>,
    permissions: HashMap<String, HashSet<String>>,
}

/// Host that keeps players and permissions in memory and prints every notice
/// as `@player: text`.
pub struct ConsoleHost {
    roster: Mutex<Roster>,
    out: Mutex<Box<dyn Write + Send>>,
    main: MainThreadHandle,
}

impl ConsoleHost {
    pub fn new(out: Box<dyn Write + Send>, main: MainThreadHandle) -> Self {
        Self {
            roster: Mutex::new(Roster::default()),
            out: Mutex::new(out),
            main,
        }
    }

    fn roster(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn print(&self, line: std::fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!("Failed to write console output: {}", e);
        }
    }

    /// The player with this name, registering them on first sight.
    pub fn player(&self, name: &str) -> Player {
        let key = name.trim().to_lowercase();
        self.roster()
            .known
            .entry(key)
            .or_insert_with(|| Player::offline(name.trim()))
            .clone()
    }

    pub fn connect(&self, player: &Player) {
        self.roster().online.insert(player.name.to_lowercase());
    }

    pub fn disconnect(&self, player: &Player) {
        self.roster().online.remove(&player.name.to_lowercase());
    }

    pub fn grant(&self, player: &Player, permission: &str) {
        self.roster()
            .permissions
            .entry(player.name.to_lowercase())
            .or_default()
            .insert(permission.trim().to_string());
    }

    /// Known player names keyed by account, for the final report.
    pub fn names(&self) -> HashMap<PlayerId, String> {
        self.roster()
            .known
            .values()
            .map(|player| (player.id, player.name.clone()))
            .collect()
    }

    pub fn main(&self) -> &MainThreadHandle {
        &self.main
    }
}

impl Host for ConsoleHost {
    fn online_player(&self, name: &str) -> Option<Player> {
        let key = name.trim().to_lowercase();
        let roster = self.roster();
        if !roster.online.contains(&key) {
            return None;
        }
        roster.known.get(&key).cloned()
    }

    fn known_player(&self, name: &str) -> Option<Player> {
        self.roster().known.get(&name.trim().to_lowercase()).cloned()
    }

    fn has_permission(&self, player: &Player, permission: &str) -> bool {
        self.roster()
            .permissions
            .get(&player.name.to_lowercase())
            .is_some_and(|granted| granted.contains(permission))
    }

    fn notify(&self, player: &Player, notice: Notice) {
        self.print(format_args!("@{}: {}", player.name, notice));
    }

    fn run_on_main(&self, task: MainTask) {
        self.main.submit(task);
    }
}

/// Applies script events to a [`PayService`] through a [`ConsoleHost`].
pub struct ScriptRunner {
    service: PayService,
    host: Arc<ConsoleHost>,
}

impl ScriptRunner {
    pub fn new(service: PayService, host: Arc<ConsoleHost>) -> Self {
        Self { service, host }
    }

    /// Runs one event and waits for any work it scheduled on the main
    /// context. Domain refusals have already been shown to the player and
    /// are not returned.
    pub async fn apply(&self, event: &ScriptEvent) -> Result<()> {
        let player = self.host.player(&event.player);
        debug!(player = %player.name, action = ?event.action, "Applying event");

        let outcome = match event.action {
            Action::Join => {
                self.host.connect(&player);
                self.service.on_reconnect(&player).await;
                Ok(())
            }
            Action::Quit => {
                self.host.disconnect(&player);
                Ok(())
            }
            Action::Grant => {
                let raw = required(&event.value, "value")?;
                let amount = Amount::parse(raw)
                    .map_err(|_| EconomyError::MalformedEvent(format!("bad grant amount {raw:?}")))?;
                self.service.ledger().deposit(player.id, amount).await.map(drop)
            }
            Action::Give => {
                self.host.grant(&player, required(&event.target, "target")?);
                Ok(())
            }
            Action::Pay => {
                let target = required(&event.target, "target")?;
                self.host.player(target);
                match event.value.as_deref() {
                    Some(raw) => match Amount::parse(raw) {
                        Ok(amount) => self.service.pay_direct(&player, target, amount).await.map(drop),
                        Err(_) => {
                            self.host.notify(&player, Notice::InvalidAmount);
                            Ok(())
                        }
                    },
                    None => self.service.start_pay(&player, target).await,
                }
            }
            Action::Charge => {
                let target = required(&event.target, "target")?;
                self.service.raise_charge(&player, target).await
            }
            Action::Chat => {
                let text = event.value.as_deref().unwrap_or_default();
                if self.service.on_free_text_input(&player, text).await
                    == InputDisposition::Passthrough
                {
                    self.host.print(format_args!("<{}> {}", player.name, text));
                }
                Ok(())
            }
            Action::Cancel => {
                self.service.cancel(&player).await;
                Ok(())
            }
            Action::Balance => self.service.balance(&player).await.map(drop),
            Action::Query => {
                let key = required(&event.value, "value")?;
                let answer = self.service.query_balance(&player, key).await;
                self.host.print(format_args!(
                    "[{}] {} = {}",
                    player.name,
                    key,
                    answer.unwrap_or_default()
                ));
                Ok(())
            }
            Action::View => {
                let target = required(&event.target, "target")?;
                self.host.player(target);
                self.service.view_balance(&player, target).await.map(drop)
            }
        };

        self.host.main().flush().await;
        match outcome {
            Err(e) if !e.is_user_facing() => Err(e),
            _ => Ok(()),
        }
    }

    /// Final balances by player name, sorted by name. Accounts with no known
    /// name are reported by id.
    pub async fn report(&self) -> Vec<(String, Balance)> {
        let names = self.host.names();
        let mut rows: Vec<_> = self
            .service
            .ledger()
            .snapshot()
            .await
            .into_iter()
            .map(|(id, balance)| {
                let name = names.get(&id).cloned().unwrap_or_else(|| id.to_string());
                (name, balance)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str> {
    field
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EconomyError::MalformedEvent(format!("missing {name}")))
}

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use vault_economy::application::ledger::Ledger;
use vault_economy::application::pending::PendingRequestQueue;
use vault_economy::application::service::PayService;
use vault_economy::config::Settings;
use vault_economy::domain::account::{Amount, PlayerId};
use vault_economy::domain::notice::Notice;
use vault_economy::domain::ports::{Clock, Host, MainTask, Player};
use vault_economy::infrastructure::in_memory::InMemoryStore;

/// Host double: records notices and holds main-context tasks until the test
/// runs them.
#[derive(Default)]
pub struct TestHost {
    online: Mutex<HashMap<String, Player>>,
    known: Mutex<HashMap<String, Player>>,
    permissions: Mutex<HashMap<PlayerId, HashSet<String>>>,
    notices: Mutex<Vec<(String, Notice)>>,
    main_queue: Mutex<Vec<MainTask>>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect(&self, player: &Player) {
        self.remember(player);
        self.online
            .lock()
            .unwrap()
            .insert(player.name.to_lowercase(), player.clone());
    }

    /// Records a player as seen without bringing them online.
    pub fn remember(&self, player: &Player) {
        self.known
            .lock()
            .unwrap()
            .insert(player.name.to_lowercase(), player.clone());
    }

    pub fn disconnect(&self, player: &Player) {
        self.online.lock().unwrap().remove(&player.name.to_lowercase());
    }

    pub fn grant(&self, player: &Player, permission: &str) {
        self.permissions
            .lock()
            .unwrap()
            .entry(player.id)
            .or_default()
            .insert(permission.to_string());
    }

    /// Notices sent to `name` so far, oldest first, and forgets them.
    pub fn take_notices(&self, name: &str) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap();
        let (mine, rest): (Vec<_>, Vec<_>) =
            notices.drain(..).partition(|(to, _)| to == name);
        *notices = rest;
        mine.into_iter().map(|(_, notice)| notice).collect()
    }

    pub fn queued_main_tasks(&self) -> usize {
        self.main_queue.lock().unwrap().len()
    }

    /// Runs every queued main-context task in submission order.
    pub async fn run_pending(&self) {
        let tasks: Vec<_> = self.main_queue.lock().unwrap().drain(..).collect();
        for task in tasks {
            task.await;
        }
    }
}

impl Host for TestHost {
    fn online_player(&self, name: &str) -> Option<Player> {
        self.online
            .lock()
            .unwrap()
            .get(&name.trim().to_lowercase())
            .cloned()
    }

    fn known_player(&self, name: &str) -> Option<Player> {
        self.known
            .lock()
            .unwrap()
            .get(&name.trim().to_lowercase())
            .cloned()
    }

    fn has_permission(&self, player: &Player, permission: &str) -> bool {
        self.permissions
            .lock()
            .unwrap()
            .get(&player.id)
            .is_some_and(|granted| granted.contains(permission))
    }

    fn notify(&self, player: &Player, notice: Notice) {
        self.notices
            .lock()
            .unwrap()
            .push((player.name.clone(), notice));
    }

    fn run_on_main(&self, task: MainTask) {
        self.main_queue.lock().unwrap().push(task);
    }
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Settings with every permission gate switched off.
pub fn open_settings() -> Settings {
    let mut settings = Settings::default();
    settings.permissions.pay_use = "none".to_string();
    settings.permissions.balance_use = "none".to_string();
    settings
}

pub fn service(host: Arc<TestHost>, settings: Settings) -> PayService {
    service_with_clock(host, settings, ManualClock::new())
}

pub fn service_with_clock(
    host: Arc<TestHost>,
    settings: Settings,
    clock: Arc<ManualClock>,
) -> PayService {
    let store = InMemoryStore::new();
    let ledger = Arc::new(Ledger::new(None, Box::new(store.clone())));
    let pending = Arc::new(PendingRequestQueue::new(Box::new(store), clock.clone()));
    PayService::new(ledger, pending, host, clock, settings)
}

pub fn player(name: &str) -> Player {
    Player::offline(name)
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

/// Writes an event script with the standard header.
pub fn write_script(path: &Path, rows: &[&str]) {
    let mut body = String::from("player,action,target,value\n");
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    std::fs::write(path, body).unwrap();
}

//! In-memory backends for tests.
//!
//! Compiled for unit tests and behind the `mocks` feature so that the server
//! crate's integration tests can drive real sessions without PostgreSQL or
//! Redis.

use async_trait::async_trait;
use metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};

use crate::{
    game::{DiceRoll, DiceRoller},
    lock::{ExclusionLock, LockError, LockResult, lock_key},
    wallet::{Ledger, WalletError, WalletResult},
};

/// Error injected in place of a storage failure.
fn injected_db_error() -> WalletError {
    WalletError::Database(sqlx::Error::PoolTimedOut)
}

/// Exclusion lock over a map of key to expiry instant.
///
/// Expiry follows `tokio::time`, so paused-clock tests can age locks out
/// with `tokio::time::advance`.
#[derive(Debug)]
pub struct InMemoryLock {
    ttl: Duration,
    keys: Mutex<HashMap<String, Instant>>,
    fail_acquire: AtomicBool,
    fail_release: AtomicBool,
    acquisitions: AtomicUsize,
}

impl InMemoryLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            keys: Mutex::new(HashMap::new()),
            fail_acquire: AtomicBool::new(false),
            fail_release: AtomicBool::new(false),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// Whether an unexpired lock exists for `client_id`.
    pub async fn is_held(&self, client_id: &str) -> bool {
        let keys = self.keys.lock().await;
        keys.get(&lock_key(client_id))
            .is_some_and(|expiry| *expiry > Instant::now())
    }

    /// Make the next `try_acquire` fail as if the store were unreachable.
    pub fn fail_next_acquire(&self) {
        self.fail_acquire.store(true, Ordering::SeqCst);
    }

    /// Make the next `release` fail as if the store were unreachable.
    /// The key is left in place, to be healed by its TTL.
    pub fn fail_next_release(&self) {
        self.fail_release.store(true, Ordering::SeqCst);
    }

    /// Number of successful acquisitions so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExclusionLock for InMemoryLock {
    async fn try_acquire(&self, client_id: &str) -> LockResult<bool> {
        if self.fail_acquire.swap(false, Ordering::SeqCst) {
            return Err(LockError::Timeout(Duration::ZERO));
        }

        let now = Instant::now();
        let mut keys = self.keys.lock().await;
        let key = lock_key(client_id);
        if keys.get(&key).is_some_and(|expiry| *expiry > now) {
            return Ok(false);
        }
        keys.insert(key, now + self.ttl);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn release(&self, client_id: &str) -> LockResult<bool> {
        if self.fail_release.swap(false, Ordering::SeqCst) {
            return Err(LockError::Timeout(Duration::ZERO));
        }

        let mut keys = self.keys.lock().await;
        Ok(keys
            .remove(&lock_key(client_id))
            .is_some_and(|expiry| expiry > Instant::now()))
    }
}

/// Ledger over a map of balances.
///
/// Adjustments hold the map for their whole duration, including any
/// configured delay, so concurrent adjustments serialize the way row-locked
/// transactions do.
#[derive(Debug)]
pub struct InMemoryLedger {
    starting_balance: i64,
    balances: Mutex<HashMap<String, i64>>,
    adjust_delay: Option<Duration>,
    fail_debit: AtomicBool,
    fail_credit: AtomicBool,
    fail_reads: AtomicBool,
    late_debit_timeout: AtomicBool,
    history: StdMutex<Vec<(String, i64)>>,
}

impl InMemoryLedger {
    pub fn new(starting_balance: i64) -> Self {
        Self {
            starting_balance,
            balances: Mutex::new(HashMap::new()),
            adjust_delay: None,
            fail_debit: AtomicBool::new(false),
            fail_credit: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            late_debit_timeout: AtomicBool::new(false),
            history: StdMutex::new(Vec::new()),
        }
    }

    /// Sleep inside every adjustment, widening race windows.
    pub fn with_adjust_delay(mut self, delay: Duration) -> Self {
        self.adjust_delay = Some(delay);
        self
    }

    /// Create or overwrite a wallet.
    pub async fn set_balance(&self, client_id: &str, balance: i64) {
        self.balances
            .lock()
            .await
            .insert(client_id.to_string(), balance);
    }

    /// Balance without failure injection; `None` when no wallet exists.
    pub async fn balance_of(&self, client_id: &str) -> Option<i64> {
        self.balances.lock().await.get(client_id).copied()
    }

    /// Fail the next negative adjustment.
    pub fn fail_next_debit(&self) {
        self.fail_debit.store(true, Ordering::SeqCst);
    }

    /// Fail the next positive adjustment.
    pub fn fail_next_credit(&self) {
        self.fail_credit.store(true, Ordering::SeqCst);
    }

    /// Apply the next negative adjustment, then report it as timed out,
    /// like a deadline that fires after COMMIT was sent.
    pub fn time_out_next_debit_after_commit(&self) {
        self.late_debit_timeout.store(true, Ordering::SeqCst);
    }

    /// Fail every `get_balance` while set.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Committed adjustments, oldest first.
    pub fn history(&self) -> Vec<(String, i64)> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn ensure_wallet(&self, client_id: &str) -> WalletResult<()> {
        self.balances
            .lock()
            .await
            .entry(client_id.to_string())
            .or_insert(self.starting_balance);
        Ok(())
    }

    async fn get_balance(&self, client_id: &str) -> WalletResult<i64> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected_db_error());
        }
        self.balance_of(client_id)
            .await
            .ok_or_else(|| WalletError::WalletNotFound(client_id.to_string()))
    }

    async fn adjust_balance(&self, client_id: &str, delta: i64) -> WalletResult<i64> {
        let mut balances = self.balances.lock().await;
        if let Some(delay) = self.adjust_delay {
            tokio::time::sleep(delay).await;
        }

        let flag = if delta < 0 {
            &self.fail_debit
        } else {
            &self.fail_credit
        };
        if flag.swap(false, Ordering::SeqCst) {
            return Err(injected_db_error());
        }

        let balance = balances
            .get_mut(client_id)
            .ok_or_else(|| WalletError::WalletNotFound(client_id.to_string()))?;
        let updated = balance
            .checked_add(delta)
            .ok_or(WalletError::BalanceOverflow)?;
        if updated < 0 {
            return Err(WalletError::InsufficientFunds {
                available: *balance,
                required: delta.saturating_neg(),
            });
        }
        *balance = updated;

        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((client_id.to_string(), delta));

        if delta < 0 && self.late_debit_timeout.swap(false, Ordering::SeqCst) {
            return Err(WalletError::Timeout(Duration::from_secs(5)));
        }
        Ok(updated)
    }
}

/// Roller that replays a fixed script of faces, cycling when it runs out.
///
/// An empty script yields `0 + 0`, which the resolver rejects.
#[derive(Debug)]
pub struct ScriptedRoller {
    rolls: Vec<DiceRoll>,
    next: AtomicUsize,
}

impl ScriptedRoller {
    pub fn new(rolls: impl IntoIterator<Item = (u8, u8)>) -> Self {
        Self {
            rolls: rolls
                .into_iter()
                .map(|(die1, die2)| DiceRoll::new(die1, die2))
                .collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl DiceRoller for ScriptedRoller {
    fn roll(&self) -> DiceRoll {
        if self.rolls.is_empty() {
            return DiceRoll::new(0, 0);
        }
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.rolls[i % self.rolls.len()]
    }
}

type Tallies = Arc<StdMutex<BTreeMap<String, u64>>>;

/// Metrics recorder that keeps counter totals, keyed as `name{label=value,...}`
/// with labels in the order they were given.
///
/// Install it for the current thread with
/// `metrics::set_default_local_recorder`; gauges and histograms are dropped.
#[derive(Clone, Debug, Default)]
pub struct CountingRecorder {
    tallies: Tallies,
}

impl CountingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total for a rendered key such as `wagers_total{outcome=win}`.
    pub fn count(&self, key: &str) -> u64 {
        self.tallies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

struct Tally {
    key: String,
    tallies: Tallies,
}

impl CounterFn for Tally {
    fn increment(&self, value: u64) {
        let mut tallies = self.tallies.lock().unwrap_or_else(|e| e.into_inner());
        *tallies.entry(self.key.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        let mut tallies = self.tallies.lock().unwrap_or_else(|e| e.into_inner());
        tallies.insert(self.key.clone(), value);
    }
}

fn render_key(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|label| format!("{}={}", label.key(), label.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(Tally {
            key: render_key(key),
            tallies: self.tallies.clone(),
        }))
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

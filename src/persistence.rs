//! Persistence layer for SealChain
//!
//! A ledger is saved as a [`LedgerSnapshot`] of plain data. Loading trusts
//! every stored block hash verbatim and never re-mines, so a tampered file
//! loads fine and is then flagged by [`Blockchain::is_chain_valid`].

use crate::addressbook::AddressBook;
use crate::amount::Amount;
use crate::blockchain::chain::check_parameters;
use crate::blockchain::{Block, Blockchain, GENESIS_PREVIOUS_HASH};
use crate::config::{StorageBackend, StorageConfig};
use crate::crypto::{Address, Sha256Hash};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Everything needed to rebuild a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub mining_reward: Amount,
    pub addresses: BTreeMap<Address, String>,
}

/// Abstraction for persistence backends. A save replaces the whole stored
/// state; a load returns `None` when nothing has been saved yet.
pub trait Persistence: Send + Sync {
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError>;
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError>;
}

/// Opens the backend selected in the storage configuration.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn Persistence>, ChainError> {
    Ok(match config.backend {
        StorageBackend::Json => Box::new(JsonFile::new(&config.path)),
        StorageBackend::Sqlite => Box::new(Database::open(&config.path)?),
    })
}

fn malformed(what: impl std::fmt::Display) -> ChainError {
    ChainError::MalformedPersistedState(what.to_string())
}

impl Blockchain {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain: self.blocks.clone(),
            pending_transactions: self.pending.transactions().to_vec(),
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
            addresses: self.address_book.entries().clone(),
        }
    }

    /// Rebuilds a ledger from a snapshot after structural checks. Hash
    /// linkage is not checked here; see [`Blockchain::verify_chain`].
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, ChainError> {
        Self::from_snapshot_with_capacity(snapshot, crate::mempool::DEFAULT_MAX_PENDING)
    }

    pub(crate) fn from_snapshot_with_capacity(
        snapshot: LedgerSnapshot,
        max_pending: usize,
    ) -> Result<Self, ChainError> {
        let LedgerSnapshot {
            chain,
            pending_transactions,
            difficulty,
            mining_reward,
            addresses,
        } = snapshot;

        let genesis = chain
            .first()
            .ok_or_else(|| malformed("chain holds no blocks"))?;
        if !genesis.transactions.is_empty() {
            return Err(malformed("genesis block must not hold transactions"));
        }
        if genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(malformed("genesis block lacks the previous-hash sentinel"));
        }
        for (position, block) in chain.iter().enumerate() {
            if block.index != position as u64 {
                return Err(malformed(format!(
                    "block at position {} claims index {}",
                    position, block.index
                )));
            }
        }
        check_parameters(difficulty, mining_reward).map_err(malformed)?;

        let mut pending = Mempool::with_capacity(max_pending.max(pending_transactions.len()));
        for tx in pending_transactions {
            if tx.is_reward() {
                return Err(malformed("pending set holds a reward transaction"));
            }
            pending.add_transaction(tx)?;
        }

        Ok(Blockchain {
            blocks: chain,
            pending,
            difficulty,
            mining_reward,
            address_book: AddressBook::from_entries(addresses)?,
        })
    }

    pub fn save_to(&self, store: &dyn Persistence) -> Result<(), ChainError> {
        store.save_snapshot(&self.snapshot())?;
        info!(blocks = self.blocks.len(), pending = self.pending.len(), "saved ledger");
        Ok(())
    }

    /// Replaces this ledger with the stored one. All-or-nothing: on any
    /// error, or when the store is empty, `self` is left untouched.
    /// Returns whether anything was loaded.
    pub fn load_from(&mut self, store: &dyn Persistence) -> Result<bool, ChainError> {
        let Some(snapshot) = store.load_snapshot()? else {
            return Ok(false);
        };
        let loaded = Self::from_snapshot_with_capacity(snapshot, self.pending.max_size())?;
        info!(blocks = loaded.blocks.len(), pending = loaded.pending.len(), "loaded ledger");
        *self = loaded;
        Ok(true)
    }
}

/// Pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFile {
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, snapshot)?;
        file.flush()?;
        file.persist(&self.path).map_err(|e| ChainError::from(e.error))?;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| malformed(format!("{}: {}", self.path.display(), e)))
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, ChainError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ChainError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                idx INTEGER PRIMARY KEY,
                hash TEXT NOT NULL,
                previous_hash TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                nonce INTEGER NOT NULL,
                transactions TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS pending (
                position INTEGER PRIMARY KEY,
                tx TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS addresses (
                address TEXT PRIMARY KEY,
                private_key TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create tables: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ChainError> {
        self.conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

fn decode_hash(text: &str) -> Result<Sha256Hash, ChainError> {
    let bytes = hex::decode(text).map_err(|e| malformed(format!("bad hash '{}': {}", text, e)))?;
    bytes
        .try_into()
        .map_err(|_| malformed(format!("hash '{}' is not 32 bytes", text)))
}

impl Persistence for Database {
    /// Replaces every stored row inside one SQL transaction.
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM blocks; DELETE FROM pending; DELETE FROM addresses; DELETE FROM metadata;",
        )?;

        for block in &snapshot.chain {
            tx.execute(
                "INSERT INTO blocks (idx, hash, previous_hash, timestamp, nonce, transactions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    block.index as i64,
                    hex::encode(block.hash),
                    hex::encode(block.previous_hash),
                    block.timestamp as i64,
                    block.nonce as i64,
                    serde_json::to_string(&block.transactions)?,
                ],
            )?;
        }

        for (position, pending) in snapshot.pending_transactions.iter().enumerate() {
            tx.execute(
                "INSERT INTO pending (position, tx) VALUES (?1, ?2)",
                params![position as i64, serde_json::to_string(pending)?],
            )?;
        }

        for (address, key) in &snapshot.addresses {
            tx.execute(
                "INSERT INTO addresses (address, private_key) VALUES (?1, ?2)",
                params![address.as_str(), key],
            )?;
        }

        tx.execute(
            "INSERT INTO metadata (key, value) VALUES ('difficulty', ?1), ('mining_reward', ?2)",
            params![
                snapshot.difficulty.to_string(),
                snapshot.mining_reward.to_bits().to_string()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError> {
        let conn = self.lock()?;

        let metadata = |key: &str| -> Result<Option<String>, ChainError> {
            Ok(conn
                .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| row.get(0))
                .optional()?)
        };
        let difficulty = metadata("difficulty")?;
        let mining_reward = metadata("mining_reward")?;

        let mut stmt = conn.prepare(
            "SELECT idx, hash, previous_hash, timestamp, nonce, transactions
             FROM blocks ORDER BY idx ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut chain = Vec::new();
        for row in rows {
            let (index, hash, previous_hash, timestamp, nonce, transactions) = row?;
            chain.push(Block {
                index: index as u64,
                timestamp: timestamp as u64,
                previous_hash: decode_hash(&previous_hash)?,
                nonce: nonce as u64,
                transactions: serde_json::from_str(&transactions)
                    .map_err(|e| malformed(format!("block {} transactions: {}", index, e)))?,
                hash: decode_hash(&hash)?,
            });
        }

        let (difficulty, mining_reward) = match (difficulty, mining_reward) {
            (None, None) if chain.is_empty() => return Ok(None),
            (Some(d), Some(r)) => (d, r),
            _ => return Err(malformed("metadata is incomplete")),
        };
        let difficulty: u32 = difficulty
            .parse()
            .map_err(|e| malformed(format!("difficulty '{}': {}", difficulty, e)))?;
        let mining_reward = mining_reward
            .parse::<i64>()
            .map(Amount::from_bits)
            .map_err(|e| malformed(format!("mining reward '{}': {}", mining_reward, e)))?;

        let mut stmt = conn.prepare("SELECT tx FROM pending ORDER BY position ASC")?;
        let pending_transactions = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|row| {
                let text = row?;
                serde_json::from_str(&text).map_err(|e| malformed(format!("pending transaction: {}", e)))
            })
            .collect::<Result<Vec<Transaction>, ChainError>>()?;

        let mut stmt = conn.prepare("SELECT address, private_key FROM addresses")?;
        let addresses = stmt
            .query_map([], |row| {
                Ok((Address::new(row.get::<_, String>(0)?), row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Some(LedgerSnapshot {
            chain,
            pending_transactions,
            difficulty,
            mining_reward,
            addresses,
        }))
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    snapshot: Arc<Mutex<Option<LedgerSnapshot>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError> {
        let mut stored = self
            .snapshot
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        *stored = Some(snapshot.clone());
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError> {
        let stored = self
            .snapshot
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn sample_ledger() -> Blockchain {
        let mut chain = Blockchain::new(1, Amount::from_num(1)).unwrap();
        let (address, keypair) = chain.generate_address().unwrap();
        chain.mine_pending_transactions(&address).unwrap();
        chain
            .send(&keypair, Address::from("bob"), Amount::from_num(0.25))
            .unwrap();
        chain
    }

    #[test]
    fn test_database_open() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.lock().unwrap().is_autocommit());
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_database_round_trip() {
        let chain = sample_ledger();
        let db = Database::open_in_memory().unwrap();
        chain.save_to(&db).unwrap();

        let loaded = db.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded, chain.snapshot());
    }

    #[test]
    fn test_database_save_replaces_previous_rows() {
        let db = Database::open_in_memory().unwrap();
        let mut chain = sample_ledger();
        chain.save_to(&db).unwrap();

        chain.mine_pending_transactions(&Address::from("miner")).unwrap();
        chain.save_to(&db).unwrap();

        let loaded = db.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.chain.len(), 3);
        assert!(loaded.pending_transactions.is_empty());
    }

    #[test]
    fn test_in_memory_round_trip() {
        let chain = sample_ledger();
        let store = InMemoryPersistence::new();
        assert!(store.load_snapshot().unwrap().is_none());

        chain.save_to(&store).unwrap();
        let mut restored = Blockchain::new(0, Amount::from_num(0)).unwrap();
        assert!(restored.load_from(&store).unwrap());
        assert_eq!(restored.snapshot(), chain.snapshot());
    }

    #[test]
    fn test_load_from_empty_store_keeps_ledger() {
        let mut chain = sample_ledger();
        let before = chain.snapshot();
        assert!(!chain.load_from(&InMemoryPersistence::new()).unwrap());
        assert_eq!(chain.snapshot(), before);
    }

    #[test]
    fn test_structural_checks_on_load() {
        let good = sample_ledger().snapshot();

        let mut empty = good.clone();
        empty.chain.clear();
        assert!(matches!(
            Blockchain::from_snapshot(empty),
            Err(ChainError::MalformedPersistedState(_))
        ));

        let mut bad_genesis = good.clone();
        bad_genesis.chain[0].previous_hash = [1u8; 32];
        assert!(Blockchain::from_snapshot(bad_genesis).is_err());

        let mut reordered = good.clone();
        reordered.chain.swap(0, 1);
        assert!(Blockchain::from_snapshot(reordered).is_err());

        let mut too_hard = good.clone();
        too_hard.difficulty = 99;
        assert!(Blockchain::from_snapshot(too_hard).is_err());

        let mut minted = good.clone();
        minted
            .pending_transactions
            .push(Transaction::reward(Address::from("x"), Amount::from_num(5)));
        assert!(Blockchain::from_snapshot(minted).is_err());

        let mut bad_key = good;
        bad_key.addresses.insert(Address::from("y"), "zz".to_string());
        assert!(Blockchain::from_snapshot(bad_key).is_err());
    }

    #[test]
    fn test_failed_load_leaves_ledger_untouched() {
        let store = InMemoryPersistence::new();
        let mut broken = sample_ledger().snapshot();
        broken.chain.clear();
        store.save_snapshot(&broken).unwrap();

        let mut chain = Blockchain::new(1, Amount::from_num(1)).unwrap();
        let keypair = KeyPair::generate().unwrap();
        chain.mine_pending_transactions(&keypair.address()).unwrap();
        let before = chain.snapshot();

        assert!(chain.load_from(&store).is_err());
        assert_eq!(chain.snapshot(), before);
    }

    #[test]
    fn test_load_trusts_stored_hash() {
        let mut snapshot = sample_ledger().snapshot();
        snapshot.chain[1].nonce += 1;

        let loaded = Blockchain::from_snapshot(snapshot.clone()).unwrap();
        assert_eq!(loaded.blocks()[1].hash, snapshot.chain[1].hash);
        assert!(!loaded.is_chain_valid());
    }
}

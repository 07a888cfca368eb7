use crate::addressbook::AddressBook;
use crate::amount::{Amount, ZERO};
use crate::config::LedgerConfig;
use crate::crypto::{Address, KeyPair, Sha256Hash};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{mine_block, MAX_DIFFICULTY};
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: Sha256Hash = [0u8; 32];
/// Fixed so that every fresh ledger shares the same genesis hash.
pub const GENESIS_TIMESTAMP: u64 = 1672531200000;

pub const DEFAULT_DIFFICULTY: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    #[serde(with = "crate::crypto::hex_hash")]
    pub previous_hash: Sha256Hash,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    /// Stored seal. Must equal `calculate_hash()`; loading trusts it verbatim.
    #[serde(with = "crate::crypto::hex_hash")]
    pub hash: Sha256Hash,
}

impl Block {
    pub fn new(index: u64, previous_hash: Sha256Hash, transactions: Vec<Transaction>) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        Self::with_timestamp(index, timestamp, previous_hash, transactions)
    }

    /// Builds an unsealed block: nonce 0, hash computed from the initial fields.
    pub fn with_timestamp(
        index: u64,
        timestamp: u64,
        previous_hash: Sha256Hash,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            previous_hash,
            nonce: 0,
            transactions,
            hash: [0u8; 32],
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(Block::calculate_merkle_root(&self.transactions));
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Sha256Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn is_sealed(&self, difficulty: u32) -> bool {
        self.hash == self.calculate_hash() && crate::miner::meets_difficulty(&self.hash, difficulty)
    }
}

/// The ledger: hash-linked blocks, the pending pool, and the parameters
/// that govern mining. Only mutated through its own operations.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub(crate) blocks: Vec<Block>,
    pub(crate) pending: Mempool,
    pub(crate) difficulty: u32,
    pub(crate) mining_reward: Amount,
    pub(crate) address_book: AddressBook,
}

impl Blockchain {
    /// Create a ledger holding only the genesis block.
    pub fn new(difficulty: u32, mining_reward: Amount) -> Result<Self, ChainError> {
        Self::with_parts(difficulty, mining_reward, Mempool::new())
    }

    pub fn with_config(config: &LedgerConfig) -> Result<Self, ChainError> {
        config.validate()?;
        Self::with_parts(
            config.difficulty,
            config.mining_reward,
            Mempool::with_capacity(config.max_pending),
        )
    }

    fn with_parts(difficulty: u32, mining_reward: Amount, pending: Mempool) -> Result<Self, ChainError> {
        check_parameters(difficulty, mining_reward).map_err(ChainError::InvalidConfig)?;
        Ok(Blockchain {
            blocks: vec![Self::create_genesis_block()],
            pending,
            difficulty,
            mining_reward,
            address_book: AddressBook::new(),
        })
    }

    /// Genesis is accepted as built; it is never mined.
    pub fn create_genesis_block() -> Block {
        Block::with_timestamp(0, GENESIS_TIMESTAMP, GENESIS_PREVIOUS_HASH, Vec::new())
    }

    pub fn get_latest_block(&self) -> &Block {
        // Never empty: every constructor starts from a genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Index of the chain head.
    pub fn height(&self) -> u64 {
        self.get_latest_block().index
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.pending.transactions()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn mining_reward(&self) -> Amount {
        self.mining_reward
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    /// Queues a user transaction. Signature and balance are NOT checked
    /// here; call [`Blockchain::is_transaction_valid`] first.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        if tx.is_reward() {
            return Err(ChainError::RejectedTransaction(format!(
                "{} transactions are minted by mining only",
                Address::GENESIS
            )));
        }
        debug!(tx = %tx.hash_str(), sender = %tx.sender, "queued pending transaction");
        self.pending.add_transaction(tx)
    }

    /// Builds, signs, validates and queues a transfer from `keypair`'s address.
    pub fn send(
        &mut self,
        keypair: &KeyPair,
        receiver: Address,
        amount: Amount,
    ) -> Result<Transaction, ChainError> {
        let mut tx = Transaction::new(keypair.address(), receiver, amount);
        tx.sign(keypair)?;
        self.validate_transaction(&tx)?;
        self.add_transaction(tx.clone())?;
        Ok(tx)
    }

    /// Mines the pending pool plus a reward for `reward_address` into a new
    /// block and appends it. Pending transactions that no longer hold up
    /// against running balances are dropped, not mined.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> Result<&Block, ChainError> {
        if reward_address.as_str().is_empty() || reward_address.is_genesis() {
            return Err(ChainError::RejectedTransaction(format!(
                "'{}' cannot receive mining rewards",
                reward_address
            )));
        }

        let pending = self.pending.take_all();
        let mut transactions = self.admissible_batch(pending);
        transactions.push(Transaction::reward(reward_address.clone(), self.mining_reward));

        let (index, previous_hash) = {
            let latest = self.get_latest_block();
            (latest.index + 1, latest.hash)
        };
        let block = mine_block(Block::new(index, previous_hash, transactions), self.difficulty);

        info!(
            index = block.index,
            hash = %block.hash_str(),
            transactions = block.transactions.len(),
            "appended block"
        );
        self.blocks.push(block);
        Ok(self.get_latest_block())
    }

    /// Creates a fresh key pair, registers it, and returns its address.
    pub fn generate_address(&mut self) -> Result<(Address, KeyPair), ChainError> {
        loop {
            let keypair = KeyPair::generate()?;
            if self.address_book.contains(&keypair.address()) {
                continue;
            }
            let address = self.address_book.register(&keypair)?;
            info!(address = %address, "generated address");
            return Ok((address, keypair));
        }
    }

    pub fn key_pair_for(&self, address: &Address) -> Option<KeyPair> {
        self.address_book.key_pair_for(address)
    }

    /// Structural check only; see [`crate::crypto::is_valid_private_key`].
    pub fn is_valid_private_key(&self, key: &str) -> bool {
        crate::crypto::is_valid_private_key(key)
    }
}

pub(crate) fn check_parameters(difficulty: u32, mining_reward: Amount) -> Result<(), String> {
    if difficulty > MAX_DIFFICULTY {
        return Err(format!(
            "difficulty {} exceeds maximum {}",
            difficulty, MAX_DIFFICULTY
        ));
    }
    if mining_reward < ZERO {
        return Err(format!("mining reward {} must not be negative", mining_reward));
    }
    Ok(())
}

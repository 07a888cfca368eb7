//! Ordered pool of submitted, unconfirmed transactions.

use crate::error::ChainError;
use crate::transaction::Transaction;

pub const DEFAULT_MAX_PENDING: usize = 10_000;

#[derive(Debug, Clone)]
pub struct Mempool {
    transactions: Vec<Transaction>,
    max_size: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_PENDING)
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Mempool {
            transactions: Vec::new(),
            max_size,
        }
    }

    /// Appends in submission order. No validation happens here.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        if self.transactions.len() >= self.max_size {
            return Err(ChainError::MempoolFull(self.max_size));
        }
        self.transactions.push(tx);
        Ok(())
    }

    /// Empties the pool, returning everything in submission order.
    pub fn take_all(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

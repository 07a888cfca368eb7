use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::transaction::Transaction;
use std::collections::HashSet;
use tracing::warn;

use super::chain::Blockchain;
use super::state::BalanceSheet;

impl Blockchain {
    /// Checks a transaction against the confirmed chain. Cheap checks
    /// (amount, signature) run before the balance replay.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<(), ChainError> {
        if tx.is_reward() {
            return Ok(());
        }
        tx.validate_stateless()?;
        if self.confirm_transaction(tx) {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} is already mined",
                tx.hash_str()
            )));
        }

        let balance = self.get_balance(&tx.sender);
        if balance < tx.amount {
            return Err(ChainError::InvalidTransaction(format!(
                "Insufficient balance: {} holds {} but sends {}",
                tx.sender, balance, tx.amount
            )));
        }
        Ok(())
    }

    pub fn is_transaction_valid(&self, tx: &Transaction) -> bool {
        self.validate_transaction(tx).is_ok()
    }

    /// Structural tamper check over every adjacent pair of blocks. Does not
    /// re-check signatures, balances, or proof-of-work.
    pub fn verify_chain(&self) -> Result<(), ChainError> {
        for (i, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = (i + 1) as u64;

            if current.hash != current.calculate_hash() {
                return Err(ChainError::TamperDetected {
                    index,
                    reason: "stored hash does not match block contents".to_string(),
                });
            }
            if current.previous_hash != previous.hash {
                return Err(ChainError::TamperDetected {
                    index,
                    reason: format!("previous hash does not link to block {}", index - 1),
                });
            }
        }
        Ok(())
    }

    pub fn is_chain_valid(&self) -> bool {
        self.verify_chain().is_ok()
    }

    /// Replays `pending` in submission order against running balances and
    /// keeps only what still holds, so one batch cannot overspend. A signed
    /// transfer is admitted at most once, across the chain and the batch.
    pub(crate) fn admissible_batch(&self, pending: Vec<Transaction>) -> Vec<Transaction> {
        let mut sheet = BalanceSheet::replay(self.confirmed_transactions());
        let mined: HashSet<Sha256Hash> = self
            .confirmed_transactions()
            .map(Transaction::hash)
            .collect();
        let mut seen: HashSet<Sha256Hash> = HashSet::with_capacity(pending.len());
        let mut admitted = Vec::with_capacity(pending.len() + 1);

        for tx in pending {
            let hash = tx.hash();
            let verdict = if tx.is_reward() {
                Err(ChainError::RejectedTransaction(
                    "reward transactions are minted by mining only".to_string(),
                ))
            } else if mined.contains(&hash) {
                Err(ChainError::InvalidTransaction("replay of a mined transaction".to_string()))
            } else if seen.contains(&hash) {
                Err(ChainError::InvalidTransaction("duplicate within pending batch".to_string()))
            } else {
                tx.validate_stateless().and_then(|_| {
                    let balance = sheet.get_balance(&tx.sender);
                    if balance < tx.amount {
                        Err(ChainError::InvalidTransaction(format!(
                            "Insufficient balance at mining time: {} holds {} but sends {}",
                            tx.sender, balance, tx.amount
                        )))
                    } else {
                        Ok(())
                    }
                })
            };

            match verdict {
                Ok(()) => {
                    seen.insert(hash);
                    sheet.apply_transaction(&tx);
                    admitted.push(tx);
                }
                Err(e) => warn!(tx = %tx.hash_str(), error = %e, "dropping pending transaction"),
            }
        }
        admitted
    }
}

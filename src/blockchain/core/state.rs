use crate::amount::{Amount, ZERO};
use crate::crypto::Address;
use crate::transaction::Transaction;
use std::collections::BTreeMap;

use super::chain::Blockchain;

/// Balances derived by replaying transactions. Built on demand and thrown
/// away; the ledger never stores one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    balances: BTreeMap<Address, Amount>,
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut sheet = Self::new();
        for tx in transactions {
            sheet.apply_transaction(tx);
        }
        sheet
    }

    /// Both parties get an entry at zero on first sight, then the delta applies.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        let sender = self.balances.entry(tx.sender.clone()).or_insert(ZERO);
        *sender = sender.saturating_sub(tx.amount);
        let receiver = self.balances.entry(tx.receiver.clone()).or_insert(ZERO);
        *receiver = receiver.saturating_add(tx.amount);
    }

    pub fn get_balance(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(ZERO)
    }

    pub fn into_map(self) -> BTreeMap<Address, Amount> {
        self.balances
    }
}

impl Blockchain {
    pub(crate) fn confirmed_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|block| block.transactions.iter())
    }

    /// Net of everything `address` received minus everything it sent, over
    /// mined blocks only.
    pub fn get_balance(&self, address: &Address) -> Amount {
        let mut balance = ZERO;
        for tx in self.confirmed_transactions() {
            if &tx.sender == address {
                balance = balance.saturating_sub(tx.amount);
            }
            if &tx.receiver == address {
                balance = balance.saturating_add(tx.amount);
            }
        }
        balance
    }

    /// Every address seen in a mined transaction, `Genesis` included.
    pub fn get_all_addresses_and_balances(&self) -> BTreeMap<Address, Amount> {
        BalanceSheet::replay(self.confirmed_transactions()).into_map()
    }

    pub fn find_transactions_for_address(&self, address: &Address) -> Vec<&Transaction> {
        self.confirmed_transactions()
            .filter(|tx| &tx.sender == address || &tx.receiver == address)
            .collect()
    }

    /// Membership test against mined blocks; does not re-verify anything.
    pub fn confirm_transaction(&self, tx: &Transaction) -> bool {
        self.confirmed_transactions().any(|mined| mined == tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(sender: &str, receiver: &str, amount: i32) -> Transaction {
        Transaction::with_timestamp(
            Address::from(sender),
            Address::from(receiver),
            Amount::from_num(amount),
            0,
        )
    }

    #[test]
    fn test_balance_sheet_replay() {
        let txs = vec![tx("Genesis", "a", 10), tx("a", "b", 4), tx("b", "c", 1)];
        let sheet = BalanceSheet::replay(&txs);
        assert_eq!(sheet.get_balance(&Address::from("a")), Amount::from_num(6));
        assert_eq!(sheet.get_balance(&Address::from("b")), Amount::from_num(3));
        assert_eq!(sheet.get_balance(&Address::from("c")), Amount::from_num(1));
        assert_eq!(sheet.get_balance(&Address::genesis()), Amount::from_num(-10));
        assert_eq!(sheet.get_balance(&Address::from("nobody")), ZERO);
        assert_eq!(sheet.into_map().len(), 4);
    }

    #[test]
    fn test_self_transfer_nets_to_zero() {
        let sheet = BalanceSheet::replay(&[tx("a", "a", 5)]);
        assert_eq!(sheet.get_balance(&Address::from("a")), ZERO);
    }

    #[test]
    fn test_unknown_address_has_zero_balance() {
        let mut chain = Blockchain::new(0, Amount::from_num(1)).unwrap();
        chain.mine_pending_transactions(&Address::from("miner")).unwrap();
        assert_eq!(chain.get_balance(&Address::from("stranger")), ZERO);
        assert!(chain.find_transactions_for_address(&Address::from("stranger")).is_empty());
    }

    #[test]
    fn test_queries_ignore_pending() {
        let mut chain = Blockchain::new(0, Amount::from_num(1)).unwrap();
        let pending = tx("x", "y", 3);
        chain.add_transaction(pending.clone()).unwrap();

        assert_eq!(chain.get_balance(&Address::from("y")), ZERO);
        assert!(!chain.confirm_transaction(&pending));
        assert!(chain.get_all_addresses_and_balances().is_empty());
    }

    #[test]
    fn test_confirm_and_history_after_mining() {
        let mut chain = Blockchain::new(0, Amount::from_num(2)).unwrap();
        let miner = Address::from("miner");
        let reward = chain.mine_pending_transactions(&miner).unwrap().transactions[0].clone();

        assert!(chain.confirm_transaction(&reward));
        assert_eq!(chain.find_transactions_for_address(&miner), vec![&reward]);

        let balances = chain.get_all_addresses_and_balances();
        assert_eq!(balances.get(&miner), Some(&Amount::from_num(2)));
        assert_eq!(balances.get(&Address::genesis()), Some(&Amount::from_num(-2)));
    }
}

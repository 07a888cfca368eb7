//! Shared helpers for the `sealchain` binary: ledger loading and table rendering.

use crate::amount::Amount;
use crate::blockchain::{Block, Blockchain};
use crate::config::Config;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::persistence::{open_store, Persistence};
use crate::transaction::Transaction;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::collections::BTreeMap;

/// Opens the configured store and loads the ledger from it, or starts a
/// fresh genesis-only ledger when the store is empty.
pub fn load_ledger_from_config(
    config: &Config,
) -> Result<(Box<dyn Persistence>, Blockchain), ChainError> {
    let store = open_store(&config.storage)?;
    let mut chain = Blockchain::with_config(&config.ledger)?;
    if !chain.load_from(store.as_ref())? {
        tracing::info!(path = %config.storage.path.display(), "no stored ledger, starting from genesis");
    }
    Ok((store, chain))
}

/// `abcdef0123...` style shortening for long hex strings.
pub fn shorten(text: &str, keep: usize) -> String {
    if text.chars().count() > keep + 3 {
        let head: String = text.chars().take(keep).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

fn sender_cell(tx: &Transaction) -> Cell {
    if tx.is_reward() {
        Cell::new(Address::GENESIS).fg(Color::Yellow)
    } else {
        Cell::new(shorten(tx.sender.as_str(), 16))
    }
}

pub fn chain_table(blocks: &[Block]) -> Table {
    let mut table = new_table(&["Index", "Timestamp", "Nonce", "Txs", "Previous", "Hash"]);
    for block in blocks {
        table.add_row(vec![
            Cell::new(block.index),
            Cell::new(format_timestamp(block.timestamp)),
            Cell::new(block.nonce),
            Cell::new(block.transactions.len()),
            Cell::new(shorten(&hex::encode(block.previous_hash), 12)),
            Cell::new(shorten(&block.hash_str(), 12)).fg(Color::Green),
        ]);
    }
    table
}

pub fn transactions_table(transactions: &[&Transaction]) -> Table {
    let mut table = new_table(&["Sender", "Receiver", "Amount", "Timestamp", "Hash"]);
    for tx in transactions {
        table.add_row(vec![
            sender_cell(tx),
            Cell::new(shorten(tx.receiver.as_str(), 16)),
            Cell::new(tx.amount),
            Cell::new(format_timestamp(tx.timestamp)),
            Cell::new(shorten(&tx.hash_str(), 12)),
        ]);
    }
    table
}

pub fn balances_table(balances: &BTreeMap<Address, Amount>) -> Table {
    let mut table = new_table(&["Address", "Balance"]);
    for (address, balance) in balances {
        let color = if *balance > Amount::ZERO {
            Color::Green
        } else {
            Color::DarkGrey
        };
        table.add_row(vec![Cell::new(address), Cell::new(balance).fg(color)]);
    }
    table
}

pub fn format_timestamp(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn config_in(dir: &std::path::Path, backend: StorageBackend) -> Config {
        let mut config = Config::default();
        config.ledger.difficulty = 0;
        config.storage.backend = backend;
        config.storage.path = dir.join("ledger.store");
        config
    }

    #[test]
    fn test_empty_store_starts_from_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let (_, chain) = load_ledger_from_config(&config_in(dir.path(), StorageBackend::Json)).unwrap();
        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.difficulty(), 0);
    }

    #[test]
    fn test_loads_what_was_saved() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), StorageBackend::Sqlite);

        let (store, mut chain) = load_ledger_from_config(&config).unwrap();
        chain.mine_pending_transactions(&Address::from("miner")).unwrap();
        chain.save_to(store.as_ref()).unwrap();

        let (_, reloaded) = load_ledger_from_config(&config).unwrap();
        assert_eq!(reloaded.blocks().len(), 2);
        assert_eq!(reloaded.get_balance(&Address::from("miner")), Amount::from_num(1));
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("abcdef", 8), "abcdef");
        assert_eq!(shorten("0123456789abcdef", 4), "0123...");
    }

    #[test]
    fn test_tables_render_rows() {
        let mut balances = BTreeMap::new();
        balances.insert(Address::from("alice"), Amount::from_num(1.5));
        let rendered = balances_table(&balances).to_string();
        assert!(rendered.contains("alice"));
        assert!(rendered.contains("1.5"));

        let genesis = Blockchain::create_genesis_block();
        assert!(chain_table(&[genesis]).to_string().contains("Index"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1672531200000), "2023-01-01 00:00:00");
    }
}

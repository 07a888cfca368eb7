//! Registry of addresses generated by this ledger instance and their keys.
//!
//! Keys are held in hex form so the book can be persisted as plain data.
//! Membership here does not gate anything: unregistered addresses may
//! still send and receive.

use crate::crypto::{is_valid_private_key, Address, KeyPair};
use crate::error::ChainError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<Address, String>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from persisted entries, rejecting malformed keys.
    pub fn from_entries(entries: BTreeMap<Address, String>) -> Result<Self, ChainError> {
        for (address, key) in &entries {
            if !is_valid_private_key(key) {
                return Err(ChainError::MalformedPersistedState(format!(
                    "Address book entry for {} holds a malformed private key",
                    address
                )));
            }
        }
        Ok(AddressBook { entries })
    }

    pub fn entries(&self) -> &BTreeMap<Address, String> {
        &self.entries
    }

    /// Records a generated key pair. Fails if its address is already registered.
    pub fn register(&mut self, keypair: &KeyPair) -> Result<Address, ChainError> {
        let address = keypair.address();
        if self.entries.contains_key(&address) {
            return Err(ChainError::DuplicateAddress(format!(
                "{} is already registered",
                address
            )));
        }
        self.entries.insert(address.clone(), keypair.secret_hex());
        Ok(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    pub fn secret_for(&self, address: &Address) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }

    pub fn key_pair_for(&self, address: &Address) -> Option<KeyPair> {
        self.secret_for(address)
            .and_then(|key| KeyPair::from_secret_hex(key).ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

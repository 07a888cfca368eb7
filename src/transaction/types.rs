/// Transaction types for SealChain
use crate::amount::Amount;
use crate::crypto::{Address, KeyPair, Sha256Hash};
use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// A value transfer between two addresses.
///
/// `sender`, `receiver`, `amount` and `timestamp` form the authenticated
/// payload; changing any of them after signing invalidates the signature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub receiver: Address,
    pub amount: Amount,
    /// Creation time in Unix milliseconds.
    pub timestamp: u64,
    #[serde(with = "crate::crypto::hex_bytes_opt")]
    pub signature: Option<Vec<u8>>,
    #[serde(with = "crate::crypto::hex_bytes_opt")]
    pub public_key: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(sender: Address, receiver: Address, amount: Amount) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        Self::with_timestamp(sender, receiver, amount, timestamp)
    }

    pub fn with_timestamp(sender: Address, receiver: Address, amount: Amount, timestamp: u64) -> Self {
        Transaction {
            sender,
            receiver,
            amount,
            timestamp,
            signature: None,
            public_key: None,
        }
    }

    /// Mining reward minted by the protocol. Never signed.
    pub fn reward(receiver: Address, amount: Amount) -> Self {
        Self::new(Address::genesis(), receiver, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender.is_genesis()
    }

    /// Canonical payload: fixed field order, strings length-prefixed.
    pub fn signable_message(&self) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice("TRANSFER:".as_bytes());
        for field in [self.sender.as_str(), self.receiver.as_str()] {
            message.extend_from_slice(&(field.len() as u64).to_le_bytes());
            message.extend_from_slice(field.as_bytes());
        }
        message.extend_from_slice(&self.amount.to_le_bytes());
        message.extend_from_slice(&self.timestamp.to_le_bytes());
        message
    }

    /// Signs the canonical payload and attaches the signer's public key.
    /// Signing again replaces the previous signature.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        let signature = keypair.sign(&self.signable_message())?;
        self.signature = Some(signature.to_vec());
        self.public_key = Some(keypair.public_key_bytes().to_vec());
        Ok(())
    }

    /// Full content hash, covering the signature and public key as well as
    /// the payload. Blocks commit to transactions through this value.
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.signable_message());
        for part in [&self.signature, &self.public_key] {
            match part {
                Some(bytes) => {
                    hasher.update([1u8]);
                    hasher.update((bytes.len() as u64).to_le_bytes());
                    hasher.update(bytes);
                }
                None => hasher.update([0u8]),
            }
        }
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }
}

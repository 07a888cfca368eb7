/// Signature checks for transactions, kept apart from the type definitions
use crate::amount::ZERO;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Stateless authentication check. Reward transactions are always authentic.
    pub fn validate_signature(&self) -> Result<(), ChainError> {
        if self.is_reward() {
            return Ok(());
        }

        let (signature, public_key) = match (&self.signature, &self.public_key) {
            (Some(sig), Some(pk)) => (sig, pk),
            _ => {
                return Err(ChainError::InvalidTransaction(
                    "Transaction not signed".to_string(),
                ))
            }
        };

        // The key must belong to the sender, otherwise anyone could sign for anyone.
        let signer = Address::from_public_key(public_key);
        if signer != self.sender {
            return Err(ChainError::InvalidTransaction(format!(
                "Public key belongs to {}, not sender {}",
                signer, self.sender
            )));
        }

        crate::crypto::verify_signature(public_key, &self.signable_message(), signature)
    }

    pub fn verify(&self) -> bool {
        self.validate_signature().is_ok()
    }

    /// Checks that do not need chain state: positive amount, then signature.
    pub fn validate_stateless(&self) -> Result<(), ChainError> {
        if self.is_reward() {
            return Ok(());
        }
        if self.amount <= ZERO {
            return Err(ChainError::InvalidTransaction(format!(
                "Amount must be positive, got {}",
                self.amount
            )));
        }
        self.validate_signature()
    }
}

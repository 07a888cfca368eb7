//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::{Address, KeyPair};
    use crate::error::ChainError;

    fn signed_transfer(keypair: &KeyPair, receiver: &str, amount: f64) -> Transaction {
        let mut tx = Transaction::new(
            keypair.address(),
            Address::from(receiver),
            Amount::from_num(amount),
        );
        tx.sign(keypair).unwrap();
        tx
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed_transfer(&keypair, "receiver", 2.5);
        assert!(tx.verify());
        assert!(tx.validate_stateless().is_ok());
        assert_eq!(tx.public_key.as_deref(), Some(&keypair.public_key_bytes()[..]));
    }

    #[test]
    fn test_unsigned_transaction_fails() {
        let keypair = KeyPair::generate().unwrap();
        let tx = Transaction::new(keypair.address(), Address::from("b"), Amount::from_num(1));
        assert!(!tx.verify());
        assert!(matches!(
            tx.validate_signature(),
            Err(ChainError::InvalidTransaction(msg)) if msg.contains("not signed")
        ));
    }

    #[test]
    fn test_reward_is_always_authentic() {
        let tx = Transaction::reward(Address::from("miner"), Amount::from_num(1));
        assert!(tx.is_reward());
        assert!(tx.signature.is_none());
        assert!(tx.verify());
    }

    #[test]
    fn test_mutating_any_field_breaks_signature() {
        let keypair = KeyPair::generate().unwrap();
        let original = signed_transfer(&keypair, "receiver", 3.0);

        let mut tx = original.clone();
        tx.receiver = Address::from("receivex");
        assert!(!tx.verify());

        let mut tx = original.clone();
        tx.amount = Amount::from_num(30);
        assert!(!tx.verify());

        let mut tx = original.clone();
        tx.timestamp += 1;
        assert!(!tx.verify());

        let mut tx = original.clone();
        let mut sender = tx.sender.as_str().to_string();
        let flipped = if sender.starts_with('0') { "1" } else { "0" };
        sender.replace_range(0..1, flipped);
        tx.sender = Address::from(sender);
        assert!(!tx.verify());

        let mut tx = original;
        if let Some(sig) = tx.signature.as_mut() {
            sig[10] ^= 0x01;
        }
        assert!(!tx.verify());
    }

    #[test]
    fn test_signature_from_foreign_key_rejected() {
        let owner = KeyPair::generate().unwrap();
        let forger = KeyPair::generate().unwrap();

        let mut tx = Transaction::new(owner.address(), Address::from("thief"), Amount::from_num(5));
        tx.sign(&forger).unwrap();

        assert!(matches!(
            tx.validate_signature(),
            Err(ChainError::InvalidTransaction(msg)) if msg.contains("not sender")
        ));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let keypair = KeyPair::generate().unwrap();
        let zero = signed_transfer(&keypair, "receiver", 0.0);
        assert!(zero.verify());
        assert!(zero.validate_stateless().is_err());

        let negative = signed_transfer(&keypair, "receiver", -1.0);
        assert!(negative.validate_stateless().is_err());
    }

    #[test]
    fn test_payload_field_order_is_unambiguous() {
        let a = Transaction::with_timestamp(Address::from("ab"), Address::from("c"), Amount::from_num(1), 7);
        let b = Transaction::with_timestamp(Address::from("a"), Address::from("bc"), Amount::from_num(1), 7);
        assert_ne!(a.signable_message(), b.signable_message());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_covers_signature() {
        let keypair = KeyPair::generate().unwrap();
        let mut tx = Transaction::with_timestamp(keypair.address(), Address::from("b"), Amount::from_num(1), 1);
        let unsigned_hash = tx.hash();
        tx.sign(&keypair).unwrap();
        assert_ne!(unsigned_hash, tx.hash());
        assert_eq!(tx.hash_str().len(), 64);
    }
}

//! The identity provider collaborator (spec §6: "Identity provider:
//! `sign(msg)`, `verify(pubkey, msg, sig)`."). Ed25519 key generation and
//! signature primitives are out of scope for the core (spec §1); this
//! trait is the seam a real implementation plugs a keypair/HSM into.

/// Signs and verifies the Ed25519 proofs used in `AUTH PROOF` (spec §4.4).
pub trait IdentityProvider: Send + Sync {
    fn sign(&self, msg: &[u8]) -> Vec<u8>;
    fn verify(&self, pubkey: &str, msg: &[u8], sig: &[u8]) -> bool;
}

/// An identity provider that accepts every session as anonymous and
/// trust-on-first-use, for tests and burrows that don't gate on identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIdentityProvider;

impl IdentityProvider for NoopIdentityProvider {
    fn sign(&self, _msg: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn verify(&self, _pubkey: &str, _msg: &[u8], _sig: &[u8]) -> bool {
        true
    }
}

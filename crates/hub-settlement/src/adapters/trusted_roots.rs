//! Proof verifier backed by roots the client has already attested.
//!
//! Each client holds the state root it trusts for a given commitment.
//! A fraud proof carries the root the rollapp actually claimed; the claim is
//! accepted only when the two match.

use crate::domain::{ClientId, SettlementError, SettlementResult, StateCommitmentRef};
use crate::ports::{ProofVerdict, ProofVerifier};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Trusted-root table keyed by `(client, commitment)`.
#[derive(Debug, Default)]
pub struct TrustedRootVerifier {
    roots: RwLock<HashMap<(ClientId, StateCommitmentRef), Vec<u8>>>,
}

impl TrustedRootVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the root `client_id` trusts for `commitment`.
    pub fn trust(&self, client_id: ClientId, commitment: StateCommitmentRef, root: Vec<u8>) {
        self.roots.write().insert((client_id, commitment), root);
    }
}

impl ProofVerifier for TrustedRootVerifier {
    fn verify_state(
        &self,
        client_id: &ClientId,
        commitment: &StateCommitmentRef,
        proof: &[u8],
    ) -> SettlementResult<ProofVerdict> {
        let roots = self.roots.read();
        let trusted = roots
            .get(&(client_id.clone(), commitment.clone()))
            .ok_or_else(|| {
                SettlementError::NotFound(format!(
                    "no trusted root for {} under client {}",
                    commitment, client_id
                ))
            })?;
        if trusted.as_slice() == proof {
            Ok(ProofVerdict::Accepted)
        } else {
            Ok(ProofVerdict::Rejected)
        }
    }
}

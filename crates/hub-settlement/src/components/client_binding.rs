//! Canonical client binding: rollapp -> verification client, set once.

use super::{decode, encode};
use crate::domain::keys;
use crate::domain::{
    CanonicalBinding, ClientId, RollappId, SettlementError, SettlementResult, ValidationLimits,
};
use crate::ports::StateReader;
use crate::staging::StagedWrites;
use tracing::info;

/// Result of a successful [`CanonicalClientBinding::bind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    /// A new binding was written.
    Bound,
    /// The same client was already bound; nothing changed.
    AlreadyBound,
}

/// Owner of the binding map.
#[derive(Clone, Debug, Default)]
pub struct CanonicalClientBinding {
    limits: ValidationLimits,
}

impl CanonicalClientBinding {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Bind `rollapp_id` to `client_id`.
    ///
    /// Re-binding the same client is a no-op; a different client is a
    /// conflict and the original binding stays.
    pub fn bind<S: StateReader + ?Sized>(
        &self,
        tx: &mut StagedWrites<'_, S>,
        rollapp_id: &RollappId,
        client_id: &ClientId,
    ) -> SettlementResult<BindOutcome> {
        self.limits.check_rollapp_id(rollapp_id)?;
        if client_id.as_str().is_empty() {
            return Err(SettlementError::InvalidArgument("empty client id".to_string()));
        }

        if let Some(existing) = Self::binding(&*tx, rollapp_id)? {
            if &existing.client_id == client_id {
                return Ok(BindOutcome::AlreadyBound);
            }
            return Err(SettlementError::Conflict(format!(
                "rollapp {} already bound to client {}",
                rollapp_id, existing.client_id
            )));
        }

        let binding = CanonicalBinding {
            rollapp_id: rollapp_id.clone(),
            client_id: client_id.clone(),
        };
        tx.put(keys::binding_key(rollapp_id), encode(&binding)?);
        info!(rollapp_id = %rollapp_id, client_id = %client_id, "bound canonical client");
        Ok(BindOutcome::Bound)
    }

    /// Client bound to `rollapp_id`. Unbound rollapps are `NotFound`.
    pub fn resolve<R: StateReader + ?Sized>(
        reader: &R,
        rollapp_id: &RollappId,
    ) -> SettlementResult<ClientId> {
        Self::binding(reader, rollapp_id)?
            .map(|b| b.client_id)
            .ok_or_else(|| SettlementError::NotFound(format!("canonical client for {}", rollapp_id)))
    }

    /// Resolve and require that the bound client is `expected`.
    pub fn ensure_bound_to<R: StateReader + ?Sized>(
        reader: &R,
        rollapp_id: &RollappId,
        expected: &ClientId,
    ) -> SettlementResult<ClientId> {
        let bound = Self::resolve(reader, rollapp_id)?;
        if &bound != expected {
            return Err(SettlementError::InvalidArgument(format!(
                "client {} is not canonical for {} (bound: {})",
                expected, rollapp_id, bound
            )));
        }
        Ok(bound)
    }

    pub fn binding<R: StateReader + ?Sized>(
        reader: &R,
        rollapp_id: &RollappId,
    ) -> SettlementResult<Option<CanonicalBinding>> {
        reader
            .get(&keys::binding_key(rollapp_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Every binding, ordered by rollapp id.
    pub fn all_bindings<R: StateReader + ?Sized>(
        reader: &R,
    ) -> SettlementResult<Vec<CanonicalBinding>> {
        reader
            .prefix_scan(&keys::binding_prefix())?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }
}

use rxstock_core::ActorId;

/// Authenticated actor for a request.
///
/// This is immutable and must be present for all ledger routes; every
/// committed adjustment records it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: ActorId,
}

impl ActorContext {
    pub fn new(actor_id: ActorId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }
}

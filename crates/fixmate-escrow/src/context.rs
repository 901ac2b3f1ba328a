//! Injected collaborators shared by both engines.

use std::sync::Arc;

use fixmate_core::{Clock, SystemClock};

use crate::policy::EscrowPolicy;
use crate::ports::{AdminAuthorizer, ClaimAdminAuthorizer, LedgerStore, PaymentGateway};
use crate::sinks::SideEffects;

/// Everything an engine operation touches outside its own arguments.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub effects: SideEffects,
    pub admins: Arc<dyn AdminAuthorizer>,
    pub clock: Arc<dyn Clock>,
    pub policy: Arc<EscrowPolicy>,
}

impl Collaborators {
    /// Collaborators with the default policy, the system clock, claim-based
    /// admin checks and log-only sinks.
    pub fn new(ledger: Arc<dyn LedgerStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            ledger,
            gateway,
            effects: SideEffects::tracing_only(),
            admins: Arc::new(ClaimAdminAuthorizer),
            clock: Arc::new(SystemClock),
            policy: Arc::new(EscrowPolicy::default()),
        }
    }

    pub fn with_effects(mut self, effects: SideEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_admins(mut self, admins: Arc<dyn AdminAuthorizer>) -> Self {
        self.admins = admins;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: EscrowPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}

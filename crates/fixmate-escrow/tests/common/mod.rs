//! Shared fixtures for the engine scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use fixmate_core::{ChargeId, ConnectedAccountId, JobId, ManualClock, Money, PaymentId, Timestamp, Uid};
use fixmate_escrow::job::{Job, JobStatus};
use fixmate_escrow::sinks::SideEffects;
use fixmate_escrow::testing::{RecordingSink, ScriptedGateway};
use fixmate_escrow::{
    Caller, Collaborators, DisputeEngine, EscrowEngine, EscrowPolicy, InMemoryLedger, Payment,
};
use rust_decimal::Decimal;

pub const CUSTOMER: &str = "cust-1";
pub const PRO: &str = "pro-1";
pub const ADMIN: &str = "admin-1";
pub const JOB: &str = "job-1";
pub const ACCOUNT: &str = "acct_pro_1";

pub fn t0() -> Timestamp {
    Timestamp::from_epoch_secs(1_767_225_600).unwrap()
}

pub fn customer() -> Caller {
    Caller::user(CUSTOMER)
}

pub fn pro() -> Caller {
    Caller::user(PRO)
}

pub fn admin() -> Caller {
    Caller::admin(ADMIN)
}

pub fn stranger() -> Caller {
    Caller::user("someone-else")
}

pub fn money(amount: Decimal) -> Money {
    Money::new(amount)
}

pub struct Harness {
    pub ledger: InMemoryLedger,
    pub gateway: ScriptedGateway,
    pub sink: RecordingSink,
    pub clock: ManualClock,
    pub policy: EscrowPolicy,
    pub escrow: EscrowEngine,
    pub disputes: DisputeEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sink(RecordingSink::new())
    }

    pub fn with_sink(sink: RecordingSink) -> Self {
        let ledger = InMemoryLedger::new();
        let gateway = ScriptedGateway::new();
        let clock = ManualClock::new(t0());
        let policy = EscrowPolicy::default();
        let ctx = Collaborators::new(Arc::new(ledger.clone()), Arc::new(gateway.clone()))
            .with_effects(SideEffects::new(Arc::new(sink.clone()), Arc::new(sink.clone())))
            .with_clock(Arc::new(clock.clone()))
            .with_policy(policy.clone());
        let harness = Self {
            escrow: EscrowEngine::new(ctx.clone()),
            disputes: DisputeEngine::new(ctx),
            ledger,
            gateway,
            sink,
            clock,
            policy,
        };
        harness.seed_job(JOB, CUSTOMER, Some(PRO));
        harness
    }

    pub fn now(&self) -> Timestamp {
        use fixmate_core::Clock;
        self.clock.now()
    }

    pub fn seed_job(&self, id: &str, customer: &str, pro: Option<&str>) {
        self.ledger
            .put_job(&Job {
                id: JobId::new(id),
                customer_uid: Uid::new(customer),
                assigned_pro_uid: pro.map(Uid::new),
                status: JobStatus::Open,
            })
            .unwrap();
    }

    /// A `Pending` payment on the default job.
    pub fn seed_pending(&self, id: &str, gross: Decimal) -> Payment {
        let payment = Payment::pending(
            PaymentId::new(id),
            JobId::new(JOB),
            Uid::new(CUSTOMER),
            Money::new(gross),
            "eur".to_string(),
            Some(ConnectedAccountId::new(ACCOUNT)),
            t0(),
        );
        self.ledger.put_payment(payment.clone());
        payment
    }

    /// A `Captured` payment on `job`, captured at `captured_at`.
    pub fn seed_captured_on(
        &self,
        job: &str,
        id: &str,
        gross: Decimal,
        captured_at: Timestamp,
    ) -> Payment {
        let mut payment = Payment::pending(
            PaymentId::new(id),
            JobId::new(job),
            Uid::new(CUSTOMER),
            Money::new(gross),
            "eur".to_string(),
            Some(ConnectedAccountId::new(ACCOUNT)),
            captured_at,
        );
        payment
            .capture(
                Some(ChargeId::new(format!("ch_{id}"))),
                captured_at,
                self.policy.escrow_hold,
            )
            .unwrap();
        self.ledger.put_payment(payment.clone());
        payment
    }

    pub fn seed_captured(&self, id: &str, gross: Decimal, captured_at: Timestamp) -> Payment {
        self.seed_captured_on(JOB, id, gross, captured_at)
    }

    /// A captured payment whose escrow hold ended one second ago.
    pub fn seed_due(&self, id: &str, gross: Decimal) -> Payment {
        let captured_at = self
            .now()
            .minus(self.policy.escrow_hold)
            .minus(Duration::seconds(1));
        self.seed_captured(id, gross, captured_at)
    }

    pub async fn payment(&self, id: &str) -> Payment {
        use fixmate_escrow::LedgerStore;
        self.ledger
            .get_payment(&PaymentId::new(id))
            .await
            .unwrap()
            .expect("payment exists")
    }

    pub fn job_doc(&self, id: &str) -> serde_json::Value {
        self.ledger.job_document(&JobId::new(id)).expect("job exists")
    }
}

//! # Escrow Policy
//!
//! Time windows, the minimum charge, and the platform fee schedule.
//!
//! ## Defaults
//!
//! | Setting | Default | Variable |
//! |---------|---------|----------|
//! | Escrow hold after capture | 7 days | `ESCROW_HOLD_HOURS` |
//! | Dispute window after capture | 14 days | `DISPUTE_WINDOW_HOURS` |
//! | Provider response deadline | 72 hours | `PRO_RESPONSE_HOURS` |
//! | Decision deadline | 7 days | `DECISION_HOURS` |
//! | Moderation reminder lookahead | 24 hours | `REMINDER_LOOKAHEAD_HOURS` |
//! | Minimum charge | 0.50 | `MIN_CHARGE` |
//! | Maximum charge | 999999.99 | `MAX_CHARGE` |
//! | Platform fee rate | 0.10 | `PLATFORM_FEE_RATE` |
//! | Platform fee fixed part | 0.00 | `PLATFORM_FEE_FIXED` |

use std::str::FromStr;

use chrono::Duration;
use fixmate_core::Money;
use rust_decimal::Decimal;
use serde::Serialize;

/// Platform fee and provider net for a released amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub platform_fee: Money,
    pub amount_net: Money,
}

/// Fee schedule: `round2(gross × rate + fixed)`, capped at gross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub rate: Decimal,
    pub fixed: Money,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            rate: Decimal::new(10, 2),
            fixed: Money::ZERO,
        }
    }
}

impl FeePolicy {
    pub fn calculate(&self, gross: Money) -> FeeBreakdown {
        let fee = Money::new(
            gross
                .as_decimal()
                .saturating_mul(self.rate)
                .saturating_add(self.fixed.as_decimal()),
        );
        let platform_fee = fee.max(Money::ZERO).min(gross);
        FeeBreakdown {
            platform_fee,
            amount_net: gross - platform_fee,
        }
    }
}

/// Escrow and dispute timing rules.
#[derive(Debug, Clone)]
pub struct EscrowPolicy {
    pub escrow_hold: Duration,
    pub dispute_window: Duration,
    pub pro_response_window: Duration,
    pub decision_window: Duration,
    pub reminder_lookahead: Duration,
    pub minimum_charge: Money,
    /// Largest single charge accepted; keeps minor units well inside `i64`.
    pub maximum_charge: Money,
    pub fees: FeePolicy,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            escrow_hold: Duration::days(7),
            dispute_window: Duration::days(14),
            pro_response_window: Duration::hours(72),
            decision_window: Duration::days(7),
            reminder_lookahead: Duration::hours(24),
            minimum_charge: Money::new(Decimal::new(50, 2)),
            maximum_charge: Money::new(Decimal::new(99_999_999, 2)),
            fees: FeePolicy::default(),
        }
    }
}

impl EscrowPolicy {
    /// Load overrides from the environment. Unset variables keep defaults.
    pub fn from_env() -> Result<Self, PolicyError> {
        let defaults = Self::default();
        Ok(Self {
            escrow_hold: env_hours("ESCROW_HOLD_HOURS", defaults.escrow_hold)?,
            dispute_window: env_hours("DISPUTE_WINDOW_HOURS", defaults.dispute_window)?,
            pro_response_window: env_hours("PRO_RESPONSE_HOURS", defaults.pro_response_window)?,
            decision_window: env_hours("DECISION_HOURS", defaults.decision_window)?,
            reminder_lookahead: env_hours(
                "REMINDER_LOOKAHEAD_HOURS",
                defaults.reminder_lookahead,
            )?,
            minimum_charge: env_parse("MIN_CHARGE", defaults.minimum_charge)?,
            maximum_charge: env_parse("MAX_CHARGE", defaults.maximum_charge)?,
            fees: FeePolicy {
                rate: env_parse("PLATFORM_FEE_RATE", defaults.fees.rate)?,
                fixed: env_parse("PLATFORM_FEE_FIXED", defaults.fees.fixed)?,
            },
        })
    }
}

fn env_hours(var: &'static str, default: Duration) -> Result<Duration, PolicyError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|h| *h > 0)
            .map(Duration::hours)
            .ok_or(PolicyError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_parse<T: FromStr>(var: &'static str, default: T) -> Result<T, PolicyError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| PolicyError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

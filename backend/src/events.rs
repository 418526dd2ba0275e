//! Audit events appended to the journal on every successful state transition.
//!
//! Failed operations emit nothing; the error returned to the caller is their only
//! trace.

use crate::access::Principal;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    OwnershipTransferred {
        previous: Principal,
        new_owner: Principal,
    },
    ProviderAdded {
        provider: Principal,
    },
    ProviderRemoved {
        provider: Principal,
    },
    LedgerPaused {
        by: Principal,
    },
    LedgerUnpaused {
        by: Principal,
    },
    CooldownUpdated {
        cooldown_seconds: u64,
    },
    BatchOpened {
        batch_id: u64,
        by: Principal,
    },
    BatchClosed {
        batch_id: u64,
        by: Principal,
    },
    ContributionSubmitted {
        batch_id: u64,
        principal: Principal,
    },
    UsageReported {
        batch_id: u64,
        provider: Principal,
    },
    SummaryRequested {
        batch_id: u64,
        request_id: u64,
        requester: Principal,
        state_hash_hex: String,
    },
    SummaryDecrypted {
        request_id: u64,
        batch_id: u64,
        contributions_total: u64,
        usage_total: u64,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OwnershipTransferred { .. } => "ownership_transferred",
            Event::ProviderAdded { .. } => "provider_added",
            Event::ProviderRemoved { .. } => "provider_removed",
            Event::LedgerPaused { .. } => "ledger_paused",
            Event::LedgerUnpaused { .. } => "ledger_unpaused",
            Event::CooldownUpdated { .. } => "cooldown_updated",
            Event::BatchOpened { .. } => "batch_opened",
            Event::BatchClosed { .. } => "batch_closed",
            Event::ContributionSubmitted { .. } => "contribution_submitted",
            Event::UsageReported { .. } => "usage_reported",
            Event::SummaryRequested { .. } => "summary_requested",
            Event::SummaryDecrypted { .. } => "summary_decrypted",
        }
    }
}

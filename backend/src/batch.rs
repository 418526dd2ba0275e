//! Batch lifecycle and the per-batch encrypted accumulators.

use crate::errors::LedgerError;
use enc_core::types::CiphertextHandle;
use enc_core::value::EncryptedValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// Lifecycle phase of one batch. Closed is terminal; a batch never reopens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Open,
    Closed,
}

/// The two metrics accumulated per batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Contributions,
    Usage,
}

/// Allocates batch ids and tracks each batch's phase.
///
/// The counter starts at 1 and allocation pre-increments, so the first opened batch is
/// id 2. Id 1 is reserved and never opened; submissions against it fail `BatchNotOpen`
/// like any other unknown id.
pub struct BatchManager {
    counter: u64,
    phases: BTreeMap<u64, BatchPhase>,
}

impl BatchManager {
    pub fn new() -> Self {
        Self {
            counter: 1,
            phases: BTreeMap::new(),
        }
    }

    /// Allocate the next id and mark it open. Ids strictly increase, with no gaps.
    pub fn open_batch(&mut self) -> u64 {
        self.counter += 1;
        let id = self.counter;
        self.phases.insert(id, BatchPhase::Open);
        id
    }

    /// One-way gate: open -> closed. Fails for unknown or already-closed ids.
    pub fn close_batch(&mut self, id: u64) -> Result<(), LedgerError> {
        match self.phases.get_mut(&id) {
            Some(phase @ BatchPhase::Open) => {
                *phase = BatchPhase::Closed;
                Ok(())
            }
            _ => Err(LedgerError::BatchNotOpen(id)),
        }
    }

    pub fn is_open(&self, id: u64) -> bool {
        self.phases.get(&id) == Some(&BatchPhase::Open)
    }

    pub fn phase(&self, id: u64) -> Option<BatchPhase> {
        self.phases.get(&id).copied()
    }
}

/// Owns the encrypted accumulators, one per `(batch id, metric)`.
///
/// The open/closed write gate is enforced by the ledger facade before `merge` is
/// reached; the store itself only guarantees that a merge lands on persisted state.
pub struct AccumulatorStore {
    slots: BTreeMap<(u64, Metric), EncryptedValue>,
}

impl AccumulatorStore {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Install zero accumulators for a freshly opened batch.
    pub fn init_zero(&mut self, batch_id: u64) {
        self.slots.insert((batch_id, Metric::Contributions), EncryptedValue::zero());
        self.slots.insert((batch_id, Metric::Usage), EncryptedValue::zero());
    }

    /// Fold an encrypted delta into the stored accumulator.
    ///
    /// If the slot was never initialized, a fresh zero is persisted first and the merge
    /// lands on it. In the normal flow `open_batch` has already initialized both
    /// metrics, so this path is unreachable; it exists so a missed initialization can
    /// never silently drop a merge into a local copy.
    pub fn merge(&mut self, batch_id: u64, metric: Metric, delta: &EncryptedValue) {
        let slot = self
            .slots
            .entry((batch_id, metric))
            .or_insert_with(EncryptedValue::zero);
        *slot = slot.add(delta);
    }

    pub fn get(&self, batch_id: u64, metric: Metric) -> Option<&EncryptedValue> {
        self.slots.get(&(batch_id, metric))
    }

    /// Both ciphertexts for a batch, contributions first. Fails `InvalidBatchId` when
    /// either slot was never initialized.
    pub fn ciphertexts(&self, batch_id: u64) -> Result<(&EncryptedValue, &EncryptedValue), LedgerError> {
        let contributions = self
            .get(batch_id, Metric::Contributions)
            .ok_or(LedgerError::InvalidBatchId(batch_id))?;
        let usage = self
            .get(batch_id, Metric::Usage)
            .ok_or(LedgerError::InvalidBatchId(batch_id))?;
        Ok((contributions, usage))
    }

    /// Content-addressed handles for both accumulators, contributions first.
    pub fn handles(&self, batch_id: u64) -> Result<[CiphertextHandle; 2], LedgerError> {
        let (contributions, usage) = self.ciphertexts(batch_id)?;
        Ok([contributions.handle(), usage.handle()])
    }
}

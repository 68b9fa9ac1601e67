//! Committed round state handle.
//!
//! Thin typed layer over a [`StateBackend`]: rounds are keyed by round
//! number, term snapshots by term number, and a single metadata pointer
//! names the current round. Every commit is one atomic batch, so observers
//! never see a round without its pointer or a transition half-applied.
//!
//! The store hands out owned [`Round`] values. Reading always deserializes a
//! fresh snapshot; there is no shared mutable round object to alias.

use std::sync::Arc;

use dposcore_core::{StateBackend, StorageError, StorageResult, WriteBatch};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{MinerListSnapshot, Round, RoundNumber, TermNumber};

/// Column family names, mirroring the storage crate's layout.
mod cf {
    pub const ROUNDS: &str = "rounds";
    pub const TERMS: &str = "terms";
    pub const METADATA: &str = "metadata";
}

const CURRENT_ROUND_KEY: &[u8] = b"current_round_number";

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Typed access to the committed rounds, term snapshots, and the current
/// round pointer.
pub struct RoundStore<B: StateBackend> {
    backend: Arc<B>,
}

impl<B: StateBackend> Clone for RoundStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StateBackend> RoundStore<B> {
    /// Wraps a storage backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// The committed current round number, if the chain is bootstrapped.
    pub fn current_round_number(&self) -> StorageResult<Option<RoundNumber>> {
        match self.backend.get(cf::METADATA, CURRENT_ROUND_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads a committed round by number.
    pub fn round(&self, number: RoundNumber) -> StorageResult<Option<Round>> {
        match self.backend.get(cf::ROUNDS, &number.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads the current committed round.
    pub fn current_round(&self) -> StorageResult<Option<Round>> {
        match self.current_round_number()? {
            Some(number) => self.round(number),
            None => Ok(None),
        }
    }

    /// Reads a term's miner list snapshot.
    pub fn term_snapshot(&self, term: TermNumber) -> StorageResult<Option<MinerListSnapshot>> {
        match self.backend.get(cf::TERMS, &term.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Commits the genesis round and its term snapshot atomically.
    pub fn commit_genesis(
        &self,
        round: &Round,
        snapshot: &MinerListSnapshot,
    ) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(
            cf::ROUNDS,
            round.round_number.to_be_bytes().to_vec(),
            encode(round)?,
        );
        batch.put(
            cf::TERMS,
            snapshot.term_number.to_be_bytes().to_vec(),
            encode(snapshot)?,
        );
        batch.put(
            cf::METADATA,
            CURRENT_ROUND_KEY.to_vec(),
            encode(&round.round_number)?,
        );
        self.backend.write_batch(batch)
    }

    /// Replaces the current round in place (same round number, updated
    /// slots) for same-round continuations.
    pub fn commit_round_update(&self, round: &Round) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(
            cf::ROUNDS,
            round.round_number.to_be_bytes().to_vec(),
            encode(round)?,
        );
        self.backend.write_batch(batch)
    }

    /// Commits a round transition atomically: the base round updated with
    /// reveals, the freshly generated next round, the advanced current-round
    /// pointer, and (for term transitions) the new term snapshot.
    pub fn commit_transition(
        &self,
        updated_base: &Round,
        next: &Round,
        snapshot: Option<&MinerListSnapshot>,
    ) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(
            cf::ROUNDS,
            updated_base.round_number.to_be_bytes().to_vec(),
            encode(updated_base)?,
        );
        batch.put(
            cf::ROUNDS,
            next.round_number.to_be_bytes().to_vec(),
            encode(next)?,
        );
        if let Some(snapshot) = snapshot {
            batch.put(
                cf::TERMS,
                snapshot.term_number.to_be_bytes().to_vec(),
                encode(snapshot)?,
            );
        }
        batch.put(
            cf::METADATA,
            CURRENT_ROUND_KEY.to_vec(),
            encode(&next.round_number)?,
        );
        self.backend.write_batch(batch)
    }
}

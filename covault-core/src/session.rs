//! Per-draft signing session state
//!
//! The original workflow kept "the current coin selection" and "the current
//! raw transaction" as process-wide state; here both live in an explicit
//! [`SigningSession`] value owned by the workflow instance that created it.
//! A session is created when a draft is built (or imported), carries the
//! draft through signing passes, and ends in exactly one of two terminal
//! states: `Broadcast` or `Discarded`.

use crate::coin_selection::types::FundingSet;
use crate::types::MultisigError;
use bitcoin::Transaction;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a signing session, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    /// Allocate the next session identifier
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a draft transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No signature slot has been filled yet
    Unsigned,
    /// At least one input carries signatures, but not every input is satisfied
    PartiallySigned,
    /// Every input is satisfied; the draft is ready for submission
    Complete,
    /// Submitted to the pending pool (terminal)
    Broadcast,
    /// Abandoned by the user (terminal)
    Discarded,
}

impl SessionState {
    /// True for the two terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Broadcast | SessionState::Discarded)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unsigned => write!(f, "Unsigned"),
            SessionState::PartiallySigned => write!(f, "PartiallySigned"),
            SessionState::Complete => write!(f, "Complete"),
            SessionState::Broadcast => write!(f, "Broadcast"),
            SessionState::Discarded => write!(f, "Discarded"),
        }
    }
}

/// One in-memory draft with its reservations and completeness flag
///
/// Owned exclusively by the workflow instance that created it; dropping the
/// session without broadcast is the cancellation path (the owner releases
/// the reservations recorded here).
#[derive(Debug)]
pub struct SigningSession {
    id: SessionId,
    draft: Transaction,
    funding: FundingSet,
    state: SessionState,
}

impl SigningSession {
    /// Start a session around a freshly built or imported draft
    ///
    /// The id is allocated by the caller first so the coin reservations
    /// taken on its behalf carry the same identity.
    pub fn new(id: SessionId, draft: Transaction, funding: FundingSet) -> Self {
        Self {
            id,
            draft,
            funding,
            state: SessionState::Unsigned,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The draft transaction
    pub fn draft(&self) -> &Transaction {
        &self.draft
    }

    /// Mutable access to the draft's signature slots
    ///
    /// Only the signature combiner writes through this; nothing else in the
    /// workflow mutates a draft after construction.
    pub(crate) fn draft_mut(&mut self) -> &mut Transaction {
        &mut self.draft
    }

    /// The coins reserved for this draft
    pub fn funding(&self) -> &FundingSet {
        &self.funding
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record the outcome of a signing pass
    ///
    /// `complete` comes from the combiner's completeness check across every
    /// input. No-op once the session is terminal.
    pub fn record_signing(&mut self, complete: bool) {
        if self.state.is_terminal() {
            return;
        }
        self.state = if complete {
            SessionState::Complete
        } else {
            SessionState::PartiallySigned
        };
    }

    /// Transition to `Broadcast` after pool admission
    pub fn mark_broadcast(&mut self) -> Result<(), MultisigError> {
        if self.state != SessionState::Complete {
            return Err(MultisigError::NotComplete);
        }
        self.state = SessionState::Broadcast;
        Ok(())
    }

    /// Abandon the draft
    pub fn discard(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Discarded;
        }
    }
}

use std::sync::atomic::{AtomicU8, Ordering};

use crate::core::types::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unprovisioned,
    Provisioned,
    Deleted,
}

impl IndexState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => IndexState::Provisioned,
            2 => IndexState::Deleted,
            _ => IndexState::Unprovisioned,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            IndexState::Unprovisioned => 0,
            IndexState::Provisioned => 1,
            IndexState::Deleted => 2,
        }
    }
}

/// Identity and provisioning state of one account's index.
///
/// `Provisioned` is optimistic: it is cleared when the backend reports the
/// resource missing and re-established by the next successful probe or create.
#[derive(Debug)]
pub struct IndexHandle {
    account: AccountId,
    location: String,
    state: AtomicU8,
}

impl IndexHandle {
    pub fn new(account: AccountId, location: String) -> Self {
        IndexHandle { account, location, state: AtomicU8::new(IndexState::Unprovisioned.as_u8()) }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Core or collection name.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn state(&self) -> IndexState {
        IndexState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_provisioned(&self) -> bool {
        self.state() == IndexState::Provisioned
    }

    pub fn mark_provisioned(&self) {
        self.state.store(IndexState::Provisioned.as_u8(), Ordering::Release);
    }

    pub fn mark_unprovisioned(&self) {
        self.state.store(IndexState::Unprovisioned.as_u8(), Ordering::Release);
    }

    pub fn mark_deleted(&self) {
        self.state.store(IndexState::Deleted.as_u8(), Ordering::Release);
    }
}

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde_json::Value;

use crate::{backend::views::WithdrawalStatus, payments::error::PaymentError};

/// The backend views the portal keeps around between page loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryName {
    TransactionList,
    WalletOverview,
    MemberDetails,
    Withdrawals,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
    TransactionList { member_id: String, status: String },
    WalletOverview { member_id: String },
    MemberDetails { member_id: String },
    Withdrawals { member_id: String, status: WithdrawalStatus },
}

impl QueryKey {
    pub fn name(&self) -> QueryName {
        match self {
            Self::TransactionList { .. } => QueryName::TransactionList,
            Self::WalletOverview { .. } => QueryName::WalletOverview,
            Self::MemberDetails { .. } => QueryName::MemberDetails,
            Self::Withdrawals { .. } => QueryName::Withdrawals,
        }
    }

    pub fn member_id(&self) -> Option<&str> {
        match self {
            Self::TransactionList { member_id, .. }
            | Self::WalletOverview { member_id }
            | Self::MemberDetails { member_id }
            | Self::Withdrawals { member_id, .. } => Some(member_id),
        }
    }
}

/// Something happened on the backend that makes cached views stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementSignal {
    PaymentVerified { member_id: Option<String> },
    WebhookProcessed,
    RepaymentConfirmed { member_id: String },
    RepaymentReverted { member_id: String },
    WithdrawalRequested { member_id: String },
}

const SETTLEMENT_QUERIES: &[QueryName] = &[
    QueryName::TransactionList,
    QueryName::WalletOverview,
    QueryName::MemberDetails,
];

const WITHDRAWAL_QUERIES: &[QueryName] = &[
    QueryName::TransactionList,
    QueryName::WalletOverview,
    QueryName::MemberDetails,
    QueryName::Withdrawals,
];

impl SettlementSignal {
    pub fn queries(&self) -> &'static [QueryName] {
        match self {
            Self::WithdrawalRequested { .. } => WITHDRAWAL_QUERIES,
            _ => SETTLEMENT_QUERIES,
        }
    }

    pub fn member_id(&self) -> Option<&str> {
        match self {
            Self::PaymentVerified { member_id } => member_id.as_deref(),
            Self::WebhookProcessed => None,
            Self::RepaymentConfirmed { member_id }
            | Self::RepaymentReverted { member_id }
            | Self::WithdrawalRequested { member_id } => Some(member_id),
        }
    }
}

struct CachedView {
    value: Value,
    stored_at: Instant,
}

#[derive(Clone)]
pub struct ViewCache {
    entries: Arc<DashMap<QueryKey, CachedView>>,
    ttl: Duration,
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn is_fresh(&self, view: &CachedView) -> bool {
        view.stored_at.elapsed() < self.ttl
    }

    /// A stale entry is a miss and is dropped on the spot.
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        let fresh = self
            .entries
            .get(key)
            .and_then(|view| self.is_fresh(&view).then(|| view.value.clone()));
        if fresh.is_none() {
            self.entries.remove_if(key, |_, view| !self.is_fresh(view));
        }
        fresh
    }

    /// Stores a view and prunes every expired one.
    pub fn insert(&self, key: QueryKey, value: Value) {
        self.entries.retain(|_, view| self.is_fresh(view));
        self.entries.insert(
            key,
            CachedView {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Serves a fresh cached copy, or fetches and remembers it. Failures are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Value, PaymentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, PaymentError>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drops every view the signal makes stale. Member-scoped signals spare other members.
    pub fn invalidate(&self, signal: &SettlementSignal) {
        let queries = signal.queries();
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            if !queries.contains(&key.name()) {
                return true;
            }
            match (signal.member_id(), key.member_id()) {
                (Some(member), Some(owner)) => member != owner,
                _ => false,
            }
        });
        tracing::debug!(
            ?signal,
            removed = before.saturating_sub(self.entries.len()),
            "invalidated cached views"
        );
    }
}

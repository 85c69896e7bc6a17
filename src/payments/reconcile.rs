use std::{future::Future, sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use time::OffsetDateTime;

use super::{
    error::PaymentError,
    types::{PaymentRedirectParams, PaymentStatus, VerifyPaymentResponse},
};
use crate::{
    backend::BackendClient,
    cache::{SettlementSignal, ViewCache},
    components::Flash,
};

pub trait PaymentVerifier {
    fn verify(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<VerifyPaymentResponse, PaymentError>> + Send;
}

impl PaymentVerifier for BackendClient {
    fn verify(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<VerifyPaymentResponse, PaymentError>> + Send {
        self.verify_payment(order_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    Verified(VerifyPaymentResponse),
    VerificationFailed { order_id: String, reason: String },
    AlreadyProcessed { order_id: String },
}

impl ReconcileOutcome {
    pub fn flash(&self) -> Option<Flash> {
        match self {
            Self::Verified(reply) => match reply.payment_status {
                None | Some(PaymentStatus::Paid) => Some(Flash::success(if reply.message.is_empty() {
                    "Payment verified successfully!".to_string()
                } else {
                    reply.message.clone()
                })),
                Some(status) => Some(Flash::error(if reply.message.is_empty() {
                    format!("Payment was not completed ({status}).")
                } else {
                    reply.message.clone()
                })),
            },
            Self::VerificationFailed { reason, .. } => Some(Flash::error(reason.clone())),
            Self::AlreadyProcessed { .. } => None,
        }
    }
}

/// One pass over a return URL. Every pass that leaves `Idle` ends in `ParamsCleared`.
#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileState {
    Idle,
    ParamsDetected(PaymentRedirectParams),
    Verifying(PaymentRedirectParams),
    Verified {
        params: PaymentRedirectParams,
        reply: VerifyPaymentResponse,
    },
    VerificationFailed {
        params: PaymentRedirectParams,
        reason: String,
    },
    ParamsCleared(ReconcileOutcome),
}

impl ReconcileState {
    pub fn detect(query: &str) -> Self {
        match PaymentRedirectParams::from_query(query) {
            Some(params) => Self::ParamsDetected(params),
            None => Self::Idle,
        }
    }

    fn begin(self, ledger: &ProcessedRedirects) -> Self {
        match self {
            Self::ParamsDetected(params) if ledger.claim(&params.order_id) => Self::Verifying(params),
            Self::ParamsDetected(params) => {
                Self::ParamsCleared(ReconcileOutcome::AlreadyProcessed {
                    order_id: params.order_id,
                })
            }
            other => other,
        }
    }

    fn settle(self, result: Result<VerifyPaymentResponse, PaymentError>) -> Self {
        let params = match self {
            Self::Verifying(params) => params,
            other => return other,
        };
        match result {
            Ok(reply) if reply.success => Self::Verified { params, reply },
            Ok(reply) => Self::VerificationFailed {
                params,
                reason: PaymentError::VerificationFailed(if reply.message.is_empty() {
                    "payment could not be confirmed".to_string()
                } else {
                    reply.message
                })
                .user_message(),
            },
            Err(err) => Self::VerificationFailed {
                params,
                reason: match err {
                    PaymentError::Backend { .. } => err.user_message(),
                    other => PaymentError::VerificationFailed(other.user_message()).user_message(),
                },
            },
        }
    }

    fn clear(self) -> Self {
        match self {
            Self::Verified { reply, .. } => Self::ParamsCleared(ReconcileOutcome::Verified(reply)),
            Self::VerificationFailed { params, reason } => {
                Self::ParamsCleared(ReconcileOutcome::VerificationFailed {
                    order_id: params.order_id,
                    reason,
                })
            }
            other => other,
        }
    }
}

/// Order ids whose redirect has already been verified, shared by every request.
#[derive(Clone)]
pub struct ProcessedRedirects {
    seen: Arc<DashMap<String, OffsetDateTime>>,
    retention: Duration,
}

impl ProcessedRedirects {
    pub fn new(retention: Duration) -> Self {
        Self {
            seen: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// True exactly once per order id within the retention window.
    pub fn claim(&self, order_id: &str) -> bool {
        let now = OffsetDateTime::now_utc();
        self.seen.retain(|_, at| now - *at < self.retention);
        match self.seen.entry(order_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

#[derive(Clone)]
pub struct RedirectReconciler {
    processed: ProcessedRedirects,
}

impl RedirectReconciler {
    pub fn new(retention: Duration) -> Self {
        Self {
            processed: ProcessedRedirects::new(retention),
        }
    }

    /// Runs the return URL's query through detection, at most one verification, and cleanup.
    pub async fn reconcile<V: PaymentVerifier>(
        &self,
        query: &str,
        verifier: &V,
        cache: &ViewCache,
    ) -> ReconcileState {
        let mut state = ReconcileState::detect(query).begin(&self.processed);
        if let ReconcileState::Verifying(params) = &state {
            tracing::info!(
                order_id = %params.order_id,
                status = %params.payment_status,
                "verifying payment redirect"
            );
            let result = verifier.verify(&params.order_id).await;
            state = state.settle(result);
        }

        match &state {
            ReconcileState::Verified { params, reply } => {
                tracing::info!(
                    order_id = %params.order_id,
                    status = ?reply.payment_status,
                    "payment verified"
                );
                cache.invalidate(&SettlementSignal::PaymentVerified {
                    member_id: params.member_id.clone(),
                });
            }
            ReconcileState::VerificationFailed { params, reason } => tracing::warn!(
                order_id = %params.order_id,
                %reason,
                "payment verification failed, leaving settlement to the webhook"
            ),
            ReconcileState::ParamsCleared(ReconcileOutcome::AlreadyProcessed { order_id }) => {
                tracing::debug!(%order_id, "payment redirect already processed")
            }
            _ => {}
        }

        state.clear()
    }
}

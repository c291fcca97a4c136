//! Step-Up Transaction Flow
//!
//! Drives any money-movement submission (outbound transfer, Pix collection
//! confirmation) as a two-phase exchange: submit the order, and when the
//! server answers with a step-up challenge, resubmit the **frozen** order with
//! the second factor. The idempotency key is generated once per logical
//! operation and replayed byte-for-byte, so a pre-challenge attempt that
//! partially committed can never execute twice.
//!
//! ```text
//! FORM ──submit──▶ MFA ──code──▶ SUCCESS ──(display delay)──▶ dismissed
//!   ▲               │
//!   └────cancel─────┘   (cancel discards the operation AND its key)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::gateway::{ApiFailure, LedgerGateway, TransferOrder};
use crate::idempotency::KeySource;
use crate::session::SessionStore;
use crate::timer::DelayedTransition;

/// How long the success confirmation stays visible before auto-dismissal.
pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(2);

/// Description applied when the user leaves the field blank.
pub const DEFAULT_DESCRIPTION: &str = "Transferência App";

/// Description stamped on Pix collection credits.
pub const PIX_DESCRIPTION: &str = "Pix recebido";

/// Money-movement modal states. `Success` is terminal for the operation;
/// failures return to the current state without losing entered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    Form,
    Mfa,
    Success,
}

impl TransferStep {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStep::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStep::Form => "FORM",
            TransferStep::Mfa => "MFA",
            TransferStep::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the user asked for, before the operation (and its key) exists.
#[derive(Debug, Clone)]
pub enum TransferDraft {
    /// Outbound payout. Origin defaults to the authenticated identity's
    /// account; the amount is checked against the known available balance.
    Payout {
        amount: Decimal,
        to_account: u64,
        description: Option<String>,
    },
    /// Pix collection confirmation: credit to the own account from the
    /// payer's account. No balance precondition; the payer's ledger decides.
    PixCollection { amount: Decimal, payer_account: u64 },
}

/// Two-phase money-movement state machine.
///
/// One instance per open modal. `&mut self` on the submit methods keeps
/// submissions serialized; the UI disables the button while one is
/// outstanding.
pub struct TransferFlow<G: LedgerGateway> {
    gateway: Arc<G>,
    session: Arc<SessionStore>,
    keys: Arc<dyn KeySource>,
    available_balance: Decimal,
    step: TransferStep,
    /// The exact order to replay on the step-up resubmission, captured at the
    /// moment the challenge arrived. Same fields, same idempotency key.
    frozen: Option<TransferOrder>,
    error: Option<String>,
    on_dismiss: Option<Arc<dyn Fn() + Send + Sync>>,
    dismiss: Option<DelayedTransition>,
}

impl<G: LedgerGateway> TransferFlow<G> {
    pub fn new(
        gateway: Arc<G>,
        session: Arc<SessionStore>,
        keys: Arc<dyn KeySource>,
        available_balance: Decimal,
    ) -> Self {
        Self {
            gateway,
            session,
            keys,
            available_balance,
            step: TransferStep::Form,
            frozen: None,
            error: None,
            on_dismiss: None,
            dismiss: None,
        }
    }

    /// Callback fired once, [`SUCCESS_DISPLAY`] after a successful submission
    /// (the UI refresh + modal close). Cancelled deterministically by
    /// [`close`](Self::close) or teardown.
    pub fn on_dismiss(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_dismiss = Some(Arc::new(f));
        self
    }

    /// Balance shown on the form; refreshed by the dashboard between
    /// operations.
    pub fn set_available_balance(&mut self, balance: Decimal) {
        self.available_balance = balance;
    }

    pub fn step(&self) -> TransferStep {
        self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The frozen order awaiting its second factor, if any. The MFA screen
    /// renders amount and destination from here, never from the form.
    pub fn frozen_order(&self) -> Option<&TransferOrder> {
        self.frozen.as_ref()
    }

    /// Phase INITIAL: validate locally, create the operation with its single
    /// idempotency key, and post it.
    pub async fn submit(&mut self, draft: TransferDraft) -> TransferStep {
        if self.step != TransferStep::Form {
            debug!(step = %self.step, "form submit ignored outside FORM");
            return self.step;
        }

        let order = match self.build_order(draft) {
            Ok(order) => order,
            Err(message) => {
                // Local precondition violation: no network call, no key burned.
                self.error = Some(message);
                return self.step;
            }
        };

        self.send(order, None).await
    }

    /// Phase STEP_UP: resubmit the frozen order unchanged plus the code.
    pub async fn submit_code(&mut self, otp: &str) -> TransferStep {
        let Some(order) = self.frozen.clone() else {
            debug!(step = %self.step, "code submit ignored without a frozen operation");
            return self.step;
        };
        self.send(order, Some(otp)).await
    }

    /// Back from MFA to the form. The operation is discarded, key included:
    /// a resumed attempt is a new logical operation and gets a new key.
    pub fn back_to_form(&mut self) {
        self.frozen = None;
        self.error = None;
        self.step = TransferStep::Form;
    }

    /// Close/cancel from any state: discard the in-flight operation, clear
    /// transient state and cancel a pending dismissal.
    pub fn close(&mut self) {
        self.dismiss = None; // drop aborts the scheduled dismissal
        self.frozen = None;
        self.error = None;
        self.step = TransferStep::Form;
    }

    /// Client-side preconditions (no server round-trip on violation).
    fn build_order(&self, draft: TransferDraft) -> Result<TransferOrder, String> {
        let identity = self
            .session
            .identity()
            .ok_or_else(|| "Session expired. Log in again.".to_string())?;

        let (amount, from, to, description) = match draft {
            TransferDraft::Payout {
                amount,
                to_account,
                description,
            } => {
                if amount > self.available_balance {
                    return Err("Amount exceeds the available balance.".to_string());
                }
                let description = description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
                (amount, identity.id, to_account, description)
            }
            TransferDraft::PixCollection {
                amount,
                payer_account,
            } => (amount, payer_account, identity.id, PIX_DESCRIPTION.to_string()),
        };

        if amount <= Decimal::ZERO {
            return Err("Amount must be greater than zero.".to_string());
        }
        if to == 0 || from == 0 {
            return Err("Destination account is required.".to_string());
        }

        // The single key of this logical operation. Never regenerated, even
        // across the step-up resubmission.
        Ok(TransferOrder {
            amount,
            to_account_id: to,
            from_account_id: from,
            description,
            idempotency_key: self.keys.new_key(),
        })
    }

    async fn send(&mut self, order: TransferOrder, otp: Option<&str>) -> TransferStep {
        match self.gateway.submit_transfer(&order, otp).await {
            Ok(receipt) => {
                info!(
                    key = %order.idempotency_key,
                    transfer_id = ?receipt.id,
                    "transfer accepted"
                );
                self.frozen = None;
                self.error = None;
                self.step = TransferStep::Success;
                if let Some(callback) = self.on_dismiss.clone() {
                    self.dismiss = Some(DelayedTransition::schedule(SUCCESS_DISPLAY, move || {
                        callback()
                    }));
                }
            }
            Err(ApiFailure::StepUpRequired) => {
                // Freeze the exact payload to replay: same fields, same key.
                // Regenerating the key here would allow two server-side
                // executions if the pre-challenge attempt partially committed.
                debug!(key = %order.idempotency_key, "step-up challenge issued, order frozen");
                self.frozen = Some(order);
                self.error = None;
                self.step = TransferStep::Mfa;
            }
            Err(failure) => {
                debug!(code = failure.code(), step = %self.step, "transfer attempt failed");
                self.error = Some(failure.to_string());
                if self.step == TransferStep::Form {
                    // Operation discarded; the next submit creates a fresh key.
                    self.frozen = None;
                }
                // In MFA the frozen order (and key) survive for another try.
            }
        }
        self.step
    }
}

#[cfg(all(test, feature = "mock-gateway"))]
mod tests {
    use super::*;
    use crate::gateway::TransferReceipt;
    use crate::gateway::mock::MockGateway;
    use crate::idempotency::OsRandomKeys;
    use crate::session::Identity;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn harness(balance: Decimal) -> (Arc<MockGateway>, TransferFlow<MockGateway>) {
        let gateway = Arc::new(MockGateway::new());
        let session = Arc::new(SessionStore::in_memory());
        session.login("acc".to_string(), "ref".to_string());
        session.set_identity(Identity {
            id: 7,
            name: "Ana Souza".to_string(),
            email: None,
            cpf_masked: "***.123.456-**".to_string(),
            mfa_enabled: true,
        });
        let flow = TransferFlow::new(gateway.clone(), session, Arc::new(OsRandomKeys), balance);
        (gateway, flow)
    }

    fn payout(amount: Decimal) -> TransferDraft {
        TransferDraft::Payout {
            amount,
            to_account: 2,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_amount_over_balance_rejected_locally() {
        let (gateway, mut flow) = harness(Decimal::from(100));

        let step = flow.submit(payout(Decimal::from(500))).await;
        assert_eq!(step, TransferStep::Form);
        assert_eq!(flow.error(), Some("Amount exceeds the available balance."));
        assert_eq!(gateway.transfer_count(), 0, "must not reach the network");
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected_locally() {
        let (gateway, mut flow) = harness(Decimal::from(100));

        flow.submit(payout(Decimal::ZERO)).await;
        assert_eq!(flow.error(), Some("Amount must be greater than zero."));

        flow.submit(payout(Decimal::from(-5))).await;
        assert_eq!(flow.error(), Some("Amount must be greater than zero."));
        assert_eq!(gateway.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_destination_rejected_locally() {
        let (gateway, mut flow) = harness(Decimal::from(100));

        let step = flow
            .submit(TransferDraft::Payout {
                amount: Decimal::from(10),
                to_account: 0,
                description: None,
            })
            .await;
        assert_eq!(step, TransferStep::Form);
        assert_eq!(flow.error(), Some("Destination account is required."));
        assert_eq!(gateway.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_identity_rejected_locally() {
        let gateway = Arc::new(MockGateway::new());
        let session = Arc::new(SessionStore::in_memory());
        let mut flow = TransferFlow::new(
            gateway.clone(),
            session,
            Arc::new(OsRandomKeys),
            Decimal::from(100),
        );

        let step = flow.submit(payout(Decimal::from(10))).await;
        assert_eq!(step, TransferStep::Form);
        assert_eq!(flow.error(), Some("Session expired. Log in again."));
        assert_eq!(gateway.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_payout_defaults_origin_and_description() {
        let (gateway, mut flow) = harness(Decimal::from(100));
        gateway.push_transfer(Ok(TransferReceipt::default()));

        flow.submit(payout(Decimal::from(50))).await;
        let sent = gateway.transfers();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].order.from_account_id, 7);
        assert_eq!(sent[0].order.to_account_id, 2);
        assert_eq!(sent[0].order.description, DEFAULT_DESCRIPTION);
        assert_eq!(sent[0].otp, None);
    }

    #[tokio::test]
    async fn test_pix_collection_credits_own_account() {
        let (gateway, mut flow) = harness(Decimal::ZERO);
        gateway.push_transfer(Ok(TransferReceipt::default()));

        // Zero balance is fine: the payer's ledger is debited, not ours
        let step = flow
            .submit(TransferDraft::PixCollection {
                amount: Decimal::from(80),
                payer_account: 1,
            })
            .await;
        assert_eq!(step, TransferStep::Success);
        let sent = gateway.transfers();
        assert_eq!(sent[0].order.from_account_id, 1);
        assert_eq!(sent[0].order.to_account_id, 7);
        assert_eq!(sent[0].order.description, PIX_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_form_failure_discards_operation() {
        let (gateway, mut flow) = harness(Decimal::from(100));
        gateway.push_transfer(Err(ApiFailure::Unknown {
            raw: "Insufficient balance".to_string(),
        }));
        gateway.push_transfer(Ok(TransferReceipt::default()));

        flow.submit(payout(Decimal::from(50))).await;
        assert_eq!(flow.step(), TransferStep::Form);
        assert_eq!(flow.error(), Some("Insufficient balance"));
        assert!(flow.frozen_order().is_none());

        // A new submit is a new logical operation with a fresh key
        flow.submit(payout(Decimal::from(50))).await;
        let sent = gateway.transfers();
        assert_eq!(sent.len(), 2);
        assert_ne!(
            sent[0].order.idempotency_key, sent[1].order.idempotency_key,
            "discarded operation must not leak its key into the next attempt"
        );
    }

    #[tokio::test]
    async fn test_unreachable_keeps_state_and_fields() {
        let (gateway, mut flow) = harness(Decimal::from(100));
        gateway.push_transfer(Err(ApiFailure::Unreachable));

        let step = flow.submit(payout(Decimal::from(50))).await;
        assert_eq!(step, TransferStep::Form);
        assert_eq!(flow.error(), Some("cannot reach the server"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_schedules_dismissal() {
        let dismissed = Arc::new(AtomicBool::new(false));
        let dismissed_clone = dismissed.clone();

        let (gateway, flow) = harness(Decimal::from(100));
        let mut flow = flow.on_dismiss(move || {
            dismissed_clone.store(true, Ordering::SeqCst);
        });
        gateway.push_transfer(Ok(TransferReceipt::default()));

        let step = flow.submit(payout(Decimal::from(50))).await;
        assert_eq!(step, TransferStep::Success);
        assert!(!dismissed.load(Ordering::SeqCst));

        tokio::time::sleep(SUCCESS_DISPLAY + Duration::from_millis(100)).await;
        assert!(dismissed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_dismissal() {
        let dismissed = Arc::new(AtomicBool::new(false));
        let dismissed_clone = dismissed.clone();

        let (gateway, flow) = harness(Decimal::from(100));
        let mut flow = flow.on_dismiss(move || {
            dismissed_clone.store(true, Ordering::SeqCst);
        });
        gateway.push_transfer(Ok(TransferReceipt::default()));

        flow.submit(payout(Decimal::from(50))).await;
        flow.close();
        assert_eq!(flow.step(), TransferStep::Form);

        tokio::time::sleep(SUCCESS_DISPLAY + Duration::from_secs(1)).await;
        assert!(
            !dismissed.load(Ordering::SeqCst),
            "dismissal must not fire after close"
        );
    }
}

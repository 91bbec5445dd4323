//! Event handlers that turn wallet events into report entries.

mod wallet_events;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reporting_core::{
    AppError,
    messaging::{
        BonusReceivedEvent, P2PTransferEvent, PartnersPaymentProcessedEvent,
        PartnersPaymentTokensReservedEvent, PaymentTransferProcessedEvent,
        PaymentTransferTokensReservedEvent, ReferralStakeBurntEvent, ReferralStakeReleasedEvent,
        ReferralStakeReservedEvent, RefundPartnersPaymentEvent, RefundPaymentTransferEvent,
        TransferToExternalProcessedEvent, TransferToInternalCompletedEvent, VoucherTokensReservedEvent,
        VoucherTokensUsedEvent,
    },
};
use tracing::{debug, instrument};

use crate::repository::{ReportEntry, ReportRepository};
use crate::subscriber::EventHandler;

/// An event that maps onto a single report entry.
pub trait ReportEvent: Send + Sync + 'static {
    fn into_report_entry(self) -> ReportEntry;
}

/// Stores every event of type `T` as a report entry.
pub struct ReportHandler<T> {
    repository: Arc<dyn ReportRepository>,
    _event: PhantomData<fn(T)>,
}

impl<T> ReportHandler<T> {
    pub fn new(repository: Arc<dyn ReportRepository>) -> Self {
        Self {
            repository,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<T: ReportEvent> EventHandler<T> for ReportHandler<T> {
    #[instrument(skip_all, fields(event = std::any::type_name::<T>()))]
    async fn handle(&self, event: T) -> Result<(), AppError> {
        let entry = event.into_report_entry();
        debug!(key = %entry.key(), status = ?entry.status, "Recording report entry");

        self.repository
            .upsert(entry)
            .await
            .map_err(|e| AppError::Handler(e.to_string()))
    }
}

/// One long-lived handler per subscribed event type.
pub struct HandlerSet {
    pub p2p_transfer: Arc<dyn EventHandler<P2PTransferEvent>>,
    pub bonus_received: Arc<dyn EventHandler<BonusReceivedEvent>>,
    pub partners_payment_tokens_reserved: Arc<dyn EventHandler<PartnersPaymentTokensReservedEvent>>,
    pub partners_payment_processed: Arc<dyn EventHandler<PartnersPaymentProcessedEvent>>,
    pub payment_transfer_tokens_reserved: Arc<dyn EventHandler<PaymentTransferTokensReservedEvent>>,
    pub payment_transfer_processed: Arc<dyn EventHandler<PaymentTransferProcessedEvent>>,
    pub refund_partners_payment: Arc<dyn EventHandler<RefundPartnersPaymentEvent>>,
    pub refund_payment_transfer: Arc<dyn EventHandler<RefundPaymentTransferEvent>>,
    pub referral_stake_released: Arc<dyn EventHandler<ReferralStakeReleasedEvent>>,
    pub referral_stake_reserved: Arc<dyn EventHandler<ReferralStakeReservedEvent>>,
    pub referral_stake_burnt: Arc<dyn EventHandler<ReferralStakeBurntEvent>>,
    pub voucher_tokens_reserved: Arc<dyn EventHandler<VoucherTokensReservedEvent>>,
    pub voucher_tokens_used: Arc<dyn EventHandler<VoucherTokensUsedEvent>>,
    pub transfer_to_external_processed: Arc<dyn EventHandler<TransferToExternalProcessedEvent>>,
    pub transfer_to_internal_completed: Arc<dyn EventHandler<TransferToInternalCompletedEvent>>,
}

impl HandlerSet {
    /// Report handlers sharing one repository.
    pub fn reporting(repository: &Arc<dyn ReportRepository>) -> Self {
        Self {
            p2p_transfer: report_handler(repository),
            bonus_received: report_handler(repository),
            partners_payment_tokens_reserved: report_handler(repository),
            partners_payment_processed: report_handler(repository),
            payment_transfer_tokens_reserved: report_handler(repository),
            payment_transfer_processed: report_handler(repository),
            refund_partners_payment: report_handler(repository),
            refund_payment_transfer: report_handler(repository),
            referral_stake_released: report_handler(repository),
            referral_stake_reserved: report_handler(repository),
            referral_stake_burnt: report_handler(repository),
            voucher_tokens_reserved: report_handler(repository),
            voucher_tokens_used: report_handler(repository),
            transfer_to_external_processed: report_handler(repository),
            transfer_to_internal_completed: report_handler(repository),
        }
    }
}

fn report_handler<T: ReportEvent>(
    repository: &Arc<dyn ReportRepository>,
) -> Arc<dyn EventHandler<T>> {
    Arc::new(ReportHandler::new(Arc::clone(repository)))
}

use chrono::{DateTime, Utc};
use reporting_core::messaging::{
    BonusReceivedEvent, P2PTransferEvent, PartnersPaymentProcessedEvent,
    PartnersPaymentTokensReservedEvent, PaymentTransferProcessedEvent,
    PaymentTransferTokensReservedEvent, ReferralStakeBurntEvent, ReferralStakeReleasedEvent,
    ReferralStakeReservedEvent, RefundPartnersPaymentEvent, RefundPaymentTransferEvent,
    TransferToExternalProcessedEvent, TransferToInternalCompletedEvent, VoucherTokensReservedEvent,
    VoucherTokensUsedEvent,
};
use rust_decimal::Decimal;

use super::ReportEvent;
use crate::repository::{ReportEntry, ReportKind, ReportStatus};

fn entry(
    id: String,
    kind: ReportKind,
    status: ReportStatus,
    customer_id: String,
    amount: Decimal,
    timestamp: DateTime<Utc>,
) -> ReportEntry {
    ReportEntry {
        id,
        kind,
        status,
        customer_id,
        counterparty_id: None,
        partner_id: None,
        amount,
        timestamp,
    }
}

impl ReportEvent for P2PTransferEvent {
    fn into_report_entry(self) -> ReportEntry {
        ReportEntry {
            counterparty_id: Some(self.receiver_customer_id),
            ..entry(
                self.transaction_id,
                ReportKind::P2PTransfer,
                ReportStatus::Completed,
                self.sender_customer_id,
                self.amount,
                self.timestamp,
            )
        }
    }
}

impl ReportEvent for BonusReceivedEvent {
    fn into_report_entry(self) -> ReportEntry {
        ReportEntry {
            partner_id: self.partner_id,
            ..entry(
                self.transfer_id,
                ReportKind::Bonus,
                ReportStatus::Completed,
                self.customer_id,
                self.amount,
                self.timestamp,
            )
        }
    }
}

fn partner_payment(
    payment_request_id: String,
    status: ReportStatus,
    customer_id: String,
    partner_id: String,
    amount: Decimal,
    timestamp: DateTime<Utc>,
) -> ReportEntry {
    ReportEntry {
        partner_id: Some(partner_id),
        ..entry(
            payment_request_id,
            ReportKind::PartnerPayment,
            status,
            customer_id,
            amount,
            timestamp,
        )
    }
}

impl ReportEvent for PartnersPaymentTokensReservedEvent {
    fn into_report_entry(self) -> ReportEntry {
        partner_payment(
            self.payment_request_id,
            ReportStatus::Reserved,
            self.customer_id,
            self.partner_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for PartnersPaymentProcessedEvent {
    fn into_report_entry(self) -> ReportEntry {
        partner_payment(
            self.payment_request_id,
            ReportStatus::Processed,
            self.customer_id,
            self.partner_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for RefundPartnersPaymentEvent {
    fn into_report_entry(self) -> ReportEntry {
        partner_payment(
            self.payment_request_id,
            ReportStatus::Refunded,
            self.customer_id,
            self.partner_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for PaymentTransferTokensReservedEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.transfer_id,
            ReportKind::PaymentTransfer,
            ReportStatus::Reserved,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for PaymentTransferProcessedEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.transfer_id,
            ReportKind::PaymentTransfer,
            ReportStatus::Processed,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for RefundPaymentTransferEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.transfer_id,
            ReportKind::PaymentTransfer,
            ReportStatus::Refunded,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for ReferralStakeReservedEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.referral_id,
            ReportKind::ReferralStake,
            ReportStatus::Reserved,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for ReferralStakeReleasedEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.referral_id,
            ReportKind::ReferralStake,
            ReportStatus::Released,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for ReferralStakeBurntEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.referral_id,
            ReportKind::ReferralStake,
            ReportStatus::Burnt,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for VoucherTokensReservedEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.transfer_id,
            ReportKind::Voucher,
            ReportStatus::Reserved,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for VoucherTokensUsedEvent {
    fn into_report_entry(self) -> ReportEntry {
        entry(
            self.transfer_id,
            ReportKind::Voucher,
            ReportStatus::Used,
            self.customer_id,
            self.amount,
            self.timestamp,
        )
    }
}

impl ReportEvent for TransferToExternalProcessedEvent {
    fn into_report_entry(self) -> ReportEntry {
        ReportEntry {
            counterparty_id: Some(self.public_address),
            ..entry(
                self.operation_id,
                ReportKind::ExternalTransfer,
                ReportStatus::Processed,
                self.customer_id,
                self.amount,
                self.timestamp,
            )
        }
    }
}

impl ReportEvent for TransferToInternalCompletedEvent {
    fn into_report_entry(self) -> ReportEntry {
        ReportEntry {
            counterparty_id: Some(self.public_address),
            ..entry(
                self.public_transfer_id,
                ReportKind::InternalTransfer,
                ReportStatus::Completed,
                self.customer_id,
                self.amount,
                self.timestamp,
            )
        }
    }
}

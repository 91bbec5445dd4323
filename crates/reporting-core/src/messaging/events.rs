//! Payloads published on the `lykke.wallet.*` exchanges.
//!
//! Producers serialize property names in `PascalCase`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Peer-to-peer token transfer between two customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct P2PTransferEvent {
    pub transaction_id: String,
    pub sender_customer_id: String,
    pub receiver_customer_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BonusReceivedEvent {
    pub transfer_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub partner_id: Option<String>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartnersPaymentTokensReservedEvent {
    pub payment_request_id: String,
    pub customer_id: String,
    pub partner_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartnersPaymentProcessedEvent {
    pub payment_request_id: String,
    pub customer_id: String,
    pub partner_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefundPartnersPaymentEvent {
    pub payment_request_id: String,
    pub customer_id: String,
    pub partner_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Tokens reserved for a real-estate payment transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentTransferTokensReservedEvent {
    pub transfer_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentTransferProcessedEvent {
    pub transfer_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefundPaymentTransferEvent {
    pub transfer_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferralStakeReservedEvent {
    pub referral_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferralStakeReleasedEvent {
    pub referral_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferralStakeBurntEvent {
    pub referral_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoucherTokensReservedEvent {
    pub transfer_id: String,
    pub customer_id: String,
    pub spend_rule_id: String,
    pub voucher_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoucherTokensUsedEvent {
    pub transfer_id: String,
    pub customer_id: String,
    pub spend_rule_id: String,
    pub voucher_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Tokens moved from the private chain to a customer's public wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferToExternalProcessedEvent {
    pub operation_id: String,
    pub customer_id: String,
    pub private_address: String,
    pub public_address: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Tokens moved from a public wallet back to the private chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferToInternalCompletedEvent {
    pub public_transfer_id: String,
    pub customer_id: String,
    pub private_address: String,
    pub public_address: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decodes_pascal_case_payload() {
        let payload = br#"{
            "TransferId": "tr-1",
            "CustomerId": "c-1",
            "CampaignId": "camp-1",
            "Amount": "12.5",
            "Timestamp": "2024-03-01T10:00:00Z"
        }"#;

        let event: BonusReceivedEvent = serde_json::from_slice(payload).unwrap();
        assert_eq!(event.transfer_id, "tr-1");
        assert_eq!(event.amount, Decimal::from_str("12.5").unwrap());
        assert_eq!(event.condition_id, None);
        assert_eq!(event.partner_id, None);
    }

    #[test]
    fn rejects_payload_missing_required_fields() {
        let payload = br#"{"CustomerId": "c-1", "Amount": "1"}"#;
        assert!(serde_json::from_slice::<P2PTransferEvent>(payload).is_err());
    }
}

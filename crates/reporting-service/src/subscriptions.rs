//! Exchange bindings of the reporting service.
//!
//! Bindings are fixed at compile time. The feature flag only decides whether
//! the public blockchain bindings are part of the active set.

/// Logical queue name shared by every binding.
pub const DEFAULT_QUEUE_NAME: &str = "reporting";

/// Event types the service subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    P2PTransfer,
    BonusReceived,
    PartnersPaymentTokensReserved,
    PartnersPaymentProcessed,
    PaymentTransferTokensReserved,
    PaymentTransferProcessed,
    RefundPartnersPayment,
    RefundPaymentTransfer,
    ReferralStakeReleased,
    ReferralStakeReserved,
    ReferralStakeBurnt,
    VoucherTokensReserved,
    VoucherTokensUsed,
    TransferToExternalProcessed,
    TransferToInternalCompleted,
}

/// Association of one exchange/queue pair to the event type decoded from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBinding {
    pub event: EventKind,
    pub exchange: &'static str,
    pub queue: &'static str,
}

impl EventBinding {
    const fn new(event: EventKind, exchange: &'static str) -> Self {
        Self {
            event,
            exchange,
            queue: DEFAULT_QUEUE_NAME,
        }
    }
}

/// Always active.
pub const CORE_BINDINGS: [EventBinding; 13] = [
    EventBinding::new(EventKind::P2PTransfer, "lykke.wallet.transfer"),
    EventBinding::new(EventKind::BonusReceived, "lykke.wallet.bonusreceived"),
    EventBinding::new(
        EventKind::PartnersPaymentTokensReserved,
        "lykke.wallet.partnerspaymenttokensreserved",
    ),
    EventBinding::new(
        EventKind::PartnersPaymentProcessed,
        "lykke.wallet.partnerspaymentprocessed",
    ),
    EventBinding::new(
        EventKind::PaymentTransferTokensReserved,
        "lykke.wallet.transfertokensreserved",
    ),
    EventBinding::new(
        EventKind::PaymentTransferProcessed,
        "lykke.wallet.transferprocessed",
    ),
    EventBinding::new(
        EventKind::RefundPartnersPayment,
        "lykke.wallet.refundpartnerspayment",
    ),
    EventBinding::new(
        EventKind::RefundPaymentTransfer,
        "lykke.wallet.refundpaymenttransfer",
    ),
    EventBinding::new(
        EventKind::ReferralStakeReleased,
        "lykke.wallet.referralstakereleased",
    ),
    EventBinding::new(
        EventKind::ReferralStakeReserved,
        "lykke.wallet.referralstakereserved",
    ),
    EventBinding::new(EventKind::ReferralStakeBurnt, "lykke.wallet.referralstakeburnt"),
    EventBinding::new(
        EventKind::VoucherTokensReserved,
        "lykke.wallet.vouchertokensreserved",
    ),
    EventBinding::new(EventKind::VoucherTokensUsed, "lykke.wallet.vouchertokensused"),
];

/// Active only while the public blockchain feature is enabled.
pub const PUBLIC_BLOCKCHAIN_BINDINGS: [EventBinding; 2] = [
    EventBinding::new(
        EventKind::TransferToExternalProcessed,
        "lykke.wallet.transfertoexternalprocessed",
    ),
    EventBinding::new(
        EventKind::TransferToInternalCompleted,
        "lykke.wallet.transfertointernalcompleted",
    ),
];

/// Feature flags read once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub public_blockchain_disabled: bool,
}

impl FeatureFlags {
    /// An unset flag leaves the feature enabled.
    #[must_use]
    pub fn from_setting(public_blockchain_disabled: Option<bool>) -> Self {
        Self {
            public_blockchain_disabled: public_blockchain_disabled.unwrap_or(false),
        }
    }
}

/// Returns the bindings to activate, core bindings first.
#[must_use]
pub fn active_bindings(flags: FeatureFlags) -> Vec<EventBinding> {
    let mut bindings = CORE_BINDINGS.to_vec();
    if !flags.public_blockchain_disabled {
        bindings.extend_from_slice(&PUBLIC_BLOCKCHAIN_BINDINGS);
    }
    bindings
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const ALL_KINDS: [EventKind; 15] = [
        EventKind::P2PTransfer,
        EventKind::BonusReceived,
        EventKind::PartnersPaymentTokensReserved,
        EventKind::PartnersPaymentProcessed,
        EventKind::PaymentTransferTokensReserved,
        EventKind::PaymentTransferProcessed,
        EventKind::RefundPartnersPayment,
        EventKind::RefundPaymentTransfer,
        EventKind::ReferralStakeReleased,
        EventKind::ReferralStakeReserved,
        EventKind::ReferralStakeBurnt,
        EventKind::VoucherTokensReserved,
        EventKind::VoucherTokensUsed,
        EventKind::TransferToExternalProcessed,
        EventKind::TransferToInternalCompleted,
    ];

    const EXTERNAL: &str = "lykke.wallet.transfertoexternalprocessed";
    const INTERNAL: &str = "lykke.wallet.transfertointernalcompleted";

    fn exchanges(bindings: &[EventBinding]) -> Vec<&'static str> {
        bindings.iter().map(|b| b.exchange).collect()
    }

    #[test]
    fn disabled_feature_leaves_core_bindings_only() {
        let bindings = active_bindings(FeatureFlags::from_setting(Some(true)));

        assert_eq!(bindings.len(), 13);
        assert_eq!(bindings, CORE_BINDINGS.to_vec());
        let names = exchanges(&bindings);
        assert!(!names.contains(&EXTERNAL));
        assert!(!names.contains(&INTERNAL));
    }

    #[test]
    fn enabled_feature_adds_public_blockchain_bindings() {
        let bindings = active_bindings(FeatureFlags::from_setting(Some(false)));

        assert_eq!(bindings.len(), 15);
        let names = exchanges(&bindings);
        assert!(names.contains(&EXTERNAL));
        assert!(names.contains(&INTERNAL));
        assert_eq!(&bindings[..13], &CORE_BINDINGS[..]);
    }

    #[test]
    fn unset_flag_enables_feature() {
        let flags = FeatureFlags::from_setting(None);

        assert!(!flags.public_blockchain_disabled);
        assert_eq!(active_bindings(flags).len(), 15);
    }

    #[test]
    fn exchange_names_are_unique() {
        let bindings = active_bindings(FeatureFlags::default());
        let unique: HashSet<_> = bindings.iter().map(|b| b.exchange).collect();

        assert_eq!(unique.len(), bindings.len());
    }

    #[test]
    fn every_event_kind_is_bound_exactly_once() {
        let bindings = active_bindings(FeatureFlags::default());

        for kind in ALL_KINDS {
            let count = bindings.iter().filter(|b| b.event == kind).count();
            assert_eq!(count, 1, "{kind:?} bound {count} times");
        }
        assert_eq!(bindings.len(), ALL_KINDS.len());
    }

    #[test]
    fn every_binding_uses_shared_queue_and_dotted_exchange() {
        for binding in active_bindings(FeatureFlags::default()) {
            assert_eq!(binding.queue, DEFAULT_QUEUE_NAME);
            assert!(binding.exchange.starts_with("lykke.wallet."));
            assert!(
                binding
                    .exchange
                    .chars()
                    .all(|c| c == '.' || c.is_ascii_lowercase())
            );
        }
    }
}

//! Wallet event contracts consumed by the reporting service.

mod events;

pub use events::*;

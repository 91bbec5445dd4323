use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{Client, Script, aio::MultiplexedConnection};
use reporting_core::AppError;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::ReportRepository;

const KEY_PREFIX_ENTRY: &str = "report:entry:";
const KEY_INDEX: &str = "report:index";

// Returns the previously indexed score. Must apply the same ordering as
// `supersedes`.
const CONDITIONAL_UPSERT: &str = r"
    local stored = redis.call('ZSCORE', KEYS[2], ARGV[1])
    if stored and tonumber(stored) > tonumber(ARGV[3]) then
        return stored
    end
    redis.call('SET', KEYS[1], ARGV[2])
    redis.call('ZADD', KEYS[2], ARGV[3], ARGV[1])
    return stored
";

/// Whether an entry stamped `incoming` may replace one indexed at `stored`.
///
/// Events for one operation arrive on different exchanges without ordering,
/// so the later timestamp wins and a tie goes to the last writer.
#[must_use]
fn supersedes(stored: Option<i64>, incoming: i64) -> bool {
    stored.is_none_or(|stored| incoming >= stored)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    #[serde(rename = "p2p_transfer")]
    P2PTransfer,
    Bonus,
    PartnerPayment,
    PaymentTransfer,
    ReferralStake,
    Voucher,
    ExternalTransfer,
    InternalTransfer,
}

impl ReportKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P2PTransfer => "p2p_transfer",
            Self::Bonus => "bonus",
            Self::PartnerPayment => "partner_payment",
            Self::PaymentTransfer => "payment_transfer",
            Self::ReferralStake => "referral_stake",
            Self::Voucher => "voucher",
            Self::ExternalTransfer => "external_transfer",
            Self::InternalTransfer => "internal_transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    Reserved,
    Processed,
    Refunded,
    Released,
    Burnt,
    Used,
}

/// One row of the transaction report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub id: String,
    pub kind: ReportKind,
    pub status: ReportStatus,
    pub customer_id: String,
    pub counterparty_id: Option<String>,
    pub partner_id: Option<String>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl ReportEntry {
    /// Entries of the same kind and id describe one operation.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}

pub struct RedisReportRepository {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    upsert_script: Script,
}

impl RedisReportRepository {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
            upsert_script: Script::new(CONDITIONAL_UPSERT),
        }
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection, AppError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl ReportRepository for RedisReportRepository {
    #[instrument(skip(self, entry), fields(key = %entry.key()))]
    async fn upsert(&self, entry: ReportEntry) -> Result<(), AppError> {
        let mut conn = self.get_conn().await?;

        let key = entry.key();
        let payload =
            serde_json::to_string(&entry).map_err(|e| AppError::Serialization(e.to_string()))?;

        let incoming = entry.timestamp.timestamp_millis();
        let stored: Option<i64> = self
            .upsert_script
            .key(format!("{KEY_PREFIX_ENTRY}{key}"))
            .key(KEY_INDEX)
            .arg(&key)
            .arg(payload)
            .arg(incoming)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        if !supersedes(stored, incoming) {
            debug!(status = ?entry.status, "Stored entry is newer, update skipped");
        }
        Ok(())
    }
}

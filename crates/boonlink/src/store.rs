//! Durable storage: orders, the offline broadcast queue, and the network
//! audit log, in one SQLite database.
//!
//! WAL journaling means a signed transaction enqueued before a power cut is
//! still there on restart. Storage is the single source of truth; anything
//! in memory is a derived view rebuilt from here (see
//! [`BridgeStore::active_orders`]).

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::BridgeError;
use crate::network::NetworkStatus;
use crate::order::{PaymentOrder, PaymentStatus, TransactionSignature};
use crate::quote::PaymentQuote;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    chat_id TEXT NOT NULL,
    status TEXT NOT NULL,
    quote_json TEXT NOT NULL,
    signature_json TEXT,
    tx_hash TEXT,
    settlement_id TEXT,
    error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    completed_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at);

CREATE TABLE IF NOT EXISTS queue (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES orders(id),
    signed_tx TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_retry INTEGER,
    next_retry INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_queue_next_retry ON queue(next_retry);

CREATE TABLE IF NOT EXISTS network_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    old_status TEXT NOT NULL,
    new_status TEXT NOT NULL,
    changed_at INTEGER NOT NULL
);
"#;

/// A signed transaction parked for broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineQueueItem {
    pub id: String,
    pub order_id: String,
    /// Raw signed transaction, 0x-prefixed hex.
    pub signed_tx_blob: String,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_retry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate queue health. `failed` counts failed orders, not queue rows:
/// failed items are dequeued, so the queue table can never answer that.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub failed: usize,
    #[serde(rename = "totalAmountTHB")]
    pub total_amount_thb: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_item: Option<DateTime<Utc>>,
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

/// The bridge database.
pub struct BridgeStore {
    conn: Mutex<Connection>,
}

impl BridgeStore {
    /// Open (or create) the database at the given path. `:memory:` works
    /// for throwaway instances.
    pub fn open(path: &str) -> Result<Self, BridgeError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, BridgeError> {
        self.conn.lock().map_err(|_| {
            BridgeError::Database(rusqlite::Error::InvalidParameterName(
                "lock poisoned".into(),
            ))
        })
    }

    // ── Orders ───────────────────────────────────────────────────────────

    pub fn insert_order(&self, order: &PaymentOrder) -> Result<(), BridgeError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO orders (id, user_id, chat_id, status, quote_json, signature_json, \
             tx_hash, settlement_id, error, created_at, updated_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                order.id,
                order.user_id,
                order.chat_id,
                order.status.as_str(),
                serde_json::to_string(&order.quote)?,
                order
                    .signature
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                order.tx_hash,
                order.settlement_id,
                order.error,
                millis(order.created_at),
                millis(order.updated_at),
                order.completed_at.map(millis),
            ],
        )?;
        Ok(())
    }

    /// Persist the mutable half of an order. Every state transition lands
    /// here, so `updated_at` is refreshed on each write.
    pub fn update_order(&self, order: &PaymentOrder) -> Result<(), BridgeError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE orders SET status = ?2, signature_json = ?3, tx_hash = ?4, \
             settlement_id = ?5, error = ?6, updated_at = ?7, completed_at = ?8 \
             WHERE id = ?1",
            params![
                order.id,
                order.status.as_str(),
                order
                    .signature
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                order.tx_hash,
                order.settlement_id,
                order.error,
                millis(order.updated_at),
                order.completed_at.map(millis),
            ],
        )?;
        if changed == 0 {
            return Err(BridgeError::OrderNotFound(order.id.clone()));
        }
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> Result<Option<PaymentOrder>, BridgeError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, user_id, chat_id, status, quote_json, signature_json, tx_hash, \
             settlement_id, error, created_at, updated_at, completed_at \
             FROM orders WHERE id = ?1",
            params![id],
            row_to_order,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Order history for one user, newest first.
    pub fn orders_by_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<PaymentOrder>, BridgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, chat_id, status, quote_json, signature_json, tx_hash, \
             settlement_id, error, created_at, updated_at, completed_at \
             FROM orders WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let orders = stmt
            .query_map(params![user_id, limit], row_to_order)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    pub fn orders_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<PaymentOrder>, BridgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, chat_id, status, quote_json, signature_json, tx_hash, \
             settlement_id, error, created_at, updated_at, completed_at \
             FROM orders WHERE status = ?1 ORDER BY created_at ASC",
        )?;
        let orders = stmt
            .query_map(params![status.as_str()], row_to_order)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    /// Orders still in flight: everything outside the terminal set. Used to
    /// rebuild in-memory views on start.
    pub fn active_orders(&self) -> Result<Vec<PaymentOrder>, BridgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, chat_id, status, quote_json, signature_json, tx_hash, \
             settlement_id, error, created_at, updated_at, completed_at \
             FROM orders \
             WHERE status NOT IN ('COMPLETED', 'EXPIRED', 'CANCELLED', 'FAILED', 'TIMEOUT') \
             ORDER BY created_at ASC",
        )?;
        let orders = stmt
            .query_map([], row_to_order)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    pub fn count_orders_with_status(&self, status: PaymentStatus) -> Result<usize, BridgeError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete completed orders older than the cutoff. Returns rows removed.
    pub fn delete_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, BridgeError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM orders WHERE status = 'COMPLETED' AND completed_at < ?1",
            params![millis(cutoff)],
        )?;
        Ok(removed)
    }

    // ── Queue ────────────────────────────────────────────────────────────

    pub fn enqueue(&self, item: &OfflineQueueItem) -> Result<(), BridgeError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queue (id, order_id, signed_tx, retry_count, last_retry, next_retry, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                item.id,
                item.order_id,
                item.signed_tx_blob,
                item.retry_count,
                item.last_retry.map(millis),
                item.next_retry.map(millis),
                millis(item.created_at),
            ],
        )?;
        Ok(())
    }

    /// Remove a queue row. The only terminal queue operation.
    pub fn dequeue(&self, id: &str) -> Result<bool, BridgeError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM queue WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn update_retry(
        &self,
        id: &str,
        retry_count: u32,
        last_retry: DateTime<Utc>,
        next_retry: DateTime<Utc>,
    ) -> Result<(), BridgeError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE queue SET retry_count = ?2, last_retry = ?3, next_retry = ?4 WHERE id = ?1",
            params![id, retry_count, millis(last_retry), millis(next_retry)],
        )?;
        Ok(())
    }

    /// Items due for a broadcast attempt, oldest enqueued first.
    pub fn ready_items(&self, now: DateTime<Utc>) -> Result<Vec<OfflineQueueItem>, BridgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, order_id, signed_tx, retry_count, last_retry, next_retry, created_at \
             FROM queue WHERE next_retry IS NULL OR next_retry <= ?1 \
             ORDER BY created_at ASC",
        )?;
        let items = stmt
            .query_map(params![millis(now)], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn all_items(&self) -> Result<Vec<OfflineQueueItem>, BridgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, order_id, signed_tx, retry_count, last_retry, next_retry, created_at \
             FROM queue ORDER BY created_at ASC",
        )?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn queue_stats(&self, now: DateTime<Utc>) -> Result<QueueStats, BridgeError> {
        let conn = self.lock()?;

        let pending: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue WHERE next_retry IS NULL OR next_retry <= ?1",
            params![millis(now)],
            |row| row.get(0),
        )?;
        let processing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue WHERE next_retry > ?1",
            params![millis(now)],
            |row| row.get(0),
        )?;
        let failed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE status = 'FAILED'",
            [],
            |row| row.get(0),
        )?;
        let oldest: Option<i64> = conn
            .query_row("SELECT MIN(created_at) FROM queue", [], |row| row.get(0))
            .optional()?
            .flatten();

        // Sum the THB leg of every queued order. The amount lives inside
        // quote_json, so the join is resolved in Rust.
        let mut stmt = conn.prepare(
            "SELECT o.quote_json FROM queue q JOIN orders o ON o.id = q.order_id",
        )?;
        let quotes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut total_amount_thb = Decimal::ZERO;
        for quote_json in quotes {
            let quote: PaymentQuote = serde_json::from_str(&quote_json)?;
            total_amount_thb += quote.amount_thb;
        }

        Ok(QueueStats {
            pending: pending as usize,
            processing: processing as usize,
            failed: failed as usize,
            total_amount_thb,
            oldest_item: oldest.map(from_millis),
        })
    }

    // ── Network audit log ────────────────────────────────────────────────

    pub fn log_network_change(
        &self,
        old: NetworkStatus,
        new: NetworkStatus,
    ) -> Result<(), BridgeError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO network_log (old_status, new_status, changed_at) VALUES (?1, ?2, ?3)",
            params![old.as_str(), new.as_str(), millis(Utc::now())],
        )?;
        Ok(())
    }

    pub fn recent_network_changes(
        &self,
        limit: u32,
    ) -> Result<Vec<(String, String, DateTime<Utc>)>, BridgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT old_status, new_status, changed_at FROM network_log \
             ORDER BY changed_at DESC LIMIT ?1",
        )?;
        let changes = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    from_millis(row.get::<_, i64>(2)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(changes)
    }
}

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentOrder> {
    let status_str: String = row.get(3)?;
    let quote_json: String = row.get(4)?;
    let signature_json: Option<String> = row.get(5)?;

    let status = PaymentStatus::parse(&status_str).map_err(|_| {
        rusqlite::Error::InvalidParameterName(format!("bad status {status_str}"))
    })?;
    let quote: PaymentQuote = serde_json::from_str(&quote_json)
        .map_err(|e| rusqlite::Error::InvalidParameterName(format!("bad quote json: {e}")))?;
    let signature: Option<TransactionSignature> = signature_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::InvalidParameterName(format!("bad signature json: {e}")))?;

    Ok(PaymentOrder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        chat_id: row.get(2)?,
        status,
        quote,
        signature,
        tx_hash: row.get(6)?,
        settlement_id: row.get(7)?,
        error: row.get(8)?,
        created_at: from_millis(row.get(9)?),
        updated_at: from_millis(row.get(10)?),
        completed_at: row.get::<_, Option<i64>>(11)?.map(from_millis),
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<OfflineQueueItem> {
    Ok(OfflineQueueItem {
        id: row.get(0)?,
        order_id: row.get(1)?,
        signed_tx_blob: row.get(2)?,
        retry_count: row.get(3)?,
        last_retry: row.get::<_, Option<i64>>(4)?.map(from_millis),
        next_retry: row.get::<_, Option<i64>>(5)?.map(from_millis),
        created_at: from_millis(row.get(6)?),
    })
}

/// Convenience used by the processor and the tools: cutoff for old-order
/// cleanup.
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promptpay;
    use crate::quote::build_quote;
    use crate::rates::{ExchangeRate, MockRateSource};
    use crate::token::Token;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_order(amount_thb: Decimal) -> PaymentOrder {
        let payload = promptpay::generate("0812345678", Some(amount_thb)).unwrap();
        let prompt_pay = promptpay::parse(&payload).unwrap();
        let now = Utc::now();
        let rate = ExchangeRate {
            token: Token::Usdt,
            fiat: "THB".to_string(),
            rate: MockRateSource::base_rate(Token::Usdt),
            source: "mock".to_string(),
            timestamp: now,
            valid_until: now + TimeDelta::seconds(300),
        };
        let quote = build_quote(amount_thb, Token::Usdt, rate, prompt_pay, dec!(10000)).unwrap();
        PaymentOrder::new(quote, "user-1", "chat-1")
    }

    fn item_for(order: &PaymentOrder) -> OfflineQueueItem {
        OfflineQueueItem {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            signed_tx_blob: "0xdeadbeef".to_string(),
            retry_count: 0,
            last_retry: None,
            next_retry: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_roundtrip() {
        let store = BridgeStore::open(":memory:").unwrap();
        let mut order = sample_order(dec!(150));
        store.insert_order(&order).unwrap();

        order.transition(PaymentStatus::Quoted).unwrap();
        order.tx_hash = Some("0xabc".to_string());
        store.update_order(&order).unwrap();

        let loaded = store.get_order(&order.id).unwrap().unwrap();
        assert_eq!(loaded.status, PaymentStatus::Quoted);
        assert_eq!(loaded.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(loaded.quote.amount_thb, dec!(150));
    }

    #[test]
    fn test_update_missing_order_errors() {
        let store = BridgeStore::open(":memory:").unwrap();
        let order = sample_order(dec!(10));
        assert!(matches!(
            store.update_order(&order),
            Err(BridgeError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_user_history_newest_first() {
        let store = BridgeStore::open(":memory:").unwrap();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut order = sample_order(dec!(10));
            order.created_at = Utc::now() + TimeDelta::milliseconds(i * 10);
            ids.push(order.id.clone());
            store.insert_order(&order).unwrap();
        }
        let history = store.orders_by_user("user-1", 10).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, ids[2]);
        assert_eq!(history[2].id, ids[0]);
    }

    #[test]
    fn test_ready_items_ordering_and_gating() {
        let store = BridgeStore::open(":memory:").unwrap();
        let now = Utc::now();

        let first = sample_order(dec!(10));
        let second = sample_order(dec!(20));
        let parked = sample_order(dec!(30));
        for order in [&first, &second, &parked] {
            store.insert_order(order).unwrap();
        }

        let mut item_a = item_for(&first);
        item_a.created_at = now - TimeDelta::seconds(30);
        let mut item_b = item_for(&second);
        item_b.created_at = now - TimeDelta::seconds(10);
        let mut item_c = item_for(&parked);
        item_c.next_retry = Some(now + TimeDelta::seconds(60));

        store.enqueue(&item_b).unwrap();
        store.enqueue(&item_a).unwrap();
        store.enqueue(&item_c).unwrap();

        let ready = store.ready_items(now).unwrap();
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].id, item_a.id, "oldest created_at drains first");
        assert_eq!(ready[1].id, item_b.id);
    }

    #[test]
    fn test_retry_bookkeeping() {
        let store = BridgeStore::open(":memory:").unwrap();
        let order = sample_order(dec!(10));
        store.insert_order(&order).unwrap();
        let item = item_for(&order);
        store.enqueue(&item).unwrap();

        let now = Utc::now();
        store
            .update_retry(&item.id, 2, now, now + TimeDelta::seconds(10))
            .unwrap();

        let all = store.all_items().unwrap();
        assert_eq!(all[0].retry_count, 2);
        assert!(all[0].next_retry.unwrap() >= all[0].last_retry.unwrap());

        assert!(store.dequeue(&item.id).unwrap());
        assert!(!store.dequeue(&item.id).unwrap());
    }

    #[test]
    fn test_stats() {
        let store = BridgeStore::open(":memory:").unwrap();
        let now = Utc::now();

        let ready_order = sample_order(dec!(100));
        let waiting_order = sample_order(dec!(250));
        store.insert_order(&ready_order).unwrap();
        store.insert_order(&waiting_order).unwrap();

        let mut failed_order = sample_order(dec!(10));
        failed_order.transition(PaymentStatus::Quoted).unwrap();
        failed_order.transition(PaymentStatus::Signed).unwrap();
        failed_order.transition(PaymentStatus::Failed).unwrap();
        store.insert_order(&failed_order).unwrap();

        store.enqueue(&item_for(&ready_order)).unwrap();
        let mut waiting = item_for(&waiting_order);
        waiting.next_retry = Some(now + TimeDelta::seconds(120));
        store.enqueue(&waiting).unwrap();

        let stats = store.queue_stats(now).unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_amount_thb, dec!(350));
        assert!(stats.oldest_item.is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.db");
        let path = path.to_str().unwrap();

        let order = sample_order(dec!(42));
        {
            let store = BridgeStore::open(path).unwrap();
            store.insert_order(&order).unwrap();
            store.enqueue(&item_for(&order)).unwrap();
        }

        // A signed item enqueued before a crash must survive it.
        let store = BridgeStore::open(path).unwrap();
        assert!(store.get_order(&order.id).unwrap().is_some());
        assert_eq!(store.all_items().unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_completed() {
        let store = BridgeStore::open(":memory:").unwrap();

        let mut old_order = sample_order(dec!(10));
        old_order.transition(PaymentStatus::Quoted).unwrap();
        old_order.transition(PaymentStatus::Signed).unwrap();
        old_order.transition(PaymentStatus::Pending).unwrap();
        old_order.transition(PaymentStatus::Settled).unwrap();
        old_order.transition(PaymentStatus::Completed).unwrap();
        old_order.completed_at = Some(Utc::now() - TimeDelta::days(60));
        store.insert_order(&old_order).unwrap();

        let fresh_order = sample_order(dec!(10));
        store.insert_order(&fresh_order).unwrap();

        let removed = store.delete_completed_before(days_ago(30)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_order(&old_order.id).unwrap().is_none());
        assert!(store.get_order(&fresh_order.id).unwrap().is_some());
    }

    #[test]
    fn test_active_orders_excludes_terminal() {
        let store = BridgeStore::open(":memory:").unwrap();

        let live = sample_order(dec!(10));
        store.insert_order(&live).unwrap();

        let mut dead = sample_order(dec!(10));
        dead.transition(PaymentStatus::Cancelled).unwrap();
        store.insert_order(&dead).unwrap();

        let active = store.active_orders().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live.id);
    }

    #[test]
    fn test_network_log() {
        let store = BridgeStore::open(":memory:").unwrap();
        store
            .log_network_change(NetworkStatus::Online, NetworkStatus::Offline)
            .unwrap();
        store
            .log_network_change(NetworkStatus::Offline, NetworkStatus::Online)
            .unwrap();

        let changes = store.recent_network_changes(10).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].1, "ONLINE");
    }
}

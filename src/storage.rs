//! Snapshot persistence for the engine's mutable books.
//!
//! The engine itself is in-memory; hosts that need the counters, locks,
//! partitioned balances, and configuration to survive a restart persist them
//! here. A snapshot is one transactional row (config + counters + locks +
//! partitions as JSON), so restore always sees a consistent set.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::ComplianceConfig;
use crate::counters::InvestorCounters;
use crate::locks::LockAccounting;
use crate::logging;
use crate::partitions::PartitionedBook;

pub struct StateStore {
    conn: Connection,
}

/// One persisted engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub ts: u64,
    pub config: ComplianceConfig,
    pub counters: InvestorCounters,
    pub locks: LockAccounting,
    pub partitions: PartitionedBook,
}

impl StateStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                config TEXT NOT NULL,
                counters TEXT NOT NULL,
                locks TEXT NOT NULL,
                partitions TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn persist_snapshot(
        &mut self,
        ts: u64,
        config: &ComplianceConfig,
        counters: &InvestorCounters,
        locks: &LockAccounting,
        partitions: &PartitionedBook,
    ) -> Result<()> {
        let config_json = serde_json::to_string(config)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshots (ts, config, counters, locks, partitions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ts as i64,
                config_json,
                serde_json::to_string(counters)?,
                serde_json::to_string(locks)?,
                serde_json::to_string(partitions)?,
            ],
        )?;
        tx.commit()?;
        logging::log(
            logging::Level::Info,
            logging::Domain::Storage,
            "snapshot_persisted",
            logging::obj(&[
                ("ts", logging::v_u64(ts)),
                (
                    "config_hash",
                    logging::v_str(&logging::params_hash(&config_json)),
                ),
            ]),
        );
        Ok(())
    }

    /// Most recent snapshot, if any.
    pub fn load_latest(&mut self) -> Result<Option<Snapshot>> {
        let row = self
            .conn
            .query_row(
                "SELECT ts, config, counters, locks, partitions
                 FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((ts, config, counters, locks, partitions)) = row else {
            return Ok(None);
        };
        Ok(Some(Snapshot {
            ts: ts as u64,
            config: serde_json::from_str(&config)?,
            counters: serde_json::from_str(&counters)?,
            locks: serde_json::from_str(&locks)?,
            partitions: serde_json::from_str(&partitions)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitions::PartitionKey;
    use crate::region::Region;

    #[test]
    fn round_trips_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");
        let mut store = StateStore::new(path.to_str().unwrap()).unwrap();
        store.init().unwrap();

        assert!(store.load_latest().unwrap().is_none());

        let mut config = ComplianceConfig::new();
        config.set_us_investors_limit(5);
        let mut counters = InvestorCounters::new();
        counters.set_total_investors_count(3);
        let mut locks = LockAccounting::new();
        locks.add_lock("inv-1", 50, 0, "escrow", 9_999, None).unwrap();
        let mut partitions = PartitionedBook::new();
        partitions.issue("w1", PartitionKey::for_issuance(86_400, Region::Us), 30);

        store
            .persist_snapshot(100, &config, &counters, &locks, &partitions)
            .unwrap();

        // A later snapshot wins.
        counters.set_total_investors_count(4);
        partitions.issue("w1", PartitionKey::for_issuance(2 * 86_400, Region::Eu), 20);
        store
            .persist_snapshot(200, &config, &counters, &locks, &partitions)
            .unwrap();

        let snap = store.load_latest().unwrap().unwrap();
        assert_eq!(snap.ts, 200);
        assert_eq!(snap.config, config);
        assert_eq!(snap.counters, counters);
        assert_eq!(snap.locks, locks);
        assert_eq!(snap.partitions, partitions);
    }
}

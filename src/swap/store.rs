use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, Row, params};

use super::status::StatusMask;
use super::{SwapState, SwapTask};
use crate::assets::AssetId;

#[derive(Debug)]
pub struct SqliteSwapStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSwapStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create swap store dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .context("configure sqlite pragmas")?;

        migrate(&conn).context("migrate sqlite schema")?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a new task in `Pending` state and returns its id.
    pub fn create_task(
        &mut self,
        asset_offer: AssetId,
        asset_ask: AssetId,
        amount: u128,
        price_snapshot: Option<&[u8]>,
    ) -> Result<i64> {
        let now = now_millis();
        self.conn
            .execute(
                r#"
INSERT INTO swap_tasks (
  created_at,
  updated_at,
  asset_offer,
  asset_ask,
  amount,
  price_snapshot,
  state,
  status
) VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#,
                params![
                    now,
                    asset_offer.to_hex(),
                    asset_ask.to_hex(),
                    amount.to_string(),
                    price_snapshot,
                    SwapState::Pending.as_str(),
                    StatusMask::NEW.bits(),
                ],
            )
            .context("insert swap task")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_task(&self, id: i64) -> Result<Option<SwapTask>> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM swap_tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()
            .with_context(|| format!("get swap task {id}"))
    }

    /// Tasks in `state`, oldest first, up to `limit` when given.
    pub fn list_by_state(&self, state: SwapState, limit: Option<usize>) -> Result<Vec<SwapTask>> {
        let sql = match limit {
            Some(_) => format!(
                "SELECT {TASK_COLUMNS} FROM swap_tasks WHERE state = ?1 ORDER BY id LIMIT ?2"
            ),
            None => format!("SELECT {TASK_COLUMNS} FROM swap_tasks WHERE state = ?1 ORDER BY id"),
        };
        let mut stmt = self.conn.prepare(&sql).context("prepare list by state")?;

        let mut out = Vec::new();
        let rows = match limit {
            Some(limit) => stmt.query_map(params![state.as_str(), limit as i64], task_from_row),
            None => stmt.query_map(params![state.as_str()], task_from_row),
        }
        .context("query tasks by state")?;

        for row in rows {
            out.push(row.context("read task row")?);
        }
        Ok(out)
    }

    /// Tasks that have already left the live states.
    pub fn list_processed(&self, limit: Option<usize>) -> Result<Vec<SwapTask>> {
        let sql = match limit {
            Some(_) => format!(
                "SELECT {TASK_COLUMNS} FROM swap_tasks WHERE state NOT IN ('pending', 'sent') ORDER BY id LIMIT ?1"
            ),
            None => format!(
                "SELECT {TASK_COLUMNS} FROM swap_tasks WHERE state NOT IN ('pending', 'sent') ORDER BY id"
            ),
        };
        let mut stmt = self.conn.prepare(&sql).context("prepare list processed")?;

        let mut out = Vec::new();
        let rows = match limit {
            Some(limit) => stmt.query_map(params![limit as i64], task_from_row),
            None => stmt.query_map([], task_from_row),
        }
        .context("query processed tasks")?;

        for row in rows {
            out.push(row.context("read task row")?);
        }
        Ok(out)
    }

    pub fn states(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT state FROM swap_tasks ORDER BY state")
            .context("prepare distinct states")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query distinct states")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("read state row")?);
        }
        Ok(out)
    }

    /// The one `Pending -> Sent` transition: records the route and query ids
    /// exactly once. Fails if the task is not pending anymore or already
    /// carries identity fields.
    pub fn mark_sent(&mut self, id: i64, route_id: u64, query_id: u64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                r#"
UPDATE swap_tasks
SET state = ?2, status = ?3, updated_at = ?4, route_id = ?5, query_id = ?6
WHERE id = ?1 AND state = ?7 AND route_id IS NULL AND query_id IS NULL
"#,
                params![
                    id,
                    SwapState::Sent.as_str(),
                    StatusMask::PENDING.bits(),
                    now_millis(),
                    route_id as i64,
                    query_id.to_string(),
                    SwapState::Pending.as_str(),
                ],
            )
            .with_context(|| format!("mark task {id} sent"))?;
        anyhow::ensure!(rows == 1, "task not pending or already sent: {id}");
        Ok(())
    }

    /// Moves a task into a terminal state, persisting the aggregate status
    /// mask alongside.
    pub fn finish(&mut self, id: i64, state: SwapState, mask: StatusMask) -> Result<()> {
        anyhow::ensure!(state.is_terminal(), "state {state} is not terminal");
        let rows = self
            .conn
            .execute(
                "UPDATE swap_tasks SET state = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
                params![id, state.as_str(), mask.bits(), now_millis()],
            )
            .with_context(|| format!("finish task {id}"))?;
        anyhow::ensure!(rows == 1, "task not found: {id}");
        Ok(())
    }

    /// Retention sweep; returns the number of deleted tasks.
    pub fn delete_older_than(&mut self, age: Duration) -> Result<usize> {
        let cutoff = now_millis() - age.as_millis() as i64;
        let rows = self
            .conn
            .execute(
                "DELETE FROM swap_tasks WHERE created_at < ?1",
                params![cutoff],
            )
            .context("delete old tasks")?;
        Ok(rows)
    }
}

const TASK_COLUMNS: &str = "id, created_at, updated_at, asset_offer, asset_ask, amount, \
                            price_snapshot, route_id, query_id, state, status";

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS swap_tasks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  asset_offer TEXT NOT NULL,
  asset_ask TEXT NOT NULL,
  amount TEXT NOT NULL,
  price_snapshot BLOB,
  route_id INTEGER,
  query_id TEXT,
  state TEXT NOT NULL DEFAULT 'pending',
  status INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS swap_tasks_state_idx ON swap_tasks(state);
"#,
    )
    .context("create tables")?;
    Ok(())
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<SwapTask> {
    let asset_offer: String = row.get(3)?;
    let asset_ask: String = row.get(4)?;
    let amount: String = row.get(5)?;
    let route_id: Option<i64> = row.get(7)?;
    let query_id: Option<String> = row.get(8)?;
    let state: String = row.get(9)?;
    let status: i64 = row.get(10)?;

    Ok(SwapTask {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        asset_offer: asset_offer.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("invalid asset id {asset_offer}").into(),
            )
        })?,
        asset_ask: asset_ask.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("invalid asset id {asset_ask}").into(),
            )
        })?,
        amount: amount.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("invalid amount {amount}").into(),
            )
        })?,
        price_snapshot: row.get(6)?,
        route_id: route_id.map(|id| id as u64),
        query_id: query_id
            .map(|id| {
                id.parse::<u64>().map_err(|_| {
                    rusqlite::Error::FromSqlConversionFailure(
                        8,
                        rusqlite::types::Type::Text,
                        format!("invalid query id {id}").into(),
                    )
                })
            })
            .transpose()?,
        state: state.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                9,
                rusqlite::types::Type::Text,
                format!("unknown swap state: {state}").into(),
            )
        })?,
        status_mask: u32::try_from(status).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                10,
                rusqlite::types::Type::Integer,
                format!("invalid status mask {status}").into(),
            )
        })?,
    })
}

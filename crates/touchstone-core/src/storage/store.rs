use crate::errors::AuditError;
use crate::model::{
    CategoryCounts, FindingCategory, PageSetupScript, PageState, RawFinding, ResultItem,
    ScriptStats, TestResult,
};
use anyhow::Context;
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

pub struct StoreStats {
    pub sessions: Option<u64>,
    pub results: Option<u64>,
    pub items: Option<u64>,
    pub last_session_id: Option<i64>,
    pub last_session_at: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: i64,
    pub page: String,
    pub created_at: String,
    pub truncated: bool,
    pub truncated_reason: Option<String>,
}

/// Embedded-array shape of a legacy finding. Legacy summaries predate
/// the item table; their arrays carry no ids or denormalized fields.
#[derive(Debug, Deserialize)]
struct LegacyItem {
    issue_id: String,
    #[serde(default)]
    touchpoint: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

struct SummaryRow {
    id: i64,
    page: String,
    session_id: i64,
    seq: u32,
    state_json: String,
    tested_at: String,
    duration_ms: Option<u64>,
    counts: CategoryCounts,
    has_details: bool,
    siblings_json: Option<String>,
    legacy_arrays: [Option<String>; 5],
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;

        // Databases created before the split schema lack the flag and
        // count columns; the external migration tool fills the data in.
        migrate_split_schema(&conn)?;

        Ok(())
    }

    // --- sessions ---

    pub fn create_session(&self, page: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions(page, created_at) VALUES (?1, ?2)",
            params![page, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn finalize_session(&self, session_id: i64, truncated: Option<&str>) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET truncated = ?1, truncated_reason = ?2 WHERE id = ?3",
            params![truncated.is_some() as i64, truncated, session_id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: i64) -> anyhow::Result<SessionRow> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, page, created_at, truncated, truncated_reason
             FROM sessions WHERE id = ?1",
            params![session_id],
            |row| {
                Ok(SessionRow {
                    id: row.get(0)?,
                    page: row.get(1)?,
                    created_at: row.get(2)?,
                    truncated: row.get::<_, i64>(3)? != 0,
                    truncated_reason: row.get(4)?,
                })
            },
        )
        .with_context(|| format!("session {} not found", session_id))
    }

    // --- result writes ---

    /// Persists one state's result: a summary with computed per-category
    /// counts plus one item row per finding.
    ///
    /// Items are written before the detail flag flips, and the flag flip
    /// is the last statement of the transaction, so a crash mid-batch
    /// leaves a summary that still looks legacy rather than "detailed
    /// but empty".
    pub fn create_result(
        &self,
        page: &str,
        session_id: i64,
        seq: u32,
        state: &PageState,
        duration_ms: Option<u64>,
        findings: &[RawFinding],
    ) -> anyhow::Result<i64> {
        let counts = CategoryCounts::from_findings(findings);
        let tested_at = chrono::Utc::now().to_rfc3339();
        let state_json = serde_json::to_string(state)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO results(page, session_id, seq, state_json, tested_at, duration_ms,
                                 violation_count, warning_count, info_count, discovery_count, pass_count,
                                 has_details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
            params![
                page,
                session_id,
                seq,
                state_json,
                tested_at,
                duration_ms.map(|v| v as i64),
                counts.violations,
                counts.warnings,
                counts.info,
                counts.discovery,
                counts.passes,
            ],
        )?;
        let result_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO result_items(result_id, page, tested_at, category, issue_id,
                                          touchpoint, location, snippet, metadata_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for f in findings {
                stmt.execute(params![
                    result_id,
                    page,
                    tested_at,
                    f.category.as_str(),
                    f.issue_id,
                    f.touchpoint,
                    f.location,
                    f.snippet,
                    serde_json::to_string(&f.metadata)?,
                ])?;
            }
        }

        let written: i64 = tx.query_row(
            "SELECT COUNT(*) FROM result_items WHERE result_id = ?1",
            params![result_id],
            |r| r.get(0),
        )?;
        if written as usize != findings.len() {
            // Dropping the transaction rolls everything back; the flag
            // is never observed true over a partial batch.
            return Err(AuditError::StorageWriteIncomplete {
                result_id,
                written: written as usize,
                expected: findings.len(),
            }
            .into());
        }

        tx.execute(
            "UPDATE results SET has_details = 1 WHERE id = ?1",
            params![result_id],
        )?;
        tx.commit()?;
        Ok(result_id)
    }

    /// Attaches sibling result ids once the session completes.
    pub fn link_session_results(&self, result_ids: &[i64]) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        for id in result_ids {
            let siblings: Vec<i64> = result_ids.iter().copied().filter(|s| s != id).collect();
            conn.execute(
                "UPDATE results SET siblings_json = ?1 WHERE id = ?2",
                params![serde_json::to_string(&siblings)?, id],
            )?;
        }
        Ok(())
    }

    /// Deletes everything owned by a page: sessions, summaries, and (via
    /// cascade) items.
    pub fn delete_page(&self, page: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM results WHERE page = ?1", params![page])?;
        conn.execute("DELETE FROM sessions WHERE page = ?1", params![page])?;
        Ok(())
    }

    // --- result reads ---

    pub fn get_result(&self, result_id: i64) -> anyhow::Result<TestResult> {
        self.get_result_filtered(result_id, None)
    }

    /// Reads a result back in the array shape used by pre-split records.
    ///
    /// Split and legacy summaries reconstruct through this single path,
    /// discriminated by the detail flag; callers are schema-agnostic.
    pub fn get_result_filtered(
        &self,
        result_id: i64,
        category: Option<FindingCategory>,
    ) -> anyhow::Result<TestResult> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, page, session_id, seq, state_json, tested_at, duration_ms,
                        violation_count, warning_count, info_count, discovery_count, pass_count,
                        has_details, siblings_json,
                        violations_json, warnings_json, info_json, discovery_json, passes_json
                 FROM results WHERE id = ?1",
                params![result_id],
                |row| {
                    Ok(SummaryRow {
                        id: row.get(0)?,
                        page: row.get(1)?,
                        session_id: row.get(2)?,
                        seq: row.get(3)?,
                        state_json: row.get(4)?,
                        tested_at: row.get(5)?,
                        duration_ms: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
                        counts: CategoryCounts {
                            violations: row.get(7)?,
                            warnings: row.get(8)?,
                            info: row.get(9)?,
                            discovery: row.get(10)?,
                            passes: row.get(11)?,
                        },
                        has_details: row.get::<_, i64>(12)? != 0,
                        siblings_json: row.get(13)?,
                        legacy_arrays: [
                            row.get(14)?,
                            row.get(15)?,
                            row.get(16)?,
                            row.get(17)?,
                            row.get(18)?,
                        ],
                    })
                },
            )
            .with_context(|| format!("result {} not found", result_id))?;

        let state: PageState =
            serde_json::from_str(&row.state_json).context("corrupt state_json on summary")?;
        let siblings: Vec<i64> = match &row.siblings_json {
            Some(s) if !s.trim().is_empty() => serde_json::from_str(s).unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut result = TestResult {
            id: row.id,
            page: row.page.clone(),
            session_id: row.session_id,
            seq: row.seq,
            state,
            tested_at: row.tested_at.clone(),
            duration_ms: row.duration_ms,
            counts: row.counts,
            has_details: row.has_details,
            siblings,
            violations: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
            discovery: Vec::new(),
            passes: Vec::new(),
        };

        if row.has_details {
            let (sql, use_category) = match category {
                Some(_) => (
                    "SELECT id, result_id, page, tested_at, category, issue_id, touchpoint,
                            location, snippet, metadata_json
                     FROM result_items WHERE result_id = ?1 AND category = ?2
                     ORDER BY id ASC",
                    true,
                ),
                None => (
                    "SELECT id, result_id, page, tested_at, category, issue_id, touchpoint,
                            location, snippet, metadata_json
                     FROM result_items WHERE result_id = ?1
                     ORDER BY id ASC",
                    false,
                ),
            };
            let mut stmt = conn.prepare(sql)?;
            let items: Vec<ResultItem> = if use_category {
                stmt.query_map(
                    params![result_id, category.map(|c| c.as_str())],
                    item_from_row,
                )?
                .collect::<Result<_, _>>()?
            } else {
                stmt.query_map(params![result_id], item_from_row)?
                    .collect::<Result<_, _>>()?
            };
            for item in items {
                push_item(&mut result, item);
            }
        } else {
            let mut from_arrays = CategoryCounts::default();
            for (idx, cat) in FindingCategory::ALL.iter().enumerate() {
                let Some(raw) = &row.legacy_arrays[idx] else {
                    continue;
                };
                if raw.trim().is_empty() {
                    continue;
                }
                let legacy: Vec<LegacyItem> = serde_json::from_str(raw)
                    .with_context(|| format!("corrupt legacy {} array", cat.as_str()))?;
                from_arrays.bump_by(*cat, legacy.len() as u32);
                if category.is_some() && category != Some(*cat) {
                    continue;
                }
                for l in legacy {
                    push_item(
                        &mut result,
                        ResultItem {
                            id: 0,
                            result_id: row.id,
                            page: row.page.clone(),
                            tested_at: row.tested_at.clone(),
                            category: *cat,
                            issue_id: l.issue_id,
                            touchpoint: l.touchpoint,
                            location: l.location,
                            snippet: l.snippet,
                            metadata: l.metadata,
                        },
                    );
                }
            }
            // Legacy rows written before counts existed carry zeros;
            // recompute from what the arrays actually hold. Counts are
            // summary-level, so a category filter never changes them.
            if result.counts.total() == 0 {
                result.counts = from_arrays;
            }
        }

        Ok(result)
    }

    /// Counts items per category straight from the item table; disagreement
    /// with the stored summary counts is a corruption condition.
    pub fn audit_counts(&self, result_id: i64) -> anyhow::Result<CategoryCounts> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM result_items
             WHERE result_id = ?1 GROUP BY category",
        )?;
        let rows = stmt.query_map(params![result_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = CategoryCounts::default();
        for r in rows {
            let (cat, n) = r?;
            counts.bump_by(FindingCategory::parse(&cat), n as u32);
        }
        Ok(counts)
    }

    // --- aggregate queries (index-backed, scoped to one result) ---

    pub fn group_items_by_issue(
        &self,
        result_id: i64,
    ) -> anyhow::Result<BTreeMap<String, Vec<ResultItem>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, result_id, page, tested_at, category, issue_id, touchpoint,
                    location, snippet, metadata_json
             FROM result_items WHERE result_id = ?1
             ORDER BY issue_id ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![result_id], item_from_row)?;
        let mut grouped: BTreeMap<String, Vec<ResultItem>> = BTreeMap::new();
        for r in rows {
            let item = r?;
            grouped.entry(item.issue_id.clone()).or_default().push(item);
        }
        Ok(grouped)
    }

    pub fn count_items_by_issue(
        &self,
        result_id: i64,
        category: Option<FindingCategory>,
    ) -> anyhow::Result<Vec<(String, u64)>> {
        let conn = self.conn.lock().unwrap();
        let (sql, with_cat) = match category {
            Some(_) => (
                "SELECT issue_id, COUNT(*) FROM result_items
                 WHERE result_id = ?1 AND category = ?2
                 GROUP BY issue_id ORDER BY issue_id ASC",
                true,
            ),
            None => (
                "SELECT issue_id, COUNT(*) FROM result_items
                 WHERE result_id = ?1
                 GROUP BY issue_id ORDER BY issue_id ASC",
                false,
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        };
        let rows: Vec<(String, u64)> = if with_cat {
            stmt.query_map(
                params![result_id, category.map(|c| c.as_str())],
                map_row,
            )?
            .collect::<Result<_, _>>()?
        } else {
            stmt.query_map(params![result_id], map_row)?
                .collect::<Result<_, _>>()?
        };
        Ok(rows)
    }

    pub fn count_items_by_touchpoint(&self, result_id: i64) -> anyhow::Result<Vec<(String, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT touchpoint, COUNT(*) FROM result_items
             WHERE result_id = ?1
             GROUP BY touchpoint ORDER BY touchpoint ASC",
        )?;
        let rows = stmt
            .query_map(params![result_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn sample_items_for_issue(
        &self,
        result_id: i64,
        category: FindingCategory,
        issue_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<ResultItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, result_id, page, tested_at, category, issue_id, touchpoint,
                    location, snippet, metadata_json
             FROM result_items
             WHERE result_id = ?1 AND category = ?2 AND issue_id = ?3
             ORDER BY id ASC LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![result_id, category.as_str(), issue_id, limit],
                item_from_row,
            )?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    // --- script definitions & execution statistics ---

    /// Records one full execution attempt. Increments are commutative so
    /// concurrent sessions running the same script never lose updates.
    pub fn bump_script_stats(
        &self,
        script: &PageSetupScript,
        success: bool,
        duration_ms: u64,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scripts(id, name, definition_json, success_count, failure_count,
                                 run_count, total_duration_ms, last_run_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                success_count = success_count + excluded.success_count,
                failure_count = failure_count + excluded.failure_count,
                run_count = run_count + excluded.run_count,
                total_duration_ms = total_duration_ms + excluded.total_duration_ms,
                last_run_at = excluded.last_run_at",
            params![
                script.id,
                script.name,
                serde_json::to_string(script)?,
                success as i64,
                (!success) as i64,
                duration_ms as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_script_stats(&self, script_id: &str) -> anyhow::Result<Option<ScriptStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT success_count, failure_count, run_count, total_duration_ms, last_run_at
             FROM scripts WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![script_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(ScriptStats {
                success_count: row.get::<_, i64>(0)? as u64,
                failure_count: row.get::<_, i64>(1)? as u64,
                run_count: row.get::<_, i64>(2)? as u64,
                total_duration_ms: row.get::<_, i64>(3)? as u64,
                last_run_at: row.get(4)?,
            }))
        } else {
            Ok(None)
        }
    }

    // --- diagnostics ---

    pub fn stats_best_effort(&self) -> anyhow::Result<StoreStats> {
        let conn = self.conn.lock().unwrap();

        let count = |table: &str| -> Option<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get::<_, i64>(0).map(|x| x as u64)
            })
            .ok()
        };

        let last: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, created_at FROM sessions ORDER BY id DESC LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();
        let (last_session_id, last_session_at) = match last {
            Some((id, at)) => (Some(id), Some(at)),
            None => (None, None),
        };

        let version: Option<String> = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .ok()
            .map(|v: i64| v.to_string());

        Ok(StoreStats {
            sessions: count("sessions"),
            results: count("results"),
            items: count("result_items"),
            last_session_id,
            last_session_at,
            version,
        })
    }
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResultItem> {
    let metadata: Option<String> = row.get(9)?;
    Ok(ResultItem {
        id: row.get(0)?,
        result_id: row.get(1)?,
        page: row.get(2)?,
        tested_at: row.get(3)?,
        category: FindingCategory::parse(&row.get::<_, String>(4)?),
        issue_id: row.get(5)?,
        touchpoint: row.get(6)?,
        location: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        snippet: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        metadata: metadata
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null),
    })
}

fn push_item(result: &mut TestResult, item: ResultItem) {
    match item.category {
        FindingCategory::Violation => result.violations.push(item),
        FindingCategory::Warning => result.warnings.push(item),
        FindingCategory::Info => result.info.push(item),
        FindingCategory::Discovery => result.discovery.push(item),
        FindingCategory::Pass => result.passes.push(item),
    }
}

fn migrate_split_schema(conn: &Connection) -> anyhow::Result<()> {
    let cols = get_columns(conn, "results")?;
    add_column_if_missing(conn, &cols, "results", "has_details", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, &cols, "results", "siblings_json", "TEXT")?;
    for col in [
        "violation_count",
        "warning_count",
        "info_count",
        "discovery_count",
        "pass_count",
    ] {
        add_column_if_missing(conn, &cols, "results", col, "INTEGER NOT NULL DEFAULT 0")?;
    }

    let session_cols = get_columns(conn, "sessions")?;
    add_column_if_missing(
        conn,
        &session_cols,
        "sessions",
        "truncated",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    add_column_if_missing(conn, &session_cols, "sessions", "truncated_reason", "TEXT")?;
    Ok(())
}

fn get_columns(
    conn: &Connection,
    table: &str,
) -> anyhow::Result<std::collections::HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = std::collections::HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &std::collections::HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> anyhow::Result<()> {
    if !cols.contains(col) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
        conn.execute(&sql, [])?;
    }
    Ok(())
}

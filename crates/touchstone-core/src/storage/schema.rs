// Field names and index definitions here are the compatibility contract
// the reporting and migration tooling depend on. Change with care.
pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  page TEXT NOT NULL,
  created_at TEXT NOT NULL,
  truncated INTEGER NOT NULL DEFAULT 0,
  truncated_reason TEXT
);

CREATE TABLE IF NOT EXISTS results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  page TEXT NOT NULL,
  session_id INTEGER NOT NULL REFERENCES sessions(id),
  seq INTEGER NOT NULL,
  state_json TEXT NOT NULL,
  tested_at TEXT NOT NULL,
  duration_ms INTEGER,
  violation_count INTEGER NOT NULL DEFAULT 0,
  warning_count INTEGER NOT NULL DEFAULT 0,
  info_count INTEGER NOT NULL DEFAULT 0,
  discovery_count INTEGER NOT NULL DEFAULT 0,
  pass_count INTEGER NOT NULL DEFAULT 0,
  has_details INTEGER NOT NULL DEFAULT 0,
  siblings_json TEXT,
  violations_json TEXT,
  warnings_json TEXT,
  info_json TEXT,
  discovery_json TEXT,
  passes_json TEXT,
  UNIQUE(session_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_results_page ON results(page, tested_at);

CREATE TABLE IF NOT EXISTS result_items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  result_id INTEGER NOT NULL REFERENCES results(id) ON DELETE CASCADE,
  page TEXT NOT NULL,
  tested_at TEXT NOT NULL,
  category TEXT NOT NULL,
  issue_id TEXT NOT NULL,
  touchpoint TEXT NOT NULL,
  location TEXT,
  snippet TEXT,
  metadata_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_items_result ON result_items(result_id);
CREATE INDEX IF NOT EXISTS idx_items_result_category ON result_items(result_id, category);
CREATE INDEX IF NOT EXISTS idx_items_result_cat_issue ON result_items(result_id, category, issue_id);
CREATE INDEX IF NOT EXISTS idx_items_result_touchpoint ON result_items(result_id, touchpoint);

CREATE TABLE IF NOT EXISTS scripts (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  definition_json TEXT NOT NULL,
  success_count INTEGER NOT NULL DEFAULT 0,
  failure_count INTEGER NOT NULL DEFAULT 0,
  run_count INTEGER NOT NULL DEFAULT 0,
  total_duration_ms INTEGER NOT NULL DEFAULT 0,
  last_run_at TEXT
);
"#;

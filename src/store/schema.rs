//! SQLite schema for the gateway's own tables.
//!
//! Follows the teacher's `persistence::schema::SCHEMA` pattern: one raw-SQL
//! constant, applied with a single `execute` call at startup.

pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type_tag TEXT NOT NULL,
    status TEXT NOT NULL,
    supported_models TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    base_url TEXT,
    models_list_url TEXT
);

CREATE TABLE IF NOT EXISTS requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id TEXT NOT NULL,
    body BLOB NOT NULL,
    status TEXT NOT NULL,
    channel_id INTEGER,
    stream INTEGER NOT NULL DEFAULT 0,
    total_latency_ms INTEGER,
    first_token_latency_ms INTEGER,
    api_key_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_api_key_created
    ON requests(api_key_id, created_at);

CREATE TABLE IF NOT EXISTS request_executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id INTEGER NOT NULL REFERENCES requests(id),
    channel_id INTEGER NOT NULL,
    upstream_model_id TEXT NOT NULL,
    body BLOB NOT NULL,
    status TEXT NOT NULL,
    stream INTEGER NOT NULL DEFAULT 0,
    total_latency_ms INTEGER,
    first_token_latency_ms INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_executions_channel_created
    ON request_executions(channel_id, created_at);

CREATE TABLE IF NOT EXISTS usage_logs (
    request_id INTEGER NOT NULL,
    api_key_id INTEGER NOT NULL,
    channel_id INTEGER NOT NULL,
    model_id TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL,
    completion_tokens INTEGER NOT NULL,
    prompt_cached_tokens INTEGER NOT NULL DEFAULT 0,
    prompt_write_cached_tokens INTEGER NOT NULL DEFAULT 0,
    completion_reasoning_tokens INTEGER NOT NULL DEFAULT 0,
    completion_audio_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL,
    total_cost TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_logs_api_key_created
    ON usage_logs(api_key_id, created_at);

CREATE INDEX IF NOT EXISTS idx_usage_logs_channel_created
    ON usage_logs(channel_id, created_at);

CREATE TABLE IF NOT EXISTS channel_probes (
    channel_id INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    total_request_count INTEGER NOT NULL,
    success_request_count INTEGER NOT NULL,
    avg_tokens_per_second REAL,
    avg_time_to_first_token_ms REAL,
    PRIMARY KEY (channel_id, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_channel_probes_timestamp
    ON channel_probes(timestamp DESC);
"#;

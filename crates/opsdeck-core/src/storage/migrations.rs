//! Database migrations
//!
//! This module manages SQLite schema migrations for opsdeck.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
"#;

/// Migration 1: Covered entity tables
///
/// Every covered table has a TEXT `id` primary key that is stable across
/// backup and restore. `team_id` / `user_id` columns are the scoping keys;
/// `hierarchy_designs.team_id` and `page_permissions.admin_user_id` carry
/// the secondary unique constraints the restore engine must respect.
const MIGRATION_V1: &str = r#"
    -- Tenant/business profile rows; one row per member of a team
    CREATE TABLE IF NOT EXISTS business_profiles (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        team_id TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'member',
        company_name TEXT,
        industry TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_business_profiles_team_id ON business_profiles(team_id);
    CREATE INDEX IF NOT EXISTS idx_business_profiles_user_id ON business_profiles(user_id);

    CREATE TABLE IF NOT EXISTS departments (
        id TEXT PRIMARY KEY NOT NULL,
        team_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        head_user_id TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_departments_team_id ON departments(team_id);

    CREATE TABLE IF NOT EXISTS service_offerings (
        id TEXT PRIMARY KEY NOT NULL,
        team_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        price_usd REAL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_service_offerings_team_id ON service_offerings(team_id);

    -- Generated workflows ("machines"): growth / fulfillment diagrams
    CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'growth' CHECK (kind IN ('growth', 'fulfillment')),
        title TEXT,
        definition TEXT,
        diagram_path TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_workflows_user_id ON workflows(user_id);

    CREATE TABLE IF NOT EXISTS strategic_plans (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        title TEXT,
        content TEXT,
        status TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_strategic_plans_user_id ON strategic_plans(user_id);

    -- One hierarchy design per team (secondary unique constraint)
    CREATE TABLE IF NOT EXISTS hierarchy_designs (
        id TEXT PRIMARY KEY NOT NULL,
        team_id TEXT NOT NULL UNIQUE,
        design TEXT,
        diagram_path TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS document_history (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        source_plan_id TEXT REFERENCES strategic_plans(id),
        document_type TEXT NOT NULL,
        storage_path TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_document_history_user_id ON document_history(user_id);
    CREATE INDEX IF NOT EXISTS idx_document_history_source_plan_id ON document_history(source_plan_id);

    CREATE TABLE IF NOT EXISTS onboarding_records (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        step TEXT NOT NULL DEFAULT 'welcome',
        completed INTEGER NOT NULL DEFAULT 0,
        answers TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_onboarding_records_user_id ON onboarding_records(user_id);

    -- One permission grant row per admin user (secondary unique constraint)
    CREATE TABLE IF NOT EXISTS page_permissions (
        id TEXT PRIMARY KEY NOT NULL,
        admin_user_id TEXT NOT NULL UNIQUE,
        page_paths TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
"#;

/// Migration 2: Backup/restore audit trail (append-only, best-effort writes)
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS backup_audit_log (
        id TEXT PRIMARY KEY NOT NULL,
        op_type TEXT NOT NULL CHECK (op_type IN ('backup', 'restore')),
        scope TEXT NOT NULL,
        backup_path TEXT NOT NULL,
        triggered_by_user_id TEXT NOT NULL,
        details TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_backup_audit_log_created_at ON backup_audit_log(created_at);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    // Get the latest version
    let row: Option<(i32,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Covered entity tables");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Backup/restore audit trail");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

//! Schema convention checks run against the migrated database.
//!
//! Requires `DATABASE_URL`; run with `cargo test -- --ignored`.

use sqlx::PgPool;

/// All `id` columns must be bigint (entity tables) or smallint (lookup tables).
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_all_pks_are_correct_type(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, data_type) in &rows {
        assert!(
            data_type == "bigint" || data_type == "smallint",
            "Table {table}.id should be bigint or smallint, got {data_type}"
        );
    }
}

/// Every table (except _sqlx_migrations) must have created_at and updated_at as timestamptz.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_all_tables_have_timestamps(pool: PgPool) {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT t.table_name, c.column_name, c.data_type
         FROM information_schema.tables t
         JOIN information_schema.columns c
           ON c.table_schema = t.table_schema AND c.table_name = t.table_name
         WHERE t.table_schema = 'public'
           AND t.table_type = 'BASE TABLE'
           AND t.table_name != '_sqlx_migrations'
           AND c.column_name IN ('created_at', 'updated_at')",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name FROM information_schema.tables
         WHERE table_schema = 'public'
           AND table_type = 'BASE TABLE'
           AND table_name != '_sqlx_migrations'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for (table,) in &tables {
        for col in ["created_at", "updated_at"] {
            let (_, _, data_type) = rows
                .iter()
                .find(|(t, c, _)| t == table && c == col)
                .unwrap_or_else(|| panic!("Table {table} is missing column {col}"));
            assert_eq!(
                data_type, "timestamp with time zone",
                "Table {table}.{col} should be timestamptz, got {data_type}"
            );
        }
    }
}

/// No character varying columns should exist; use TEXT.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_no_varchar_columns(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, column_name
         FROM information_schema.columns
         WHERE table_schema = 'public'
           AND data_type = 'character varying'
           AND table_name != '_sqlx_migrations'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(rows.is_empty(), "varchar columns found: {rows:?}");
}

/// Lookup tables are seeded with ids matching the Rust enums.
#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_lookup_seed_matches_enums(pool: PgPool) {
    use lectern_core::roles::UserRole;
    use lectern_core::tokens::TokenPurpose;

    let purposes: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM token_purposes ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(purposes.len(), TokenPurpose::ALL.len());
    for (id, name) in purposes {
        assert_eq!(TokenPurpose::from_id(id).unwrap().name(), name);
    }

    let roles: Vec<(i16, String)> = sqlx::query_as("SELECT id, name FROM user_roles ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    for (id, name) in roles {
        assert_eq!(UserRole::from_id(id).unwrap().name(), name);
    }
}

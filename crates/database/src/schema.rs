//! Versioned schema bootstrap for tenant databases.
//!
//! Migrations run in version order. Applied versions are recorded in
//! `schema_migrations` and skipped on later runs. Every statement is also
//! guarded with `IF NOT EXISTS`, so a run interrupted between a statement and
//! its version record is safe to repeat.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::Result;

/// Dimension of the `documents.embedding` vector column.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// One ordered step of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Strictly increasing version number.
    pub version: i64,
    /// Short description, stored alongside the version.
    pub name: &'static str,
    /// Statements run sequentially, each auto-committed.
    pub statements: &'static [&'static str],
}

/// The full schema, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "vector_extension",
        statements: &["CREATE EXTENSION IF NOT EXISTS vector"],
    },
    Migration {
        version: 2,
        name: "chat_threads",
        statements: &[r#"
        CREATE TABLE IF NOT EXISTS chat_threads (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            user_id TEXT NOT NULL,
            persona_message TEXT NOT NULL DEFAULT '',
            persona_message_title TEXT NOT NULL DEFAULT '',
            extension TEXT[] NOT NULL DEFAULT '{}',
            bookmarked BOOLEAN NOT NULL DEFAULT FALSE,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            type TEXT NOT NULL DEFAULT 'CHAT_THREAD',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_message_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#],
    },
    Migration {
        version: 3,
        name: "chat_citations",
        statements: &[r#"
        CREATE TABLE IF NOT EXISTS chat_citations (
            id TEXT PRIMARY KEY,
            content JSONB NOT NULL,
            user_id TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'CHAT_CITATION',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#],
    },
    Migration {
        version: 4,
        name: "personas",
        statements: &[r#"
        CREATE TABLE IF NOT EXISTS personas (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            persona_message TEXT NOT NULL DEFAULT '',
            is_published BOOLEAN NOT NULL DEFAULT FALSE,
            user_id TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'PERSONA',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#],
    },
    Migration {
        version: 5,
        name: "extensions",
        statements: &[r#"
        CREATE TABLE IF NOT EXISTS extensions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            execution_steps TEXT NOT NULL DEFAULT '',
            headers JSONB NOT NULL DEFAULT '[]',
            functions JSONB NOT NULL DEFAULT '[]',
            is_published BOOLEAN NOT NULL DEFAULT FALSE,
            user_id TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'EXTENSION',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#],
    },
    Migration {
        version: 6,
        name: "documents",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                page_content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{}',
                embedding vector(1536) NOT NULL,
                user_id TEXT NOT NULL,
                chat_thread_id TEXT,
                is_admin_kb BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS documents_owner_thread_idx
            ON documents (user_id, chat_thread_id)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS documents_embedding_idx
            ON documents USING hnsw (embedding vector_cosine_ops)
            "#,
        ],
    },
    Migration {
        version: 7,
        name: "chat_messages",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                chat_thread_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                multi_modal_image TEXT,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                type TEXT NOT NULL DEFAULT 'CHAT_MESSAGE',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS chat_messages_thread_idx
            ON chat_messages (chat_thread_id, created_at)
            "#,
        ],
    },
    Migration {
        version: 8,
        name: "chat_documents",
        statements: &[r#"
        CREATE TABLE IF NOT EXISTS chat_documents (
            id TEXT PRIMARY KEY,
            chat_thread_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            type TEXT NOT NULL DEFAULT 'CHAT_DOCUMENT',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#],
    },
    Migration {
        version: 9,
        name: "prompts",
        statements: &[r#"
        CREATE TABLE IF NOT EXISTS prompts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            is_published BOOLEAN NOT NULL DEFAULT FALSE,
            user_id TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'PROMPT',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#],
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Returns the number of migrations applied. Any SQL failure aborts the run
/// and is returned as-is; already applied steps stay applied.
pub async fn initialize_schema(pool: &PgPool) -> Result<usize> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    let applied = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT version FROM schema_migrations
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut count = 0;
    for migration in pending(MIGRATIONS, &applied) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying schema migration"
        );

        for statement in migration.statements {
            sqlx::query(*statement).execute(pool).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO schema_migrations (version, name)
            VALUES ($1, $2)
            ON CONFLICT (version) DO NOTHING
            "#,
        )
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

        count += 1;
    }

    debug!(applied = count, "Schema up to date");
    Ok(count)
}

/// Migrations whose version is not in `applied`, in order.
fn pending<'a>(
    migrations: &'a [Migration],
    applied: &'a [i64],
) -> impl Iterator<Item = &'a Migration> + 'a {
    migrations
        .iter()
        .filter(move |migration| !applied.contains(&migration.version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_strictly_increase() {
        for pair in MIGRATIONS.windows(2) {
            assert!(
                pair[0].version < pair[1].version,
                "{} must come before {}",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn test_every_statement_is_guarded() {
        for migration in MIGRATIONS {
            for statement in migration.statements {
                assert!(
                    statement.contains("IF NOT EXISTS"),
                    "unguarded statement in {}",
                    migration.name
                );
            }
        }
    }

    #[test]
    fn test_schema_covers_required_tables() {
        let sql: String = MIGRATIONS
            .iter()
            .flat_map(|m| m.statements.iter().copied())
            .collect();
        for table in [
            "chat_threads",
            "chat_citations",
            "personas",
            "extensions",
            "documents",
            "chat_messages",
            "chat_documents",
            "prompts",
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {} ", table)),
                "missing table {}",
                table
            );
        }
    }

    #[test]
    fn test_extension_comes_first() {
        assert!(MIGRATIONS[0].statements[0].contains("CREATE EXTENSION"));
    }

    #[test]
    fn test_embedding_dimension_matches_column() {
        let documents = MIGRATIONS.iter().find(|m| m.name == "documents").unwrap();
        let column = format!("vector({})", EMBEDDING_DIMENSIONS);
        assert!(documents.statements[0].contains(&column));
    }

    #[test]
    fn test_pending_skips_applied() {
        let applied = vec![1, 2, 3];
        let versions: Vec<i64> = pending(MIGRATIONS, &applied).map(|m| m.version).collect();
        assert_eq!(versions, vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_pending_all_applied_is_empty() {
        let applied: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert_eq!(pending(MIGRATIONS, &applied).count(), 0);
    }
}

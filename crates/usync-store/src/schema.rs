use rusqlite::Connection;

use crate::error::{classify, Result};

/// Ordered, forward-only migrations. Each entry's index+1 is its
/// schema version; `run_migrations` applies every migration whose version
/// is greater than the value currently in the `schema_version` table,
/// inside one transaction, so a crash mid-migration leaves the prior
/// version intact rather than a half-applied schema.
const MIGRATIONS: &[(&i64, &str)] = &[
    (&1, MIGRATION_1),
    (&2, MIGRATION_2),
    (&3, MIGRATION_3),
];

const MIGRATION_1: &str = r#"
CREATE TABLE users (
    user_id      BLOB PRIMARY KEY,
    display_name TEXT NOT NULL,
    public_key   BLOB NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE folders (
    db_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_unique_id BLOB NOT NULL UNIQUE,
    owner_id         BLOB NOT NULL REFERENCES users(user_id),
    root_path        TEXT NOT NULL UNIQUE,
    state            TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE TABLE files (
    file_id        INTEGER NOT NULL,
    folder_db_id   INTEGER NOT NULL REFERENCES folders(db_id),
    relative_path  TEXT NOT NULL,
    size           INTEGER NOT NULL,
    content_hash   BLOB NOT NULL,
    segment_count  INTEGER NOT NULL,
    version        INTEGER NOT NULL,
    PRIMARY KEY (folder_db_id, file_id),
    UNIQUE (folder_db_id, relative_path)
);

CREATE TABLE segments (
    folder_db_id     INTEGER NOT NULL,
    file_id          INTEGER NOT NULL,
    segment_index    INTEGER NOT NULL,
    redundancy_group INTEGER NOT NULL,
    size             INTEGER NOT NULL,
    plaintext_hash   BLOB NOT NULL,
    ciphertext_hash  BLOB,
    usenet_subject   TEXT NOT NULL,
    message_id       TEXT,
    packed_with      TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (folder_db_id, file_id, segment_index, redundancy_group),
    FOREIGN KEY (folder_db_id, file_id) REFERENCES files(folder_db_id, file_id)
);
"#;

const MIGRATION_2: &str = r#"
CREATE TABLE shares (
    share_id        BLOB PRIMARY KEY,
    folder_db_id    INTEGER NOT NULL REFERENCES folders(db_id),
    share_type      TEXT NOT NULL,
    encrypted_index BLOB NOT NULL,
    owner_id        BLOB NOT NULL REFERENCES users(user_id),
    created_at      TEXT NOT NULL,
    expires_at      TEXT
);

CREATE TABLE access_grants (
    share_id   BLOB NOT NULL REFERENCES shares(share_id),
    commitment BLOB NOT NULL,
    PRIMARY KEY (share_id, commitment)
);
"#;

const MIGRATION_3: &str = r#"
ALTER TABLE access_grants ADD COLUMN wrapped_key BLOB;
"#;

pub(crate) fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(classify)?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .map_err(classify)?;

    let tx = conn.transaction().map_err(classify)?;
    for (version, sql) in MIGRATIONS {
        let version = **version;
        if version <= current {
            continue;
        }
        tx.execute_batch(sql).map_err(classify)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(classify)?;
        tracing::debug!(version, "applied store migration");
    }
    tx.commit().map_err(classify)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }
}

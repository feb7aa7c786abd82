use rusqlite::Connection;
use tracing::info;

use crate::error::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                karma       INTEGER NOT NULL DEFAULT 0,
                text_avatar TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE characters (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                type        TEXT NOT NULL,
                description TEXT NOT NULL,
                text_avatar TEXT NOT NULL,
                user_id     INTEGER REFERENCES users(id),
                karma       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_characters_user ON characters(user_id);

            CREATE TABLE accusations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT NOT NULL,
                is_custom   INTEGER NOT NULL DEFAULT 0,
                created_by  INTEGER REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE trials (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                character_id    INTEGER NOT NULL REFERENCES characters(id),
                accusation_id   INTEGER NOT NULL REFERENCES accusations(id),
                defense_title   TEXT NOT NULL,
                defense_content TEXT NOT NULL,
                user_id         INTEGER REFERENCES users(id),
                karma_innocent  INTEGER NOT NULL DEFAULT 0,
                karma_guilty    INTEGER NOT NULL DEFAULT 0,
                is_active       INTEGER NOT NULL DEFAULT 1,
                end_time        TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_trials_active ON trials(is_active);

            CREATE TABLE votes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                trial_id    INTEGER NOT NULL REFERENCES trials(id),
                user_id     INTEGER NOT NULL REFERENCES users(id),
                is_innocent INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(trial_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}

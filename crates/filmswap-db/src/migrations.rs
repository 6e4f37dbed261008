use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
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
            -- At most one exchange per database
            CREATE TABLE exchange (
                id                  INTEGER PRIMARY KEY CHECK (id = 1),
                phase               TEXT NOT NULL DEFAULT 'JOIN',
                channel_ref         INTEGER,
                join_message_ref    INTEGER
            );

            CREATE TABLE participants (
                participant_id  INTEGER PRIMARY KEY,
                display_name    TEXT NOT NULL,
                letter          TEXT,
                gift            TEXT,
                watched         INTEGER NOT NULL DEFAULT 0,
                santa_id        INTEGER,
                giftee_id       INTEGER,
                joined_at       TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (santa_id IS NULL OR santa_id != participant_id),
                CHECK (giftee_id IS NULL OR giftee_id != participant_id)
            );

            CREATE INDEX idx_participants_santa ON participants(santa_id);
            CREATE INDEX idx_participants_giftee ON participants(giftee_id);

            CREATE TABLE banned (
                participant_id  INTEGER PRIMARY KEY,
                banned_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (letterboxd handle)");
        conn.execute_batch(
            "
            ALTER TABLE participants ADD COLUMN letterboxd TEXT;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

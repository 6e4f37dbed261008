use anyhow::Result;
use filmswap_types::ParticipantId;
use rusqlite::Connection;

use crate::models::BannedRow;

pub fn is_banned(conn: &Connection, id: ParticipantId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM banned WHERE participant_id = ?1",
        [id.0],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Returns `false` if the id was already banned.
pub fn insert(conn: &Connection, id: ParticipantId) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO banned (participant_id) VALUES (?1)",
        [id.0],
    )?;
    Ok(inserted == 1)
}

/// Returns `false` if the id was not banned.
pub fn delete(conn: &Connection, id: ParticipantId) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM banned WHERE participant_id = ?1", [id.0])?;
    Ok(deleted == 1)
}

pub fn list(conn: &Connection) -> Result<Vec<BannedRow>> {
    let mut stmt =
        conn.prepare("SELECT participant_id, banned_at FROM banned ORDER BY participant_id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(BannedRow {
                participant_id: row.get(0)?,
                banned_at: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

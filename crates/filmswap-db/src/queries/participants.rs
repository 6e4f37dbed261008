use anyhow::{Result, bail};
use filmswap_types::{Participant, ParticipantId};
use rusqlite::{Connection, Row};

use super::OptionalExt;

const COLUMNS: &str =
    "participant_id, display_name, letter, gift, watched, santa_id, giftee_id, letterboxd";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: ParticipantId(row.get(0)?),
        display_name: row.get(1)?,
        letter: row.get(2)?,
        gift: row.get(3)?,
        watched: row.get(4)?,
        santa_id: row.get::<_, Option<i64>>(5)?.map(ParticipantId),
        giftee_id: row.get::<_, Option<i64>>(6)?.map(ParticipantId),
        letterboxd: row.get(7)?,
    })
}

fn query_list(conn: &Connection, filter: &str) -> Result<Vec<Participant>> {
    let sql = format!("SELECT {COLUMNS} FROM participants {filter} ORDER BY participant_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Reads --

pub fn get(conn: &Connection, id: ParticipantId) -> Result<Option<Participant>> {
    let sql = format!("SELECT {COLUMNS} FROM participants WHERE participant_id = ?1");
    conn.query_row(&sql, [id.0], from_row).optional()
}

pub fn list_all(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(conn, "")
}

pub fn list_without_letter(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(conn, "WHERE letter IS NULL")
}

/// Participants with a letter who have not submitted a gift.
pub fn list_without_gift(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(
        conn,
        "WHERE letter IS NOT NULL AND (gift IS NULL OR trim(gift) = '')",
    )
}

pub fn list_without_giftee(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(conn, "WHERE letter IS NOT NULL AND giftee_id IS NULL")
}

pub fn list_without_santa(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(conn, "WHERE letter IS NOT NULL AND santa_id IS NULL")
}

pub fn list_not_watched(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(conn, "WHERE letter IS NOT NULL AND watched = 0")
}

/// Participants who have written a letter and are not yet in a ring.
pub fn list_unmatched_with_letter(conn: &Connection) -> Result<Vec<Participant>> {
    query_list(conn, "WHERE letter IS NOT NULL AND santa_id IS NULL")
}

/// Number of participants currently in a ring.
pub fn count_matched(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM participants WHERE giftee_id IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Number of rows that still point at `id` through either link column.
pub fn count_references_to(conn: &Connection, id: ParticipantId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM participants WHERE santa_id = ?1 OR giftee_id = ?1",
        [id.0],
        |r| r.get(0),
    )?;
    Ok(count)
}

// -- Writes --

pub fn insert(conn: &Connection, id: ParticipantId, display_name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO participants (participant_id, display_name) VALUES (?1, ?2)",
        (id.0, display_name),
    )?;
    Ok(())
}

/// Returns `false` if there was no such participant.
pub fn delete(conn: &Connection, id: ParticipantId) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM participants WHERE participant_id = ?1", [id.0])?;
    Ok(deleted == 1)
}

pub fn set_display_name(conn: &Connection, id: ParticipantId, display_name: &str) -> Result<()> {
    update_one(
        conn,
        "UPDATE participants SET display_name = ?2 WHERE participant_id = ?1",
        id,
        display_name,
    )
}

pub fn set_letter(conn: &Connection, id: ParticipantId, letter: Option<&str>) -> Result<()> {
    update_one(
        conn,
        "UPDATE participants SET letter = ?2 WHERE participant_id = ?1",
        id,
        letter,
    )
}

pub fn set_gift(conn: &Connection, id: ParticipantId, gift: Option<&str>) -> Result<()> {
    update_one(
        conn,
        "UPDATE participants SET gift = ?2 WHERE participant_id = ?1",
        id,
        gift,
    )
}

pub fn set_watched(conn: &Connection, id: ParticipantId, watched: bool) -> Result<()> {
    update_one(
        conn,
        "UPDATE participants SET watched = ?2 WHERE participant_id = ?1",
        id,
        watched,
    )
}

pub fn set_letterboxd(conn: &Connection, id: ParticipantId, handle: Option<&str>) -> Result<()> {
    update_one(
        conn,
        "UPDATE participants SET letterboxd = ?2 WHERE participant_id = ?1",
        id,
        handle,
    )
}

/// Make `santa` gift to `giftee`. Writes both sides of the link.
pub fn link(conn: &Connection, santa: ParticipantId, giftee: ParticipantId) -> Result<()> {
    update_one(
        conn,
        "UPDATE participants SET giftee_id = ?2 WHERE participant_id = ?1",
        santa,
        giftee.0,
    )?;
    update_one(
        conn,
        "UPDATE participants SET santa_id = ?2 WHERE participant_id = ?1",
        giftee,
        santa.0,
    )
}

/// Clear both link columns of a single participant.
pub fn clear_links(conn: &Connection, id: ParticipantId) -> Result<()> {
    let changed = conn.execute(
        "UPDATE participants SET santa_id = NULL, giftee_id = NULL WHERE participant_id = ?1",
        [id.0],
    )?;
    if changed != 1 {
        bail!("Participant not found: {}", id);
    }
    Ok(())
}

pub fn clear_all_links(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE participants SET santa_id = NULL, giftee_id = NULL",
        [],
    )?)
}

/// Unlink everyone, drop every gift and watched flag. Letters are kept.
pub fn reset_for_new_cycle(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE participants SET santa_id = NULL, giftee_id = NULL, gift = NULL, watched = 0",
        [],
    )?)
}

pub fn reset_watched(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("UPDATE participants SET watched = 0", [])?)
}

fn update_one<V: rusqlite::ToSql>(
    conn: &Connection,
    sql: &str,
    id: ParticipantId,
    value: V,
) -> Result<()> {
    let changed = conn.execute(sql, rusqlite::params![id.0, value])?;
    if changed != 1 {
        bail!("Participant not found: {}", id);
    }
    Ok(())
}

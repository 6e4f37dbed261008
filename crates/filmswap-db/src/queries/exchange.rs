use anyhow::{Context, Result, bail};
use filmswap_types::{Exchange, Phase};
use rusqlite::Connection;

use super::OptionalExt;

pub fn get(conn: &Connection) -> Result<Option<Exchange>> {
    let row = conn
        .query_row(
            "SELECT phase, channel_ref, join_message_ref FROM exchange WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((phase, channel_ref, join_message_ref)) = row else {
        return Ok(None);
    };

    let phase: Phase = phase
        .parse()
        .with_context(|| "Corrupt phase in exchange row")?;

    Ok(Some(Exchange {
        phase,
        channel_ref,
        join_message_ref,
    }))
}

/// Insert the singleton exchange in the join phase.
/// Returns `false` if it already existed.
pub fn create(conn: &Connection) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO exchange (id, phase) VALUES (1, ?1)",
        [Phase::Join.as_str()],
    )?;
    Ok(inserted == 1)
}

pub fn set_phase(conn: &Connection, phase: Phase) -> Result<()> {
    expect_one(conn.execute(
        "UPDATE exchange SET phase = ?1 WHERE id = 1",
        [phase.as_str()],
    )?)
}

pub fn set_channel(conn: &Connection, channel_ref: i64) -> Result<()> {
    expect_one(conn.execute(
        "UPDATE exchange SET channel_ref = ?1 WHERE id = 1",
        [channel_ref],
    )?)
}

pub fn set_join_message(conn: &Connection, message_ref: i64) -> Result<()> {
    expect_one(conn.execute(
        "UPDATE exchange SET join_message_ref = ?1 WHERE id = 1",
        [message_ref],
    )?)
}

fn expect_one(changed: usize) -> Result<()> {
    if changed != 1 {
        bail!("No exchange configured");
    }
    Ok(())
}

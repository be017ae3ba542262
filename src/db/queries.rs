use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Bed, BedStatus, BedWithStay, Hotel, Role, Stay, User};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_optional_timestamp(s: Option<String>) -> Option<NaiveDateTime> {
    s.as_deref().map(parse_timestamp)
}

// ── Users ──

pub fn get_user_by_username(conn: &Connection, username: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, password_hash, role, created_at FROM users WHERE username = ?1",
            params![username],
            |row| {
                let role: String = row.get(3)?;
                let created_at: String = row.get(4)?;
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    role: Role::parse(&role),
                    created_at: parse_timestamp(&created_at),
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    role: Role,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
        params![username, password_hash, role.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_users(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

// ── Hotels ──

pub fn list_hotels(conn: &Connection) -> anyhow::Result<Vec<Hotel>> {
    let mut stmt =
        conn.prepare("SELECT id, name, description, created_at FROM hotels ORDER BY id ASC")?;
    let rows = stmt.query_map([], parse_hotel_row)?;

    let mut hotels = vec![];
    for row in rows {
        hotels.push(row?);
    }
    Ok(hotels)
}

pub fn get_hotel(conn: &Connection, id: i64) -> anyhow::Result<Option<Hotel>> {
    let hotel = conn
        .query_row(
            "SELECT id, name, description, created_at FROM hotels WHERE id = ?1",
            params![id],
            parse_hotel_row,
        )
        .optional()?;
    Ok(hotel)
}

pub fn insert_hotel(conn: &Connection, name: &str, description: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO hotels (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_hotel_row(row: &rusqlite::Row) -> rusqlite::Result<Hotel> {
    let created_at: String = row.get(3)?;
    Ok(Hotel {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_timestamp(&created_at),
    })
}

// ── Beds ──

/// New beds always start available; only the occupancy service changes status.
pub fn insert_bed(
    conn: &Connection,
    hotel_id: i64,
    bed_number: &str,
    position: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO beds (hotel_id, bed_number, position, status) VALUES (?1, ?2, ?3, 'available')",
        params![hotel_id, bed_number, position],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_bed(conn: &Connection, id: i64) -> anyhow::Result<Option<Bed>> {
    let bed = conn
        .query_row(
            "SELECT id, hotel_id, bed_number, position, status, created_at FROM beds WHERE id = ?1",
            params![id],
            parse_bed_row,
        )
        .optional()?;
    Ok(bed)
}

pub fn list_beds_with_active_stay(
    conn: &Connection,
    hotel_id: i64,
) -> anyhow::Result<Vec<BedWithStay>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.hotel_id, b.bed_number, b.position, b.status, b.created_at,
                s.id, s.full_name, s.mobile_number, s.check_in, s.planned_check_out,
                s.amount_paid, s.payment_mode, s.created_at
         FROM beds b
         LEFT JOIN stays s ON s.bed_id = b.id AND s.check_out IS NULL
         WHERE b.hotel_id = ?1
         ORDER BY b.position, b.bed_number",
    )?;

    let rows = stmt.query_map(params![hotel_id], |row| {
        let bed = parse_bed_row(row)?;
        let stay_id: Option<i64> = row.get(6)?;
        let active_stay = match stay_id {
            Some(id) => {
                let check_in: String = row.get(9)?;
                let created_at: String = row.get(13)?;
                Some(Stay {
                    id,
                    bed_id: bed.id,
                    full_name: row.get(7)?,
                    mobile_number: row.get(8)?,
                    check_in: parse_timestamp(&check_in),
                    planned_check_out: parse_optional_timestamp(row.get(10)?),
                    check_out: None,
                    amount_paid: row.get(11)?,
                    payment_mode: row.get(12)?,
                    created_at: parse_timestamp(&created_at),
                })
            }
            None => None,
        };
        Ok(BedWithStay { bed, active_stay })
    })?;

    let mut beds = vec![];
    for row in rows {
        beds.push(row?);
    }
    Ok(beds)
}

fn parse_bed_row(row: &rusqlite::Row) -> rusqlite::Result<Bed> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(Bed {
        id: row.get(0)?,
        hotel_id: row.get(1)?,
        bed_number: row.get(2)?,
        position: row.get(3)?,
        status: BedStatus::parse(&status),
        created_at: parse_timestamp(&created_at),
    })
}

// ── Stays ──

pub fn get_stay(conn: &Connection, id: i64) -> anyhow::Result<Option<Stay>> {
    let stay = conn
        .query_row(
            "SELECT id, bed_id, full_name, mobile_number, check_in, planned_check_out, check_out,
                    amount_paid, payment_mode, created_at
             FROM stays WHERE id = ?1",
            params![id],
            |row| {
                let check_in: String = row.get(4)?;
                let created_at: String = row.get(9)?;
                Ok(Stay {
                    id: row.get(0)?,
                    bed_id: row.get(1)?,
                    full_name: row.get(2)?,
                    mobile_number: row.get(3)?,
                    check_in: parse_timestamp(&check_in),
                    planned_check_out: parse_optional_timestamp(row.get(5)?),
                    check_out: parse_optional_timestamp(row.get(6)?),
                    amount_paid: row.get(7)?,
                    payment_mode: row.get(8)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        )
        .optional()?;
    Ok(stay)
}

pub fn count_stays_for_bed(conn: &Connection, bed_id: i64) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM stays WHERE bed_id = ?1",
        params![bed_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

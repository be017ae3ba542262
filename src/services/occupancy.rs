//! Bed occupancy transitions.
//!
//! A bed's `status` mirrors whether an active stay references it. Both writes
//! happen inside one `BEGIN IMMEDIATE` transaction: SQLite takes its write
//! lock at BEGIN, so no other writer can interleave between the locked read,
//! the precondition check and the two updates. `rusqlite::Transaction` rolls
//! back on drop, which covers every early return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::db::queries::format_timestamp;
use crate::models::{BedStatus, GuestDetails};

pub type StayId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum OccupancyError {
    #[error("bed {0} not found")]
    BedNotFound(i64),

    #[error("bed {0} is not available")]
    BedUnavailable(i64),

    #[error("stay {0} not found or already checked out")]
    StayNotFound(i64),

    #[error("request cancelled before commit")]
    Cancelled,

    #[error("ledger inconsistency: {0}")]
    Inconsistent(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl OccupancyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OccupancyError::BedNotFound(_) | OccupancyError::StayNotFound(_) => {
                ErrorKind::NotFound
            }
            OccupancyError::BedUnavailable(_) => ErrorKind::Conflict,
            OccupancyError::Cancelled
            | OccupancyError::Inconsistent(_)
            | OccupancyError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Shared flag telling a blocking worker its caller has gone away.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns a guard that cancels this token when dropped unless disarmed.
    /// Held across the await on the worker, it trips when the request future
    /// is dropped mid-flight.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

pub struct CancelOnDrop {
    token: Option<Cancellation>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClosedStay {
    pub stay_id: StayId,
    pub bed_id: i64,
    pub check_out: NaiveDateTime,
}

/// Claims an available bed and records an active stay on it.
pub fn open_stay(
    conn: &mut Connection,
    bed_id: i64,
    guest: &GuestDetails,
    cancel: &Cancellation,
) -> Result<StayId, OccupancyError> {
    let tx = begin_exclusive(conn)?;
    ensure_live(cancel)?;

    let status = lock_bed(&tx, bed_id)?.ok_or(OccupancyError::BedNotFound(bed_id))?;
    if status != BedStatus::Available {
        tracing::debug!(bed_id, "bed already occupied");
        return Err(OccupancyError::BedUnavailable(bed_id));
    }

    tx.execute(
        "INSERT INTO stays (full_name, mobile_number, check_in, planned_check_out, check_out, amount_paid, payment_mode, bed_id)
         VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7)",
        params![
            guest.full_name,
            guest.mobile_number,
            format_timestamp(&guest.check_in),
            guest.planned_check_out.as_ref().map(format_timestamp),
            guest.amount_paid,
            guest.payment_mode,
            bed_id,
        ],
    )?;
    let stay_id = tx.last_insert_rowid();

    set_bed_status(&tx, bed_id, BedStatus::Occupied)?;
    commit_unless_cancelled(tx, cancel)?;

    tracing::info!(bed_id, stay_id, "stay opened");
    Ok(stay_id)
}

/// Closes an active stay and releases its bed.
pub fn close_stay(
    conn: &mut Connection,
    stay_id: StayId,
    cancel: &Cancellation,
) -> Result<ClosedStay, OccupancyError> {
    let tx = begin_exclusive(conn)?;
    ensure_live(cancel)?;

    let bed_id = lock_active_stay(&tx, stay_id)?.ok_or(OccupancyError::StayNotFound(stay_id))?;

    let check_out = Utc::now().naive_utc();
    let closed = tx.execute(
        "UPDATE stays SET check_out = ?1 WHERE id = ?2 AND check_out IS NULL",
        params![format_timestamp(&check_out), stay_id],
    )?;
    if closed != 1 {
        return Err(OccupancyError::Inconsistent(format!(
            "closing stay {stay_id} touched {closed} rows"
        )));
    }

    set_bed_status(&tx, bed_id, BedStatus::Available)?;
    commit_unless_cancelled(tx, cancel)?;

    tracing::info!(bed_id, stay_id, "stay closed");
    Ok(ClosedStay {
        stay_id,
        bed_id,
        check_out,
    })
}

// ── Locking helpers ──

fn begin_exclusive(conn: &mut Connection) -> Result<Transaction<'_>, OccupancyError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn ensure_live(cancel: &Cancellation) -> Result<(), OccupancyError> {
    if cancel.is_cancelled() {
        return Err(OccupancyError::Cancelled);
    }
    Ok(())
}

fn lock_bed(tx: &Transaction<'_>, bed_id: i64) -> Result<Option<BedStatus>, OccupancyError> {
    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM beds WHERE id = ?1",
            params![bed_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(status.as_deref().map(BedStatus::parse))
}

/// Returns the bed of `stay_id` only while that stay is still open.
fn lock_active_stay(tx: &Transaction<'_>, stay_id: StayId) -> Result<Option<i64>, OccupancyError> {
    let bed_id = tx
        .query_row(
            "SELECT bed_id FROM stays WHERE id = ?1 AND check_out IS NULL",
            params![stay_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(bed_id)
}

fn set_bed_status(
    tx: &Transaction<'_>,
    bed_id: i64,
    status: BedStatus,
) -> Result<(), OccupancyError> {
    let changed = tx.execute(
        "UPDATE beds SET status = ?1 WHERE id = ?2",
        params![status.as_str(), bed_id],
    )?;
    if changed != 1 {
        return Err(OccupancyError::Inconsistent(format!(
            "marking bed {bed_id} {} touched {changed} rows",
            status.as_str()
        )));
    }
    Ok(())
}

fn commit_unless_cancelled(tx: Transaction<'_>, cancel: &Cancellation) -> Result<(), OccupancyError> {
    if cancel.is_cancelled() {
        tx.rollback()?;
        return Err(OccupancyError::Cancelled);
    }
    tx.commit()?;
    Ok(())
}

// ── Audit ──

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerDiscrepancy {
    pub bed_id: i64,
    pub status: String,
    pub active_stays: i64,
}

/// Lists beds whose status disagrees with their number of active stays.
pub fn audit(conn: &Connection) -> anyhow::Result<Vec<LedgerDiscrepancy>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.status, COUNT(s.id)
         FROM beds b
         LEFT JOIN stays s ON s.bed_id = b.id AND s.check_out IS NULL
         GROUP BY b.id, b.status
         ORDER BY b.id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(LedgerDiscrepancy {
            bed_id: row.get(0)?,
            status: row.get(1)?,
            active_stays: row.get(2)?,
        })
    })?;

    let mut discrepancies = vec![];
    for row in rows {
        let entry = row?;
        let consistent = match entry.status.as_str() {
            "available" => entry.active_stays == 0,
            "occupied" => entry.active_stays == 1,
            _ => false,
        };
        if !consistent {
            discrepancies.push(entry);
        }
    }
    Ok(discrepancies)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::db::{queries, Database};

    struct Ledger {
        _dir: tempfile::TempDir,
        db: Database,
        hotel_id: i64,
    }

    impl Ledger {
        fn new() -> Self {
            Self::with_timeout(Duration::from_secs(10))
        }

        fn with_timeout(lock_timeout: Duration) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::open(dir.path().join("ledger.db"), lock_timeout).unwrap();
            let conn = db.connect().unwrap();
            let hotel_id = queries::insert_hotel(&conn, "Harbour Hostel", "").unwrap();
            Self {
                _dir: dir,
                db,
                hotel_id,
            }
        }

        fn conn(&self) -> Connection {
            self.db.connect().unwrap()
        }

        fn add_bed(&self, number: &str) -> i64 {
            queries::insert_bed(&self.conn(), self.hotel_id, number, "").unwrap()
        }

        fn status(&self, bed_id: i64) -> BedStatus {
            queries::get_bed(&self.conn(), bed_id).unwrap().unwrap().status
        }

        fn stay_count(&self) -> i64 {
            self.conn()
                .query_row("SELECT COUNT(*) FROM stays", [], |row| row.get(0))
                .unwrap()
        }
    }

    fn guest(name: &str) -> GuestDetails {
        GuestDetails {
            full_name: name.to_string(),
            mobile_number: "+15550001111".to_string(),
            check_in: NaiveDateTime::parse_from_str("2025-06-16 14:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            planned_check_out: None,
            amount_paid: 35.0,
            payment_mode: "cash".to_string(),
        }
    }

    #[test]
    fn test_check_in_check_out_scenario() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("5");
        let mut conn = ledger.conn();
        let cancel = Cancellation::new();

        let alice = open_stay(&mut conn, bed, &guest("Alice"), &cancel).unwrap();
        assert_eq!(alice, 1);
        assert_eq!(ledger.status(bed), BedStatus::Occupied);

        let err = open_stay(&mut conn, bed, &guest("Bob"), &cancel).unwrap_err();
        assert!(matches!(err, OccupancyError::BedUnavailable(b) if b == bed));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(ledger.status(bed), BedStatus::Occupied);
        assert_eq!(ledger.stay_count(), 1);

        let closed = close_stay(&mut conn, alice, &cancel).unwrap();
        assert_eq!(closed.bed_id, bed);
        assert_eq!(ledger.status(bed), BedStatus::Available);

        let stay = queries::get_stay(&conn, alice).unwrap().unwrap();
        assert!(!stay.is_active());

        let err = close_stay(&mut conn, alice, &cancel).unwrap_err();
        assert!(matches!(err, OccupancyError::StayNotFound(s) if s == alice));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(ledger.status(bed), BedStatus::Available);
    }

    #[test]
    fn test_open_missing_bed_writes_nothing() {
        let ledger = Ledger::new();
        let mut conn = ledger.conn();

        let err = open_stay(&mut conn, 999, &guest("Alice"), &Cancellation::new()).unwrap_err();
        assert!(matches!(err, OccupancyError::BedNotFound(999)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(ledger.stay_count(), 0);
    }

    #[test]
    fn test_close_unknown_stay() {
        let ledger = Ledger::new();
        let mut conn = ledger.conn();

        let err = close_stay(&mut conn, 7, &Cancellation::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_planned_check_out_does_not_close_stay() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let mut conn = ledger.conn();

        let mut g = guest("Alice");
        g.planned_check_out = Some(g.check_in + chrono::Duration::days(2));
        let id = open_stay(&mut conn, bed, &g, &Cancellation::new()).unwrap();

        let stay = queries::get_stay(&conn, id).unwrap().unwrap();
        assert!(stay.is_active());
        assert_eq!(stay.planned_check_out, g.planned_check_out);
    }

    #[test]
    fn test_failed_insert_rolls_back() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let mut conn = ledger.conn();
        conn.execute_batch(
            "CREATE TRIGGER fail_stay_insert BEFORE INSERT ON stays
             WHEN NEW.full_name = 'Mallory'
             BEGIN SELECT RAISE(ABORT, 'simulated insert failure'); END;",
        )
        .unwrap();

        let err = open_stay(&mut conn, bed, &guest("Mallory"), &Cancellation::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(ledger.status(bed), BedStatus::Available);
        assert_eq!(ledger.stay_count(), 0);

        // the lock was released: the bed can still be claimed
        open_stay(&mut conn, bed, &guest("Alice"), &Cancellation::new()).unwrap();
    }

    #[test]
    fn test_failed_bed_update_rolls_back_stay() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let mut conn = ledger.conn();
        conn.execute_batch(
            "CREATE TRIGGER fail_bed_update BEFORE UPDATE ON beds
             WHEN NEW.status = 'occupied'
             BEGIN SELECT RAISE(ABORT, 'simulated update failure'); END;",
        )
        .unwrap();

        let err = open_stay(&mut conn, bed, &guest("Alice"), &Cancellation::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(ledger.status(bed), BedStatus::Available);
        assert_eq!(ledger.stay_count(), 0);
    }

    #[test]
    fn test_cancelled_request_commits_nothing() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let mut conn = ledger.conn();

        let cancel = Cancellation::new();
        cancel.cancel();
        let err = open_stay(&mut conn, bed, &guest("Alice"), &cancel).unwrap_err();
        assert!(matches!(err, OccupancyError::Cancelled));
        assert_eq!(ledger.status(bed), BedStatus::Available);
        assert_eq!(ledger.stay_count(), 0);
    }

    #[test]
    fn test_cancel_on_drop_guard() {
        let token = Cancellation::new();
        drop(token.drop_guard());
        assert!(token.is_cancelled());

        let token = Cancellation::new();
        token.drop_guard().disarm();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_lock_timeout_is_internal_and_leaves_ledger_untouched() {
        let ledger = Ledger::with_timeout(Duration::from_millis(50));
        let bed = ledger.add_bed("1");

        let mut holder = ledger.conn();
        let held = holder
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .unwrap();

        let mut conn = ledger.conn();
        let err = open_stay(&mut conn, bed, &guest("Alice"), &Cancellation::new()).unwrap_err();
        assert!(matches!(err, OccupancyError::Store(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);

        drop(held);
        assert_eq!(ledger.status(bed), BedStatus::Available);
        assert_eq!(ledger.stay_count(), 0);
    }

    #[test]
    fn test_concurrent_opens_admit_exactly_one() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let db = ledger.db.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut conn = db.connect().unwrap();
                    barrier.wait();
                    open_stay(
                        &mut conn,
                        bed,
                        &guest(&format!("Guest {i}")),
                        &Cancellation::new(),
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::Conflict))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(conflicts, workers - 1);
        assert_eq!(ledger.status(bed), BedStatus::Occupied);
        assert_eq!(ledger.stay_count(), 1);
    }

    #[test]
    fn test_concurrent_closes_release_once() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let stay = open_stay(&mut ledger.conn(), bed, &guest("Alice"), &Cancellation::new())
            .unwrap();

        let workers = 4;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let db = ledger.db.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut conn = db.connect().unwrap();
                    barrier.wait();
                    close_stay(&mut conn, stay, &Cancellation::new())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::NotFound));
        assert_eq!(ledger.status(bed), BedStatus::Available);
    }

    #[test]
    fn test_invariant_holds_across_mixed_operations() {
        let ledger = Ledger::new();
        let beds: Vec<i64> = (1..=3).map(|n| ledger.add_bed(&n.to_string())).collect();
        let mut conn = ledger.conn();
        let cancel = Cancellation::new();
        let mut active: Vec<Option<StayId>> = vec![None; beds.len()];

        // deterministic pseudo-random walk over open/close attempts
        let mut seed: u64 = 0x5eed;
        for step in 0..60 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let slot = (seed >> 33) as usize % beds.len();
            let opening = (seed >> 40) % 2 == 0;

            if opening {
                let result = open_stay(&mut conn, beds[slot], &guest(&format!("g{step}")), &cancel);
                match active[slot] {
                    Some(_) => assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict),
                    None => active[slot] = Some(result.unwrap()),
                }
            } else {
                let target = active[slot].unwrap_or(10_000 + step);
                let result = close_stay(&mut conn, target, &cancel);
                match active[slot].take() {
                    Some(_) => assert_eq!(result.unwrap().bed_id, beds[slot]),
                    None => assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound),
                }
            }

            assert!(audit(&conn).unwrap().is_empty(), "ledger drifted at step {step}");
        }
    }

    #[test]
    fn test_audit_reports_drift() {
        let ledger = Ledger::new();
        let bed = ledger.add_bed("1");
        let conn = ledger.conn();
        conn.execute("UPDATE beds SET status = 'occupied' WHERE id = ?1", params![bed])
            .unwrap();

        let report = audit(&conn).unwrap();
        assert_eq!(
            report,
            vec![LedgerDiscrepancy {
                bed_id: bed,
                status: "occupied".to_string(),
                active_stays: 0,
            }]
        );
    }
}

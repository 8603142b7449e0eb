use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{Booking, Slot};
use crate::wal::{Record, Wal};

use super::{BookingStore, InMemoryStore, ScheduleStore, SlotStore};

enum WalCommand {
    Append {
        record: Record,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        records: Vec<Record>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends.
/// 4. One flush_sync for the whole batch.
/// 5. Answer every sender with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { record, response } => {
                let mut batch = vec![(record, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { record, response }) => batch.push((record, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Record, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Record, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (record, _) in batch {
        if let Err(e) = wal.append_buffered(record) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so half-buffered bytes do not leak into
    // the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { records, response } => {
            let result = Wal::write_compact_file(wal.path(), &records).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Store whose writes are logged to a WAL before they become visible in memory.
///
/// Validation runs against the in-memory state, then the record is appended and
/// fsynced (group commit), then applied. A failed append leaves memory untouched.
/// Same-key writers are serialized by the engine's lock table.
///
/// Commits hold `commit_gate` shared from append through apply; compaction holds
/// it exclusively from snapshot through file swap, so every acknowledged write is
/// either in the snapshot or appended after the swap.
pub struct WalStore {
    state: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    commit_gate: RwLock<()>,
}

impl WalStore {
    /// Replay `path` into memory and start the writer task. Must run inside a
    /// tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let records = Wal::recover(path)?;
        let wal = Wal::open(path)?;
        let state = InMemoryStore::new();
        let replayed = records.len();
        for record in records {
            apply(&state, record);
        }
        info!(
            path = %path.display(),
            records = replayed,
            slots = state.slot_count(),
            bookings = state.booking_count(),
            "wal replayed"
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));
        Ok(Self {
            state,
            wal_tx,
            commit_gate: RwLock::new(()),
        })
    }

    /// Read access to the materialized state.
    pub fn state(&self) -> &InMemoryStore {
        &self.state
    }

    async fn append(&self, record: Record) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { record, response: tx })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))??;
        Ok(())
    }

    /// Log then apply.
    async fn commit(&self, record: Record) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        self.append(record.clone()).await?;
        apply(&self.state, record);
        Ok(())
    }

    /// Rewrite the WAL with one record per live slot and booking.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let (slots, bookings) = self.state.snapshot();
        let mut records = Vec::with_capacity(bookings.len() + 1);
        if !slots.is_empty() {
            records.push(Record::SlotsSaved(slots));
        }
        records.extend(bookings.into_iter().map(Record::BookingSaved));

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { records, response: tx })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))??;
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Compact once the WAL has grown by `threshold` appends. Returns whether it ran.
    pub async fn compact_if_needed(&self, threshold: u64) -> Result<bool, EngineError> {
        let appends = self.appends_since_compact().await;
        if appends < threshold {
            debug!(appends, threshold, "compaction not needed");
            return Ok(false);
        }
        self.compact().await?;
        info!(appends, "wal compacted");
        Ok(true)
    }
}

fn apply(state: &InMemoryStore, record: Record) {
    match record {
        Record::SlotSaved(slot) => state.put_slot(slot),
        Record::SlotsSaved(slots) => slots.into_iter().for_each(|s| state.put_slot(s)),
        Record::BookingSaved(booking) => state.put_booking(booking),
        Record::Claimed { slot, booking } => state.put_claim(slot, booking),
        Record::Transitioned { booking, released } => state.put_transition(booking, released),
    }
}

#[async_trait]
impl SlotStore for WalStore {
    async fn find_slot(&self, id: Ulid) -> Result<Option<Slot>, EngineError> {
        Ok(self.state.get_slot(&id))
    }

    async fn find_slots_by_facility_and_date(
        &self,
        facility_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError> {
        Ok(self.state.slots_on(facility_id, date))
    }

    async fn exists_slots_for(&self, facility_id: Ulid, date: NaiveDate) -> Result<bool, EngineError> {
        Ok(self.state.has_slots_on(facility_id, date))
    }

    async fn save_slot(&self, slot: Slot) -> Result<(), EngineError> {
        self.state.check_slots(std::slice::from_ref(&slot))?;
        self.commit(Record::SlotSaved(slot)).await
    }

    async fn save_slots(&self, slots: Vec<Slot>) -> Result<(), EngineError> {
        if slots.is_empty() {
            return Ok(());
        }
        self.state.check_slots(&slots)?;
        self.commit(Record::SlotsSaved(slots)).await
    }
}

#[async_trait]
impl ScheduleStore for WalStore {
    async fn claim(&self, slot: Slot, booking: Booking) -> Result<(), EngineError> {
        self.state.check_claim(&slot, &booking)?;
        self.commit(Record::Claimed { slot, booking }).await
    }

    async fn transition(&self, booking: Booking, released: Option<Slot>) -> Result<(), EngineError> {
        self.state.check_transition(&booking, released.as_ref())?;
        self.commit(Record::Transitioned { booking, released }).await
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn find_booking(&self, id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.state.get_booking(&id))
    }

    async fn find_active_booking_for_slot(&self, slot_id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.state.active_booking_for(&slot_id))
    }

    async fn find_bookings_for_member(&self, member_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        Ok(self.state.bookings_of(&member_id))
    }

    async fn save_booking(&self, booking: Booking) -> Result<(), EngineError> {
        self.state.check_booking(&booking)?;
        self.commit(Record::BookingSaved(booking)).await
    }
}

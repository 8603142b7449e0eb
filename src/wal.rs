use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{Booking, Slot};

/// One durable state change. Replaying all records in order rebuilds the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    SlotSaved(Slot),
    SlotsSaved(Vec<Slot>),
    BookingSaved(Booking),
    /// A slot turned BOOKED together with the booking that holds it.
    Claimed { slot: Slot, booking: Booking },
    /// A booking's new status, plus the slot it released (cancel only).
    Transitioned { booking: Booking, released: Option<Slot> },
}

/// Encode a single record to [len][bincode][crc32] format.
fn encode_record(writer: &mut impl Write, record: &Record) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only write-ahead log of slot and booking records.
///
/// Format per entry: `[u32: len][bincode: Record][u32: crc32]`, little-endian.
/// A truncated or corrupt tail (crash mid-write) ends replay at the last good entry.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        self.append_buffered(record)?;
        self.flush_sync()
    }

    /// Buffer a record without syncing. `flush_sync` commits the whole batch.
    pub fn append_buffered(&mut self, record: &Record) -> io::Result<()> {
        encode_record(&mut self.writer, record)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the compacted log to a temp file next to the WAL and fsync it.
    pub fn write_compact_file(path: &Path, records: &[Record]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            encode_record(&mut writer, record)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rename the temp file over the WAL and reopen for appending.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Read every valid record. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Record>> {
        Ok(read_valid_prefix(path)?.0)
    }

    /// Replay, then cut off a torn or corrupt tail so later appends stay readable.
    pub fn recover(path: &Path) -> io::Result<Vec<Record>> {
        let (records, valid_len) = read_valid_prefix(path)?;
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            warn!(path = %path.display(), dropped_bytes = file_len - valid_len, "truncating torn wal tail");
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(records)
    }
}

/// Records up to the first incomplete or corrupt entry, and the byte length they cover.
fn read_valid_prefix(path: &Path) -> io::Result<(Vec<Record>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut valid_len = 0u64;

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
            Err(e) => return Err(e),
        }

        let mut crc_buf = [0u8; 4];
        match reader.read_exact(&mut crc_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
            Err(e) => return Err(e),
        }
        if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
            break;
        }

        match bincode::deserialize::<Record>(&payload) {
            Ok(record) => records.push(record),
            Err(_) => break,
        }
        valid_len += (len + 8) as u64;
    }

    Ok((records, valid_len))
}

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::limits::MAX_ENTRY_BYTES;
use crate::model::Booking;

/// First bytes of every ledger file.
pub const LEDGER_MAGIC: &[u8; 8] = b"SLOTLDG1";

/// Encode a single booking to [len][bincode][crc32] format.
fn encode_entry(writer: &mut impl Write, booking: &Booking) -> io::Result<()> {
    let payload =
        bincode::serialize(booking).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Flat-file booking ledger: append for new bookings, whole-file rewrite for
/// everything else.
///
/// Layout: `LEDGER_MAGIC`, then entries of `[u32: len][bincode: Booking][u32: crc32]`.
/// A truncated or corrupt trailing entry (crash mid-append) is dropped on replay.
pub struct LedgerLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LedgerLog {
    /// Open (or create) the ledger at `path`, writing the header to a new file.
    /// A file shorter than the header is restarted from an empty header.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() < LEDGER_MAGIC.len() as u64 {
            file.set_len(0)?;
            file.write_all(LEDGER_MAGIC)?;
            file.sync_all()?;
        }
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Buffer one booking. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, booking: &Booking) -> io::Result<()> {
        encode_entry(&mut self.writer, booking)
    }

    /// Flush the BufWriter and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// A log whose handle cannot write, so every flush fails.
    #[cfg(test)]
    pub(crate) fn read_only(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::open(path)?),
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, booking: &Booking) -> io::Result<()> {
        self.append_buffered(booking)?;
        self.flush_sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole ledger with `bookings`. Readers of the file see
    /// either the old contents or the new ones, never a mix.
    ///
    /// Bytes still buffered from an append that failed to flush are thrown
    /// away, never written.
    pub fn rewrite(&mut self, bookings: &[Booking]) -> io::Result<()> {
        self.discard_buffered()?;

        let tmp_path = self.path.with_extension("ledger.tmp");
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            tmp.write_all(LEDGER_MAGIC)?;
            for booking in bookings {
                encode_entry(&mut tmp, booking)?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }

    fn discard_buffered(&mut self) -> io::Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let (_, unwritten) = stale.into_parts();
        if let Ok(bytes) = unwritten {
            if !bytes.is_empty() {
                tracing::warn!("dropping {} unflushed ledger bytes", bytes.len());
            }
        }
        Ok(())
    }

    /// Read every valid entry from disk. A missing file is an empty ledger.
    pub fn replay(path: &Path) -> io::Result<Vec<Booking>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if file.metadata()?.len() == 0 {
            return Ok(Vec::new());
        }
        let mut reader = BufReader::new(file);

        let mut magic = Vec::with_capacity(LEDGER_MAGIC.len());
        (&mut reader)
            .take(LEDGER_MAGIC.len() as u64)
            .read_to_end(&mut magic)?;
        if magic.len() < LEDGER_MAGIC.len() && LEDGER_MAGIC.starts_with(&magic) {
            // Crash while the header of a new ledger was being written.
            tracing::warn!("{} has a partial header, treating as empty", path.display());
            return Ok(Vec::new());
        }
        if magic.as_slice() != LEDGER_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a slot ledger", path.display()),
            ));
        }

        let mut bookings = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_ENTRY_BYTES {
                tracing::warn!("ledger entry length {len} out of range, stopping replay");
                break;
            }

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
                tracing::warn!("ledger entry checksum mismatch, stopping replay");
                break;
            }

            match bincode::deserialize::<Booking>(&payload) {
                Ok(booking) => bookings.push(booking),
                Err(_) => break,
            }
        }

        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Slot;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotbook_test_log");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn booking(slot_id: u32, email: &str) -> Booking {
        let slot = Slot { id: slot_id, label: format!("slot-{slot_id}") };
        Booking::new(&slot, "Mario".into(), email.into())
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.ledger");
        let bookings = vec![booking(0, "a@x.com"), booking(1, "b@x.com")];
        {
            let mut log = LedgerLog::open(&path).unwrap();
            for b in &bookings {
                log.append(b).unwrap();
            }
        }
        assert_eq!(LedgerLog::replay(&path).unwrap(), bookings);
    }

    #[test]
    fn reopen_keeps_header_single() {
        let path = tmp_path("reopen.ledger");
        let first = booking(0, "a@x.com");
        let second = booking(1, "b@x.com");
        LedgerLog::open(&path).unwrap().append(&first).unwrap();
        LedgerLog::open(&path).unwrap().append(&second).unwrap();
        assert_eq!(LedgerLog::replay(&path).unwrap(), vec![first, second]);
    }

    #[test]
    fn replay_handles_truncation() {
        let path = tmp_path("truncation.ledger");
        let b = booking(0, "a@x.com");
        LedgerLog::open(&path).unwrap().append(&b).unwrap();

        // Half-written second entry
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8, 0, 0, 0, 1, 2]).unwrap();
        }

        assert_eq!(LedgerLog::replay(&path).unwrap(), vec![b]);
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("bad_crc.ledger");
        let b = booking(0, "a@x.com");
        {
            let payload = bincode::serialize(&b).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(LEDGER_MAGIC).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }
        assert!(LedgerLog::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_rejects_foreign_file() {
        let path = tmp_path("foreign.ledger");
        fs::write(&path, b"slot_id,time_slot,user_name\n").unwrap();
        let err = LedgerLog::replay(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.ledger");
        assert!(LedgerLog::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn rewrite_then_append() {
        let path = tmp_path("rewrite.ledger");
        let keep = booking(0, "keep@x.com");
        let gone = booking(1, "gone@x.com");
        let later = booking(2, "later@x.com");
        {
            let mut log = LedgerLog::open(&path).unwrap();
            log.append(&keep).unwrap();
            log.append(&gone).unwrap();
            log.rewrite(std::slice::from_ref(&keep)).unwrap();
            log.append(&later).unwrap();
        }
        assert_eq!(LedgerLog::replay(&path).unwrap(), vec![keep, later]);
        assert!(!path.with_extension("ledger.tmp").exists());
    }

    #[test]
    fn partial_header_is_empty_ledger() {
        let path = tmp_path("partial_header.ledger");
        fs::write(&path, &LEDGER_MAGIC[..4]).unwrap();
        assert!(LedgerLog::replay(&path).unwrap().is_empty());

        let b = booking(0, "a@x.com");
        LedgerLog::open(&path).unwrap().append(&b).unwrap();
        assert_eq!(LedgerLog::replay(&path).unwrap(), vec![b]);
    }

    #[test]
    fn short_foreign_file_rejected() {
        let path = tmp_path("short_foreign.ledger");
        fs::write(&path, b"id,").unwrap();
        let err = LedgerLog::replay(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rewrite_discards_unflushed_bytes() {
        let path = tmp_path("discard_unflushed.ledger");
        let keep = booking(0, "keep@x.com");
        let failed = booking(0, "failed@x.com");
        let later = booking(1, "later@x.com");
        LedgerLog::open(&path).unwrap().append(&keep).unwrap();

        let mut log = LedgerLog::read_only(&path).unwrap();
        log.append_buffered(&failed).unwrap();
        assert!(log.flush_sync().is_err());

        log.rewrite(std::slice::from_ref(&keep)).unwrap();
        log.append(&later).unwrap();
        drop(log);
        assert_eq!(LedgerLog::replay(&path).unwrap(), vec![keep, later]);
    }

    #[test]
    fn rewrite_to_empty() {
        let path = tmp_path("rewrite_empty.ledger");
        let mut log = LedgerLog::open(&path).unwrap();
        log.append(&booking(0, "a@x.com")).unwrap();
        log.rewrite(&[]).unwrap();
        drop(log);
        assert!(LedgerLog::replay(&path).unwrap().is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), LEDGER_MAGIC.len() as u64);
    }
}

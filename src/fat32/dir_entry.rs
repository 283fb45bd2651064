//! FAT directory entries.
//!
//! A directory is a flat array of 32-byte slots. A slot is either a short
//! (8.3) entry, a long-file-name fragment carrying 13 UTF-16 characters, a
//! volume label, or a free/deleted slot. LFN fragments precede their short
//! entry in reverse order, so fragments are prepended to an accumulator that
//! names the next short entry.

use binread::{BinRead, BinReaderExt};
use chrono::{NaiveDate, NaiveDateTime};
use getset::Getters;
use std::io;

use super::fat_error::FatError;

/// Marker byte of a deleted slot.
const DELETED: u8 = 0xE5;
/// The attribute combination identifying a long-file-name fragment.
const LFN_ATTRS: u8 = 0x0F;

/// File attribute bits of a short directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes(u8);

impl Attributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_LABEL: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;

    pub fn new(bits: u8) -> Self {
        Attributes(bits)
    }

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    pub fn is_volume_label(self) -> bool {
        self.contains(Self::VOLUME_LABEL)
    }

    /// Human-readable names of the set flags.
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::READ_ONLY) {
            names.push("Read Only");
        }
        if self.contains(Self::HIDDEN) {
            names.push("Hidden");
        }
        if self.contains(Self::SYSTEM) {
            names.push("System");
        }
        if self.contains(Self::VOLUME_LABEL) {
            names.push("Volume Label");
        }
        if self.contains(Self::DIRECTORY) {
            names.push("Directory");
        }
        if self.contains(Self::ARCHIVE) {
            names.push("Archive");
        }
        names
    }
}

/// On-disk layout of one 32-byte short directory entry.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
struct RawDirEntry {
    /// Filename in space-padded 8.3 format.
    name: [u8; 11],
    /// File attributes byte.
    attr: u8,
    /// NT reserved.
    _nt_res: u8,
    /// Creation time, 10 ms units past the two-second resolution.
    crt_time_tenth: u8,
    /// Creation time, packed 2-second resolution.
    crt_time: u16,
    /// Creation date.
    crt_date: u16,
    /// Last access date.
    lst_acc_date: u16,
    /// High 16 bits of the first cluster number.
    fst_clus_hi: u16,
    /// Last write time.
    wrt_time: u16,
    /// Last write date.
    wrt_date: u16,
    /// Low 16 bits of the first cluster number.
    fst_clus_lo: u16,
    /// File size in bytes (0 for directories).
    file_size: u32,
}

impl RawDirEntry {
    fn from_slice(slot: &[u8]) -> Result<RawDirEntry, FatError> {
        let mut reader = io::Cursor::new(slot);
        Ok(reader.read_le()?)
    }

    fn start_cluster(&self) -> u32 {
        (u32::from(self.fst_clus_hi) << 16) | u32::from(self.fst_clus_lo)
    }

    /// Reconstructs the 8.3 name: base trimmed of padding, dot and extension
    /// appended only when the extension is non-blank.
    fn short_name(&self) -> String {
        let base = String::from_utf8_lossy(&self.name[..8]).trim_end().to_string();
        let ext = String::from_utf8_lossy(&self.name[8..]).trim_end().to_string();
        if ext.is_empty() {
            base
        } else {
            format!("{}.{}", base, ext)
        }
    }
}

/// One cooked directory entry with its resolved long name.
#[derive(Debug, Clone, Getters)]
pub struct DirEntry {
    /// Resolved name: the accumulated long name when present, the 8.3 name
    /// otherwise.
    #[get = "pub"]
    name: String,
    #[get = "pub"]
    attrs: Attributes,
    /// First cluster of the entry's data. Zero for empty files.
    #[get = "pub"]
    start_cluster: u32,
    /// File size in bytes.
    #[get = "pub"]
    size: u32,
    #[get = "pub"]
    created: Option<NaiveDateTime>,
    #[get = "pub"]
    modified: Option<NaiveDateTime>,
    /// Last access has date resolution only, so it decodes to midnight.
    #[get = "pub"]
    accessed: Option<NaiveDateTime>,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.attrs.is_directory()
    }

    /// Active entries hide volume labels and System-flagged slots; the dot
    /// entries are kept (the traversal skips them itself).
    pub fn is_active(&self) -> bool {
        !self.attrs.is_volume_label() && !self.attrs.contains(Attributes::SYSTEM)
    }
}

/// A fully parsed directory: one cooked entry per live slot, plus the volume
/// label when the directory carries one.
#[derive(Debug, Default)]
pub struct DirTable {
    entries: Vec<DirEntry>,
    volume_label: Option<String>,
}

impl DirTable {
    /// Parses the raw bytes of a directory's cluster chain.
    ///
    /// Free (0x00) and deleted (0xE5) slots are skipped and clear the pending
    /// long-name fragments, so a stale name never attaches to a later entry.
    pub fn parse(bytes: &[u8]) -> Result<DirTable, FatError> {
        let mut table = DirTable::default();
        let mut lfn_acc = String::new();

        for slot in bytes.chunks_exact(32) {
            if slot[0] == 0 || slot[0] == DELETED {
                lfn_acc.clear();
                continue;
            }

            if slot[11] == LFN_ATTRS {
                lfn_acc = format!("{}{}", lfn_fragment(slot), lfn_acc);
                continue;
            }

            let raw = RawDirEntry::from_slice(slot)?;
            let attrs = Attributes::new(raw.attr);

            if attrs.is_volume_label() {
                table.volume_label = Some(raw.short_name());
                lfn_acc.clear();
                continue;
            }

            let name = if lfn_acc.is_empty() {
                raw.short_name()
            } else {
                std::mem::take(&mut lfn_acc)
            };

            table.entries.push(DirEntry {
                name,
                attrs,
                start_cluster: raw.start_cluster(),
                size: raw.file_size,
                created: decode_timestamp(raw.crt_date, raw.crt_time, raw.crt_time_tenth),
                modified: decode_timestamp(raw.wrt_date, raw.wrt_time, 0),
                accessed: decode_timestamp(raw.lst_acc_date, 0, 0),
            });
            lfn_acc.clear();
        }

        Ok(table)
    }

    /// All cooked entries, including System-flagged ones.
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Entries visible to traversal and presentation.
    pub fn active_entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|entry| entry.is_active())
    }

    /// Case-insensitive lookup among active entries.
    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.active_entries()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn volume_label(&self) -> Option<&str> {
        self.volume_label.as_deref()
    }
}

/// Extracts the 13 UTF-16 characters of a long-name fragment, stopping at the
/// NUL terminator or 0xFFFF padding.
fn lfn_fragment(slot: &[u8]) -> String {
    let ranges: [(usize, usize); 3] = [(1, 11), (14, 26), (28, 32)];
    let mut units = Vec::with_capacity(13);

    'outer: for (start, end) in ranges {
        for off in (start..end).step_by(2) {
            let unit = u16::from_le_bytes([slot[off], slot[off + 1]]);
            if unit == 0 || unit == 0xFFFF {
                break 'outer;
            }
            units.push(unit);
        }
    }

    String::from_utf16_lossy(&units)
}

/// Decodes the packed FAT date and time fields. The date counts years from
/// 1980; the time has two-second resolution, refined by the 10 ms `tenth`
/// counter where recorded. A zeroed or invalid field decodes to `None`.
fn decode_timestamp(date: u16, time: u16, tenth: u8) -> Option<NaiveDateTime> {
    let year = 1980 + i32::from(date >> 9);
    let month = u32::from((date >> 5) & 0x0F);
    let day = u32::from(date & 0x1F);

    let hour = u32::from(time >> 11);
    let minute = u32::from((time >> 5) & 0x3F);
    let second = u32::from(time & 0x1F) * 2 + u32::from(tenth) / 100;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds one 32-byte short entry slot.
    pub(crate) fn short_slot(
        name_83: &[u8; 11],
        attr: u8,
        start_cluster: u32,
        size: u32,
    ) -> Vec<u8> {
        let mut slot = vec![0u8; 32];
        slot[0..11].copy_from_slice(name_83);
        slot[11] = attr;
        slot[20..22].copy_from_slice(&((start_cluster >> 16) as u16).to_le_bytes());
        slot[26..28].copy_from_slice(&(start_cluster as u16).to_le_bytes());
        slot[28..32].copy_from_slice(&size.to_le_bytes());
        slot
    }

    /// Builds one LFN fragment slot carrying up to 13 characters.
    pub(crate) fn lfn_slot(order: u8, chars: &str) -> Vec<u8> {
        let mut slot = vec![0xFFu8; 32];
        slot[0] = order;
        slot[11] = LFN_ATTRS;
        slot[12] = 0;
        slot[13] = 0; // checksum, unchecked
        slot[26] = 0;
        slot[27] = 0;

        let units: Vec<u16> = chars.encode_utf16().collect();
        let ranges: [(usize, usize); 3] = [(1, 11), (14, 26), (28, 32)];
        let mut i = 0;
        for (start, end) in ranges {
            for off in (start..end).step_by(2) {
                let unit = match i.cmp(&units.len()) {
                    std::cmp::Ordering::Less => units[i],
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => 0xFFFF,
                };
                slot[off..off + 2].copy_from_slice(&unit.to_le_bytes());
                i += 1;
            }
        }
        slot
    }

    #[test]
    fn short_name_gets_dot_and_extension() {
        // Scenario: "HELLO   TXT" decodes as "HELLO.TXT".
        let bytes = short_slot(b"HELLO   TXT", Attributes::ARCHIVE, 3, 42);
        let table = DirTable::parse(&bytes).unwrap();
        let entry = &table.entries()[0];
        assert_eq!(entry.name(), "HELLO.TXT");
        assert_eq!(*entry.start_cluster(), 3);
        assert_eq!(*entry.size(), 42);
        assert!(!entry.is_directory());
    }

    #[test]
    fn blank_extension_has_no_dot() {
        let bytes = short_slot(b"FOLDER     ", Attributes::DIRECTORY, 7, 0);
        let table = DirTable::parse(&bytes).unwrap();
        assert_eq!(table.entries()[0].name(), "FOLDER");
        assert!(table.entries()[0].is_directory());
    }

    #[test]
    fn lfn_fragments_assemble_in_reverse_order() {
        // "a long file name.txt" needs two fragments; the later-ordered one
        // is stored first.
        let mut bytes = lfn_slot(0x42, "ame.txt");
        bytes.extend(lfn_slot(0x01, "a long file n"));
        bytes.extend(short_slot(b"ALONGF~1TXT", Attributes::ARCHIVE, 9, 100));

        let table = DirTable::parse(&bytes).unwrap();
        assert_eq!(table.entries()[0].name(), "a long file name.txt");
    }

    #[test]
    fn deleted_slot_clears_pending_fragments() {
        let mut bytes = lfn_slot(0x41, "stale name");
        let mut deleted = short_slot(b"GONE    TXT", Attributes::ARCHIVE, 4, 10);
        deleted[0] = 0xE5;
        bytes.extend(deleted);
        bytes.extend(short_slot(b"KEPT    TXT", Attributes::ARCHIVE, 5, 10));

        let table = DirTable::parse(&bytes).unwrap();
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].name(), "KEPT.TXT");
    }

    #[test]
    fn volume_label_is_captured_not_listed() {
        let mut bytes = short_slot(b"USB KEY    ", Attributes::VOLUME_LABEL, 0, 0);
        bytes.extend(short_slot(b"A       TXT", Attributes::ARCHIVE, 3, 1));

        let table = DirTable::parse(&bytes).unwrap();
        assert_eq!(table.volume_label(), Some("USB KEY"));
        assert_eq!(table.entries().len(), 1);
    }

    #[test]
    fn system_entries_are_inactive() {
        let bytes = short_slot(b"SYS     BIN", Attributes::SYSTEM, 3, 1);
        let table = DirTable::parse(&bytes).unwrap();
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.active_entries().count(), 0);
    }

    #[test]
    fn find_is_case_insensitive() {
        let bytes = short_slot(b"HELLO   TXT", Attributes::ARCHIVE, 3, 42);
        let table = DirTable::parse(&bytes).unwrap();
        assert!(table.find("hello.txt").is_some());
        assert!(table.find("HELLO.TXT").is_some());
        assert!(table.find("other.txt").is_none());
    }

    #[test]
    fn packed_timestamps_decode() {
        // 2023-06-15 (date = (43 << 9) | (6 << 5) | 15) at 13:45:30
        // (time = (13 << 11) | (45 << 5) | 15).
        let mut slot = short_slot(b"T       TXT", Attributes::ARCHIVE, 3, 1);
        let date: u16 = (43 << 9) | (6 << 5) | 15;
        let time: u16 = (13 << 11) | (45 << 5) | 15;
        slot[14..16].copy_from_slice(&time.to_le_bytes());
        slot[16..18].copy_from_slice(&date.to_le_bytes());
        slot[22..24].copy_from_slice(&time.to_le_bytes());
        slot[24..26].copy_from_slice(&date.to_le_bytes());

        let table = DirTable::parse(&slot).unwrap();
        let entry = &table.entries()[0];
        assert_eq!(
            entry.created().unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2023-06-15 13:45:30"
        );
        assert_eq!(entry.created(), entry.modified());
    }

    #[test]
    fn access_date_decodes_to_midnight() {
        let mut slot = short_slot(b"T       TXT", Attributes::ARCHIVE, 3, 1);
        let date: u16 = (43 << 9) | (6 << 5) | 15;
        slot[18..20].copy_from_slice(&date.to_le_bytes());

        let table = DirTable::parse(&slot).unwrap();
        assert_eq!(
            table.entries()[0]
                .accessed()
                .unwrap()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            "2023-06-15 00:00:00"
        );
    }

    #[test]
    fn zeroed_timestamp_is_none() {
        let bytes = short_slot(b"T       TXT", Attributes::ARCHIVE, 3, 1);
        let table = DirTable::parse(&bytes).unwrap();
        assert!(table.entries()[0].created().is_none());
    }
}

//! NTFS volume reader.
//!
//! Scans the Master File Table sequentially from the cluster named by the
//! VBR. The scan bound is discovered mid-flight: it starts at one record and
//! is widened exactly once when the `$MFT` record itself is decoded, since
//! that record's own data size is the authoritative table length. The
//! `$Volume` record contributes the label used for the synthetic root.

use log::{debug, warn};
use std::collections::HashMap;
use std::fmt::Write;

use super::mft::MftEntry;
use super::ntfs_error::NtfsError;
use super::vbr::Vbr;
use crate::constants::TEXT_EXTENSIONS;
use crate::source::ByteSource;
use crate::traits::LayoutDisplay;
use crate::tree::{FsKind, Record, RecordId};
use crate::utils;

/// The record identifier NTFS reserves for the root directory.
pub const ROOT_RECORD_ID: u64 = 5;

/// A fully scanned NTFS volume: geometry, label, and the in-use entry set.
pub struct NtfsVol {
    vbr: Vbr,
    start_byte: u64,
    volume_name: String,
    entries: Vec<MftEntry>,
    contents: HashMap<u64, String>,
}

impl NtfsVol {
    /// Reads the VBR at `start_sector` and scans the whole MFT.
    ///
    /// Entry-level decode failures (bad signature, truncated record) are
    /// logged and skipped; the scan continues with the remaining slots. I/O
    /// failures abort the scan.
    ///
    /// # Errors
    ///
    /// - `NtfsError::Io` if a record slot or content extent cannot be read
    /// - VBR validation errors when `validate` is true
    pub fn scan<S: ByteSource>(
        source: &mut S,
        start_sector: u64,
        validate: bool,
        sector_size: usize,
    ) -> Result<NtfsVol, NtfsError> {
        let start_byte = start_sector * sector_size as u64;
        let vbr = Vbr::from_source(source, start_byte, validate)?;
        let bytes_per_cluster = vbr.bytes_per_cluster();
        let bytes_per_entry = vbr.bytes_per_entry();
        if bytes_per_entry == 0 {
            return Err(NtfsError::InvalidEntrySize);
        }
        let mft_byte_offset = start_byte + vbr.mft_byte_offset();

        let mut vol = NtfsVol {
            vbr,
            start_byte,
            volume_name: String::new(),
            entries: Vec::new(),
            contents: HashMap::new(),
        };

        // The scan bound starts at a single record and is replaced by the
        // $MFT record's own sizing, exactly once.
        let mut remaining: u64 = 1;
        let mut bound_discovered = false;
        let mut slot: u64 = 0;

        while remaining > 0 {
            remaining -= 1;
            let offset = mft_byte_offset + slot * bytes_per_entry;
            slot += 1;

            let entry_bytes = source.read_vec(offset, bytes_per_entry as usize)?;
            if entry_bytes[0] == 0 {
                // Unallocated slot; it still consumes one unit of the bound.
                continue;
            }

            let entry = match MftEntry::parse(&entry_bytes, bytes_per_cluster) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping MFT slot {}: {}", slot - 1, err);
                    continue;
                }
            };

            if entry.file_name() == Some("$MFT") {
                if !bound_discovered {
                    bound_discovered = true;
                    remaining = (entry.data_size() / bytes_per_entry).saturating_sub(1);
                    debug!(
                        "$MFT sizes the table at {} records",
                        entry.data_size() / bytes_per_entry
                    );
                } else {
                    // A second record named $MFT is corruption; the bound is
                    // never re-triggered.
                    warn!("ignoring duplicate $MFT record at slot {}", slot - 1);
                }
            }
            if entry.file_name() == Some("$Volume") {
                if let Some(label) = entry.volume_name() {
                    vol.volume_name = label.to_string();
                }
            }

            if !entry.is_deleted() && entry.file_name().is_some() {
                if let Some(text) = vol.materialize_text(source, &entry)? {
                    vol.contents.insert(entry.id(), text);
                }
                vol.entries.push(entry);
            }
        }

        Ok(vol)
    }

    /// Materializes text content for entries with a designated text
    /// extension; every other file carries no content.
    fn materialize_text<S: ByteSource>(
        &self,
        source: &mut S,
        entry: &MftEntry,
    ) -> Result<Option<String>, NtfsError> {
        let is_text = entry
            .extension()
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext));
        if !is_text || entry.is_directory() {
            return Ok(None);
        }
        let Some(data) = entry.data() else {
            return Ok(None);
        };

        if let Some(resident) = &data.resident {
            return Ok(Some(utils::decode_text(resident)));
        }

        let mut bytes = Vec::with_capacity(data.size as usize);
        let mut total = data.size;
        for run in &data.runs {
            if total == 0 {
                break;
            }
            let length = run.length.min(total);
            total -= length;
            let extent = source.read_vec(self.start_byte + run.offset, length as usize)?;
            bytes.extend_from_slice(&extent);
        }
        Ok(Some(utils::decode_text(&bytes)))
    }

    /// The volume label captured from `$Volume`.
    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    /// The full in-use entry set, including entries the presentation filter
    /// hides. Needed so a filtered-out directory can still act as a parent.
    pub fn entries(&self) -> &[MftEntry] {
        &self.entries
    }

    /// Total size of the volume in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.vbr.total_sec() * u64::from(*self.vbr.bytes_per_sec())
    }

    /// Produces the externally exposed record list under the given volume
    /// sequence number: one synthetic root (record id 5, parent `None`, named
    /// by the volume label) plus every retained entry that passes the
    /// Read-Only/Hidden/System filter.
    pub fn records(&self, volume_seq: u32) -> Vec<Record> {
        let volume_size = self.total_bytes();
        let mut records = vec![Record {
            id: RecordId::new(volume_seq, ROOT_RECORD_ID),
            name: self.volume_name.clone(),
            is_folder: true,
            parent: None,
            size: 0,
            created: None,
            modified: None,
            content: None,
            attributes: None,
            file_system: FsKind::Ntfs,
            volume_size,
        }];

        for entry in &self.entries {
            if entry.id() == ROOT_RECORD_ID || !entry.is_presentable() {
                continue;
            }
            let Some(name) = entry.file_name() else {
                continue;
            };
            let si = entry.standard_info();
            records.push(Record {
                id: RecordId::new(volume_seq, entry.id()),
                name: name.to_string(),
                is_folder: entry.is_directory(),
                parent: entry
                    .parent_id()
                    .map(|parent| RecordId::new(volume_seq, parent)),
                size: if entry.is_directory() {
                    0
                } else {
                    entry.data_size()
                },
                created: si.and_then(|si| si.created),
                modified: si.and_then(|si| si.modified),
                content: self.contents.get(&entry.id()).cloned(),
                attributes: Some(entry.flags().names()),
                file_system: FsKind::Ntfs,
                volume_size,
            });
        }

        records
    }
}

impl LayoutDisplay for NtfsVol {
    fn display_layout(&self, indent: u8) -> String {
        let mut out = String::from("");
        let indent = " ".repeat(indent.into());
        let sec_per_clus = u64::from(*self.vbr.sec_per_clus());

        writeln!(out, "{}┌{:─^55}┐", indent, " NTFS Partition Layout ").unwrap();
        writeln!(
            out,
            "{}├{:^12}┬{:^12}┬{:^28}┤",
            indent, "Region", "Start", "Description"
        )
        .unwrap();
        writeln!(out, "{}├{:─<12}┼{:─<12}┼{:─<28}┤", indent, "", "", "").unwrap();
        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<28}│",
            indent, "Boot", 0, "Volume Boot Record"
        )
        .unwrap();
        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<28}│",
            indent,
            "MFT",
            self.vbr.mft_clus() * sec_per_clus,
            "Master File Table"
        )
        .unwrap();
        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<28}│",
            indent,
            "MFT Mirror",
            self.vbr.mft_mirror_clus() * sec_per_clus,
            "MFT redundant copy"
        )
        .unwrap();
        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<28}│",
            indent,
            "End",
            self.vbr.total_sec(),
            "Total sectors"
        )
        .unwrap();
        writeln!(out, "{}└{:─<12}┴{:─<12}┴{:─<28}┘", indent, "", "", "").unwrap();

        out
    }
}

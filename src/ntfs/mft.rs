//! Master File Table records and attribute decoding.
//!
//! An MFT record is a fixed-size slot starting with the ASCII `FILE` tag,
//! followed by a chain of variable-length attributes. Only the attribute
//! kinds needed to rebuild the tree are decoded: StandardInformation,
//! FileName, Data and VolumeName. Attribute lists are not followed; directory
//! relationships come from the FileName attribute's parent reference.

use chrono::{DateTime, NaiveDateTime};
use log::warn;

use super::ntfs_error::NtfsError;
use super::runlist::{self, Run};
use crate::utils;

/// Offset between the Windows epoch (1601-01-01) and the Unix epoch,
/// in 100 ns ticks.
const WIN_EPOCH: u64 = 116_444_736_000_000_000;

/// Bit flags carried by the FileName attribute.
///
/// Decoded as independent bitmask checks so that the same flag set serves
/// both presentation (names) and filtering (read-only/hidden/system).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileNameFlags(u32);

impl FileNameFlags {
    pub const READ_ONLY: u32 = 0x0001;
    pub const HIDDEN: u32 = 0x0002;
    pub const SYSTEM: u32 = 0x0004;
    pub const ARCHIVE: u32 = 0x0020;
    pub const DIRECTORY: u32 = 0x1000_0000;

    pub fn new(bits: u32) -> Self {
        FileNameFlags(bits)
    }

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
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
        if self.contains(Self::ARCHIVE) {
            names.push("Archive");
        }
        if self.contains(Self::DIRECTORY) {
            names.push("Directory");
        }
        names
    }
}

/// The four 64-bit Windows-epoch timestamps of StandardInformation.
#[derive(Debug, Clone, Default)]
pub struct StandardInformation {
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub mft_modified: Option<NaiveDateTime>,
    pub accessed: Option<NaiveDateTime>,
}

/// The FileName attribute: parent reference, flags and UTF-16 name.
#[derive(Debug, Clone)]
pub struct FileName {
    pub parent_id: u64,
    pub flags: FileNameFlags,
    pub name: String,
}

/// The Data attribute: either resident inline bytes or a non-resident size
/// plus its resolved run-list.
#[derive(Debug, Clone)]
pub struct DataAttribute {
    /// Real size of the data in bytes.
    pub size: u64,
    /// Inline content, present only for resident attributes.
    pub resident: Option<Vec<u8>>,
    /// Byte extents relative to the partition start, for non-resident data.
    pub runs: Vec<Run>,
}

/// A decoded MFT record slot.
#[derive(Debug, Clone, Default)]
pub struct MftEntry {
    id: u64,
    state: u16,
    standard_info: Option<StandardInformation>,
    file_name: Option<FileName>,
    data: Option<DataAttribute>,
    volume_name: Option<String>,
}

/// Recognized attribute kinds; anything else is skipped over by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    StandardInformation,
    FileName,
    VolumeName,
    Data,
    End,
    Other(u32),
}

impl AttrKind {
    fn from_type(value: u32) -> AttrKind {
        match value {
            0x10 => AttrKind::StandardInformation,
            0x30 => AttrKind::FileName,
            0x60 => AttrKind::VolumeName,
            0x80 => AttrKind::Data,
            0xFFFF_FFFF => AttrKind::End,
            other => AttrKind::Other(other),
        }
    }
}

impl MftEntry {
    /// Decodes one MFT record slot.
    ///
    /// # Errors
    ///
    /// - `NtfsError::BadSignature` if the slot does not start with `FILE`
    /// - `NtfsError::TruncatedEntry` if declared offsets point outside the slot
    pub fn parse(entry_bytes: &[u8], bytes_per_cluster: u64) -> Result<MftEntry, NtfsError> {
        if entry_bytes.len() < 48 {
            return Err(NtfsError::TruncatedEntry(0, entry_bytes.len()));
        }
        if &entry_bytes[0..4] != b"FILE" {
            let mut sig = [0u8; 4];
            sig.copy_from_slice(&entry_bytes[0..4]);
            return Err(NtfsError::BadSignature(sig));
        }

        let first_attr_offset = utils::u16_at(entry_bytes, 20) as usize;
        let state = utils::u16_at(entry_bytes, 22);
        let id = u64::from(utils::u32_at(entry_bytes, 44));

        if first_attr_offset >= entry_bytes.len() {
            return Err(NtfsError::TruncatedEntry(id, first_attr_offset));
        }

        let mut entry = MftEntry {
            id,
            state,
            ..MftEntry::default()
        };
        entry.read_attributes(&entry_bytes[first_attr_offset..], bytes_per_cluster)?;
        Ok(entry)
    }

    /// Walks the attribute chain until the 0xFFFFFFFF end marker.
    fn read_attributes(
        &mut self,
        mut attrs: &[u8],
        bytes_per_cluster: u64,
    ) -> Result<(), NtfsError> {
        loop {
            if attrs.len() < 8 {
                return Err(NtfsError::TruncatedEntry(self.id, attrs.len()));
            }
            let attr_type = utils::u32_at(attrs, 0);
            let kind = AttrKind::from_type(attr_type);
            if kind == AttrKind::End {
                return Ok(());
            }

            let attr_len = utils::u32_at(attrs, 4) as usize;
            if attr_len < 16 || attr_len > attrs.len() {
                return Err(NtfsError::TruncatedEntry(self.id, attrs.len()));
            }
            let attr = &attrs[..attr_len];

            match self.decode_attribute(kind, attr, bytes_per_cluster) {
                Ok(()) => {}
                Err(err) => {
                    // One malformed attribute does not discard the record.
                    warn!("MFT record {}: {}", self.id, err);
                }
            }

            attrs = &attrs[attr_len..];
        }
    }

    fn decode_attribute(
        &mut self,
        kind: AttrKind,
        attr: &[u8],
        bytes_per_cluster: u64,
    ) -> Result<(), NtfsError> {
        let attr_type = utils::u32_at(attr, 0);
        let non_resident = utils::u8_at(attr, 8);

        let content: &[u8] = if non_resident == 0 {
            if attr.len() < 24 {
                return Err(NtfsError::MalformedAttribute(
                    attr_type,
                    "resident header truncated".to_string(),
                ));
            }
            let size = utils::u32_at(attr, 16) as usize;
            let offset = utils::u16_at(attr, 20) as usize;
            if offset + size > attr.len() {
                return Err(NtfsError::MalformedAttribute(
                    attr_type,
                    format!("content {}+{} exceeds attribute length {}", offset, size, attr.len()),
                ));
            }
            &attr[offset..offset + size]
        } else {
            &[]
        };

        match kind {
            AttrKind::StandardInformation => {
                if content.len() < 32 {
                    return Err(NtfsError::MalformedAttribute(
                        attr_type,
                        "StandardInformation shorter than 32 bytes".to_string(),
                    ));
                }
                self.standard_info = Some(StandardInformation {
                    created: filetime_to_naive(utils::u64_at(content, 0)),
                    modified: filetime_to_naive(utils::u64_at(content, 8)),
                    mft_modified: filetime_to_naive(utils::u64_at(content, 16)),
                    accessed: filetime_to_naive(utils::u64_at(content, 24)),
                });
            }
            AttrKind::FileName => {
                if content.len() < 66 {
                    return Err(NtfsError::MalformedAttribute(
                        attr_type,
                        "FileName shorter than its fixed header".to_string(),
                    ));
                }
                let name_len = utils::u8_at(content, 64) as usize;
                if 66 + name_len * 2 > content.len() {
                    return Err(NtfsError::MalformedAttribute(
                        attr_type,
                        "FileName text exceeds attribute content".to_string(),
                    ));
                }
                let name = utils::utf16_le(&content[66..66 + name_len * 2])
                    .unwrap_or_default();
                self.file_name = Some(FileName {
                    parent_id: utils::u48_at(content, 0),
                    flags: FileNameFlags::new(utils::u32_at(content, 56)),
                    name,
                });
            }
            AttrKind::VolumeName => {
                self.volume_name = utils::utf16_le(content);
            }
            AttrKind::Data => {
                if non_resident == 0 {
                    self.data = Some(DataAttribute {
                        size: content.len() as u64,
                        resident: Some(content.to_vec()),
                        runs: Vec::new(),
                    });
                } else {
                    if attr.len() < 64 {
                        return Err(NtfsError::MalformedAttribute(
                            attr_type,
                            "non-resident header truncated".to_string(),
                        ));
                    }
                    let size = utils::u64_at(attr, 48);
                    // The mapping-pairs offset is followed by the attribute's
                    // UTF-16 name; validate the padded offset before slicing.
                    let name_len = utils::u8_at(attr, 9) as usize;
                    let run_offset = utils::u16_at(attr, 32) as usize + name_len * 2;
                    if run_offset >= attr.len() {
                        return Err(NtfsError::MalformedAttribute(
                            attr_type,
                            format!(
                                "run-list offset {} exceeds attribute length {}",
                                run_offset,
                                attr.len()
                            ),
                        ));
                    }
                    let runs = runlist::decode_runs(&attr[run_offset..], bytes_per_cluster);
                    self.data = Some(DataAttribute {
                        size,
                        resident: None,
                        runs,
                    });
                }
            }
            AttrKind::End | AttrKind::Other(_) => {}
        }

        Ok(())
    }

    /// Returns the record identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// A record is deleted when its state byte is 0x00 (never used) or
    /// 0x02 (freed directory).
    pub fn is_deleted(&self) -> bool {
        self.state == 0x00 || self.state == 0x02
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_ref().map(|fn_attr| fn_attr.name.as_str())
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.file_name.as_ref().map(|fn_attr| fn_attr.parent_id)
    }

    pub fn flags(&self) -> FileNameFlags {
        self.file_name
            .as_ref()
            .map(|fn_attr| fn_attr.flags)
            .unwrap_or_default()
    }

    pub fn is_directory(&self) -> bool {
        self.flags().is_directory()
    }

    /// The extension of the file name, if any. Case is preserved.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    pub fn data_size(&self) -> u64 {
        self.data.as_ref().map(|data| data.size).unwrap_or(0)
    }

    pub fn data(&self) -> Option<&DataAttribute> {
        self.data.as_ref()
    }

    pub fn standard_info(&self) -> Option<&StandardInformation> {
        self.standard_info.as_ref()
    }

    pub fn volume_name(&self) -> Option<&str> {
        self.volume_name.as_deref()
    }

    /// Presentation filter: Read-Only, Hidden and System entries are kept in
    /// the internal set (they may be somebody's parent) but excluded from the
    /// externally exposed list.
    pub fn is_presentable(&self) -> bool {
        let flags = self.flags();
        !(flags.contains(FileNameFlags::READ_ONLY)
            || flags.contains(FileNameFlags::HIDDEN)
            || flags.contains(FileNameFlags::SYSTEM))
    }
}

/// Converts a Windows FILETIME (100 ns ticks since 1601) to a naive UTC
/// timestamp. Values before the Unix epoch or out of range decode to `None`.
pub fn filetime_to_naive(filetime: u64) -> Option<NaiveDateTime> {
    if filetime < WIN_EPOCH {
        return None;
    }
    let ticks = filetime - WIN_EPOCH;
    let secs = (ticks / 10_000_000) as i64;
    let nanos = (ticks % 10_000_000) as u32 * 100;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

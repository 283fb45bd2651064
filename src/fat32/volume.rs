//! FAT32 volume reader.
//!
//! Mounts a partition by parsing its boot sector and FAT copies, then
//! resolves directories lazily: each directory's cluster chain is read and
//! parsed on first visit and cached afterwards. The root directory is loaded
//! eagerly since it also carries the volume label.

use log::warn;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;

use super::boot_sector::BootSector;
use super::dir_entry::{DirEntry, DirTable};
use super::fat::Fat;
use super::fat_error::FatError;
use crate::constants::TEXT_EXTENSIONS;
use crate::source::ByteSource;
use crate::traits::LayoutDisplay;
use crate::tree::{FsKind, Record, RecordId};
use crate::utils;

/// A mounted FAT32 volume.
///
/// The volume does not own its byte source; traversal methods borrow it per
/// call, so one source serves every volume on the disk.
pub struct FatVol {
    boot: BootSector,
    start_sector: u64,
    sector_cnt: u64,
    sector_size: usize,
    fats: Vec<Fat>,
    tables: HashMap<u32, DirTable>,
    volume_label: String,
}

impl FatVol {
    /// Mounts the volume at `start_sector`: boot sector, every FAT copy and
    /// the root directory.
    ///
    /// # Errors
    ///
    /// - `FatError::Io` if the boot sector, FAT or root directory cannot be
    ///   read
    /// - Boot sector validation errors when `validate` is true
    pub fn mount<S: ByteSource>(
        source: &mut S,
        start_sector: u64,
        sector_cnt: u64,
        validate: bool,
        sector_size: usize,
    ) -> Result<FatVol, FatError> {
        let boot = BootSector::from_source(source, start_sector, validate, sector_size)?;

        // Every FAT copy is loaded; chain walking only ever consults the
        // first one.
        let fat_len = *boot.fat_sz_32() as usize * usize::from(*boot.bytes_per_sec());
        let mut fats = Vec::with_capacity(usize::from(*boot.num_fat()));
        for i in 0..*boot.num_fat() {
            let fat_offset = (start_sector + u64::from(*boot.rsvd_sec_cnt())) * sector_size as u64
                + u64::from(i) * fat_len as u64;
            fats.push(Fat::from_bytes(&source.read_vec(fat_offset, fat_len)?));
        }

        let mut vol = FatVol {
            boot,
            start_sector,
            sector_cnt,
            sector_size,
            fats,
            tables: HashMap::new(),
            volume_label: String::new(),
        };

        let root_cluster = *vol.boot.root_clus();
        let root = vol.load_dir_table(source, root_cluster)?;
        vol.volume_label = root
            .volume_label()
            .map(str::to_string)
            .unwrap_or_else(|| vol.boot.volume_label());
        vol.tables.insert(root_cluster, root);

        Ok(vol)
    }

    /// The volume label: the root directory's label entry when present, the
    /// boot sector field otherwise.
    pub fn volume_label(&self) -> &str {
        &self.volume_label
    }

    pub fn boot(&self) -> &BootSector {
        &self.boot
    }

    /// Total size of the volume in bytes.
    pub fn total_bytes(&self) -> u64 {
        u64::from(self.boot.tot_sec()) * u64::from(*self.boot.bytes_per_sec())
    }

    /// Maps a data cluster to its sector, relative to the partition start.
    fn cluster_to_sector(&self, cluster: u32) -> u64 {
        u64::from(*self.boot.rsvd_sec_cnt())
            + u64::from(*self.boot.num_fat()) * u64::from(*self.boot.fat_sz_32())
            + u64::from(cluster - 2) * u64::from(*self.boot.sec_per_clus())
    }

    fn cluster_byte_offset(&self, cluster: u32) -> u64 {
        (self.start_sector + self.cluster_to_sector(cluster)) * self.sector_size as u64
    }

    /// Reads the full cluster chain starting at `first_cluster`.
    fn read_chain_bytes<S: ByteSource>(
        &self,
        source: &mut S,
        first_cluster: u32,
    ) -> Result<Vec<u8>, FatError> {
        let cluster_size = self.boot.bytes_per_cluster() as usize;
        let mut bytes = Vec::new();
        for cluster in self.fats[0].chain(first_cluster)? {
            let extent = source.read_vec(self.cluster_byte_offset(cluster), cluster_size)?;
            bytes.extend_from_slice(&extent);
        }
        Ok(bytes)
    }

    fn load_dir_table<S: ByteSource>(
        &self,
        source: &mut S,
        cluster: u32,
    ) -> Result<DirTable, FatError> {
        DirTable::parse(&self.read_chain_bytes(source, cluster)?)
    }

    /// Returns the parsed directory at `cluster`, loading and caching it on
    /// first access. Cluster 0 is an alias for the root directory, which is
    /// how the `..` entry of a first-level directory refers to it.
    pub fn dir_table<S: ByteSource>(
        &mut self,
        source: &mut S,
        cluster: u32,
    ) -> Result<&DirTable, FatError> {
        let cluster = if cluster == 0 {
            *self.boot.root_clus()
        } else {
            cluster
        };
        if !self.tables.contains_key(&cluster) {
            let table = self.load_dir_table(source, cluster)?;
            self.tables.insert(cluster, table);
        }
        Ok(&self.tables[&cluster])
    }

    /// Resolves a directory path to its parsed table. Separators may be `/`
    /// or `\`; matching is case-insensitive; a leading volume-label component
    /// is accepted and stripped.
    ///
    /// # Errors
    ///
    /// - `FatError::DirectoryNotFound` when a component does not exist
    /// - `FatError::NotADirectory` when a component names a file
    pub fn visit_directory<S: ByteSource>(
        &mut self,
        source: &mut S,
        path: &str,
    ) -> Result<&DirTable, FatError> {
        let mut cluster = *self.boot.root_clus();

        let mut components = path
            .replace('\\', "/")
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect::<VecDeque<String>>();
        if components
            .front()
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.volume_label))
        {
            components.pop_front();
        }

        for part in components {
            let table = self.dir_table(source, cluster)?;
            let entry = table
                .find(&part)
                .ok_or_else(|| FatError::DirectoryNotFound(part.clone()))?;
            if !entry.is_directory() {
                return Err(FatError::NotADirectory(part.clone()));
            }
            cluster = *entry.start_cluster();
        }

        self.dir_table(source, cluster)
    }

    /// Reads a file's content as text, decoding after the full chain is
    /// assembled. Each cluster contributes at most the file's remaining byte
    /// count, so trailing slack never leaks into the text.
    ///
    /// # Errors
    ///
    /// - `FatError::FileNotFound` when the final component does not exist
    /// - `FatError::IsADirectory` when it names a directory
    /// - `FatError::CorruptClusterChain` when the chain is broken
    pub fn read_text<S: ByteSource>(
        &mut self,
        source: &mut S,
        path: &str,
    ) -> Result<String, FatError> {
        let normalized = path.replace('\\', "/");
        let (dir_path, file_name) = match normalized.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", normalized.as_str()),
        };
        if file_name.is_empty() {
            return Err(FatError::FileNotFound(path.to_string()));
        }

        let table = self.visit_directory(source, dir_path)?;
        let entry = table
            .find(file_name)
            .ok_or_else(|| FatError::FileNotFound(file_name.to_string()))?
            .clone();
        if entry.is_directory() {
            return Err(FatError::IsADirectory(file_name.to_string()));
        }

        let bytes = self.read_file_bytes(source, &entry)?;
        Ok(utils::decode_text(&bytes))
    }

    /// Reads a file's bytes, clamped to its recorded size. An empty file
    /// (start cluster 0) reads as no bytes.
    fn read_file_bytes<S: ByteSource>(
        &self,
        source: &mut S,
        entry: &DirEntry,
    ) -> Result<Vec<u8>, FatError> {
        if *entry.start_cluster() < 2 || *entry.size() == 0 {
            return Ok(Vec::new());
        }

        let cluster_size = self.boot.bytes_per_cluster() as u64;
        let mut remaining = u64::from(*entry.size());
        let mut bytes = Vec::with_capacity(remaining as usize);

        for cluster in self.fats[0].chain(*entry.start_cluster())? {
            if remaining == 0 {
                break;
            }
            let take = cluster_size.min(remaining);
            remaining -= take;
            let extent = source.read_vec(self.cluster_byte_offset(cluster), take as usize)?;
            bytes.extend_from_slice(&extent);
        }

        Ok(bytes)
    }

    /// Produces the record list under the given volume sequence number by
    /// walking the directory tree breadth-first from the root.
    ///
    /// The root becomes entry 0, named by the volume label; files and
    /// directories get sequential entry numbers in visit order. Dot entries
    /// are skipped, and a directory whose cluster was already visited is not
    /// descended into again. A directory whose chain is corrupt loses its
    /// children but keeps its own record.
    pub fn records<S: ByteSource>(
        &mut self,
        source: &mut S,
        volume_seq: u32,
    ) -> Result<Vec<Record>, FatError> {
        let volume_size = self.total_bytes();
        let root_id = RecordId::new(volume_seq, 0);
        let mut records = vec![Record {
            id: root_id,
            name: self.volume_label.clone(),
            is_folder: true,
            parent: None,
            size: 0,
            created: None,
            modified: None,
            content: None,
            attributes: None,
            file_system: FsKind::Fat32,
            volume_size,
        }];

        let root_cluster = *self.boot.root_clus();
        let mut next_entry: u64 = 1;
        let mut visited = HashSet::from([root_cluster]);
        let mut queue = VecDeque::from([(root_cluster, root_id)]);

        while let Some((dir_cluster, parent_id)) = queue.pop_front() {
            let entries: Vec<DirEntry> = match self.dir_table(source, dir_cluster) {
                Ok(table) => table.active_entries().cloned().collect(),
                Err(FatError::Io(err)) => return Err(FatError::Io(err)),
                Err(err) => {
                    warn!("skipping directory at cluster {}: {}", dir_cluster, err);
                    continue;
                }
            };

            for entry in entries {
                if entry.name() == "." || entry.name() == ".." {
                    continue;
                }

                let id = RecordId::new(volume_seq, next_entry);
                next_entry += 1;

                let content = if !entry.is_directory() && is_text_name(entry.name()) {
                    match self.read_file_bytes(source, &entry) {
                        Ok(bytes) => Some(utils::decode_text(&bytes)),
                        Err(FatError::Io(err)) => return Err(FatError::Io(err)),
                        Err(err) => {
                            warn!("could not read content of {}: {}", entry.name(), err);
                            None
                        }
                    }
                } else {
                    None
                };

                records.push(Record {
                    id,
                    name: entry.name().clone(),
                    is_folder: entry.is_directory(),
                    parent: Some(parent_id),
                    size: u64::from(*entry.size()),
                    created: *entry.created(),
                    modified: *entry.modified(),
                    content,
                    attributes: Some(entry.attrs().names()),
                    file_system: FsKind::Fat32,
                    volume_size,
                });

                if entry.is_directory() {
                    let cluster = *entry.start_cluster();
                    if cluster >= 2 && visited.insert(cluster) {
                        queue.push_back((cluster, id));
                    }
                }
            }
        }

        Ok(records)
    }
}

fn is_text_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => TEXT_EXTENSIONS.contains(&ext),
        None => false,
    }
}

impl LayoutDisplay for FatVol {
    fn display_layout(&self, indent: u8) -> String {
        let mut out = String::from("");
        let indent = " ".repeat(indent.into());

        let rsvd_start = self.start_sector;
        let fat_start = rsvd_start + u64::from(*self.boot.rsvd_sec_cnt());
        let fat_sz = u64::from(*self.boot.fat_sz_32());
        let data_start = fat_start + u64::from(*self.boot.num_fat()) * fat_sz;
        let data_end = data_start
            + u64::from(self.boot.cluster_count()) * u64::from(*self.boot.sec_per_clus());
        let end = self.start_sector + self.sector_cnt;

        writeln!(out, "{}┌{:─^55}┐", indent, " FAT32 Partition Layout ").unwrap();
        writeln!(
            out,
            "{}├{:^12}┬{:^12}┬{:^12}┬{:^16}┤",
            indent, "Region", "Start", "End", "Description"
        )
        .unwrap();
        writeln!(
            out,
            "{}├{:─<12}┼{:─<12}┼{:─<12}┼{:─<16}┤",
            indent, "", "", "", ""
        )
        .unwrap();

        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
            indent, "Reserved", rsvd_start, fat_start, "Boot + Reserved"
        )
        .unwrap();
        for i in 0..*self.boot.num_fat() {
            let fat_i_start = fat_start + u64::from(i) * fat_sz;
            writeln!(
                out,
                "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
                indent,
                format!("FAT #{}", i),
                fat_i_start,
                fat_i_start + fat_sz,
                "FAT Tables"
            )
            .unwrap();
        }
        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
            indent, "Data", data_start, data_end, "Cluster Data"
        )
        .unwrap();
        if data_end < end {
            writeln!(
                out,
                "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
                indent, "", data_end, end, "Volume Slack"
            )
            .unwrap();
        }

        writeln!(
            out,
            "{}└{:─<12}┴{:─<12}┴{:─<12}┴{:─<16}┘",
            indent, "", "", "", ""
        )
        .unwrap();

        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fat32::boot_sector::tests::boot_sector_bytes;
    use crate::fat32::dir_entry::tests::{lfn_slot, short_slot};
    use crate::fat32::dir_entry::Attributes;
    use std::io::Cursor;

    /// Geometry used throughout: 512-byte sectors, 1 sector per cluster,
    /// 4 reserved sectors, 2 FATs of 2 sectors each. Data starts at sector 8,
    /// so cluster `c` sits at sector `8 + (c - 2)`.
    const DATA_START: usize = 8;

    pub(crate) struct ImageBuilder {
        sectors: Vec<u8>,
        fat: Vec<u32>,
    }

    impl ImageBuilder {
        pub(crate) fn new(total_sectors: usize) -> ImageBuilder {
            let mut sectors = vec![0u8; total_sectors * 512];
            let boot = boot_sector_bytes(1, 4, 2, 2, total_sectors as u32, 2, b"NO NAME    ");
            sectors[..512].copy_from_slice(&boot);
            let mut fat = vec![0u32; 256];
            fat[0] = 0x0FFF_FFF8;
            fat[1] = 0x0FFF_FFFF;
            ImageBuilder { sectors, fat }
        }

        /// Marks `clusters` as one chain ending in EOC and writes `data`
        /// across them.
        pub(crate) fn chain(&mut self, clusters: &[u32], data: &[u8]) -> &mut Self {
            for pair in clusters.windows(2) {
                self.fat[pair[0] as usize] = pair[1];
            }
            self.fat[clusters[clusters.len() - 1] as usize] = 0x0FFF_FFFF;

            for (i, chunk) in data.chunks(512).enumerate() {
                let sector = DATA_START + (clusters[i] as usize - 2);
                self.sectors[sector * 512..sector * 512 + chunk.len()].copy_from_slice(chunk);
            }
            self
        }

        pub(crate) fn raw_fat_entry(&mut self, cluster: u32, value: u32) -> &mut Self {
            self.fat[cluster as usize] = value;
            self
        }

        pub(crate) fn build(&self) -> Cursor<Vec<u8>> {
            let mut sectors = self.sectors.clone();
            let fat_bytes: Vec<u8> = self.fat.iter().flat_map(|e| e.to_le_bytes()).collect();
            // Both FAT copies, at sectors 4 and 6.
            sectors[4 * 512..4 * 512 + fat_bytes.len()].copy_from_slice(&fat_bytes);
            sectors[6 * 512..6 * 512 + fat_bytes.len()].copy_from_slice(&fat_bytes);
            Cursor::new(sectors)
        }
    }

    fn sample_image() -> Cursor<Vec<u8>> {
        // Root (cluster 2): label, HELLO.TXT (cluster 3, 5 bytes), DOCS dir
        // (cluster 4). DOCS: dot entries plus "notes.txt" via LFN
        // (cluster 5, 700 bytes over clusters 5 and 6).
        let mut root = short_slot(b"USB KEY    ", Attributes::VOLUME_LABEL, 0, 0);
        root.extend(short_slot(b"HELLO   TXT", Attributes::ARCHIVE, 3, 5));
        root.extend(short_slot(b"DOCS       ", Attributes::DIRECTORY, 4, 0));

        let mut docs = short_slot(b".          ", Attributes::DIRECTORY, 4, 0);
        docs.extend(short_slot(b"..         ", Attributes::DIRECTORY, 0, 0));
        docs.extend(lfn_slot(0x41, "notes.txt"));
        docs.extend(short_slot(b"NOTES   TXT", Attributes::ARCHIVE, 5, 700));

        let mut notes = vec![b'A'; 512];
        notes.extend(vec![b'B'; 188]);
        // Slack in the final cluster that must not leak into the text.
        notes.extend(vec![b'Z'; 324]);

        let mut builder = ImageBuilder::new(32);
        builder
            .chain(&[2], &root)
            .chain(&[3], b"hello")
            .chain(&[4], &docs)
            .chain(&[5, 6], &notes);
        builder.build()
    }

    #[test]
    fn mount_reads_label_from_root_directory() {
        let mut src = sample_image();
        let vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();
        assert_eq!(vol.volume_label(), "USB KEY");
    }

    #[test]
    fn label_falls_back_to_boot_sector() {
        let mut builder = ImageBuilder::new(32);
        builder.chain(&[2], &short_slot(b"A       TXT", Attributes::ARCHIVE, 3, 1));
        builder.chain(&[3], b"x");
        let mut src = builder.build();

        let vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();
        assert_eq!(vol.volume_label(), "NO NAME");
    }

    #[test]
    fn visit_directory_is_case_insensitive() {
        let mut src = sample_image();
        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();

        let table = vol.visit_directory(&mut src, "docs").unwrap();
        assert!(table.find("notes.txt").is_some());
        assert!(vol.visit_directory(&mut src, "DOCS").is_ok());
        assert!(vol.visit_directory(&mut src, "/USB KEY/docs").is_ok());
    }

    #[test]
    fn visit_rejects_missing_and_non_directories() {
        let mut src = sample_image();
        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();

        assert!(matches!(
            vol.visit_directory(&mut src, "nope"),
            Err(FatError::DirectoryNotFound(_))
        ));
        assert!(matches!(
            vol.visit_directory(&mut src, "hello.txt"),
            Err(FatError::NotADirectory(_))
        ));
    }

    #[test]
    fn read_text_clamps_to_file_size() {
        let mut src = sample_image();
        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();

        assert_eq!(vol.read_text(&mut src, "hello.txt").unwrap(), "hello");

        let notes = vol.read_text(&mut src, "docs/notes.txt").unwrap();
        assert_eq!(notes.len(), 700);
        assert!(notes.ends_with('B'));
        assert!(!notes.contains('Z'));
    }

    #[test]
    fn read_text_distinguishes_files_and_directories() {
        let mut src = sample_image();
        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();

        assert!(matches!(
            vol.read_text(&mut src, "docs"),
            Err(FatError::IsADirectory(_))
        ));
        assert!(matches!(
            vol.read_text(&mut src, "docs/nope.txt"),
            Err(FatError::FileNotFound(_))
        ));
    }

    #[test]
    fn corrupt_chain_fails_the_read() {
        let mut builder = ImageBuilder::new(32);
        builder.chain(&[2], &short_slot(b"LOOP    TXT", Attributes::ARCHIVE, 3, 2000));
        builder.chain(&[3, 4], &vec![b'x'; 1024]);
        builder.raw_fat_entry(4, 3); // 3 -> 4 -> 3
        let mut src = builder.build();

        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();
        assert!(matches!(
            vol.read_text(&mut src, "loop.txt"),
            Err(FatError::CorruptClusterChain(3))
        ));
    }

    #[test]
    fn records_walk_the_whole_tree() {
        let mut src = sample_image();
        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();

        let records = vol.records(&mut src, 1).unwrap();

        let root = &records[0];
        assert_eq!(root.id, RecordId::new(1, 0));
        assert_eq!(root.name, "USB KEY");
        assert!(root.parent.is_none());
        assert!(root.attributes.is_none());

        let hello = records.iter().find(|r| r.name == "HELLO.TXT").unwrap();
        assert_eq!(hello.parent, Some(root.id));
        assert_eq!(hello.size, 5);
        assert_eq!(hello.content.as_deref(), Some("hello"));
        assert_eq!(hello.attributes.as_deref(), Some(&["Archive"][..]));

        let docs = records.iter().find(|r| r.name == "DOCS").unwrap();
        assert!(docs.is_folder);

        let notes = records.iter().find(|r| r.name == "notes.txt").unwrap();
        assert_eq!(notes.parent, Some(docs.id));
        assert_eq!(notes.size, 700);

        // Dot entries never become records.
        assert!(records.iter().all(|r| r.name != "." && r.name != ".."));
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn directory_loop_does_not_hang_the_walk() {
        // EVIL's ".." points back at itself via the visited-cluster guard.
        let mut root = short_slot(b"EVIL       ", Attributes::DIRECTORY, 3, 0);
        root.extend(short_slot(b"A       TXT", Attributes::ARCHIVE, 4, 1));
        let evil = short_slot(b"LOOP       ", Attributes::DIRECTORY, 3, 0);

        let mut builder = ImageBuilder::new(32);
        builder.chain(&[2], &root).chain(&[3], &evil).chain(&[4], b"x");
        let mut src = builder.build();

        let mut vol = FatVol::mount(&mut src, 0, 32, false, 512).unwrap();
        let records = vol.records(&mut src, 0).unwrap();
        // root, EVIL, A.TXT, LOOP; LOOP is not descended into again.
        assert_eq!(records.len(), 4);
    }
}

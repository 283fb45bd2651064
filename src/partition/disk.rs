//! Disk image analysis.
//!
//! Opens a raw disk image, parses its partition table, and mounts a volume
//! reader on every partition of a recognized kind. A partition that fails to
//! mount is logged and skipped so the remaining volumes stay usable. The disk
//! owns the single byte source; volumes borrow it per operation.

use log::{error, info};
use std::fs::File;
use std::path::Path;

use super::disk_error::DiskError;
use super::mbr::{Mbr, PartitionKind};
use crate::fat32::{DirEntry, FatError, FatVol};
use crate::ntfs::NtfsVol;
use crate::source::ByteSource;
use crate::traits::LayoutDisplay;
use crate::tree::{FsKind, Record, Tree};

/// One mounted volume, dispatched by filesystem kind.
pub enum Volume {
    Ntfs(NtfsVol),
    Fat32(FatVol),
}

impl Volume {
    pub fn kind(&self) -> FsKind {
        match self {
            Volume::Ntfs(_) => FsKind::Ntfs,
            Volume::Fat32(_) => FsKind::Fat32,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Volume::Ntfs(vol) => vol.volume_name(),
            Volume::Fat32(vol) => vol.volume_label(),
        }
    }
}

impl LayoutDisplay for Volume {
    fn display_layout(&self, indent: u8) -> String {
        match self {
            Volume::Ntfs(vol) => vol.display_layout(indent),
            Volume::Fat32(vol) => vol.display_layout(indent),
        }
    }
}

/// A disk image: its partition table and every volume that mounted.
pub struct Disk<S: ByteSource> {
    source: S,
    sector_size: usize,
    mbr: Mbr,
    volumes: Vec<Volume>,
}

impl Disk<File> {
    /// Opens a disk image file read-only and analyzes it.
    ///
    /// # Errors
    ///
    /// - `DiskError::Io` if the file cannot be opened or read
    /// - MBR parsing and validation errors
    pub fn open(path: &Path, sector_size: usize, validate: bool) -> Result<Disk<File>, DiskError> {
        let file = File::open(path)?;
        Disk::from_source(file, sector_size, validate)
    }
}

impl<S: ByteSource> Disk<S> {
    /// Parses the partition table and mounts a reader on every NTFS or FAT32
    /// partition. Partitions of other kinds, and partitions whose reader
    /// fails to mount, are skipped.
    pub fn from_source(
        mut source: S,
        sector_size: usize,
        validate: bool,
    ) -> Result<Disk<S>, DiskError> {
        let mbr = Mbr::from_source(&mut source, sector_size)?;

        let mut volumes = Vec::new();
        for (idx, part) in mbr.partitions().iter().enumerate() {
            if !part.is_decodable() {
                continue;
            }
            let mounted = match part.kind() {
                PartitionKind::Ntfs => {
                    NtfsVol::scan(&mut source, *part.starting_sector(), validate, sector_size)
                        .map(Volume::Ntfs)
                        .map_err(|err| err.to_string())
                }
                PartitionKind::Fat32 => FatVol::mount(
                    &mut source,
                    *part.starting_sector(),
                    *part.sector_cnt(),
                    validate,
                    sector_size,
                )
                .map(Volume::Fat32)
                .map_err(|err| err.to_string()),
                _ => unreachable!(),
            };

            match mounted {
                Ok(volume) => {
                    info!(
                        "mounted {} volume \"{}\" at sector {}",
                        volume.kind(),
                        volume.label(),
                        part.starting_sector()
                    );
                    volumes.push(volume);
                }
                Err(err) => {
                    error!("cannot mount partition #{}: {}", idx + 1, err);
                }
            }
        }

        Ok(Disk {
            source,
            sector_size,
            mbr,
            volumes,
        })
    }

    pub fn mbr(&self) -> &Mbr {
        &self.mbr
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Collects the normalized records of every mounted volume. Volumes are
    /// numbered in mount order, which namespaces their record identifiers.
    pub fn records(&mut self) -> Result<Vec<Record>, DiskError> {
        let mut all = Vec::new();
        for (seq, volume) in self.volumes.iter_mut().enumerate() {
            match volume {
                Volume::Ntfs(vol) => all.extend(vol.records(seq as u32)),
                Volume::Fat32(vol) => {
                    all.extend(vol.records(&mut self.source, seq as u32).map_err(fat_error)?)
                }
            }
        }
        Ok(all)
    }

    /// Builds the merged record tree over all mounted volumes.
    pub fn tree(&mut self) -> Result<Tree, DiskError> {
        Ok(Tree::build(self.records()?))
    }

    /// Lists the directory at `path` on the FAT32 volume `vol_idx`.
    ///
    /// # Errors
    ///
    /// - `DiskError::NoSuchVolume` for an out-of-range index
    /// - `DiskError::Volume` when the volume is not FAT32 or the path does
    ///   not resolve to a directory
    pub fn list_directory(
        &mut self,
        vol_idx: usize,
        path: &str,
    ) -> Result<Vec<DirEntry>, DiskError> {
        let (vol, source) = self.fat_volume(vol_idx)?;
        Ok(vol
            .visit_directory(source, path)
            .map_err(fat_error)?
            .active_entries()
            .cloned()
            .collect())
    }

    /// Reads the file at `path` on the FAT32 volume `vol_idx` as text.
    pub fn read_text(&mut self, vol_idx: usize, path: &str) -> Result<String, DiskError> {
        let (vol, source) = self.fat_volume(vol_idx)?;
        vol.read_text(source, path).map_err(fat_error)
    }

    fn fat_volume(&mut self, vol_idx: usize) -> Result<(&mut FatVol, &mut S), DiskError> {
        let volume = self
            .volumes
            .get_mut(vol_idx)
            .ok_or(DiskError::NoSuchVolume(vol_idx))?;
        match volume {
            Volume::Fat32(vol) => Ok((vol, &mut self.source)),
            Volume::Ntfs(_) => Err(DiskError::Volume(
                "directory browsing is only available on FAT32 volumes".to_string(),
            )),
        }
    }

    /// Renders the partition-table layout followed by each volume's layout.
    pub fn print_layout(&self, indent: u8) {
        print!("{}", self.mbr.display_layout(indent));
        for volume in &self.volumes {
            print!("\n{}", volume.display_layout(indent + 3));
        }
    }
}

fn fat_error(err: FatError) -> DiskError {
    match err {
        FatError::Io(io) => DiskError::Io(io),
        other => DiskError::Volume(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PART_TABLE_OFFSET;
    use crate::fat32::volume::tests::ImageBuilder;
    use crate::fat32::Attributes;
    use crate::fat32::dir_entry::tests::short_slot;
    use std::io::Cursor;

    /// Lays a FAT32 partition image (built partition-relative) into a disk
    /// image behind an MBR describing it.
    fn disk_with_fat_partition(part_start: u64, part_sectors: u32) -> Cursor<Vec<u8>> {
        let mut root = short_slot(b"KEY        ", Attributes::VOLUME_LABEL, 0, 0);
        root.extend(short_slot(b"HELLO   TXT", Attributes::ARCHIVE, 3, 5));
        let mut builder = ImageBuilder::new(part_sectors as usize);
        builder.chain(&[2], &root).chain(&[3], b"hello");
        let partition = builder.build().into_inner();

        let total = (part_start + u64::from(part_sectors)) * 512;
        let mut image = vec![0u8; total as usize];
        let off = PART_TABLE_OFFSET;
        image[off + 4] = 0x0C;
        image[off + 8..off + 12].copy_from_slice(&(part_start as u32).to_le_bytes());
        image[off + 12..off + 16].copy_from_slice(&part_sectors.to_le_bytes());
        image[510] = 0x55;
        image[511] = 0xAA;

        let part_off = (part_start * 512) as usize;
        image[part_off..part_off + partition.len()].copy_from_slice(&partition);
        Cursor::new(image)
    }

    #[test]
    fn mounts_decodable_partitions() {
        let src = disk_with_fat_partition(64, 32);
        let disk = Disk::from_source(src, 512, false).unwrap();
        assert_eq!(disk.volumes().len(), 1);
        assert_eq!(disk.volumes()[0].label(), "KEY");
        assert_eq!(disk.volumes()[0].kind(), FsKind::Fat32);
    }

    #[test]
    fn failed_mounts_leave_other_volumes_intact() {
        // Two FAT32 descriptors; the second points past the end of the image
        // and cannot mount.
        let mut src = disk_with_fat_partition(64, 32);
        {
            let image = src.get_mut();
            let off = PART_TABLE_OFFSET + 16;
            image[off + 4] = 0x0C;
            image[off + 8..off + 12].copy_from_slice(&96u32.to_le_bytes());
            image[off + 12..off + 16].copy_from_slice(&8u32.to_le_bytes());
        }
        let disk = Disk::from_source(src, 512, false).unwrap();
        assert_eq!(disk.volumes().len(), 1);
    }

    #[test]
    fn records_and_tree_come_from_all_volumes() {
        let src = disk_with_fat_partition(64, 32);
        let mut disk = Disk::from_source(src, 512, false).unwrap();

        let tree = disk.tree().unwrap();
        assert_eq!(tree.roots().len(), 1);
        let root = tree.roots()[0];
        assert_eq!(tree.get(root).unwrap().name, "KEY");
        assert_eq!(tree.children(root).len(), 1);
        let hello = tree.get(tree.children(root)[0]).unwrap();
        assert_eq!(hello.name, "HELLO.TXT");
        assert_eq!(hello.content.as_deref(), Some("hello"));
    }

    #[test]
    fn directory_browsing_requires_a_valid_volume() {
        let src = disk_with_fat_partition(64, 32);
        let mut disk = Disk::from_source(src, 512, false).unwrap();

        let entries = disk.list_directory(0, "").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "HELLO.TXT");

        assert!(matches!(
            disk.list_directory(5, ""),
            Err(DiskError::NoSuchVolume(5))
        ));
        assert_eq!(disk.read_text(0, "hello.txt").unwrap(), "hello");
    }
}

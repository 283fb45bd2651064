//! File Allocation Table decoding and cluster-chain traversal.
//!
//! FAT32 entries are 32 bits on disk but only the low 28 bits are
//! significant; the high nibble is masked off before interpretation. Chain
//! traversal always uses the first FAT copy.

use super::fat_error::FatError;
use crate::utils;
use std::collections::HashSet;

/// Mask selecting the significant 28 bits of a FAT32 entry.
const ENTRY_MASK: u32 = 0x0FFF_FFFF;
/// A free cluster.
const FREE: u32 = 0;
/// The bad-cluster marker.
const BAD: u32 = 0x0FFF_FFF7;
/// Entries at or above this value mark the end of a chain.
const EOC: u32 = 0x0FFF_FFF8;

/// One decoded FAT copy.
#[derive(Debug)]
pub struct Fat {
    links: Vec<u32>,
}

impl Fat {
    /// Decodes a FAT from its raw sectors; every entry is masked to 28 bits.
    pub fn from_bytes(bytes: &[u8]) -> Fat {
        let links = (0..bytes.len() / 4)
            .map(|i| utils::u32_at(bytes, i * 4) & ENTRY_MASK)
            .collect();
        Fat { links }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Walks the chain starting at `first_cluster`, collecting every cluster
    /// up to the end-of-chain marker.
    ///
    /// # Errors
    ///
    /// `FatError::CorruptClusterChain` when the chain revisits a cluster,
    /// leaves the table bounds, runs onto a free entry, or hits the
    /// bad-cluster marker. A broken chain never yields a partial read.
    pub fn chain(&self, first_cluster: u32) -> Result<Vec<u32>, FatError> {
        let mut clusters = Vec::new();
        let mut visited = HashSet::new();
        let mut cluster = first_cluster;

        loop {
            if cluster < 2 || cluster as usize >= self.links.len() {
                return Err(FatError::CorruptClusterChain(cluster));
            }
            if !visited.insert(cluster) {
                return Err(FatError::CorruptClusterChain(cluster));
            }
            clusters.push(cluster);

            let next = self.links[cluster as usize];
            if next >= EOC {
                return Ok(clusters);
            }
            if next == FREE || next == BAD {
                return Err(FatError::CorruptClusterChain(cluster));
            }
            cluster = next;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds FAT bytes from 32-bit entries.
    pub(crate) fn fat_bytes(entries: &[u32]) -> Vec<u8> {
        entries.iter().flat_map(|e| e.to_le_bytes()).collect()
    }

    #[test]
    fn masks_the_high_nibble() {
        let fat = Fat::from_bytes(&fat_bytes(&[0xFFFF_FFF8, 0xFFFF_FFFF, 0xF000_0003]));
        assert_eq!(fat.links[0], 0x0FFF_FFF8);
        assert_eq!(fat.links[2], 3);
    }

    #[test]
    fn walks_a_linked_chain() {
        // 2 -> 3 -> 5 -> EOC; cluster 4 is free.
        let fat = Fat::from_bytes(&fat_bytes(&[
            0x0FFF_FFF8,
            0x0FFF_FFFF,
            3,
            5,
            0,
            0x0FFF_FFFF,
        ]));
        assert_eq!(fat.chain(2).unwrap(), vec![2, 3, 5]);
    }

    #[test]
    fn any_eoc_value_terminates() {
        let fat = Fat::from_bytes(&fat_bytes(&[0, 0, 3, 0x0FFF_FFF8, 0]));
        assert_eq!(fat.chain(2).unwrap(), vec![2, 3]);
    }

    #[test]
    fn loop_is_reported_as_corrupt() {
        // 2 -> 3 -> 2.
        let fat = Fat::from_bytes(&fat_bytes(&[0, 0, 3, 2]));
        assert!(matches!(
            fat.chain(2),
            Err(FatError::CorruptClusterChain(2))
        ));
    }

    #[test]
    fn free_link_is_corrupt() {
        let fat = Fat::from_bytes(&fat_bytes(&[0, 0, 3, 0]));
        assert!(matches!(
            fat.chain(2),
            Err(FatError::CorruptClusterChain(3))
        ));
    }

    #[test]
    fn bad_cluster_link_is_corrupt() {
        let fat = Fat::from_bytes(&fat_bytes(&[0, 0, 3, 0x0FFF_FFF7]));
        assert!(matches!(
            fat.chain(2),
            Err(FatError::CorruptClusterChain(3))
        ));
    }

    #[test]
    fn out_of_bounds_link_is_corrupt() {
        let fat = Fat::from_bytes(&fat_bytes(&[0, 0, 500]));
        assert!(matches!(
            fat.chain(2),
            Err(FatError::CorruptClusterChain(500))
        ));
    }
}

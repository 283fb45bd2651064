//!
//! rawvol: A library and CLI for decoding NTFS and FAT32 structures from raw
//! disk images.
//!
//! This crate provides tools for:
//! - Parsing and validating Master Boot Records and their EBR chains
//! - Scanning NTFS volumes through the Master File Table
//! - Traversing FAT32 volumes through the FAT and directory tables
//! - Merging every volume's files into one normalized record tree
//!
//! The library is designed for extensibility and can be used both as a CLI
//! tool and as a Rust library.
//!
//! # Re-exports
//! - [`Disk`]: Disk abstraction with partition and volume management
//! - [`Volume`]: Enum for supported volume types
//! - [`Tree`] / [`Record`]: The normalized record tree over all volumes

pub mod commands;
pub mod constants;
pub mod fat32;
pub mod ntfs;
pub mod partition;
pub mod source;
pub mod traits;
pub mod tree;
pub mod utils;

/// Disk abstraction with partition and volume management (see [`partition::disk::Disk`]).
pub use crate::partition::disk::Disk;
/// Enum for supported volume types (see [`partition::disk::Volume`]).
pub use crate::partition::disk::Volume;
/// Random-access byte source every reader operates on (see [`source::ByteSource`]).
pub use crate::source::ByteSource;
/// One normalized record of the merged tree (see [`tree::Record`]).
pub use crate::tree::Record;
/// Namespaced record identifier (see [`tree::RecordId`]).
pub use crate::tree::RecordId;
/// The merged record tree (see [`tree::Tree`]).
pub use crate::tree::Tree;

//! This is the main entry point for the disk inspection tool.
//!
//! The program provides an interactive command-line interface for analyzing
//! raw disk images holding NTFS and FAT32 partitions. Users can open an
//! image, print its layout, dump the merged record tree, and browse FAT32
//! volumes with `ls` and `cat`.

use log::{error, warn};
use rawvol::commands::Command;
use rawvol::constants::SECTOR_SIZE;
use rawvol::{Disk, Volume};
use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

/// Represents the runtime state of the program.
///
/// This struct keeps track of the currently opened disk image and the volume
/// selected for browsing.
struct RunState {
    /// The currently opened disk image.
    disk: Option<Disk<File>>,
    /// Volume in inspection mode, zero-based.
    vol_nb: Option<usize>,
    /// Enable the validation of on-disk structures.
    validation: bool,
    /// The size of a sector.
    sector_size: usize,
}

fn main() {
    stderrlog::new().module(module_path!()).init().unwrap();

    let mut run_state = RunState {
        disk: None,
        vol_nb: None,
        validation: true,
        sector_size: SECTOR_SIZE,
    };

    loop {
        print!("> ");
        io::stdout().flush().unwrap();

        let mut s = String::new();
        io::stdin()
            .read_line(&mut s)
            .expect("Failed to read command");
        let cmd = Command::from_string(&s);

        match cmd {
            Command::Open(path) => {
                match Disk::open(
                    Path::new(&path),
                    run_state.sector_size,
                    run_state.validation,
                ) {
                    Ok(disk) => {
                        println!("{} volume(s) mounted.", disk.volumes().len());
                        run_state.disk = Some(disk);
                        run_state.vol_nb = None;
                    }
                    Err(err) => {
                        error!("{err}");
                    }
                }
            }
            Command::Quit => break,
            Command::Print => match &run_state.disk {
                Some(disk) => {
                    disk.print_layout(3);
                }
                None => error!("Open disk image first"),
            },
            Command::Partition(vol_nb) => {
                if let Some(disk) = &run_state.disk {
                    let index = vol_nb as usize;
                    if index == 0 || index > disk.volumes().len() {
                        error!(
                            "Invalid volume number. There are {} valid volumes on disk.",
                            disk.volumes().len()
                        );
                    } else {
                        describe_volume(&disk.volumes()[index - 1]);
                        run_state.vol_nb = Some(index - 1);
                    }
                } else {
                    warn!("Open disk image first");
                }
            }
            Command::Tree => {
                if let Some(disk) = run_state.disk.as_mut() {
                    match disk.tree() {
                        Ok(tree) => print!("{}", tree.display_tree()),
                        Err(err) => error!("Tree construction failed: {err}"),
                    }
                } else {
                    warn!("Open disk image first")
                }
            }
            Command::List(path) => list_directory(&mut run_state, &path),
            Command::Cat(path) => cat_file(&mut run_state, &path),
            Command::Skip => run_state.validation = false,
            Command::Unknown(s) => error!("Unknown command: {s:?}"),
            Command::Invalid(s) => error!("{s}"),
            Command::Empty => {}
        }
    }
}

fn describe_volume(volume: &Volume) {
    println!("Selected {} volume \"{}\".", volume.kind(), volume.label());
}

fn selected_volume(run_state: &RunState) -> Option<usize> {
    match run_state.vol_nb {
        Some(index) => Some(index),
        None => {
            warn!("Select a volume first with 'part <n>'");
            None
        }
    }
}

fn list_directory(run_state: &mut RunState, path: &str) {
    let Some(index) = selected_volume(run_state) else {
        return;
    };
    let Some(disk) = run_state.disk.as_mut() else {
        warn!("Open disk image first");
        return;
    };

    match disk.list_directory(index, path) {
        Ok(entries) => {
            for entry in entries {
                let marker = if entry.is_directory() { "<DIR>" } else { "" };
                println!("{:>10} {:>5}  {}", entry.size(), marker, entry.name());
            }
        }
        Err(err) => error!("{err}"),
    }
}

fn cat_file(run_state: &mut RunState, path: &str) {
    let Some(index) = selected_volume(run_state) else {
        return;
    };
    let Some(disk) = run_state.disk.as_mut() else {
        warn!("Open disk image first");
        return;
    };

    match disk.read_text(index, path) {
        Ok(text) => println!("{text}"),
        Err(err) => error!("{err}"),
    }
}

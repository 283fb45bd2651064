//! This module defines the `Command` enum and its associated methods for
//! parsing user commands of the interactive disk inspection tool.
//!
//! The `Command` enum represents the commands the user can input, such as
//! opening a disk image, printing its layout, listing a directory, reading a
//! file, or quitting the program.

/// Represents a user command of the disk inspection tool.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Command to quit the program.
    Quit,
    /// Command to open a disk image, encapsulating the file path as a `String`.
    Open(String),
    /// Command to print the disk and volume layouts.
    Print,
    /// Select the volume to browse.
    Partition(u8),
    /// Print the merged record tree of all volumes.
    Tree,
    /// List a directory of the selected volume.
    List(String),
    /// Print a file of the selected volume as text.
    Cat(String),
    /// Skip the on-disk structure validation.
    Skip,
    /// Command for an unknown input, encapsulating the raw input as a `String`.
    Unknown(String),
    /// Command for invalid input, encapsulating an error message as a `String`.
    Invalid(String),
    /// Command for an empty input.
    Empty,
}

impl Command {
    /// Parses a string into a `Command` instance.
    ///
    /// # Parameters
    /// - `s`: A string slice representing the user input.
    ///
    /// # Returns
    /// - The matching `Command` variant, `Command::Invalid` when a required
    ///   argument is missing or malformed, `Command::Unknown` for an
    ///   unrecognized verb, and `Command::Empty` for blank input.
    pub fn from_string(s: &str) -> Self {
        let mut parts = s.trim().split_whitespace();
        match parts.next() {
            Some("quit") => Command::Quit,
            Some("open") => match parts.next() {
                Some(arg) => Command::Open(arg.to_string()),
                None => Command::Invalid(String::from(
                    "Missing arg: 'open' expects the path to a '.img' file.",
                )),
            },
            Some("print") => Command::Print,
            Some("part") => match parts.next() {
                Some(arg) => match arg.parse::<u8>() {
                    Ok(nb) => Command::Partition(nb),
                    Err(_) => Command::Invalid(String::from(
                        "Arg parsing error: 'part' expects an unsigned integer.",
                    )),
                },
                None => Command::Invalid(String::from(
                    "Missing arg: 'part' expects the volume number.",
                )),
            },
            Some("tree") => Command::Tree,
            // Paths may contain spaces, so everything after the verb is the arg.
            Some("ls") => Command::List(parts.collect::<Vec<_>>().join(" ")),
            Some("cat") => {
                let path = parts.collect::<Vec<_>>().join(" ");
                if path.is_empty() {
                    Command::Invalid(String::from("Missing arg: 'cat' expects a file path."))
                } else {
                    Command::Cat(path)
                }
            }
            Some("skip") => Command::Skip,
            Some(other) => Command::Unknown(other.to_string()),
            None => Command::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_verbs() {
        assert_eq!(Command::from_string("quit"), Command::Quit);
        assert_eq!(Command::from_string(" print "), Command::Print);
        assert_eq!(Command::from_string("tree"), Command::Tree);
        assert_eq!(Command::from_string("skip"), Command::Skip);
        assert_eq!(
            Command::from_string("open disk.img"),
            Command::Open("disk.img".to_string())
        );
        assert_eq!(Command::from_string("part 2"), Command::Partition(2));
    }

    #[test]
    fn paths_keep_their_spaces() {
        assert_eq!(
            Command::from_string("cat docs/my notes.txt"),
            Command::Cat("docs/my notes.txt".to_string())
        );
        assert_eq!(Command::from_string("ls"), Command::List(String::new()));
    }

    #[test]
    fn missing_args_are_invalid() {
        assert!(matches!(Command::from_string("open"), Command::Invalid(_)));
        assert!(matches!(Command::from_string("part"), Command::Invalid(_)));
        assert!(matches!(Command::from_string("part x"), Command::Invalid(_)));
        assert!(matches!(Command::from_string("cat"), Command::Invalid(_)));
    }

    #[test]
    fn unknown_and_empty_inputs() {
        assert!(matches!(Command::from_string("frobnicate"), Command::Unknown(_)));
        assert_eq!(Command::from_string("   "), Command::Empty);
    }
}

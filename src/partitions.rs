//! Registered partitions and the fixed record key
//! Each partition holds exactly one record; collection identity (multiple
//! timetables, multiple chats) lives inside the serialized blob

use std::fmt;

/// A named logical collection in the durable store.
///
/// Partition names are declared here so the store can create every tree at
/// open time instead of discovering them lazily one write at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition(&'static str);

impl Partition {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Timetable list
pub const TIMETABLES: Partition = Partition::new("timetables");
/// Per-timetable course data
pub const COURSES: Partition = Partition::new("courses");
/// Chat history
pub const CHATS: Partition = Partition::new("chats");
/// Sidebar / UI flags
pub const SETTINGS: Partition = Partition::new("settings");
/// Note documents
pub const NOTES: Partition = Partition::new("notes");

/// Every partition the engine declares at open time
pub const ALL: &[Partition] = &[TIMETABLES, COURSES, CHATS, SETTINGS, NOTES];

/// The single key each partition stores its snapshot under
pub const RECORD_KEY: &str = "state";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_names_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(TIMETABLES.to_string(), "timetables");
        assert_eq!(format!("{}", NOTES), NOTES.name());
    }
}

//! Approximate linking of unit names to phone directory entries.

mod directory;
mod matcher;
mod normalize;

pub use directory::{DirectoryEntry, DirectoryStats, ListingSplitter};
pub use matcher::{FuzzyMatcher, MatchConfig};

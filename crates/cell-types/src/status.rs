use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse fill state of a cell, for UI and observability only.
///
/// Variants are listed in priority order: the first matching state wins.
/// Game logic never branches on this; insert/extract decisions consult the
/// capacity model directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    /// Nothing stored and no resource types committed.
    Empty,
    /// A new resource type could still be accepted.
    HasRoomForNewType,
    /// No new types fit, but an existing type has remaining capacity.
    HasRoomInExistingType,
    /// No capacity remains for anything.
    Full,
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CellStatus::Empty => "empty",
            CellStatus::HasRoomForNewType => "room-for-new-type",
            CellStatus::HasRoomInExistingType => "room-in-existing-type",
            CellStatus::Full => "full",
        };
        write!(f, "{s}")
    }
}

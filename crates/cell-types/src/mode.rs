use serde::{Deserialize, Serialize};

/// Whether a transfer is a dry-run or a committed mutation.
///
/// `Simulate` answers "how much would fit / come out" without touching the
/// ledger or the persisted record. `Modulate` commits the change and persists
/// it before returning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    Simulate,
    Modulate,
}

impl TransferMode {
    pub fn is_simulate(self) -> bool {
        matches!(self, TransferMode::Simulate)
    }

    pub fn is_modulate(self) -> bool {
        matches!(self, TransferMode::Modulate)
    }
}

use serde::Serialize;
use strum::{Display, EnumString};

/// Where a collection is in a reindex cycle
///
/// A blue/green cycle walks
/// `IDLE → FETCHING → NORMALIZING → WRITING_SHADOW → SWAPPING → RETIRING_OLD → IDLE`.
/// A direct load replaces the shadow write and the swap with
/// `WRITING_PRODUCTION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    Normalizing,
    WritingShadow,
    WritingProduction,
    Swapping,
    RetiringOld,
}

/// How a cycle writes its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReindexMode {
    /// Build staging indexes, then swap them in
    BlueGreen,
    /// Write straight into production (first-time bootstrap)
    Direct,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(CyclePhase::WritingShadow.to_string(), "WRITING_SHADOW");
        assert_eq!(CyclePhase::RetiringOld.to_string(), "RETIRING_OLD");
        assert_eq!(CyclePhase::default(), CyclePhase::Idle);
        assert_eq!(ReindexMode::BlueGreen.to_string(), "blue_green");
    }
}

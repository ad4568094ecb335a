// ABOUTME: Percentage/count resize instructions converted into exact instance targets.
// ABOUTME: Implements both the legacy and v2 rounding regimes.

use serde::{Deserialize, Serialize};

/// A resize instruction as written on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "UPPERCASE")]
pub enum Instruction {
    /// An absolute instance count.
    Count(u32),
    /// A percentage of the manifest's instance ceiling, clamped to 100.
    Percentage(u32),
}

/// Which percentage-to-count conversion an account uses.
///
/// Workflows persisted under one regime must keep computing the same
/// numbers when replayed, so both are implemented exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingRegime {
    /// The percentage names the share being handed to the new application;
    /// the old application keeps the remainder, with the transferred share
    /// rounded half-up.
    Legacy,
    /// The percentage names the share of the ceiling the old application
    /// keeps, rounded down.
    V2,
}

/// The number of new-application instances to run, given the phase's upsize
/// instruction and the ceiling recorded at setup.
pub fn upsize_count(instruction: Instruction, max_instance_count: u32) -> u32 {
    match instruction {
        Instruction::Count(c) => c.min(max_instance_count),
        Instruction::Percentage(p) => round_half_up(p.min(100), max_instance_count),
    }
}

/// The number of old-application instances that must remain running after a
/// resize.
///
/// Resolution order: an explicit downsize instruction wins; otherwise one is
/// inferred from the upsize instruction by symmetry (`100 - percent`, or
/// `max - count`); with neither, the old application is left untouched.
pub fn downsize_keep_count(
    regime: RoundingRegime,
    explicit: Option<Instruction>,
    upsize: Option<Instruction>,
    max_instance_count: u32,
) -> u32 {
    match regime {
        RoundingRegime::Legacy => {
            // Legacy reads both explicit and inferred instructions as the
            // share being moved to the new application.
            match explicit.or(upsize) {
                Some(Instruction::Percentage(p)) => {
                    max_instance_count.saturating_sub(round_half_up(p.min(100), max_instance_count))
                }
                Some(Instruction::Count(c)) => max_instance_count.saturating_sub(c),
                None => max_instance_count,
            }
        }
        RoundingRegime::V2 => {
            let keep = match (explicit, upsize) {
                (Some(Instruction::Percentage(p)), _) => {
                    floor_of(p.min(100), max_instance_count)
                }
                (Some(Instruction::Count(c)), _) => c,
                (None, Some(Instruction::Percentage(p))) => {
                    floor_of(100 - p.min(100), max_instance_count)
                }
                (None, Some(Instruction::Count(c))) => max_instance_count.saturating_sub(c),
                (None, None) => max_instance_count,
            };
            keep.min(max_instance_count)
        }
    }
}

// Widened to u64: percent * max can exceed u32 for very large ceilings.
fn round_half_up(percent: u32, max: u32) -> u32 {
    ((u64::from(percent) * u64::from(max) + 50) / 100) as u32
}

fn floor_of(percent: u32, max: u32) -> u32 {
    (u64::from(percent) * u64::from(max) / 100) as u32
}

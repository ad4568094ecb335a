// ABOUTME: Feature-flag evaluation collapsed into a per-phase mode value.
// ABOUTME: Flags are read fresh at phase start; call sites only ever see PhaseMode.

use crate::manifest::Enforcement;
use crate::resize::RoundingRegime;
use crate::types::NamePolicy;

/// Behavior switches evaluated by the surrounding platform.
///
/// Flags are queried once when a phase starts and folded into a
/// [`PhaseMode`]; nothing downstream re-checks a flag mid-phase.
pub trait FeatureFlagSource {
    fn is_enabled(&self, flag: Flag) -> bool;
}

/// Known behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Use the v2 percentage-to-count rounding regime instead of legacy.
    ResizeRoundingV2,
    /// Fail when the winning override level holds more than one manifest.
    SingleManifestEnforcement,
    /// Keep special characters in application names instead of sanitizing.
    AllowSpecialCharactersInNames,
}

/// The resolved behavior of one phase execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMode {
    pub rounding: RoundingRegime,
    pub enforcement: Enforcement,
    pub name_policy: NamePolicy,
}

impl PhaseMode {
    /// Read every flag once and fix the phase's behavior.
    pub fn resolve(flags: &dyn FeatureFlagSource) -> Self {
        Self {
            rounding: if flags.is_enabled(Flag::ResizeRoundingV2) {
                RoundingRegime::V2
            } else {
                RoundingRegime::Legacy
            },
            enforcement: if flags.is_enabled(Flag::SingleManifestEnforcement) {
                Enforcement::Strict
            } else {
                Enforcement::Lenient
            },
            name_policy: if flags.is_enabled(Flag::AllowSpecialCharactersInNames) {
                crate::types::NamePolicy::AllowSpecialCharacters
            } else {
                crate::types::NamePolicy::Sanitize
            },
        }
    }
}

impl Default for PhaseMode {
    fn default() -> Self {
        Self {
            rounding: RoundingRegime::Legacy,
            enforcement: Enforcement::Lenient,
            name_policy: NamePolicy::Sanitize,
        }
    }
}

/// Flag source with nothing enabled, for callers outside a platform context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFlags;

impl FeatureFlagSource for NoFlags {
    fn is_enabled(&self, _flag: Flag) -> bool {
        false
    }
}

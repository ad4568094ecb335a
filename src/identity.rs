// ABOUTME: Active/inactive application identity tracking across blue/green swaps.
// ABOUTME: One pure transition function per swap kind; rollback is the structural mirror.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AppId, AppName};

/// Sweeping-output name under which the identity state is persisted.
pub const INFO_OUTPUT_NAME: &str = "appIdentityInfo";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("swap of {kind:?} requires a rename report from the worker, none was returned")]
    MissingRenameReport { kind: SwapKind },
}

/// Which of the two application identities currently serves traffic.
///
/// Created after Setup with `active` = the old application and `inactive` =
/// the newly pushed one; mutated exactly once per swap or rollback response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoVariables {
    pub active_app_name: AppName,
    pub active_app_id: AppId,
    pub inactive_app_name: AppName,
    pub inactive_app_id: AppId,
    pub old_app_name: AppName,
    pub old_app_id: AppId,
    pub new_app_name: AppName,
    pub new_app_id: AppId,
    /// The inactive-slot name as it was before the most recent forward
    /// swap. A plain structural inverse cannot recover it once two swaps
    /// have renamed apps back and forth; kept one level deep only.
    pub most_recent_inactive_app_version_old_name: Option<AppName>,
}

impl InfoVariables {
    /// Identity state right after Setup: the pre-existing application still
    /// serves traffic, the freshly pushed one is idle.
    pub fn after_setup(old: (AppName, AppId), new: (AppName, AppId)) -> Self {
        Self {
            active_app_name: old.0.clone(),
            active_app_id: old.1.clone(),
            inactive_app_name: new.0.clone(),
            inactive_app_id: new.1.clone(),
            old_app_name: old.0,
            old_app_id: old.1,
            new_app_name: new.0,
            new_app_id: new.1,
            most_recent_inactive_app_version_old_name: None,
        }
    }
}

/// The four swap shapes, classified once from whether each side carries a
/// numeric version suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapKind {
    VersionToVersion,
    VersionToNonVersion,
    NonVersionToVersion,
    NonVersionToNonVersion,
}

impl SwapKind {
    pub fn classify(old: &AppName, new: &AppName) -> Self {
        match (old.is_versioned(), new.is_versioned()) {
            (true, true) => SwapKind::VersionToVersion,
            (true, false) => SwapKind::VersionToNonVersion,
            (false, true) => SwapKind::NonVersionToVersion,
            (false, false) => SwapKind::NonVersionToNonVersion,
        }
    }

    /// Every kind except version-to-version displaces a fixed name, which
    /// the worker resolves by renaming and reporting the outcome.
    pub fn involves_rename(&self) -> bool {
        !matches!(self, SwapKind::VersionToVersion)
    }
}

/// Post-rename names reported by the worker after a swap that touched a
/// fixed (non-versioned) application name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameReport {
    /// The application now serving traffic, under its current name.
    pub active_app_name: AppName,
    /// The displaced application, under its post-rename name.
    pub inactive_app_name: AppName,
}

/// Apply a forward swap to the identity state.
///
/// Version-to-version swaps need no rename: the new application becomes
/// active and the old one inactive, ids passing through unchanged. Any
/// kind touching a fixed name takes both resulting names from the worker's
/// rename report.
pub fn apply_swap(
    info: &InfoVariables,
    report: Option<&RenameReport>,
) -> Result<InfoVariables, IdentityError> {
    let kind = SwapKind::classify(&info.old_app_name, &info.new_app_name);
    let (active_name, inactive_name) = transition_names(kind, info, report, Direction::Forward)?;

    Ok(InfoVariables {
        active_app_name: active_name,
        active_app_id: info.new_app_id.clone(),
        inactive_app_name: inactive_name,
        inactive_app_id: info.old_app_id.clone(),
        most_recent_inactive_app_version_old_name: Some(info.inactive_app_name.clone()),
        ..info.clone()
    })
}

/// Apply the rollback of a forward swap: the same classification with the
/// old/new roles reversed, except that the inactive name is restored from
/// the one-level-deep history field instead of a structural inverse.
pub fn apply_rollback(
    info: &InfoVariables,
    report: Option<&RenameReport>,
) -> Result<InfoVariables, IdentityError> {
    let kind = SwapKind::classify(&info.new_app_name, &info.old_app_name);
    let (active_name, structural_inactive) =
        transition_names(kind, info, report, Direction::Rollback)?;

    let inactive_name = info
        .most_recent_inactive_app_version_old_name
        .clone()
        .unwrap_or(structural_inactive);

    Ok(InfoVariables {
        active_app_name: active_name,
        active_app_id: info.old_app_id.clone(),
        inactive_app_name: inactive_name,
        inactive_app_id: info.new_app_id.clone(),
        most_recent_inactive_app_version_old_name: None,
        ..info.clone()
    })
}

enum Direction {
    Forward,
    Rollback,
}

/// The pure name transition for one swap kind. Returns (active, inactive).
fn transition_names(
    kind: SwapKind,
    info: &InfoVariables,
    report: Option<&RenameReport>,
    direction: Direction,
) -> Result<(AppName, AppName), IdentityError> {
    if !kind.involves_rename() {
        return Ok(match direction {
            Direction::Forward => (info.new_app_name.clone(), info.old_app_name.clone()),
            Direction::Rollback => (info.old_app_name.clone(), info.new_app_name.clone()),
        });
    }

    let report = report.ok_or(IdentityError::MissingRenameReport { kind })?;
    Ok((
        report.active_app_name.clone(),
        report.inactive_app_name.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AppName {
        AppName::new(s).unwrap()
    }

    fn setup(old: &str, new: &str) -> InfoVariables {
        InfoVariables::after_setup(
            (name(old), AppId::new("id-old")),
            (name(new), AppId::new("id-new")),
        )
    }

    #[test]
    fn classification_covers_all_four_kinds() {
        assert_eq!(
            SwapKind::classify(&name("a__1"), &name("a__2")),
            SwapKind::VersionToVersion
        );
        assert_eq!(
            SwapKind::classify(&name("a__1"), &name("a")),
            SwapKind::VersionToNonVersion
        );
        assert_eq!(
            SwapKind::classify(&name("a"), &name("a__2")),
            SwapKind::NonVersionToVersion
        );
        assert_eq!(
            SwapKind::classify(&name("a"), &name("b")),
            SwapKind::NonVersionToNonVersion
        );
    }

    #[test]
    fn version_to_version_swaps_without_rename() {
        let info = setup("orders__1", "orders__2");
        let swapped = apply_swap(&info, None).unwrap();

        assert_eq!(swapped.active_app_name, name("orders__2"));
        assert_eq!(swapped.active_app_id, AppId::new("id-new"));
        assert_eq!(swapped.inactive_app_name, name("orders__1"));
        assert_eq!(swapped.inactive_app_id, AppId::new("id-old"));
    }

    #[test]
    fn rename_kinds_require_a_report() {
        let info = setup("orders", "orders__2");
        assert!(matches!(
            apply_swap(&info, None),
            Err(IdentityError::MissingRenameReport { .. })
        ));
    }

    #[test]
    fn rename_kinds_take_names_from_worker_report() {
        let info = setup("orders", "orders__2");
        let report = RenameReport {
            active_app_name: name("orders__2"),
            inactive_app_name: name("orders__INACTIVE"),
        };
        let swapped = apply_swap(&info, Some(&report)).unwrap();

        assert_eq!(swapped.active_app_name, name("orders__2"));
        assert_eq!(swapped.inactive_app_name, name("orders__INACTIVE"));
        assert_eq!(
            swapped.most_recent_inactive_app_version_old_name,
            Some(name("orders__2"))
        );
    }

    #[test]
    fn forward_then_rollback_restores_pair_for_all_kinds() {
        let cases = [
            ("orders__1", "orders__2", None, None),
            (
                "orders__1",
                "orders",
                Some(("orders", "orders__1__i")),
                Some(("orders__1", "orders__x")),
            ),
            (
                "orders",
                "orders__2",
                Some(("orders__2", "orders__i")),
                Some(("orders", "orders__x")),
            ),
            (
                "orders",
                "orders-next",
                Some(("orders-next", "orders__i")),
                Some(("orders", "orders__x")),
            ),
        ];

        for (old, new, fwd, back) in cases {
            let info = setup(old, new);
            let fwd_report = fwd.map(|(a, i)| RenameReport {
                active_app_name: name(a),
                inactive_app_name: name(i),
            });
            let back_report = back.map(|(a, i)| RenameReport {
                active_app_name: name(a),
                inactive_app_name: name(i),
            });

            let swapped = apply_swap(&info, fwd_report.as_ref()).unwrap();
            let restored = apply_rollback(&swapped, back_report.as_ref()).unwrap();

            assert_eq!(restored.active_app_name, info.active_app_name, "{old}->{new}");
            assert_eq!(restored.inactive_app_name, info.inactive_app_name, "{old}->{new}");
            assert_eq!(restored.active_app_id, info.active_app_id);
            assert_eq!(restored.inactive_app_id, info.inactive_app_id);
        }
    }

    #[test]
    fn history_field_is_one_level_deep() {
        let info = setup("orders__1", "orders__2");
        let swapped = apply_swap(&info, None).unwrap();
        assert_eq!(
            swapped.most_recent_inactive_app_version_old_name,
            Some(name("orders__2"))
        );

        let restored = apply_rollback(&swapped, None).unwrap();
        assert_eq!(restored.most_recent_inactive_app_version_old_name, None);
    }
}

//! Restore scope resolution
//!
//! Narrows a full snapshot down to the rows and objects belonging to one
//! tenant team. Membership is derived transitively: the profile table
//! yields the team's member user ids, member-scoped tables are filtered
//! against that set, and object ownership is inferred from storage path
//! conventions. The derivation rules are an explicit, per-table set rather
//! than a generic graph walk; the indirections are few and irregular.

use super::snapshot::{Row, Snapshot, UNIVERSAL_SCOPE};
use super::tables::{ScopeRule, PROFILE_TABLE, RESTORE_ORDER};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// The subset of the dataset a restore operation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreScope {
    /// The entire store
    All,
    /// One tenant team's data
    Team(String),
}

impl RestoreScope {
    /// Parse an operator-supplied scope; absent, empty, or `"all"` means
    /// the universal scope
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(UNIVERSAL_SCOPE) => Self::All,
            Some(team) => Self::Team(team.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => UNIVERSAL_SCOPE,
            Self::Team(team) => team.as_str(),
        }
    }
}

/// Derived membership sets for one team scope
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    pub team_id: String,
    /// User ids of the team's members (from the profile table)
    pub member_user_ids: Vec<String>,
    /// Ids of the team's generated workflows
    pub workflow_ids: HashSet<String>,
    /// Ids of the team's hierarchy designs
    pub design_ids: HashSet<String>,
}

impl ScopeFilter {
    /// Derive the membership sets from a snapshot already restricted to
    /// the team (either exported at team scope or narrowed here)
    pub fn derive(snapshot: &Snapshot, team_id: &str) -> Self {
        let member_user_ids: Vec<String> = snapshot
            .table_rows(PROFILE_TABLE)
            .iter()
            .filter_map(|r| str_field(r, "user_id"))
            .map(str::to_string)
            .collect();

        Self {
            team_id: team_id.to_string(),
            member_user_ids,
            workflow_ids: snapshot.table_ids("workflows"),
            design_ids: snapshot.table_ids("hierarchy_designs"),
        }
    }

    /// Filter values for a member-scoped column. When the snapshot carries
    /// no profile rows for the team, fall back to the team id itself so a
    /// degenerate single-user team still reconciles.
    pub fn member_filter_values(&self) -> Vec<String> {
        if self.member_user_ids.is_empty() {
            vec![self.team_id.clone()]
        } else {
            self.member_user_ids.clone()
        }
    }

    /// Whether a manifest object belongs to this team. Ownership is
    /// inferred from path conventions: a path segment naming the team
    /// (e.g. `business-plan/{team}/plan.pdf`), a path rooted under a
    /// member user id, or an `{owning-id}_...` filename prefix that maps
    /// to one of the team's workflows or hierarchy designs.
    pub fn retains_object(&self, path: &str) -> bool {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next().unwrap_or("");

        if path.split('/').any(|segment| segment == self.team_id) {
            return true;
        }
        if self.member_user_ids.iter().any(|m| m == first) {
            return true;
        }
        if let Some(owner) = filename_owner_id(path) {
            return self.workflow_ids.contains(owner) || self.design_ids.contains(owner);
        }
        false
    }
}

/// Owning-entity id encoded as the filename prefix before the first `_`
fn filename_owner_id(path: &str) -> Option<&str> {
    let filename = path.rsplit('/').next()?;
    let (prefix, _) = filename.split_once('_')?;
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

fn str_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    match row.get(column) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Narrow a snapshot to the requested scope.
///
/// Pure function: pass-through when the scopes already agree, narrowing
/// when an `"all"` snapshot is restored for one team. A narrow can never
/// widen: requesting a different team, or the universal scope against a
/// team-scoped snapshot, fails with `ScopeMismatch`.
///
/// Returns the (possibly narrowed) snapshot and, for team scopes, the
/// derived filter the reconciler restricts live rows with.
pub fn narrow(snapshot: &Snapshot, requested: &RestoreScope) -> Result<(Snapshot, Option<ScopeFilter>)> {
    match requested {
        RestoreScope::All => {
            if snapshot.scope == UNIVERSAL_SCOPE {
                Ok((snapshot.clone(), None))
            } else {
                Err(Error::ScopeMismatch {
                    snapshot: snapshot.scope.clone(),
                    requested: UNIVERSAL_SCOPE.to_string(),
                })
            }
        }
        RestoreScope::Team(team) => {
            if &snapshot.scope == team {
                let filter = ScopeFilter::derive(snapshot, team);
                return Ok((snapshot.clone(), Some(filter)));
            }
            if snapshot.scope != UNIVERSAL_SCOPE {
                return Err(Error::ScopeMismatch {
                    snapshot: snapshot.scope.clone(),
                    requested: team.clone(),
                });
            }
            Ok(narrow_to_team(snapshot, team))
        }
    }
}

fn narrow_to_team(snapshot: &Snapshot, team: &str) -> (Snapshot, Option<ScopeFilter>) {
    let mut tables: BTreeMap<String, Vec<Row>> = BTreeMap::new();

    // The profile table roots the derivation: its kept rows yield the
    // member user ids every member-scoped table is filtered against.
    let profiles: Vec<Row> = snapshot
        .table_rows(PROFILE_TABLE)
        .iter()
        .filter(|r| str_field(r, "team_id") == Some(team))
        .cloned()
        .collect();
    let members: HashSet<String> = profiles
        .iter()
        .filter_map(|r| str_field(r, "user_id"))
        .map(str::to_string)
        .collect();
    tables.insert(PROFILE_TABLE.to_string(), profiles);

    for table in RESTORE_ORDER.iter().filter(|t| t.name != PROFILE_TABLE) {
        let kept: Vec<Row> = snapshot
            .table_rows(table.name)
            .iter()
            .filter(|row| match table.scope {
                ScopeRule::Team(column) => str_field(row, column) == Some(team),
                ScopeRule::Member(column) => match str_field(row, column) {
                    Some(owner) if !members.is_empty() => members.contains(owner),
                    Some(owner) => owner == team,
                    None => false,
                },
            })
            .cloned()
            .collect();
        tables.insert(table.name.to_string(), kept);
    }

    let mut narrowed = Snapshot {
        exported_at: snapshot.exported_at,
        scope: team.to_string(),
        checksum: None,
        tables,
        object_manifest: Vec::new(),
    };

    let filter = ScopeFilter::derive(&narrowed, team);
    narrowed.object_manifest = snapshot
        .object_manifest
        .iter()
        .filter(|entry| filter.retains_object(&entry.path))
        .cloned()
        .collect();

    (narrowed, Some(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backup::snapshot::ManifestEntry;
    use serde_json::json;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn two_team_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new(UNIVERSAL_SCOPE);
        snapshot.tables.insert(
            PROFILE_TABLE.to_string(),
            vec![
                row(&[("id", "prof-1"), ("team_id", "team-1"), ("user_id", "user-1")]),
                row(&[("id", "prof-2"), ("team_id", "team-2"), ("user_id", "user-2")]),
            ],
        );
        snapshot.tables.insert(
            "departments".to_string(),
            vec![
                row(&[("id", "dep-1"), ("team_id", "team-1"), ("name", "Sales")]),
                row(&[("id", "dep-2"), ("team_id", "team-2"), ("name", "Ops")]),
            ],
        );
        snapshot.tables.insert(
            "workflows".to_string(),
            vec![
                row(&[("id", "wf-1"), ("user_id", "user-1"), ("kind", "growth")]),
                row(&[("id", "wf-2"), ("user_id", "user-2"), ("kind", "growth")]),
            ],
        );
        snapshot.tables.insert(
            "hierarchy_designs".to_string(),
            vec![
                row(&[("id", "hd-1"), ("team_id", "team-1")]),
                row(&[("id", "hd-2"), ("team_id", "team-2")]),
            ],
        );
        snapshot.object_manifest = vec![
            ManifestEntry {
                bucket: "workflow-diagrams".to_string(),
                path: "growth_workflows/wf-1_v3.png".to_string(),
                snapshot_path: "p/storage/workflow-diagrams/growth_workflows/wf-1_v3.png".to_string(),
            },
            ManifestEntry {
                bucket: "workflow-diagrams".to_string(),
                path: "growth_workflows/wf-2_v1.png".to_string(),
                snapshot_path: "p/storage/workflow-diagrams/growth_workflows/wf-2_v1.png".to_string(),
            },
            ManifestEntry {
                bucket: "generated-documents".to_string(),
                path: "business-plan/team-1/plan.pdf".to_string(),
                snapshot_path: "p/storage/generated-documents/business-plan/team-1/plan.pdf".to_string(),
            },
            ManifestEntry {
                bucket: "profile-pictures".to_string(),
                path: "user-2/avatar.png".to_string(),
                snapshot_path: "p/storage/profile-pictures/user-2/avatar.png".to_string(),
            },
        ];
        snapshot
    }

    #[test]
    fn test_universal_pass_through() {
        let snapshot = two_team_snapshot();
        let (narrowed, filter) = narrow(&snapshot, &RestoreScope::All).unwrap();
        assert_eq!(narrowed.row_count(), snapshot.row_count());
        assert!(filter.is_none());
    }

    #[test]
    fn test_narrow_to_team_keeps_only_owned_rows() {
        let snapshot = two_team_snapshot();
        let (narrowed, filter) =
            narrow(&snapshot, &RestoreScope::Team("team-1".to_string())).unwrap();
        let filter = filter.unwrap();

        assert_eq!(narrowed.scope, "team-1");
        assert_eq!(narrowed.table_ids(PROFILE_TABLE), HashSet::from(["prof-1".to_string()]));
        assert_eq!(narrowed.table_ids("departments"), HashSet::from(["dep-1".to_string()]));
        // workflows are member-scoped: user-1 belongs to team-1
        assert_eq!(narrowed.table_ids("workflows"), HashSet::from(["wf-1".to_string()]));
        assert_eq!(filter.member_user_ids, vec!["user-1".to_string()]);
        assert!(filter.workflow_ids.contains("wf-1"));
        assert!(!filter.workflow_ids.contains("wf-2"));
    }

    #[test]
    fn test_narrow_filters_object_manifest() {
        let snapshot = two_team_snapshot();
        let (narrowed, _) =
            narrow(&snapshot, &RestoreScope::Team("team-1".to_string())).unwrap();

        let kept: Vec<&str> = narrowed
            .object_manifest
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        // wf-1 diagram via filename prefix, team-1 plan via path segment;
        // user-2's avatar and wf-2's diagram belong to team-2
        assert_eq!(
            kept,
            vec!["growth_workflows/wf-1_v3.png", "business-plan/team-1/plan.pdf"]
        );
    }

    #[test]
    fn test_team_scoped_snapshot_pass_through() {
        let mut snapshot = two_team_snapshot();
        snapshot.scope = "team-1".to_string();
        let (narrowed, filter) =
            narrow(&snapshot, &RestoreScope::Team("team-1".to_string())).unwrap();
        // Pass-through: rows are not re-filtered
        assert_eq!(narrowed.row_count(), snapshot.row_count());
        assert!(filter.is_some());
    }

    #[test]
    fn test_scope_mismatch_between_teams() {
        let mut snapshot = two_team_snapshot();
        snapshot.scope = "team-1".to_string();
        let result = narrow(&snapshot, &RestoreScope::Team("team-2".to_string()));
        assert!(matches!(result, Err(Error::ScopeMismatch { .. })));
    }

    #[test]
    fn test_cannot_widen_team_snapshot_to_all() {
        let mut snapshot = two_team_snapshot();
        snapshot.scope = "team-1".to_string();
        let result = narrow(&snapshot, &RestoreScope::All);
        assert!(matches!(result, Err(Error::ScopeMismatch { .. })));
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(RestoreScope::parse(None), RestoreScope::All);
        assert_eq!(RestoreScope::parse(Some("")), RestoreScope::All);
        assert_eq!(RestoreScope::parse(Some("all")), RestoreScope::All);
        assert_eq!(
            RestoreScope::parse(Some(" team-9 ")),
            RestoreScope::Team("team-9".to_string())
        );
    }

    #[test]
    fn test_member_fallback_when_no_profiles() {
        let filter = ScopeFilter {
            team_id: "team-1".to_string(),
            member_user_ids: vec![],
            workflow_ids: HashSet::new(),
            design_ids: HashSet::new(),
        };
        assert_eq!(filter.member_filter_values(), vec!["team-1".to_string()]);
    }

    #[test]
    fn test_filename_owner_id() {
        assert_eq!(
            filename_owner_id("growth_workflows/wf-1_v3.png"),
            Some("wf-1")
        );
        assert_eq!(filename_owner_id("team_hierarchy/hd-77_render.svg"), Some("hd-77"));
        assert_eq!(filename_owner_id("plain.png"), None);
    }
}

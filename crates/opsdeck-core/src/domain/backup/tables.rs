//! Dependency order registry for the covered entity tables
//!
//! A static declaration, not computed: insertion order lists every parent
//! type before any type that references it, and cleanup order is the exact
//! reverse (children first). Adding an entity table means adding one entry
//! here (order position, scope rule, and unique column in a single
//! localized edit), and the unit tests below keep the two orderings
//! consistent by construction.

/// How a table's rows are attributed to a tenant team
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    /// Rows carry the team id directly in the named column
    Team(&'static str),
    /// Rows belong to a team member; the named column holds the owning
    /// user id, matched against the team's derived member set
    Member(&'static str),
}

/// One covered entity table
#[derive(Debug, Clone, Copy)]
pub struct EntityTable {
    pub name: &'static str,
    pub scope: ScopeRule,
    /// Secondary unique column the store enforces beyond the primary key
    pub unique_column: Option<&'static str>,
}

/// The tenant/profile table that roots scope derivation
pub const PROFILE_TABLE: &str = "business_profiles";

/// Insertion order: parents before children
pub const RESTORE_ORDER: &[EntityTable] = &[
    EntityTable {
        name: PROFILE_TABLE,
        scope: ScopeRule::Team("team_id"),
        unique_column: None,
    },
    EntityTable {
        name: "departments",
        scope: ScopeRule::Team("team_id"),
        unique_column: None,
    },
    EntityTable {
        name: "service_offerings",
        scope: ScopeRule::Team("team_id"),
        unique_column: None,
    },
    EntityTable {
        name: "workflows",
        scope: ScopeRule::Member("user_id"),
        unique_column: None,
    },
    EntityTable {
        name: "strategic_plans",
        scope: ScopeRule::Member("user_id"),
        unique_column: None,
    },
    EntityTable {
        name: "hierarchy_designs",
        scope: ScopeRule::Team("team_id"),
        unique_column: Some("team_id"),
    },
    EntityTable {
        name: "document_history",
        scope: ScopeRule::Member("user_id"),
        unique_column: None,
    },
    EntityTable {
        name: "onboarding_records",
        scope: ScopeRule::Member("user_id"),
        unique_column: None,
    },
    EntityTable {
        name: "page_permissions",
        scope: ScopeRule::Member("admin_user_id"),
        unique_column: Some("admin_user_id"),
    },
];

/// Cleanup order: children before parents (exact reverse of insertion)
pub fn cleanup_order() -> impl Iterator<Item = &'static EntityTable> {
    RESTORE_ORDER.iter().rev()
}

/// Look up a covered table by name
pub fn covered_table(name: &str) -> Option<&'static EntityTable> {
    RESTORE_ORDER.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_is_exact_reverse_of_insertion() {
        let forward: Vec<&str> = RESTORE_ORDER.iter().map(|t| t.name).collect();
        let mut backward: Vec<&str> = cleanup_order().map(|t| t.name).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_table_names_are_unique() {
        for (i, a) in RESTORE_ORDER.iter().enumerate() {
            for b in &RESTORE_ORDER[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_unique_column_registry() {
        let with_unique: Vec<(&str, &str)> = RESTORE_ORDER
            .iter()
            .filter_map(|t| t.unique_column.map(|c| (t.name, c)))
            .collect();
        assert_eq!(
            with_unique,
            vec![
                ("hierarchy_designs", "team_id"),
                ("page_permissions", "admin_user_id"),
            ]
        );
    }

    #[test]
    fn test_profile_table_is_first() {
        // Scope derivation reads member ids from the profile table, so it
        // must be written before any member-scoped table.
        assert_eq!(RESTORE_ORDER[0].name, PROFILE_TABLE);
    }

    #[test]
    fn test_document_history_follows_strategic_plans() {
        // document_history.source_plan_id references strategic_plans(id)
        let pos = |name: &str| RESTORE_ORDER.iter().position(|t| t.name == name).unwrap();
        assert!(pos("strategic_plans") < pos("document_history"));
    }
}

//! Run report

use cpd_common::PrincipalKind;
use serde::Serialize;

/// Which step failed for a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The primary email or an alias is not `local@domain`; nothing was attempted
    MalformedAddress,
    PrimaryUpdate,
    AliasInsert,
}

/// A per-record failure, kept for the operator to review before re-running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalFailure {
    pub id: String,
    pub email: String,
    pub kind: FailureKind,
    /// The alias being inserted, when the failure was an alias insert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub reason: String,
}

/// Counts for one principal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub kind: PrincipalKind,
    pub renamed: usize,
    pub already_current: usize,
    pub failed: usize,
    pub aliases_added: usize,
    pub alias_failures: usize,
    pub failures: Vec<PrincipalFailure>,
}

impl PassReport {
    pub fn new(kind: PrincipalKind) -> Self {
        Self {
            kind,
            renamed: 0,
            already_current: 0,
            failed: 0,
            aliases_added: 0,
            alias_failures: 0,
            failures: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.renamed + self.already_current + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.alias_failures > 0
    }
}

/// What happened to the customer's primary domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainOutcome {
    Updated,
    AlreadyCurrent,
    /// Dry run: the update was confirmed but not sent
    Planned,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub customer_id: String,
    pub domain: DomainOutcome,
    pub dry_run: bool,
    pub users: PassReport,
    pub groups: PassReport,
}

impl MigrationReport {
    pub fn has_failures(&self) -> bool {
        self.users.has_failures() || self.groups.has_failures()
    }

    /// Successful write calls (in a dry run, the writes that would have been issued).
    pub fn mutation_count(&self) -> usize {
        let domain = usize::from(self.domain != DomainOutcome::AlreadyCurrent);
        domain
            + self.users.renamed
            + self.users.aliases_added
            + self.groups.renamed
            + self.groups.aliases_added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(domain: DomainOutcome, dry_run: bool) -> MigrationReport {
        MigrationReport {
            customer_id: "C01".into(),
            domain,
            dry_run,
            users: PassReport::new(PrincipalKind::User),
            groups: PassReport::new(PrincipalKind::Group),
        }
    }

    #[test]
    fn test_planned_domain_update_is_reported_as_planned() {
        let planned = report(DomainOutcome::Planned, true);
        let json = serde_json::to_value(&planned).unwrap();
        assert_eq!(json["domain"], "PLANNED");
        assert_eq!(planned.mutation_count(), 1);
        assert_eq!(report(DomainOutcome::AlreadyCurrent, false).mutation_count(), 0);
    }

    #[test]
    fn test_failure_kind_is_serialized() {
        let failure = PrincipalFailure {
            id: "u9".into(),
            email: "no-at-sign".into(),
            kind: FailureKind::MalformedAddress,
            alias: None,
            reason: "missing '@' separator".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "MALFORMED_ADDRESS");
        assert!(json.get("alias").is_none());
    }
}

//! Domain-rename reconciliation.
//!
//! Decides, from a principal's current primary email and aliases, which
//! mutations move it onto the new domain while keeping every previously
//! reachable address reachable. Plans are derived from current state on
//! every run and never stored, so re-running over an already migrated
//! directory yields plans with nothing to do.

use cpd_common::Principal;

use crate::address::{replace_domain, split_address, MalformedAddress};

/// What happens to the primary email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryChange {
    /// Already on the new domain; no update call is issued.
    AlreadyCurrent,
    Rename { to: String },
}

/// Mutations for one principal in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub current_primary: String,
    pub primary: PrimaryChange,
    /// Aliases to insert, in listing order
    pub aliases_to_add: Vec<String>,
}

impl RenamePlan {
    /// Primary email once the plan is applied.
    pub fn new_primary(&self) -> &str {
        match &self.primary {
            PrimaryChange::AlreadyCurrent => &self.current_primary,
            PrimaryChange::Rename { to } => to,
        }
    }

    pub fn is_already_current(&self) -> bool {
        self.primary == PrimaryChange::AlreadyCurrent
    }

    /// True when applying the plan issues no calls at all.
    pub fn is_noop(&self) -> bool {
        self.is_already_current() && self.aliases_to_add.is_empty()
    }
}

/// Plans renames from `old_domain` to `new_domain`.
#[derive(Debug, Clone)]
pub struct DomainReconciler {
    old_domain: String,
    new_domain: String,
    preserve_old_primary: bool,
}

impl DomainReconciler {
    pub fn new(old_domain: impl Into<String>, new_domain: impl Into<String>) -> Self {
        Self {
            old_domain: old_domain.into(),
            new_domain: new_domain.into(),
            preserve_old_primary: false,
        }
    }

    /// Also schedule the old primary address as an alias when the primary
    /// is renamed off the old domain and nothing else keeps it reachable.
    pub fn with_preserve_old_primary(mut self, preserve: bool) -> Self {
        self.preserve_old_primary = preserve;
        self
    }

    pub fn old_domain(&self) -> &str {
        &self.old_domain
    }

    pub fn new_domain(&self) -> &str {
        &self.new_domain
    }

    pub fn plan(&self, principal: &Principal) -> Result<RenamePlan, MalformedAddress> {
        let mut plan = plan_principal_rename(principal, &self.old_domain, &self.new_domain)?;

        let old_primary = &principal.primary_email;
        let leaves_old_domain = !plan.is_already_current()
            && split_address(old_primary)?.1 == self.old_domain;
        if self.preserve_old_primary && leaves_old_domain {
            let reachable = principal.has_alias(old_primary) || plan.aliases_to_add.contains(old_primary);
            if !reachable {
                plan.aliases_to_add.insert(0, old_primary.clone());
            }
        }

        Ok(plan)
    }
}

/// Compute the rename plan for one principal.
///
/// Every existing alias other than the old-domain form of the primary is
/// mirrored onto the new domain unless that address is already an alias.
/// The old-domain form of the primary itself is not added when missing; see
/// [`DomainReconciler::with_preserve_old_primary`].
pub fn plan_principal_rename(
    principal: &Principal,
    old_domain: &str,
    new_domain: &str,
) -> Result<RenamePlan, MalformedAddress> {
    let candidate = replace_domain(&principal.primary_email, new_domain)?;
    let primary = if candidate == principal.primary_email {
        PrimaryChange::AlreadyCurrent
    } else {
        PrimaryChange::Rename { to: candidate.clone() }
    };

    let old_primary_as_alias = replace_domain(&principal.primary_email, old_domain)?;

    let mut aliases_to_add: Vec<String> = Vec::new();
    for alias in &principal.aliases {
        if *alias == old_primary_as_alias {
            continue;
        }
        let mirrored = replace_domain(alias, new_domain)?;
        if principal.has_alias(&mirrored) || mirrored == candidate || aliases_to_add.contains(&mirrored) {
            continue;
        }
        aliases_to_add.push(mirrored);
    }

    Ok(RenamePlan {
        current_primary: principal.primary_email.clone(),
        primary,
        aliases_to_add,
    })
}

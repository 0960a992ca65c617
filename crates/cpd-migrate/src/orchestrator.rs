//! Migration phases: customer domain swap, user pass, group pass.
//!
//! Phases run strictly in sequence with one request in flight at a time.
//! Each rename pass snapshots the full listing before issuing any write, so
//! renames cannot shift records between pages of the cursor being read.
//!
//! Failure policy:
//! - Reading the customer, updating its domain, listing users or groups and
//!   reading a confirmation are fatal and end the run with an error.
//! - A failed rename, a failed alias insert or a malformed address is
//!   logged, recorded in the [`PassReport`] and the pass moves on.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cpd_common::{Customer, Principal, PrincipalKind};
use cpd_directory::{CustomerPatch, DirectoryClient, ListQuery};

use crate::config::MigrationConfig;
use crate::confirm::{ConfirmationPort, Gate};
use crate::error::{MigrationError, Result};
use crate::reconciler::{DomainReconciler, PrimaryChange, RenamePlan};
use crate::report::{DomainOutcome, FailureKind, MigrationReport, PassReport, PrincipalFailure};

/// Drives a primary domain migration against a directory.
pub struct MigrationOrchestrator {
    directory: Arc<dyn DirectoryClient>,
    confirmation: Arc<dyn ConfirmationPort>,
    config: MigrationConfig,
    reconciler: DomainReconciler,
}

impl MigrationOrchestrator {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        confirmation: Arc<dyn ConfirmationPort>,
        config: MigrationConfig,
    ) -> Self {
        let reconciler = DomainReconciler::new(&config.old_domain, &config.new_domain)
            .with_preserve_old_primary(config.preserve_old_primary);
        Self {
            directory,
            confirmation,
            config,
            reconciler,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run all phases.
    ///
    /// Returns [`MigrationError::UserAbort`] when the operator declines a
    /// gate; nothing has been written in that case.
    pub async fn run(&self) -> Result<MigrationReport> {
        info!(
            old_domain = %self.config.old_domain,
            new_domain = %self.config.new_domain,
            dry_run = self.config.dry_run,
            "Changing primary domain"
        );

        let customer = self.fetch_customer().await?;
        let domain = self.swap_domain(&customer).await?;

        let users = self
            .rename_pass(PrincipalKind::User, &self.config.customer_key)
            .await?;
        // Groups are scoped by the customer id rather than the key alias
        let groups = self.rename_pass(PrincipalKind::Group, &customer.id).await?;

        let report = MigrationReport {
            customer_id: customer.id,
            domain,
            dry_run: self.config.dry_run,
            users,
            groups,
        };
        log_summary(&report);
        Ok(report)
    }

    /// Read the customer record.
    pub async fn fetch_customer(&self) -> Result<Customer> {
        self.directory
            .get_customer(&self.config.customer_key)
            .await
            .map_err(MigrationError::CustomerLookup)
    }

    /// Domain check and, once confirmed, the domain update.
    pub async fn swap_domain(&self, customer: &Customer) -> Result<DomainOutcome> {
        let new_domain = &self.config.new_domain;

        if customer.primary_domain == *new_domain {
            self.require(Gate::DomainAlreadyCurrent {
                customer_id: customer.id.clone(),
                domain: new_domain.clone(),
            })?;
            return Ok(DomainOutcome::AlreadyCurrent);
        }

        if customer.primary_domain != self.config.old_domain {
            warn!(
                customer_id = %customer.id,
                current = %customer.primary_domain,
                expected = %self.config.old_domain,
                "Customer primary domain is not the given old domain"
            );
        }

        self.require(Gate::UpdateDomain {
            customer_id: customer.id.clone(),
            from: customer.primary_domain.clone(),
            to: new_domain.clone(),
        })?;

        info!(
            customer_id = %customer.id,
            from = %customer.primary_domain,
            to = %new_domain,
            "Updating customer primary domain"
        );

        if self.config.dry_run {
            info!("Dry run, customer not updated");
            return Ok(DomainOutcome::Planned);
        }

        self.directory
            .update_customer(&customer.id, &CustomerPatch::primary_domain(new_domain.as_str()))
            .await
            .map_err(MigrationError::CustomerUpdate)?;
        info!("Done.");
        Ok(DomainOutcome::Updated)
    }

    fn require(&self, gate: Gate) -> Result<()> {
        if self.confirmation.confirm(&gate)? {
            Ok(())
        } else {
            Err(MigrationError::UserAbort { gate: gate.name() })
        }
    }

    /// Rename every principal of one kind listed under `scope`.
    pub async fn rename_pass(&self, kind: PrincipalKind, scope: &str) -> Result<PassReport> {
        let query = ListQuery::new(scope, self.config.page_size);
        let principals = self
            .directory
            .list_all(kind, &query)
            .await
            .map_err(|source| MigrationError::Listing { kind, source })?;

        let mut report = PassReport::new(kind);
        if principals.is_empty() {
            info!("No {} found.", kind.plural());
            return Ok(report);
        }

        info!(count = principals.len(), "Checking {}", kind.plural());
        for principal in &principals {
            self.reconcile_principal(principal, &mut report).await;
        }
        Ok(report)
    }

    async fn reconcile_principal(&self, principal: &Principal, report: &mut PassReport) {
        let plan = match self.reconciler.plan(principal) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(kind = %principal.kind, id = %principal.id, error = %e, "Skipping principal");
                report.failed += 1;
                report.failures.push(failure(
                    principal,
                    FailureKind::MalformedAddress,
                    None,
                    e.to_string(),
                ));
                return;
            }
        };

        // Address the principal answers to once the primary step is done
        let mut primary = plan.new_primary();

        match &plan.primary {
            PrimaryChange::AlreadyCurrent => {
                info!(
                    kind = %principal.kind,
                    name = principal.label(),
                    "Email address is already {}", plan.current_primary
                );
                report.already_current += 1;
            }
            PrimaryChange::Rename { to } => {
                info!(
                    kind = %principal.kind,
                    name = principal.label(),
                    from = %plan.current_primary,
                    to = %to,
                    "Changing primary email"
                );
                let updated = if self.config.dry_run {
                    Ok(())
                } else {
                    self.directory
                        .update_primary_email(principal.kind, &principal.id, to)
                        .await
                        .map(|_| ())
                };
                match updated {
                    Ok(()) => report.renamed += 1,
                    Err(e) => {
                        warn!(
                            kind = %principal.kind,
                            principal = %plan.current_primary,
                            error = %e,
                            "Unable to update primary email"
                        );
                        report.failed += 1;
                        report.failures.push(failure(
                            principal,
                            FailureKind::PrimaryUpdate,
                            None,
                            e.to_string(),
                        ));
                        primary = plan.current_primary.as_str();
                    }
                }
            }
        }

        // Aliases attach by id, so the sub-pass runs whether or not the rename succeeded
        self.add_aliases(principal, &plan, primary, report).await;
    }

    async fn add_aliases(
        &self,
        principal: &Principal,
        plan: &RenamePlan,
        primary: &str,
        report: &mut PassReport,
    ) {
        debug!(
            kind = %principal.kind,
            principal = %primary,
            old_domain = %self.reconciler.old_domain(),
            existing = ?principal.aliases,
            "Checking email aliases"
        );

        for alias in &plan.aliases_to_add {
            // Still the primary after a failed rename
            if alias == primary {
                debug!(principal = %primary, alias = %alias, "Alias is the current primary, skipped");
                continue;
            }
            if self.config.dry_run {
                info!(principal = %primary, alias = %alias, "Would add alias");
                report.aliases_added += 1;
                continue;
            }

            match self
                .directory
                .insert_alias(principal.kind, &principal.id, alias)
                .await
            {
                Ok(confirmation) => {
                    info!(
                        kind = %principal.kind,
                        principal = %confirmation.primary_email,
                        alias = %confirmation.alias,
                        "New alias added"
                    );
                    report.aliases_added += 1;
                }
                Err(e) => {
                    warn!(
                        kind = %principal.kind,
                        principal = %primary,
                        alias = %alias,
                        error = %e,
                        "Could not add new alias"
                    );
                    report.alias_failures += 1;
                    report.failures.push(failure(
                        principal,
                        FailureKind::AliasInsert,
                        Some(alias.clone()),
                        e.to_string(),
                    ));
                }
            }
        }
    }
}

fn failure(
    principal: &Principal,
    kind: FailureKind,
    alias: Option<String>,
    reason: String,
) -> PrincipalFailure {
    PrincipalFailure {
        id: principal.id.clone(),
        email: principal.primary_email.clone(),
        kind,
        alias,
        reason,
    }
}

fn log_summary(report: &MigrationReport) {
    for pass in [&report.users, &report.groups] {
        info!(
            kind = %pass.kind,
            renamed = pass.renamed,
            already_current = pass.already_current,
            failed = pass.failed,
            aliases_added = pass.aliases_added,
            alias_failures = pass.alias_failures,
            "Finished {}", pass.kind.plural()
        );
        for f in &pass.failures {
            warn!(
                kind = %pass.kind,
                id = %f.id,
                principal = %f.email,
                failure = ?f.kind,
                alias = f.alias.as_deref().unwrap_or("-"),
                reason = %f.reason,
                "Needs attention"
            );
        }
    }
}

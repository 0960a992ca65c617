//! Migration settings

use crate::error::{MigrationError, Result};

/// Settings for one migration run, passed to the orchestrator at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub old_domain: String,
    pub new_domain: String,
    /// Key for the customer lookup and the user listing
    pub customer_key: String,
    pub page_size: u32,
    pub dry_run: bool,
    pub preserve_old_primary: bool,
}

impl MigrationConfig {
    /// Create settings for `old_domain` -> `new_domain` with defaults.
    pub fn new(old_domain: impl Into<String>, new_domain: impl Into<String>) -> Result<Self> {
        let config = Self {
            old_domain: old_domain.into().trim().to_string(),
            new_domain: new_domain.into().trim().to_string(),
            customer_key: "my_customer".to_string(),
            page_size: 50,
            dry_run: false,
            preserve_old_primary: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_customer_key(mut self, customer_key: impl Into<String>) -> Self {
        self.customer_key = customer_key.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_preserve_old_primary(mut self, preserve: bool) -> Self {
        self.preserve_old_primary = preserve;
        self
    }

    fn validate(&self) -> Result<()> {
        for (flag, domain) in [("old-domain", &self.old_domain), ("new-domain", &self.new_domain)] {
            if domain.is_empty() {
                return Err(MigrationError::InvalidConfig(format!("--{} is required", flag)));
            }
            if domain.contains('@') {
                return Err(MigrationError::InvalidConfig(format!(
                    "--{} must be a bare domain, got {}",
                    flag, domain
                )));
            }
        }
        if self.old_domain == self.new_domain {
            return Err(MigrationError::InvalidConfig(format!(
                "old and new domain are both {}",
                self.new_domain
            )));
        }
        Ok(())
    }
}

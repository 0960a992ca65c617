//! In-memory directory for tests and dry rehearsals.
//!
//! Behaves like the remote directory for the operations the migration uses
//! and records every call so tests can assert on mutations.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use cpd_common::{Customer, Principal, PrincipalKind};

use crate::directory::{DirectoryClient, ListQuery, Page};
use crate::dto::{AliasConfirmation, CustomerPatch};
use crate::error::{Error, Result};

/// Alias accepted by the real API for the current customer.
pub const MY_CUSTOMER: &str = "my_customer";

/// A call made against the in-memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    GetCustomer(String),
    UpdateCustomer { id: String, domain: Option<String> },
    List { kind: PrincipalKind, customer: String, page_token: Option<String> },
    UpdateEmail { kind: PrincipalKind, id: String, email: String },
    InsertAlias { kind: PrincipalKind, id: String, alias: String },
}

impl DirectoryCall {
    /// Calls that change directory state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            DirectoryCall::UpdateCustomer { .. }
                | DirectoryCall::UpdateEmail { .. }
                | DirectoryCall::InsertAlias { .. }
        )
    }
}

#[derive(Debug, Default)]
struct State {
    customer: Option<Customer>,
    users: Vec<Principal>,
    groups: Vec<Principal>,
    calls: Vec<DirectoryCall>,
    failing_updates: HashSet<String>,
    failing_aliases: HashSet<String>,
    failing_lists: HashSet<PrincipalKind>,
}

impl State {
    fn principals(&self, kind: PrincipalKind) -> &Vec<Principal> {
        match kind {
            PrincipalKind::User => &self.users,
            PrincipalKind::Group => &self.groups,
        }
    }

    fn principals_mut(&mut self, kind: PrincipalKind) -> &mut Vec<Principal> {
        match kind {
            PrincipalKind::User => &mut self.users,
            PrincipalKind::Group => &mut self.groups,
        }
    }

    fn address_in_use(&self, address: &str) -> bool {
        self.users
            .iter()
            .chain(self.groups.iter())
            .any(|p| p.is_reachable_at(address))
    }

    fn customer_matches(&self, key: &str) -> bool {
        match &self.customer {
            Some(c) => key == MY_CUSTOMER || key == c.id,
            None => false,
        }
    }
}

/// In-memory [`DirectoryClient`].
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<State>,
}

impl InMemoryDirectory {
    pub fn new(customer: Customer) -> Self {
        let directory = Self::default();
        directory.state.lock().customer = Some(customer);
        directory
    }

    /// A directory with no customer record; every customer lookup is `NotFound`.
    pub fn without_customer() -> Self {
        Self::default()
    }

    pub fn with_principal(self, principal: Principal) -> Self {
        self.insert(principal);
        self
    }

    pub fn insert(&self, principal: Principal) {
        let mut state = self.state.lock();
        state.principals_mut(principal.kind).push(principal);
    }

    /// Make every primary-email update for this id fail with a server error.
    pub fn fail_updates_for(&self, id: impl Into<String>) {
        self.state.lock().failing_updates.insert(id.into());
    }

    /// Make every insert of this alias fail with a server error.
    pub fn fail_alias(&self, alias: impl Into<String>) {
        self.state.lock().failing_aliases.insert(alias.into());
    }

    /// Make listing of this kind fail with a server error.
    pub fn fail_listing(&self, kind: PrincipalKind) {
        self.state.lock().failing_lists.insert(kind);
    }

    pub fn customer(&self) -> Option<Customer> {
        self.state.lock().customer.clone()
    }

    pub fn principals(&self, kind: PrincipalKind) -> Vec<Principal> {
        self.state.lock().principals(kind).clone()
    }

    pub fn find(&self, kind: PrincipalKind, id: &str) -> Option<Principal> {
        self.state
            .lock()
            .principals(kind)
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<DirectoryCall> {
        self.calls().into_iter().filter(DirectoryCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn list(&self, kind: PrincipalKind, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>> {
        let mut state = self.state.lock();
        state.calls.push(DirectoryCall::List {
            kind,
            customer: query.customer.clone(),
            page_token: page_token.map(str::to_string),
        });

        if state.failing_lists.contains(&kind) {
            return Err(Error::Server(format!("listing {} failed", kind.plural())));
        }
        if !state.customer_matches(&query.customer) {
            return Err(Error::NotFound(format!("customer {}", query.customer)));
        }

        let mut items = state.principals(kind).clone();
        if query.order_by_email {
            items.sort_by(|a, b| a.primary_email.cmp(&b.primary_email));
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::Validation(format!("invalid page token {}", token)))?,
            None => 0,
        };
        let page_size = query.page_size.max(1) as usize;
        let end = (offset + page_size).min(items.len());
        let next_page_token = (end < items.len()).then(|| end.to_string());

        Ok(Page {
            items: items.get(offset..end).map(<[Principal]>::to_vec).unwrap_or_default(),
            next_page_token,
        })
    }

    fn update_email(&self, kind: PrincipalKind, id: &str, email: &str) -> Result<Principal> {
        let mut state = self.state.lock();
        state.calls.push(DirectoryCall::UpdateEmail {
            kind,
            id: id.to_string(),
            email: email.to_string(),
        });

        if state.failing_updates.contains(id) {
            return Err(Error::Server(format!("update of {} failed", id)));
        }

        let principal = state
            .principals_mut(kind)
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("{} {}", kind, id)))?;
        principal.primary_email = email.to_string();
        Ok(principal.clone())
    }

    fn insert_alias_record(&self, kind: PrincipalKind, id: &str, alias: &str) -> Result<AliasConfirmation> {
        let mut state = self.state.lock();
        state.calls.push(DirectoryCall::InsertAlias {
            kind,
            id: id.to_string(),
            alias: alias.to_string(),
        });

        if state.failing_aliases.contains(alias) {
            return Err(Error::Server(format!("insert of alias {} failed", alias)));
        }
        if state.address_in_use(alias) {
            return Err(Error::Conflict("Entity already exists.".to_string()));
        }

        let principal = state
            .principals_mut(kind)
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("{} {}", kind, id)))?;
        principal.aliases.push(alias.to_string());
        Ok(AliasConfirmation {
            alias: alias.to_string(),
            primary_email: principal.primary_email.clone(),
        })
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn get_customer(&self, customer_key: &str) -> Result<Customer> {
        let mut state = self.state.lock();
        state.calls.push(DirectoryCall::GetCustomer(customer_key.to_string()));
        if !state.customer_matches(customer_key) {
            return Err(Error::NotFound(format!("customer {}", customer_key)));
        }
        state
            .customer
            .clone()
            .ok_or_else(|| Error::NotFound(format!("customer {}", customer_key)))
    }

    async fn update_customer(&self, customer_id: &str, patch: &CustomerPatch) -> Result<Customer> {
        let mut state = self.state.lock();
        state.calls.push(DirectoryCall::UpdateCustomer {
            id: customer_id.to_string(),
            domain: patch.customer_domain.clone(),
        });
        if !state.customer_matches(customer_id) {
            return Err(Error::NotFound(format!("customer {}", customer_id)));
        }
        let customer = state
            .customer
            .as_mut()
            .ok_or_else(|| Error::NotFound(format!("customer {}", customer_id)))?;
        if let Some(domain) = &patch.customer_domain {
            customer.primary_domain = domain.clone();
        }
        Ok(customer.clone())
    }

    async fn list_users(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>> {
        self.list(PrincipalKind::User, query, page_token)
    }

    async fn update_user_email(&self, user_id: &str, primary_email: &str) -> Result<Principal> {
        self.update_email(PrincipalKind::User, user_id, primary_email)
    }

    async fn insert_user_alias(&self, user_id: &str, alias: &str) -> Result<AliasConfirmation> {
        self.insert_alias_record(PrincipalKind::User, user_id, alias)
    }

    async fn list_groups(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>> {
        self.list(PrincipalKind::Group, query, page_token)
    }

    async fn update_group_email(&self, group_id: &str, email: &str) -> Result<Principal> {
        self.update_email(PrincipalKind::Group, group_id, email)
    }

    async fn insert_group_alias(&self, group_id: &str, alias: &str) -> Result<AliasConfirmation> {
        self.insert_alias_record(PrincipalKind::Group, group_id, alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::new(Customer {
            id: "C01".into(),
            primary_domain: "old.com".into(),
        })
        .with_principal(Principal::user("u2", "zed@old.com"))
        .with_principal(Principal::user("u1", "amy@old.com"))
        .with_principal(Principal::user("u3", "max@old.com"))
    }

    #[tokio::test]
    async fn test_pagination_is_ordered_by_email() {
        let directory = directory();
        let dyn_dir: &dyn DirectoryClient = &directory;

        let query = ListQuery::new(MY_CUSTOMER, 2);
        let first = dyn_dir.list_users(&query, None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].primary_email, "amy@old.com");
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let all = dyn_dir.list_all(PrincipalKind::User, &query).await.unwrap();
        let emails: Vec<_> = all.iter().map(|p| p.primary_email.as_str()).collect();
        assert_eq!(emails, vec!["amy@old.com", "max@old.com", "zed@old.com"]);
    }

    #[tokio::test]
    async fn test_alias_in_use_is_conflict() {
        let directory = directory();
        let err = directory.insert_user_alias("u1", "zed@old.com").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(directory.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let directory = InMemoryDirectory::without_customer();
        let err = directory.get_customer(MY_CUSTOMER).await.unwrap_err();
        assert!(err.is_not_found());
    }
}

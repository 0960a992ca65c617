//! The directory contract consumed by the migration, and its Admin SDK
//! implementation.

use async_trait::async_trait;
use tracing::{debug, instrument};

use cpd_common::{Customer, Principal, PrincipalKind};

use crate::client::Client;
use crate::dto::{
    AliasConfirmation, AliasInsert, CustomerPatch, CustomerResource, GroupPatch, GroupResource,
    GroupsPage, UserPatch, UserResource, UsersPage,
};
use crate::error::Result;

/// Listing parameters for users and groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Customer scope: `my_customer` or a customer id
    pub customer: String,
    pub page_size: u32,
    /// Ascending by primary email when set
    pub order_by_email: bool,
}

impl ListQuery {
    pub fn new(customer: impl Into<String>, page_size: u32) -> Self {
        Self {
            customer: customer.into(),
            page_size,
            order_by_email: true,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Remote directory operations on customer, user and group records.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn get_customer(&self, customer_key: &str) -> Result<Customer>;

    async fn update_customer(&self, customer_id: &str, patch: &CustomerPatch) -> Result<Customer>;

    async fn list_users(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>>;

    async fn update_user_email(&self, user_id: &str, primary_email: &str) -> Result<Principal>;

    async fn insert_user_alias(&self, user_id: &str, alias: &str) -> Result<AliasConfirmation>;

    async fn list_groups(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>>;

    async fn update_group_email(&self, group_id: &str, email: &str) -> Result<Principal>;

    async fn insert_group_alias(&self, group_id: &str, alias: &str) -> Result<AliasConfirmation>;
}

/// Kind-dispatching helpers over [`DirectoryClient`].
impl<'a> dyn DirectoryClient + 'a {
    pub async fn list_page(
        &self,
        kind: PrincipalKind,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<Page<Principal>> {
        match kind {
            PrincipalKind::User => self.list_users(query, page_token).await,
            PrincipalKind::Group => self.list_groups(query, page_token).await,
        }
    }

    pub async fn update_primary_email(
        &self,
        kind: PrincipalKind,
        id: &str,
        primary_email: &str,
    ) -> Result<Principal> {
        match kind {
            PrincipalKind::User => self.update_user_email(id, primary_email).await,
            PrincipalKind::Group => self.update_group_email(id, primary_email).await,
        }
    }

    pub async fn insert_alias(
        &self,
        kind: PrincipalKind,
        id: &str,
        alias: &str,
    ) -> Result<AliasConfirmation> {
        match kind {
            PrincipalKind::User => self.insert_user_alias(id, alias).await,
            PrincipalKind::Group => self.insert_group_alias(id, alias).await,
        }
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    pub async fn list_all(&self, kind: PrincipalKind, query: &ListQuery) -> Result<Vec<Principal>> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(kind, query, page_token.as_deref()).await?;
            debug!(kind = %kind, count = page.items.len(), "Fetched listing page");
            all.extend(page.items);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(all),
            }
        }
    }
}

/// [`DirectoryClient`] backed by the Admin SDK Directory API.
#[derive(Debug, Clone)]
pub struct GoogleDirectory {
    client: Client,
}

impl GoogleDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn list_url(&self, collection: &str, query: &ListQuery, page_token: Option<&str>) -> Result<url::Url> {
        let mut url = self.client.url(&[collection])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("customer", &query.customer)
                .append_pair("maxResults", &query.page_size.to_string());
            if query.order_by_email {
                pairs.append_pair("orderBy", "email");
            }
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl DirectoryClient for GoogleDirectory {
    #[instrument(skip(self))]
    async fn get_customer(&self, customer_key: &str) -> Result<Customer> {
        let url = self.client.url(&["customers", customer_key])?;
        let resource: CustomerResource = self.client.get(url).await?;
        Ok(resource.into())
    }

    #[instrument(skip(self, patch))]
    async fn update_customer(&self, customer_id: &str, patch: &CustomerPatch) -> Result<Customer> {
        let url = self.client.url(&["customers", customer_id])?;
        let resource: CustomerResource = self.client.patch(url, patch).await?;
        Ok(resource.into())
    }

    async fn list_users(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>> {
        let url = self.list_url("users", query, page_token)?;
        let page: UsersPage = self.client.get(url).await?;
        Ok(Page {
            items: page.users.into_iter().map(Into::into).collect(),
            next_page_token: page.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn update_user_email(&self, user_id: &str, primary_email: &str) -> Result<Principal> {
        let url = self.client.url(&["users", user_id])?;
        let resource: UserResource = self.client.patch(url, &UserPatch { primary_email }).await?;
        Ok(resource.into())
    }

    #[instrument(skip(self))]
    async fn insert_user_alias(&self, user_id: &str, alias: &str) -> Result<AliasConfirmation> {
        let url = self.client.url(&["users", user_id, "aliases"])?;
        self.client.post(url, &AliasInsert { alias }).await
    }

    async fn list_groups(&self, query: &ListQuery, page_token: Option<&str>) -> Result<Page<Principal>> {
        let url = self.list_url("groups", query, page_token)?;
        let page: GroupsPage = self.client.get(url).await?;
        Ok(Page {
            items: page.groups.into_iter().map(Into::into).collect(),
            next_page_token: page.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn update_group_email(&self, group_id: &str, email: &str) -> Result<Principal> {
        let url = self.client.url(&["groups", group_id])?;
        let resource: GroupResource = self.client.patch(url, &GroupPatch { email }).await?;
        Ok(resource.into())
    }

    #[instrument(skip(self))]
    async fn insert_group_alias(&self, group_id: &str, alias: &str) -> Result<AliasConfirmation> {
        let url = self.client.url(&["groups", group_id, "aliases"])?;
        self.client.post(url, &AliasInsert { alias }).await
    }
}

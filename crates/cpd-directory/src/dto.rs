//! Directory API wire types

use serde::{Deserialize, Serialize};

use cpd_common::{Customer, Principal};

/// `admin#directory#customer`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResource {
    pub id: String,
    #[serde(default)]
    pub customer_domain: String,
}

impl From<CustomerResource> for Customer {
    fn from(r: CustomerResource) -> Self {
        Customer {
            id: r.id,
            primary_domain: r.customer_domain,
        }
    }
}

/// Partial customer update
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_domain: Option<String>,
}

impl CustomerPatch {
    pub fn primary_domain(domain: impl Into<String>) -> Self {
        Self {
            customer_domain: Some(domain.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(default)]
    pub full_name: String,
}

/// `admin#directory#user` (only the fields the migration reads)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResource {
    pub id: String,
    pub primary_email: String,
    #[serde(default)]
    pub name: UserName,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl From<UserResource> for Principal {
    fn from(r: UserResource) -> Self {
        Principal::user(r.id, r.primary_email)
            .with_display_name(r.name.full_name)
            .with_aliases(r.aliases)
    }
}

/// `admin#directory#group` (only the fields the migration reads)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResource {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl From<GroupResource> for Principal {
    fn from(r: GroupResource) -> Self {
        Principal::group(r.id, r.email)
            .with_display_name(r.name)
            .with_aliases(r.aliases)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<UserResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsPage {
    #[serde(default)]
    pub groups: Vec<GroupResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch<'a> {
    pub primary_email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AliasInsert<'a> {
    pub alias: &'a str,
}

/// Alias record returned by an insert
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasConfirmation {
    pub alias: String,
    #[serde(default)]
    pub primary_email: String,
}

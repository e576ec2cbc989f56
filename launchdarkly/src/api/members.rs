//! Account member API implementation

use super::client::Client;
use super::common::{segment, ApiQueryParams, Items, PatchOperation};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: String,
    /// Custom role IDs, not keys.
    #[serde(default)]
    pub custom_roles: Vec<String>,
}

/// One entry of the POST /api/v2/members body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPost {
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_roles: Vec<String>,
}

pub struct MembersApi<'a> {
    client: &'a Client,
}

impl<'a> MembersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(id: &str) -> String {
        format!("/api/v2/members/{}", segment(id))
    }

    /// GET /api/v2/members/{id}
    pub async fn get(&self, id: &str) -> Result<Member, ApiError> {
        self.client.get(&Self::path(id)).await
    }

    /// POST /api/v2/members with a single invitation
    pub async fn create(&self, body: &MemberPost) -> Result<Member, ApiError> {
        let created: Items<Member> = self
            .client
            .post("/api/v2/members", &[body])
            .await?;
        created.items.into_iter().next().ok_or_else(|| {
            ApiError::ParseError(format!("no member returned for invitation of {}", body.email))
        })
    }

    /// PATCH /api/v2/members/{id}
    pub async fn patch(&self, id: &str, ops: &[PatchOperation]) -> Result<Member, ApiError> {
        self.client.patch(&Self::path(id), ops).await
    }

    /// DELETE /api/v2/members/{id}
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(id)).await
    }

    /// GET /api/v2/members?filter=query:{email}, following pages until the
    /// reported total is reached. Only an exact email match counts.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Member>, ApiError> {
        let mut offset = 0;
        loop {
            let params = ApiQueryParams::new()
                .add("limit", PAGE_SIZE)
                .add("offset", offset)
                .add("filter", format!("query:{}", email));
            let page: Items<Member> = self.client.get_with_params("/api/v2/members", &params).await?;

            let count = page.items.len();
            if let Some(member) = page.items.into_iter().find(|m| m.email == email) {
                return Ok(Some(member));
            }
            offset += count;
            let total = page.total_count.unwrap_or(0) as usize;
            if count == 0 || offset >= total {
                return Ok(None);
            }
        }
    }
}

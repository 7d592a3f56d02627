//! Identity lookups
//!
//! Members, participants, pipelines and several other resources have no
//! by-id read on the platform, so resources resolve them by scanning the
//! list endpoints with [`paginated_search`]. A missing item is `Ok(None)`,
//! not an error.
//!
//! Some list endpoints ignore `max`/`offset` and always return everything;
//! those are fetched once and never paged.

use serde::{Deserialize, Serialize};

use crate::platform::operations::{
    LIST_DATASET_VERSIONS, LIST_ORGANIZATIONS, LIST_ORGANIZATION_MEMBERS,
    LIST_ORGANIZATION_TEAM_MEMBERS, LIST_PIPELINES, LIST_PIPELINE_SECRETS, LIST_WORKSPACES,
    LIST_WORKSPACE_PARTICIPANTS,
};
use crate::platform::{ApiError, OperationDescriptor, PlatformClient, RequestParams};
use crate::search::{paginated_search, SearchPage};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    pub member_id: Option<i64>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceParticipant {
    pub participant_id: Option<i64>,
    pub member_id: Option<i64>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub wsp_role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub pipeline_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub repository: Option<String>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub org_id: Option<i64>,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<String>,
}

/// Secret values are never returned by the platform, only metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSecret {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub last_used: Option<String>,
    pub date_created: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub dataset_id: Option<String>,
    pub version: Option<i64>,
    pub file_name: Option<String>,
    pub media_type: Option<String>,
    pub url: Option<String>,
    pub has_header: Option<bool>,
    pub disabled: Option<bool>,
    pub date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMembersResponse {
    #[serde(default)]
    members: Vec<OrganizationMember>,
    total_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParticipantsResponse {
    #[serde(default)]
    participants: Vec<WorkspaceParticipant>,
    total_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPipelinesResponse {
    #[serde(default)]
    pipelines: Vec<Pipeline>,
    total_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListOrganizationsResponse {
    #[serde(default)]
    organizations: Vec<Organization>,
    total_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListWorkspacesResponse {
    #[serde(default)]
    workspaces: Vec<Workspace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPipelineSecretsResponse {
    #[serde(default)]
    pipeline_secrets: Vec<PipelineSecret>,
    total_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListDatasetVersionsResponse {
    #[serde(default)]
    versions: Vec<DatasetVersion>,
}

/// How to recognise a member or participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKey<'a> {
    Email(&'a str),
    /// `member_id` for organization and team members, `participant_id` for participants
    Id(i64),
}

impl MemberKey<'_> {
    /// Server-side search term; only emails narrow the list usefully
    fn search_term(&self) -> Option<&str> {
        match self {
            Self::Email(email) => Some(email),
            Self::Id(_) => None,
        }
    }

    fn matches(&self, email: Option<&str>, id: Option<i64>) -> bool {
        match self {
            Self::Email(wanted) => email.is_some_and(|e| e.eq_ignore_ascii_case(wanted)),
            Self::Id(wanted) => id == Some(*wanted),
        }
    }
}

/// Whether a list endpoint honours `max`/`offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paging {
    Offset,
    /// Everything comes back in one response
    Unpaged,
}

/// Fetch one page of a list operation
async fn list_page<R, T>(
    client: &PlatformClient,
    operation: OperationDescriptor,
    params: RequestParams,
    paging: Paging,
    max: usize,
    offset: usize,
    into_page: fn(R) -> SearchPage<T>,
) -> Result<SearchPage<T>, ApiError>
where
    R: serde::de::DeserializeOwned,
{
    let params = match paging {
        Paging::Offset => params.query("max", max).query("offset", offset),
        // The first response already held everything
        Paging::Unpaged if offset > 0 => return Ok(SearchPage::new(Vec::new(), None)),
        Paging::Unpaged => params,
    };
    let response: R = client.execute_json(&operation, params).await?;
    Ok(into_page(response))
}

pub async fn find_organization_member(
    client: &PlatformClient,
    org_id: i64,
    key: MemberKey<'_>,
) -> Result<Option<OrganizationMember>, ApiError> {
    let mut params = RequestParams::new().path("orgId", org_id);
    if let Some(term) = key.search_term() {
        params = params.query("search", term);
    }

    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_ORGANIZATION_MEMBERS,
                params.clone(),
                Paging::Offset,
                max,
                offset,
                |r: ListMembersResponse| SearchPage::new(r.members, r.total_size),
            )
        },
        |m: &OrganizationMember| key.matches(m.email.as_deref(), m.member_id),
    )
    .await
}

pub async fn find_workspace_participant(
    client: &PlatformClient,
    org_id: i64,
    workspace_id: i64,
    key: MemberKey<'_>,
) -> Result<Option<WorkspaceParticipant>, ApiError> {
    let mut params = RequestParams::new()
        .path("orgId", org_id)
        .path("workspaceId", workspace_id);
    if let Some(term) = key.search_term() {
        params = params.query("search", term);
    }

    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_WORKSPACE_PARTICIPANTS,
                params.clone(),
                Paging::Offset,
                max,
                offset,
                |r: ListParticipantsResponse| SearchPage::new(r.participants, r.total_size),
            )
        },
        |p: &WorkspaceParticipant| key.matches(p.email.as_deref(), p.participant_id),
    )
    .await
}

/// Team membership; an id lookup lists the whole team, an email lookup
/// lets the platform narrow it first
pub async fn find_team_member(
    client: &PlatformClient,
    org_id: i64,
    team_id: i64,
    key: MemberKey<'_>,
) -> Result<Option<OrganizationMember>, ApiError> {
    let params = RequestParams::new()
        .path("orgId", org_id)
        .path("teamId", team_id)
        .query("search", key.search_term().unwrap_or_default());

    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_ORGANIZATION_TEAM_MEMBERS,
                params.clone(),
                Paging::Unpaged,
                max,
                offset,
                |r: ListMembersResponse| SearchPage::new(r.members, r.total_size),
            )
        },
        |m: &OrganizationMember| key.matches(m.email.as_deref(), m.member_id),
    )
    .await
}

/// Exact (case-sensitive) name match; the platform search is a substring match
pub async fn find_pipeline_by_name(
    client: &PlatformClient,
    workspace_id: i64,
    name: &str,
) -> Result<Option<Pipeline>, ApiError> {
    let params = RequestParams::new()
        .query("workspaceId", workspace_id)
        .query("search", name);

    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_PIPELINES,
                params.clone(),
                Paging::Offset,
                max,
                offset,
                |r: ListPipelinesResponse| SearchPage::new(r.pipelines, r.total_size),
            )
        },
        |p: &Pipeline| p.name.as_deref() == Some(name),
    )
    .await
}

/// Exact name match over every organization visible to the caller
pub async fn find_organization_by_name(
    client: &PlatformClient,
    name: &str,
) -> Result<Option<Organization>, ApiError> {
    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_ORGANIZATIONS,
                RequestParams::new(),
                Paging::Unpaged,
                max,
                offset,
                |r: ListOrganizationsResponse| SearchPage::new(r.organizations, r.total_size),
            )
        },
        |o: &Organization| o.name.as_deref() == Some(name),
    )
    .await
}

/// Exact name match within one organization
pub async fn find_workspace_by_name(
    client: &PlatformClient,
    org_id: i64,
    name: &str,
) -> Result<Option<Workspace>, ApiError> {
    let params = RequestParams::new().path("orgId", org_id);

    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_WORKSPACES,
                params.clone(),
                Paging::Unpaged,
                max,
                offset,
                |r: ListWorkspacesResponse| SearchPage::new(r.workspaces, None),
            )
        },
        |w: &Workspace| w.name.as_deref() == Some(name),
    )
    .await
}

pub async fn find_pipeline_secret_by_name(
    client: &PlatformClient,
    workspace_id: i64,
    name: &str,
) -> Result<Option<PipelineSecret>, ApiError> {
    let params = RequestParams::new().query("workspaceId", workspace_id);

    paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_PIPELINE_SECRETS,
                params.clone(),
                Paging::Unpaged,
                max,
                offset,
                |r: ListPipelineSecretsResponse| SearchPage::new(r.pipeline_secrets, r.total_size),
            )
        },
        |s: &PipelineSecret| s.name.as_deref() == Some(name),
    )
    .await
}

/// A disabled version counts as absent
pub async fn find_dataset_version(
    client: &PlatformClient,
    workspace_id: i64,
    dataset_id: &str,
    version: i64,
) -> Result<Option<DatasetVersion>, ApiError> {
    let params = RequestParams::new()
        .path("datasetId", dataset_id)
        .query("workspaceId", workspace_id);

    let found = paginated_search(
        |max, offset| {
            list_page(
                client,
                LIST_DATASET_VERSIONS,
                params.clone(),
                Paging::Unpaged,
                max,
                offset,
                |r: ListDatasetVersionsResponse| SearchPage::new(r.versions, None),
            )
        },
        |v: &DatasetVersion| v.version == Some(version),
    )
    .await?;

    Ok(found.filter(|v| v.disabled != Some(true)))
}

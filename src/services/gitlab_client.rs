//! GitLab API client.
//!
//! Provides the HTTP collaborator for GitLab API v4 with authentication and
//! pagination. List operations return fully hydrated domain values: every
//! merge request carries its approvals (in response order) and its
//! discussion comments.

use crate::error::AppError;
use crate::models::{Comment, MergeRequest, User};
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// GitLab API client configuration.
#[derive(Debug, Clone)]
pub struct GitLabClientConfig {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitLabClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitLab API client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    config: GitLabClientConfig,
}

/// Pagination information from GitLab API response headers.
#[derive(Debug, Clone, Default)]
struct PaginationInfo {
    /// Next page number (if any).
    next_page: Option<u32>,
}

/// Query parameters for listing merge requests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeRequestsQuery {
    /// Filter by state: `opened`, `merged`, `closed`, `all`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Filter by scope: `created_by_me`, `assigned_to_me`, `all`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Filter WIP MRs: `yes` or `no`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip: Option<String>,

    /// Filter draft MRs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,

    /// Filter by author user ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,

    /// Filter by reviewer: a user ID rendered as a string, or the literal
    /// `None` to select MRs with no reviewer assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,

    /// Filter by assignee user ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
}

/// Base query for the rotation's list angles: open, non-draft, non-WIP
/// merge requests across all projects visible to the token.
fn open_merge_requests_query() -> MergeRequestsQuery {
    MergeRequestsQuery {
        state: Some("opened".to_string()),
        scope: Some("all".to_string()),
        wip: Some("no".to_string()),
        draft: Some(false),
        ..Default::default()
    }
}

/// GitLab user from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub id: i64,
    pub username: String,
    pub name: String,
}

impl From<GitLabUser> for User {
    fn from(user: GitLabUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
        }
    }
}

/// GitLab merge request from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabMergeRequest {
    pub iid: i64,
    pub project_id: i64,
    #[serde(default)]
    pub draft: bool,
    pub web_url: String,
    pub source_branch: String,
    pub target_branch: String,
    pub author: GitLabUser,
    pub assignee: Option<GitLabUser>,
    pub reviewers: Option<Vec<GitLabUser>>,
}

/// GitLab note/comment from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabNote {
    pub id: i64,
    pub body: String,
    pub author: GitLabUser,
    pub created_at: String,
    pub system: bool,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
}

/// Response from the MR approvals endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestApprovals {
    pub approved_by: Vec<ApprovedBy>,
}

/// User who approved an MR.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovedBy {
    pub user: GitLabUser,
}

/// Whether a note should be carried as a discussion comment.
///
/// System notes are dropped unless GitLab typed them as discussion notes.
fn is_discussion_comment(note: &GitLabNote) -> bool {
    !(note.system && note.note_type.as_deref() != Some("DiscussionNote"))
}

/// Parse an ISO 8601 timestamp, falling back to the Unix epoch.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl GitLabClient {
    /// Create a new GitLab client.
    pub fn new(config: GitLabClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        // Add the private token header for authentication
        let token_value = header::HeaderValue::from_str(&config.token)
            .map_err(|_| AppError::authentication("Invalid token format"))?;
        headers.insert("PRIVATE-TOKEN", token_value);

        // Build the HTTP client
        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL for API requests.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v4{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    /// Parse pagination headers from response.
    fn parse_pagination(response: &Response) -> PaginationInfo {
        let next_page = response
            .headers()
            .get("x-next-page")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        PaginationInfo { next_page }
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::UNAUTHORIZED {
            // 401 Unauthorized - token is expired or revoked
            Err(AppError::authentication(
                "GitLab token expired or revoked. Please re-authenticate.",
            ))
        } else {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let body_message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    // GitLab returns errors as {"message": "..."} or {"error": "..."}
                    v.get("message").or_else(|| v.get("error")).map(|m| {
                        if let Some(s) = m.as_str() {
                            s.to_string()
                        } else {
                            // Sometimes "message" is an object like {"base":["msg"]}
                            m.to_string()
                        }
                    })
                });

            let message = match (status, &body_message) {
                (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
                (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
                (StatusCode::TOO_MANY_REQUESTS, _) => "Rate limit exceeded".to_string(),
                (_, Some(msg)) => msg.clone(),
                _ => format!("Request failed ({}): {}", status_code, body),
            };

            Err(AppError::gitlab_api_full(&message, status_code, endpoint))
        }
    }

    /// Fetch all pages of a paginated endpoint.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&impl Serialize>,
    ) -> Result<Vec<T>, AppError> {
        let mut all_data = Vec::new();
        let mut page = 1u32;

        loop {
            let url = self.api_url(endpoint);
            let mut request = self.client.get(&url);

            // Add original query params
            if let Some(q) = query {
                request = request.query(q);
            }

            // Add pagination params
            request = request.query(&[("page", page.to_string()), ("per_page", "100".to_string())]);

            let response = request.send().await?;
            let pagination = Self::parse_pagination(&response);
            let data = self.handle_response::<Vec<T>>(response, endpoint).await?;

            all_data.extend(data);

            match pagination.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(all_data)
    }

    /// Fetch the authenticated user.
    ///
    /// Also serves as the startup token validation call.
    pub async fn current_user(&self) -> Result<User, AppError> {
        let url = self.api_url("/user");
        let response = self.client.get(&url).send().await?;
        let user: GitLabUser = self.handle_response(response, "/user").await?;

        Ok(user.into())
    }

    /// Fetch a single user by ID.
    pub async fn get_user(&self, user_id: i64) -> Result<User, AppError> {
        let endpoint = format!("/users/{}", user_id);
        let url = self.api_url(&endpoint);
        let response = self.client.get(&url).send().await?;
        let user: GitLabUser = self.handle_response(response, &endpoint).await?;

        Ok(user.into())
    }

    /// List open MRs authored by this user that have no reviewer assigned.
    pub async fn list_by_author(&self, author_id: i64) -> Result<Vec<MergeRequest>, AppError> {
        let mut query = open_merge_requests_query();
        query.author_id = Some(author_id);
        query.reviewer_id = Some("None".to_string());

        self.list_merge_requests(&query).await
    }

    /// List open MRs where this user holds the reviewer slot.
    pub async fn list_by_reviewer(&self, reviewer_id: i64) -> Result<Vec<MergeRequest>, AppError> {
        let mut query = open_merge_requests_query();
        query.reviewer_id = Some(reviewer_id.to_string());

        self.list_merge_requests(&query).await
    }

    /// List open MRs assigned to this user.
    pub async fn list_by_assignee(&self, assignee_id: i64) -> Result<Vec<MergeRequest>, AppError> {
        let mut query = open_merge_requests_query();
        query.assignee_id = Some(assignee_id);

        self.list_merge_requests(&query).await
    }

    /// List merge requests and hydrate each with approvals and comments.
    async fn list_merge_requests(
        &self,
        query: &MergeRequestsQuery,
    ) -> Result<Vec<MergeRequest>, AppError> {
        let listed: Vec<GitLabMergeRequest> =
            self.get_all_pages("/merge_requests", Some(query)).await?;

        let mut merge_requests = Vec::with_capacity(listed.len());

        for mr in listed {
            merge_requests.push(self.hydrate(mr).await?);
        }

        Ok(merge_requests)
    }

    /// Build the domain value for one listed MR.
    ///
    /// Approvals keep the order of GitLab's `approved_by` response; the
    /// classifier depends on it.
    async fn hydrate(&self, mr: GitLabMergeRequest) -> Result<MergeRequest, AppError> {
        let approvals = self.get_mr_approvals(mr.project_id, mr.iid).await?;
        let notes = self.list_mr_notes(mr.project_id, mr.iid).await?;

        let comments = notes
            .into_iter()
            .filter(is_discussion_comment)
            .map(|note| Comment {
                id: note.id,
                created_at: parse_timestamp(&note.created_at),
                author: note.author.into(),
                body: note.body,
            })
            .collect();

        Ok(MergeRequest {
            id: mr.iid,
            project_id: mr.project_id,
            draft: mr.draft,
            author: mr.author.into(),
            assignee: mr.assignee.map(User::from),
            reviewer: mr
                .reviewers
                .and_then(|reviewers| reviewers.into_iter().next())
                .map(User::from),
            approvals: approvals
                .approved_by
                .into_iter()
                .map(|approved| approved.user.into())
                .collect(),
            branches: format!("{} to {}", mr.source_branch, mr.target_branch),
            link: mr.web_url,
            comments,
        })
    }

    /// Get approval status for a merge request.
    async fn get_mr_approvals(
        &self,
        project_id: i64,
        mr_iid: i64,
    ) -> Result<MergeRequestApprovals, AppError> {
        let endpoint = format!(
            "/projects/{}/merge_requests/{}/approvals",
            project_id, mr_iid
        );
        let url = self.api_url(&endpoint);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response, &endpoint).await
    }

    /// List all notes on a merge request.
    async fn list_mr_notes(
        &self,
        project_id: i64,
        mr_iid: i64,
    ) -> Result<Vec<GitLabNote>, AppError> {
        let endpoint = format!("/projects/{}/merge_requests/{}/notes", project_id, mr_iid);
        self.get_all_pages(&endpoint, None::<&()>).await
    }

    /// Set or clear the reviewer slot on a merge request.
    ///
    /// `Some(id)` hands the slot to that user; `None` clears it.
    pub async fn update_reviewer(
        &self,
        project_id: i64,
        mr_iid: i64,
        reviewer: Option<i64>,
    ) -> Result<(), AppError> {
        let endpoint = format!("/projects/{}/merge_requests/{}", project_id, mr_iid);
        let url = self.api_url(&endpoint);

        let reviewer_ids: Vec<i64> = reviewer.into_iter().collect();

        let response = self
            .client
            .put(&url)
            .json(&serde_json::json!({ "reviewer_ids": reviewer_ids }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            // Read the body for a more descriptive error
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message")?.as_str().map(String::from))
                .unwrap_or_else(|| format!("Reviewer update failed ({})", status));

            Err(AppError::gitlab_api_full(
                &message,
                status.as_u16(),
                &endpoint,
            ))
        }
    }
}

//! Typed operations against the student directory API.

use crate::auth::DirectoryAuth;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{
    ListPage, RemoteSection, RemoteStudent, SectionPayload, StudentPayload,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of following a paginated listing to the end.
///
/// A page failure does not discard the pages already fetched: the records
/// collected so far are returned together with the error that stopped the
/// walk, and the caller decides how much of a run can proceed on partial
/// data.
#[derive(Debug)]
pub struct PageOutcome<T> {
    pub items: Vec<T>,
    pub interrupted: Option<DirectoryError>,
}

impl<T> PageOutcome<T> {
    /// Whether every page was fetched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Outcome of a section create, which the directory makes idempotent by a
/// unique constraint on (name, school_year, coordination).
#[derive(Debug)]
pub enum SectionCreated {
    Created(RemoteSection),
    AlreadyExists,
}

/// HTTP client for the student directory.
///
/// Holds no state across calls beyond the pagination cursors it follows
/// internally; all mutations are single requests classified by status.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    base_url: String,
    auth: DirectoryAuth,
    http: Client,
}

impl DirectoryClient {
    /// Create a client with a bounded per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        auth: DirectoryAuth,
        timeout: Duration,
    ) -> DirectoryResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("enturma/0.1")
            .build()
            .map_err(|e| DirectoryError::Parse(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(base_url, auth, http))
    }

    /// Create a client around a pre-built `reqwest::Client` (tests).
    #[must_use]
    pub fn with_http_client(base_url: impl Into<String>, auth: DirectoryAuth, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            http,
        }
    }

    /// Base URL the client is pointed at.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Listings ──────────────────────────────────────────────────────

    /// List every student in the given school year, following pagination.
    pub async fn list_students(&self, school_year: i32) -> PageOutcome<RemoteStudent> {
        let url = format!("{}/students/?school_year={school_year}", self.base_url);
        self.walk_pages(url).await
    }

    /// List every class section in the given school year.
    pub async fn list_sections(&self, school_year: i32) -> PageOutcome<RemoteSection> {
        let url = format!("{}/classes/?school_year={school_year}", self.base_url);
        self.walk_pages(url).await
    }

    /// Find a student by enrollment number, walking the paginated listing
    /// until the first match.
    ///
    /// The directory has no enrollment filter, so this scans pages; it is
    /// only used on the rare duplicate-create recovery path.
    pub async fn find_student_by_enrollment(
        &self,
        school_year: i32,
        enrollment_number: &str,
    ) -> DirectoryResult<Option<RemoteStudent>> {
        let mut url = Some(format!(
            "{}/students/?school_year={school_year}",
            self.base_url
        ));
        while let Some(page_url) = url {
            let page: ListPage<RemoteStudent> = self.get(&page_url).await?;
            if let Some(found) = page
                .results
                .into_iter()
                .find(|s| s.enrollment_number == enrollment_number)
            {
                return Ok(Some(found));
            }
            url = page.next;
        }
        Ok(None)
    }

    // ── Student mutations ─────────────────────────────────────────────

    /// Create a student (POST /students/), returning the created record.
    pub async fn create_student(&self, payload: &StudentPayload) -> DirectoryResult<RemoteStudent> {
        let url = format!("{}/students/", self.base_url);
        self.post(&url, payload).await
    }

    /// Replace a student's identity fields (PUT /students/{id}/).
    pub async fn update_student(&self, id: &str, payload: &StudentPayload) -> DirectoryResult<()> {
        let url = format!("{}/students/{id}/", self.base_url);
        debug!(%url, "directory PUT");
        let builder = self.auth.apply(self.http.put(&url)).json(payload);
        let response = builder.send().await?;
        self.expect_success(response).await
    }

    /// Mark a student active (POST /students/{id}/enable/).
    pub async fn enable_student(&self, id: &str) -> DirectoryResult<()> {
        self.post_action(id, "enable").await
    }

    /// Mark a student inactive (POST /students/{id}/disable/).
    pub async fn disable_student(&self, id: &str) -> DirectoryResult<()> {
        self.post_action(id, "disable").await
    }

    /// Enroll a student into class sections (POST /students/{id}/set_classes/).
    ///
    /// The endpoint is additive and idempotent: section ids already held
    /// are a no-op success, and existing enrollments are never cleared.
    pub async fn assign_sections(&self, id: &str, section_ids: &[String]) -> DirectoryResult<()> {
        let url = format!("{}/students/{id}/set_classes/", self.base_url);
        debug!(%url, count = section_ids.len(), "directory assign sections");
        let body = serde_json::json!({ "school_classes": section_ids });
        let builder = self.auth.apply(self.http.post(&url)).json(&body);
        let response = builder.send().await?;
        self.expect_success(response).await
    }

    // ── Section mutations ─────────────────────────────────────────────

    /// Create a class section (POST /classes/).
    ///
    /// A 400 naming the (name, school_year, coordination) unique set means
    /// the section already exists and is reported as such, not an error.
    pub async fn create_section(&self, payload: &SectionPayload) -> DirectoryResult<SectionCreated> {
        let url = format!("{}/classes/", self.base_url);
        debug!(%url, name = %payload.name, "directory create section");
        let builder = self.auth.apply(self.http.post(&url)).json(payload);
        let response = builder.send().await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            let section = serde_json::from_str(&body)
                .map_err(|e| DirectoryError::Parse(format!("create section response: {e}")))?;
            return Ok(SectionCreated::Created(section));
        }
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            let is_unique_violation = serde_json::from_str::<serde_json::Value>(&body)
                .map(|v| v.get("non_field_errors").is_some())
                .unwrap_or(false);
            if is_unique_violation {
                return Ok(SectionCreated::AlreadyExists);
            }
            return Err(DirectoryError::Validation { detail: body });
        }
        Err(classify_status(status, response.text().await.unwrap_or_default(), None))
    }

    // ── Internals ─────────────────────────────────────────────────────

    async fn post_action(&self, id: &str, action: &str) -> DirectoryResult<()> {
        let url = format!("{}/students/{id}/{action}/", self.base_url);
        debug!(%url, "directory POST");
        let builder = self.auth.apply(self.http.post(&url)).json(&serde_json::json!({}));
        let response = builder.send().await?;
        self.expect_success(response).await
    }

    async fn walk_pages<T: DeserializeOwned>(&self, first_url: String) -> PageOutcome<T> {
        let mut items = Vec::new();
        let mut url = Some(first_url);
        let mut pages = 0usize;

        while let Some(page_url) = url {
            match self.get::<ListPage<T>>(&page_url).await {
                Ok(page) => {
                    items.extend(page.results);
                    url = page.next;
                    pages += 1;
                }
                Err(e) => {
                    warn!(page = pages + 1, error = %e, "listing interrupted, keeping partial results");
                    return PageOutcome {
                        items,
                        interrupted: Some(e),
                    };
                }
            }
        }

        debug!(pages, total = items.len(), "listing complete");
        PageOutcome {
            items,
            interrupted: None,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> DirectoryResult<T> {
        debug!(%url, "directory GET");
        let builder = self.auth.apply(self.http.get(url));
        let response = builder.send().await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> DirectoryResult<T> {
        debug!(%url, "directory POST");
        let builder = self.auth.apply(self.http.post(url)).json(body);
        let response = builder.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> DirectoryResult<T> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| DirectoryError::Parse(e.to_string()))
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn expect_success(&self, response: reqwest::Response) -> DirectoryResult<()> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: reqwest::Response) -> DirectoryError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
        classify_status(status, body, retry_after)
    }
}

fn classify_status(status: StatusCode, body: String, retry_after: Option<u64>) -> DirectoryError {
    match status {
        StatusCode::BAD_REQUEST => DirectoryError::Validation { detail: body },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DirectoryError::Auth {
            status: status.as_u16(),
            detail: body,
        },
        StatusCode::NOT_FOUND => DirectoryError::NotFound(body),
        StatusCode::TOO_MANY_REQUESTS => DirectoryError::RateLimited {
            retry_after_secs: retry_after,
        },
        _ => DirectoryError::Http {
            status: status.as_u16(),
            detail: if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body
            },
        },
    }
}

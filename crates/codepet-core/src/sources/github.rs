//! GitHub as the primary activity source.
//!
//! Commit activity comes from the commit search API. When search fails or
//! has not indexed today's commits yet, the repository listing's
//! `pushed_at` timestamps stand in.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::traits::{PrimarySource, RepoSummary};
use crate::error::SourceError;
use crate::storage::Config;
use crate::streak::DayKey;

const API_VERSION: &str = "2022-11-28";

pub struct GitHubSource {
    client: Client,
    api_base: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    commit: SearchCommit,
}

#[derive(Deserialize)]
struct SearchCommit {
    author: SearchAuthor,
}

#[derive(Deserialize)]
struct SearchAuthor {
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GitHubSource {
    /// # Errors
    /// Fails if `api_base` is not a URL or the HTTP client cannot be built.
    pub fn new(
        api_base: &str,
        token: Option<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let api_base = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|e| SourceError::InvalidEndpoint(format!("{api_base}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_base,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Self::new(
            &config.github.api_base,
            config.github_token(),
            &config.github.user_agent,
            config.upstream_timeout(),
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidEndpoint(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Map non-success responses onto [`SourceError`].
    async fn check(resp: Response, subject: &str) -> Result<Response, SourceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = super::retry_after(resp.headers(), Utc::now());
        let exhausted = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);

        match status {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(subject.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited { retry_after }),
            StatusCode::FORBIDDEN
                if exhausted || message.to_ascii_lowercase().contains("rate limit") =>
            {
                Err(SourceError::RateLimited { retry_after })
            }
            _ => Err(SourceError::Http {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn fetch_repositories(&self, id: &str) -> Result<Vec<RepoSummary>, SourceError> {
        let mut url = self.endpoint(&["users", id, "repos"])?;
        url.query_pairs_mut()
            .append_pair("per_page", "100")
            .append_pair("sort", "pushed");
        let resp = Self::check(self.get(url).send().await?, id).await?;
        resp.json::<Vec<RepoSummary>>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PrimarySource for GitHubSource {
    fn name(&self) -> &str {
        "github"
    }

    async fn verify_identity(&self, id: &str) -> Result<(), SourceError> {
        let url = self.endpoint(&["users", id])?;
        Self::check(self.get(url).send().await?, id).await?;
        Ok(())
    }

    async fn search_activity(
        &self,
        id: &str,
        since: DayKey,
    ) -> Result<Vec<DateTime<Utc>>, SourceError> {
        let mut url = self.endpoint(&["search", "commits"])?;
        url.query_pairs_mut()
            .append_pair("q", &format!("author:{id} author-date:>={since}"))
            .append_pair("per_page", "100");
        let resp = Self::check(self.get(url).send().await?, id).await?;
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(body.items.into_iter().map(|i| i.commit.author.date).collect())
    }

    async fn fallback_activity(
        &self,
        id: &str,
        since: DayKey,
    ) -> Result<Vec<DateTime<Utc>>, SourceError> {
        let floor = since.start();
        Ok(self
            .fetch_repositories(id)
            .await?
            .into_iter()
            .filter_map(|r| r.pushed_at)
            .filter(|ts| *ts >= floor)
            .collect())
    }

    async fn list_repositories(&self, id: &str) -> Result<Vec<RepoSummary>, SourceError> {
        self.fetch_repositories(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn source(server: &mockito::ServerGuard) -> GitHubSource {
        GitHubSource::new(&server.url(), Some("ghp_test".into()), "codepet-test", Duration::from_secs(5))
            .unwrap()
    }

    fn since() -> DayKey {
        DayKey::from_ymd(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn verify_identity_maps_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/ghost")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let err = source(&server).verify_identity("ghost").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn verify_identity_sends_auth_and_version_headers() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/users/octocat")
            .match_header("authorization", "Bearer ghp_test")
            .match_header("x-github-api-version", API_VERSION)
            .with_status(200)
            .with_body(r#"{"login":"octocat"}"#)
            .create_async()
            .await;

        source(&server).verify_identity("octocat").await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn search_parses_commit_author_dates() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/search/commits")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "author:octocat author-date:>=2024-05-01".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"total_count":2,"items":[
                    {"commit":{"author":{"date":"2024-05-02T10:00:00Z"}}},
                    {"commit":{"author":{"date":"2024-05-03T23:30:00-05:00"}}}
                ]}"#,
            )
            .create_async()
            .await;

        let dates = source(&server).search_activity("octocat", since()).await.unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(
            DayKey::from_timestamp(&dates[1]),
            DayKey::from_ymd(2024, 5, 4).unwrap()
        );
    }

    #[tokio::test]
    async fn forbidden_with_exhausted_quota_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/search/commits")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("retry-after", "30")
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .create_async()
            .await;

        let err = source(&server).search_activity("octocat", since()).await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(30)
        ));
    }

    #[tokio::test]
    async fn plain_forbidden_is_an_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/octocat")
            .with_status(403)
            .with_body(r#"{"message":"Resource not accessible"}"#)
            .create_async()
            .await;

        let err = source(&server).verify_identity("octocat").await.unwrap_err();
        assert!(matches!(err, SourceError::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn fallback_uses_pushed_at_inside_window() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/octocat/repos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("sort".into(), "pushed".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[
                    {"id":1,"name":"fresh","html_url":"https://github.com/octocat/fresh","pushed_at":"2024-05-20T08:00:00Z"},
                    {"id":2,"name":"stale","html_url":"https://github.com/octocat/stale","pushed_at":"2023-01-01T08:00:00Z"},
                    {"id":3,"name":"empty","html_url":"https://github.com/octocat/empty","pushed_at":null}
                ]"#,
            )
            .create_async()
            .await;

        let dates = source(&server).fallback_activity("octocat", since()).await.unwrap();
        assert_eq!(dates.len(), 1);
        assert_eq!(DayKey::from_timestamp(&dates[0]), DayKey::from_ymd(2024, 5, 20).unwrap());
    }

    #[tokio::test]
    async fn list_repositories_keeps_listing_fields() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/octocat/repos")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"id":7,"name":"hello","description":"hi","html_url":"https://github.com/octocat/hello",
                     "stargazers_count":12,"forks_count":3,"pushed_at":"2024-05-20T08:00:00Z",
                     "created_at":"2020-01-01T00:00:00Z","updated_at":"2024-05-20T08:00:00Z","private":false}]"#,
            )
            .create_async()
            .await;

        let repos = source(&server).list_repositories("octocat").await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "hello");
        assert_eq!(repos[0].stargazers_count, 12);
        assert_eq!(repos[0].description.as_deref(), Some("hi"));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = GitHubSource::new("not a url", None, "codepet", Duration::from_secs(1));
        assert!(matches!(result, Err(SourceError::InvalidEndpoint(_))));
    }
}

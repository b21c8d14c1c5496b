//! Typed client for the persistence boundary
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list ratings | `GET /rating[?email=]` |
//! | create rating | `POST /rating` |
//! | update rating | `PUT /rating?id=` |
//! | delete rating | `DELETE /rating?id=` |
//! | list completions | `GET /day` |
//! | create completion | `POST /day` |
//! | read profile | `GET /user?email=` |
//! | save profile | `PUT /user`, `POST /user` when absent |

use crate::{Result, SyncError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tally_common::sanitizer::redact;
use tally_common::{DailyCompletion, NewDailyCompletion, NewRating, Rating, UserProfile};

/// The remote persistence boundary
#[async_trait]
pub trait Remote: Send + Sync {
    /// All ratings, or one submitter's when `email` is given
    async fn list_ratings(&self, email: Option<&str>) -> Result<Vec<Rating>>;

    async fn create_rating(&self, rating: &NewRating) -> Result<Rating>;

    async fn update_rating(&self, id: i64, rating: &NewRating) -> Result<Rating>;

    async fn delete_rating(&self, id: i64) -> Result<()>;

    async fn list_completions(&self) -> Result<Vec<DailyCompletion>>;

    async fn create_completion(&self, record: &NewDailyCompletion) -> Result<DailyCompletion>;

    /// `None` when no profile exists for `email`
    async fn get_profile(&self, email: &str) -> Result<Option<UserProfile>>;

    async fn save_profile(&self, email: &str, name: &str) -> Result<UserProfile>;
}

#[derive(Serialize)]
struct ProfileBody<'a> {
    email: &'a str,
    name: &'a str,
}

/// [`Remote`] over HTTP with JSON bodies
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Boundary answered {}: {}", status, body);
        Err(SyncError::Server {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SyncError::Shape {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn list_ratings(&self, email: Option<&str>) -> Result<Vec<Rating>> {
        let mut request = self.client.get(self.url("rating"));
        if let Some(email) = email {
            request = request.query(&[("email", email)]);
        }

        match self.send(request).await {
            Ok(response) => self.decode("GET /rating", response).await,
            // A filtered list with no matches comes back as 404
            Err(e) if email.is_some() && e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_rating(&self, rating: &NewRating) -> Result<Rating> {
        let response = self
            .send(self.client.post(self.url("rating")).json(rating))
            .await?;
        self.decode("POST /rating", response).await
    }

    async fn update_rating(&self, id: i64, rating: &NewRating) -> Result<Rating> {
        let request = self
            .client
            .put(self.url("rating"))
            .query(&[("id", id)])
            .json(rating);
        let response = self.send(request).await?;
        self.decode("PUT /rating", response).await
    }

    async fn delete_rating(&self, id: i64) -> Result<()> {
        let request = self.client.delete(self.url("rating")).query(&[("id", id)]);
        self.send(request).await?;
        Ok(())
    }

    async fn list_completions(&self) -> Result<Vec<DailyCompletion>> {
        let response = self.send(self.client.get(self.url("day"))).await?;
        self.decode("GET /day", response).await
    }

    async fn create_completion(&self, record: &NewDailyCompletion) -> Result<DailyCompletion> {
        let response = self
            .send(self.client.post(self.url("day")).json(record))
            .await?;
        self.decode("POST /day", response).await
    }

    async fn get_profile(&self, email: &str) -> Result<Option<UserProfile>> {
        let request = self.client.get(self.url("user")).query(&[("email", email)]);
        match self.send(request).await {
            Ok(response) => self.decode("GET /user", response).await.map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_profile(&self, email: &str, name: &str) -> Result<UserProfile> {
        let body = ProfileBody { email, name };
        match self.send(self.client.put(self.url("user")).json(&body)).await {
            Ok(response) => self.decode("PUT /user", response).await,
            Err(e) if e.is_not_found() => {
                tracing::debug!("No profile for {}, creating one", redact(email));
                let response = self
                    .send(self.client.post(self.url("user")).json(&body))
                    .await?;
                self.decode("POST /user", response).await
            }
            Err(e) => Err(e),
        }
    }
}

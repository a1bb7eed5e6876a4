/// TVmaze client for the actor directory
use crate::{
    config::DirectoryConfig,
    directory::{ActorDirectory, CastCredit, DirectoryPerson, NamedRef},
    error::{CastError, CastResult},
    metrics,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the TVmaze people endpoints
#[derive(Clone)]
pub struct TvMazeClient {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    person: DirectoryPerson,
}

#[derive(Debug, Deserialize)]
struct CreditEntry {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedShow,
}

#[derive(Debug, Deserialize)]
struct EmbeddedShow {
    show: NamedRef,
}

impl TvMazeClient {
    /// Create a new TVmaze client
    pub fn new(config: &DirectoryConfig) -> CastResult<Self> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CastError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
    ) -> CastResult<T> {
        debug!("Directory request: {}", url);

        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_directory_request(endpoint, "error");
                return Err(CastError::Directory(format!("Request to {} failed: {}", url, e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::record_directory_request(endpoint, "error");
            return Err(CastError::Directory(format!(
                "{} returned status {}",
                url, status
            )));
        }

        let body = response.json::<T>().await.map_err(|e| {
            metrics::record_directory_request(endpoint, "error");
            CastError::Directory(format!("Failed to parse response from {}: {}", url, e))
        })?;

        metrics::record_directory_request(endpoint, "ok");
        Ok(body)
    }
}

#[async_trait]
impl ActorDirectory for TvMazeClient {
    async fn search(&self, name: &str) -> CastResult<Vec<DirectoryPerson>> {
        let url = format!(
            "{}/search/people?q={}",
            self.base_url,
            urlencoding::encode(name)
        );

        let hits: Vec<SearchHit> = self.get_json("search", &url).await?;
        Ok(hits.into_iter().map(|hit| hit.person).collect())
    }

    async fn credits(&self, external_id: i64) -> CastResult<Vec<CastCredit>> {
        let url = format!(
            "{}/people/{}/castcredits?embed=show",
            self.base_url, external_id
        );

        let entries: Vec<CreditEntry> = self.get_json("credits", &url).await?;
        Ok(entries
            .into_iter()
            .map(|entry| CastCredit {
                show: entry.embedded.show,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TvMazeClient {
        TvMazeClient::new(&DirectoryConfig {
            base_url: server.uri(),
            user_agent: "cast-cache-test".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_people() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/people"))
            .and(query_param("q", "brad pitt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "score": 0.9,
                    "person": {
                        "id": 5,
                        "name": "Brad Pitt",
                        "country": {"name": "United States", "code": "US"},
                        "birthday": "1963-12-18",
                        "deathday": null,
                        "gender": "Male",
                        "image": null
                    }
                },
                {
                    "score": 0.4,
                    "person": {"id": 9, "name": "Brad Pittman"}
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let people = client_for(&server).search("brad pitt").await.unwrap();

        assert_eq!(people.len(), 2);
        assert_eq!(people[0].id, 5);
        assert_eq!(people[0].country.as_ref().unwrap().name, "United States");
        assert_eq!(people[0].deathday, None);
        assert_eq!(people[1].gender, None);
    }

    #[tokio::test]
    async fn test_cast_credits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/people/5/castcredits"))
            .and(query_param("embed", "show"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"self": true, "voice": false, "_embedded": {"show": {"id": 1, "name": "Friends"}}},
                {"self": false, "voice": false, "_embedded": {"show": {"id": 2, "name": "Lost"}}}
            ])))
            .mount(&server)
            .await;

        let credits = client_for(&server).credits(5).await.unwrap();

        let names: Vec<_> = credits.iter().map(|c| c.show.name.as_str()).collect();
        assert_eq!(names, vec!["Friends", "Lost"]);
    }

    #[tokio::test]
    async fn test_server_error_is_directory_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search("anyone").await.unwrap_err();
        assert!(matches!(err, CastError::Directory(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_directory_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).credits(1).await.unwrap_err();
        assert!(matches!(err, CastError::Directory(_)));
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use super::config::RemoteConfig;
use super::models::{
    MoveCardBody, MoveQuestBody, ReorderCardsBody, ReorderQuestsBody, SpawnQuestBody,
};
use questboard_api::{ApiError, Card, CardStatus, ContainerId, Quest, ReorderRequest};
use questboard_core::{OrderingApi, QuestApi, Result};

const MAX_BODY_IN_ERROR: usize = 500;

/// HTTP client for the ordering service.
pub struct HttpOrderingClient {
    base_url: Url,
    default_headers: HeaderMap,
    client: reqwest::Client,
}

impl HttpOrderingClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::invalid(format!("Invalid API token format: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(config.timeout());
        }
        let client = builder.build().map_err(|e| ApiError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        let base_url = Url::parse(config.base())
            .map_err(|e| ApiError::invalid(format!("Invalid base URL {}: {}", config.base(), e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::invalid(format!(
                "Base URL {} cannot carry a path",
                base_url
            )));
        }

        info!("[HttpOrderingClient] Using {}", base_url);
        Ok(Self {
            base_url,
            default_headers: headers,
            client,
        })
    }

    /// Each segment is percent-encoded, so ids may contain `/`, `?` or `#`.
    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    /// Map a transport-level failure onto the error taxonomy.
    fn format_reqwest_error(e: reqwest::Error, url: &str, operation: &str) -> ApiError {
        if e.is_timeout() {
            ApiError::Network {
                message: format!(
                    "Failed to {} for {}: timeout - request took too long",
                    operation, url
                ),
            }
        } else if {
            #[cfg(not(target_arch = "wasm32"))]
            {
                e.is_connect()
            }
            #[cfg(target_arch = "wasm32")]
            {
                false
            }
        } {
            ApiError::Network {
                message: format!(
                    "Failed to {} for {}: connection error - check that the service is reachable. Error: {}",
                    operation, url, e
                ),
            }
        } else if e.is_decode() {
            ApiError::Decode {
                message: format!(
                    "Failed to {} for {}: unexpected response format. Error: {}",
                    operation, url, e
                ),
            }
        } else {
            ApiError::Network {
                message: format!("Failed to {} for {}: {}", operation, url, e),
            }
        }
    }

    /// Read the body, turning non-success statuses into errors.
    async fn handle_response(response: reqwest::Response, url: &str) -> Result<String> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| ApiError::Network {
            message: format!("Failed to read response body from {}: {}", url, e),
        })?;

        if !status.is_success() {
            return Err(status_error(status, url, &response_text));
        }

        Ok(response_text)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        operation: &str,
    ) -> Result<String> {
        debug!("[HttpOrderingClient] {} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .headers(self.default_headers.clone());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let error = Self::format_reqwest_error(e, url, operation);
            error!("[HttpOrderingClient] {}", error);
            error
        })?;

        Self::handle_response(response, url).await.map_err(|e| {
            error!("[HttpOrderingClient] Failed to {}: {}", operation, e);
            e
        })
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        operation: &str,
    ) -> Result<R> {
        let text = self
            .send::<()>(Method::GET, url, query, None, operation)
            .await?;
        decode(&text, url)
    }

    async fn fetch_cards(&self, board_id: &str) -> Result<Vec<Card>> {
        let url = self.url(&["boards", board_id, "cards"]);
        let cards: Vec<Card> = self.get_json(&url, &[], "fetch cards").await?;
        debug!(
            "[HttpOrderingClient] Fetched {} card(s) for board {}",
            cards.len(),
            board_id
        );
        Ok(cards)
    }

    async fn fetch_quests(&self, date: NaiveDate) -> Result<Vec<Quest>> {
        let url = self.url(&["quests"]);
        let quests: Vec<Quest> = self
            .get_json(&url, &[("date", date.to_string())], "fetch quests")
            .await?;
        debug!(
            "[HttpOrderingClient] Fetched {} quest(s) for {}",
            quests.len(),
            date
        );
        Ok(quests)
    }
}

fn truncate_body(text: &str) -> String {
    if text.len() <= MAX_BODY_IN_ERROR {
        return text.to_string();
    }
    let mut cut = MAX_BODY_IN_ERROR;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated)", &text[..cut])
}

fn status_error(status: StatusCode, url: &str, body: &str) -> ApiError {
    let message = format!(
        "HTTP {} error from {}: {}",
        status.as_u16(),
        url,
        truncate_body(body)
    );
    match status.as_u16() {
        400 | 404 | 409 | 422 => ApiError::Validation {
            status: status.as_u16(),
            message,
        },
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

fn decode<R: DeserializeOwned>(text: &str, url: &str) -> Result<R> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode {
        message: format!(
            "Failed to parse response from {}: {} - body: {}",
            url,
            e,
            truncate_body(text)
        ),
    })
}

fn board_of(container: &ContainerId) -> Result<&str> {
    match container {
        ContainerId::Board(id) => Ok(id),
        other => Err(ApiError::ContainerNotFound {
            container: format!("{} is not a board", other),
        }),
    }
}

fn day_of(container: &ContainerId) -> Result<NaiveDate> {
    match container {
        ContainerId::Day(date) => Ok(*date),
        other => Err(ApiError::ContainerNotFound {
            container: format!("{} is not a day", other),
        }),
    }
}

#[async_trait]
impl OrderingApi<Card> for HttpOrderingClient {
    async fn fetch_list(&self, container: &ContainerId) -> Result<Vec<Card>> {
        self.fetch_cards(board_of(container)?).await
    }

    async fn apply_reorder(
        &self,
        container: &ContainerId,
        request: &ReorderRequest<CardStatus>,
    ) -> Result<()> {
        let board_id = board_of(container)?;
        match request {
            ReorderRequest::Positions { entries } => {
                let url = self.url(&["boards", board_id, "cards", "reorder"]);
                let body = ReorderCardsBody {
                    entries: entries.clone(),
                };
                self.send(Method::POST, &url, &[], Some(&body), "reorder cards")
                    .await?;
                info!(
                    "[HttpOrderingClient] Reordered {} card(s) on board {}",
                    entries.len(),
                    board_id
                );
            }
            ReorderRequest::MoveToGroup { id, group, index } => {
                let url = self.url(&["cards", id.as_str(), "move"]);
                let body = MoveCardBody {
                    status: *group,
                    index: *index,
                };
                self.send(Method::PATCH, &url, &[], Some(&body), "move card")
                    .await?;
                info!(
                    "[HttpOrderingClient] Moved card {} to {}[{}]",
                    id, group, index
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderingApi<Quest> for HttpOrderingClient {
    async fn fetch_list(&self, container: &ContainerId) -> Result<Vec<Quest>> {
        self.fetch_quests(day_of(container)?).await
    }

    async fn apply_reorder(
        &self,
        container: &ContainerId,
        request: &ReorderRequest<NaiveDate>,
    ) -> Result<()> {
        let date = day_of(container)?;
        match request {
            ReorderRequest::Positions { entries } => {
                let url = self.url(&["quests", "reorder"]);
                let body = ReorderQuestsBody {
                    date,
                    entries: entries.clone(),
                };
                self.send(Method::POST, &url, &[], Some(&body), "reorder quests")
                    .await?;
                info!(
                    "[HttpOrderingClient] Reordered {} quest(s) on {}",
                    entries.len(),
                    date
                );
            }
            ReorderRequest::MoveToGroup { id, group, index } => {
                let url = self.url(&["quests", id.as_str(), "move"]);
                let body = MoveQuestBody {
                    date: *group,
                    index: *index,
                };
                self.send(Method::PATCH, &url, &[], Some(&body), "move quest")
                    .await?;
                info!(
                    "[HttpOrderingClient] Moved quest {} from {} to {}[{}]",
                    id, date, group, index
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QuestApi for HttpOrderingClient {
    async fn spawn_recurring(&self, template: &Quest, date: NaiveDate) -> Result<Quest> {
        let url = self.url(&["quests", template.id.as_str(), "spawn"]);
        let text = self
            .send(
                Method::POST,
                &url,
                &[],
                Some(&SpawnQuestBody { date }),
                "spawn recurring quest",
            )
            .await?;
        let quest: Quest = decode(&text, &url)?;
        info!(
            "[HttpOrderingClient] Spawned {} from {} on {}",
            quest.id, template.id, date
        );
        Ok(quest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "u", "stale"),
            ApiError::Validation { status: 409, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "u", ""),
            ApiError::Validation { status: 422, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "u", ""),
            ApiError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() <= MAX_BODY_IN_ERROR + "... (truncated)".len());
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn test_path_segments_are_percent_encoded() {
        let client = HttpOrderingClient::new(&RemoteConfig::new("http://localhost:8080/api/")).unwrap();
        assert_eq!(
            client.url(&["boards", "team/alpha", "cards"]),
            "http://localhost:8080/api/boards/team%2Falpha/cards"
        );
        assert_eq!(
            client.url(&["cards", "a?b#c", "move"]),
            "http://localhost:8080/api/cards/a%3Fb%23c/move"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(HttpOrderingClient::new(&RemoteConfig::new("not a url")).is_err());
        assert!(HttpOrderingClient::new(&RemoteConfig::new("mailto:ops@example.com")).is_err());
    }

    #[test]
    fn test_wrong_container_kind() {
        assert!(board_of(&ContainerId::today()).is_err());
        assert_eq!(board_of(&ContainerId::board("b1")).unwrap(), "b1");
    }
}

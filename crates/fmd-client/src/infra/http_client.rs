use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::server::{classify_status, FmdServer, ServerError, SignedCommand};

/// Request body shared by every endpoint.
#[derive(Serialize, Debug)]
struct ApiRequest<'a> {
    #[serde(rename = "IDT")]
    idt: &'a str,
    #[serde(rename = "Data")]
    data: &'a str,
    #[serde(rename = "SessionDurationSeconds", skip_serializing_if = "Option::is_none")]
    session_duration_seconds: Option<u64>,
    #[serde(rename = "UnixTime", skip_serializing_if = "Option::is_none")]
    unix_time: Option<i64>,
    #[serde(rename = "CmdSig", skip_serializing_if = "Option::is_none")]
    cmd_sig: Option<&'a str>,
}

impl<'a> ApiRequest<'a> {
    fn new(idt: &'a str, data: &'a str) -> Self {
        Self {
            idt,
            data,
            session_duration_seconds: None,
            unix_time: None,
            cmd_sig: None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct DataResponse {
    #[serde(rename = "Data")]
    data: serde_json::Value,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PicturesResponse {
    List(Vec<String>),
    Wrapped {
        #[serde(rename = "Data")]
        data: Vec<String>,
    },
}

/// reqwest-backed [`FmdServer`].
#[derive(Clone)]
pub struct HttpServer {
    client: Client,
    base_url: String,
}

impl HttpServer {
    pub fn new(base_url: &str, config: &ClientConfig) -> Result<Self, ServerError> {
        Self::with_timeouts(base_url, config.request_timeout(), config.connect_timeout())
    }

    pub fn with_timeouts(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ServerError::Transient(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// PUT an [`ApiRequest`] and return the `Data` field as text.
    ///
    /// Some servers label JSON as `application/octet-stream`, so the body is
    /// parsed as JSON regardless of content type and falls back to raw text.
    async fn put_data(&self, path: &str, body: &ApiRequest<'_>) -> Result<String, ServerError> {
        let resp = self.client.put(self.url(path)).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), error_message(&text, status)));
        }

        match serde_json::from_str::<DataResponse>(&text) {
            Ok(DataResponse {
                data: serde_json::Value::String(s),
            }) => Ok(s),
            Ok(DataResponse {
                data: serde_json::Value::Number(n),
            }) => Ok(n.to_string()),
            Ok(DataResponse {
                data: serde_json::Value::Null,
            }) => Ok(String::new()),
            _ => {
                if text.is_empty() {
                    debug!(endpoint = path, "Empty response body");
                }
                Ok(text)
            }
        }
    }
}

fn error_message(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[async_trait]
impl FmdServer for HttpServer {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn salt(&self, fmd_id: &str) -> Result<String, ServerError> {
        self.put_data("/api/v1/salt", &ApiRequest::new(fmd_id, "")).await
    }

    async fn request_access(
        &self,
        fmd_id: &str,
        auth_hash: &str,
        session_duration_secs: u64,
    ) -> Result<String, ServerError> {
        let body = ApiRequest {
            session_duration_seconds: Some(session_duration_secs),
            ..ApiRequest::new(fmd_id, auth_hash)
        };
        let token = self.put_data("/api/v1/requestAccess", &body).await?;
        if token.trim().is_empty() {
            return Err(ServerError::Unauthorized);
        }
        Ok(token)
    }

    async fn private_key_blob(&self, token: &str) -> Result<String, ServerError> {
        self.put_data("/api/v1/key", &ApiRequest::new(token, "unused")).await
    }

    async fn location_count(&self, token: &str) -> Result<usize, ServerError> {
        let raw = self
            .put_data("/api/v1/locationDataSize", &ApiRequest::new(token, "unused"))
            .await?;
        raw.trim()
            .parse::<usize>()
            .map_err(|_| ServerError::InvalidResponse(format!("location count {raw:?}")))
    }

    async fn location(&self, token: &str, index: usize) -> Result<String, ServerError> {
        let index = index.to_string();
        self.put_data("/api/v1/location", &ApiRequest::new(token, &index))
            .await
    }

    async fn pictures(&self, token: &str) -> Result<Vec<String>, ServerError> {
        let resp = self
            .client
            .put(self.url("/api/v1/pictures"))
            .json(&ApiRequest::new(token, ""))
            .send()
            .await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            warn!("Server has no pictures endpoint, treating as empty");
            return Ok(Vec::new());
        }
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), error_message(&text, status)));
        }
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<PicturesResponse>(&text) {
            Ok(PicturesResponse::List(list)) | Ok(PicturesResponse::Wrapped { data: list }) => {
                Ok(list)
            }
            Err(e) => Err(ServerError::InvalidResponse(format!("picture list: {e}"))),
        }
    }

    async fn command(&self, token: &str, command: &SignedCommand) -> Result<(), ServerError> {
        let body = ApiRequest {
            unix_time: Some(command.unix_time_ms),
            cmd_sig: Some(&command.signature),
            ..ApiRequest::new(token, &command.command)
        };
        let resp = self
            .client
            .post(self.url("/api/v1/command"))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(classify_status(status.as_u16(), error_message(&text, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_field_names() {
        let body = ApiRequest {
            session_duration_seconds: Some(3600),
            ..ApiRequest::new("device-1", "$argon2id$...")
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["IDT"], "device-1");
        assert_eq!(json["Data"], "$argon2id$...");
        assert_eq!(json["SessionDurationSeconds"], 3600);
        assert!(json.get("UnixTime").is_none());
        assert!(json.get("CmdSig").is_none());
    }

    #[test]
    fn test_command_body_field_names() {
        let body = ApiRequest {
            unix_time: Some(1_700_000_000_000),
            cmd_sig: Some("c2ln"),
            ..ApiRequest::new("token", "ring")
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["UnixTime"], 1_700_000_000_000i64);
        assert_eq!(json["CmdSig"], "c2ln");
        assert!(json.get("SessionDurationSeconds").is_none());
    }

    #[test]
    fn test_picture_list_shapes() {
        let bare: PicturesResponse = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert!(matches!(bare, PicturesResponse::List(v) if v.len() == 2));
        let wrapped: PicturesResponse = serde_json::from_str(r#"{"Data":["a"]}"#).unwrap();
        assert!(matches!(wrapped, PicturesResponse::Wrapped { data } if data.len() == 1));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let server = HttpServer::with_timeouts(
            "https://fmd.example.org/",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(server.base_url(), "https://fmd.example.org");
        assert_eq!(server.url("/api/v1/salt"), "https://fmd.example.org/api/v1/salt");
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;

use crate::capture::EncodedFrame;
use crate::error::AnalysisError;
use crate::settings::ServiceSettings;

use super::schema::{DescribeRequest, ModeContext, RawReply};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// The remote multimodal description service.
#[async_trait]
pub trait DescriptionClient: Send + Sync {
    async fn analyze(
        &self,
        frame: &EncodedFrame,
        context: &ModeContext,
    ) -> Result<RawReply, AnalysisError>;
}

pub struct HttpDescriptionClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpDescriptionClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self, AnalysisError> {
        // Slightly looser than the per-tick timeout so the scheduler's own timer fires first.
        let client = Client::builder()
            .timeout(settings.timeout() + Duration::from_secs(1))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
        })
    }

    fn url_for(&self, context: &ModeContext) -> String {
        format!("{}/api/detect/{}", self.base_url, context.endpoint())
    }
}

pub fn data_url(frame: &EncodedFrame) -> String {
    format!("data:{};base64,{}", EncodedFrame::MIME, STANDARD.encode(&frame.bytes))
}

#[async_trait]
impl DescriptionClient for HttpDescriptionClient {
    async fn analyze(
        &self,
        frame: &EncodedFrame,
        context: &ModeContext,
    ) -> Result<RawReply, AnalysisError> {
        let url = self.url_for(context);
        let body = DescribeRequest::new(data_url(frame), context);

        log_debug!(
            "POST {} ({}x{}, {} bytes)",
            url,
            frame.width,
            frame.height,
            frame.bytes.len()
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Server {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| AnalysisError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn frame() -> EncodedFrame {
        EncodedFrame {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 2,
            height: 2,
            captured_at: Utc::now(),
        }
    }

    /// Serve exactly one HTTP response and hand back the raw request text.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn client_for(base_url: String, token: Option<&str>) -> HttpDescriptionClient {
        HttpDescriptionClient::new(&ServiceSettings {
            base_url,
            api_token: token.map(str::to_string),
            timeout_ms: 2000,
        })
        .unwrap()
    }

    #[test]
    fn data_url_is_base64_jpeg() {
        assert_eq!(data_url(&frame()), "data:image/jpeg;base64,/9j/2Q==");
    }

    #[tokio::test]
    async fn posts_search_context_and_parses_reply() {
        let (base_url, server) =
            serve_once("HTTP/1.1 200 OK", r#"{"description":"OBJETO ENCONTRADO à direita"}"#)
                .await;
        let client = client_for(base_url, Some("secret"));

        let reply = client
            .analyze(
                &frame(),
                &ModeContext::Search {
                    query: "caneca".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            reply.description.as_deref(),
            Some("OBJETO ENCONTRADO à direita")
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/detect/analyze-frame"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(r#""search_query":"caneca""#));
    }

    #[tokio::test]
    async fn server_errors_are_reported_with_status() {
        let (base_url, _server) =
            serve_once("HTTP/1.1 503 Service Unavailable", r#"{"detail":"overloaded"}"#).await;
        let client = client_for(base_url, None);

        let err = client
            .analyze(
                &frame(),
                &ModeContext::Traffic {
                    mode: super::super::schema::TrafficMode::Navigation,
                },
            )
            .await
            .unwrap_err();

        match err {
            AnalysisError::Server { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("overloaded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

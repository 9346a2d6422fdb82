//! `Transport` implementation on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, PartContent, Transport};

/// Executes requests with a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn form(parts: Vec<crate::http::MultipartPart>) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for part in parts {
        form = match part.content {
            PartContent::Text(value) => form.text(part.name, value),
            PartContent::File {
                file_name,
                content_type,
                bytes,
            } => {
                let file = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| ApiError::Serialization(e.to_string()))?;
                form.part(part.name, file)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self.http.request(method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        builder = match request.body {
            Some(HttpBody::Json(body)) => builder.body(body),
            Some(HttpBody::Multipart(parts)) => builder.multipart(form(parts)?),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        debug!(status, url = %request.url, "response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

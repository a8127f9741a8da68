//! HTTP client for the hosted catalog and processing APIs.
use tracing::{debug, warn};

use crate::core::params::ServiceConfig;
use crate::core::render::RenderRequest;
use crate::error::{Error, Result};
use crate::io::catalog::{CatalogPage, CatalogQuery, CatalogService};
use crate::io::imagery::{ImageryService, RenderedPayload};
use crate::io::token::TokenProvider;

/// Authenticated client implementing both service seams.
pub struct HubClient<T: TokenProvider> {
    client: reqwest::Client,
    tokens: T,
    process_url: String,
    catalog_url: String,
}

impl<T: TokenProvider> HubClient<T> {
    pub fn new(config: &ServiceConfig, tokens: T) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("sarscene/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            tokens,
            process_url: config.process_url.clone(),
            catalog_url: config.catalog_url.clone(),
        })
    }

    async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        service: &'static str,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let token = self.tokens.bearer_token().await?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            // Upstream error text is passed through unchanged.
            let message = resp.text().await.unwrap_or_default();
            warn!("{} service returned {}: {}", service, status, message);
            return Err(Error::UpstreamService {
                service,
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }
}

impl<T: TokenProvider> CatalogService for HubClient<T> {
    async fn search_page(
        &self,
        query: &CatalogQuery,
        next: Option<&serde_json::Value>,
    ) -> Result<CatalogPage> {
        let body = query.to_body(next);
        let resp = self.post_json("catalog", &self.catalog_url, &body).await?;
        let text = resp.text().await?;
        if text.is_empty() {
            return Err(Error::EmptyResult { service: "catalog" });
        }
        let page: CatalogPage = serde_json::from_str(&text)?;
        debug!("Catalog page with {} features", page.features.len());
        Ok(page)
    }
}

impl<T: TokenProvider> ImageryService for HubClient<T> {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPayload> {
        let resp = self.post_json("process", &self.process_url, request).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(Error::EmptyResult { service: "process" });
        }
        debug!("Rendered {} bytes ({})", bytes.len(), content_type);
        Ok(RenderedPayload::new(bytes, content_type))
    }
}

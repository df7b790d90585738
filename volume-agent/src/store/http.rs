//! REST client for the cluster record store.

use super::{collection_path, merge_patch, ListParams, ObjectList, RecordStore, Resource};
use crate::config::StoreConfig;
use crate::utils::errors::{AgentError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

const MERGE_PATCH: &str = "application/merge-patch+json";

pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRecordStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.resolve_token()?,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn object_url<R: Resource>(&self, namespace: &str, name: &str) -> String {
        format!("{}{}/{}", self.base_url, collection_path::<R>(Some(namespace)), name)
    }
}

/// Map non-success responses onto agent errors.
async fn check(response: Response, kind: &str, name: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AgentError::RecordNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AgentError::Network(format!("{kind} {name}: {status}: {body}")))
}

impl RecordStore for HttpRecordStore {
    async fn list<R: Resource>(&self, params: &ListParams) -> Result<Vec<R>> {
        let url = format!(
            "{}{}",
            self.base_url,
            collection_path::<R>(params.namespace.as_deref())
        );

        let mut request = self.client.get(&url);
        if !params.fields.is_empty() {
            request = request.query(&[("fieldSelector", params.fields.to_string())]);
        }

        debug!(url = %url, fields = %params.fields, "listing {}", R::PLURAL);
        let response = self.authorized(request).send().await?;
        let list: ObjectList<R> = check(response, R::KIND, &url).await?.json().await?;
        Ok(list.items)
    }

    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> Result<R> {
        let url = self.object_url::<R>(namespace, name);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let key = format!("{namespace}/{name}");
        Ok(check(response, R::KIND, &key).await?.json().await?)
    }

    async fn patch<R: Resource>(&self, original: &R, modified: &R) -> Result<()> {
        let patch = merge_patch::diff(&serde_json::to_value(original)?, &serde_json::to_value(modified)?);
        if merge_patch::is_empty(&patch) {
            debug!(record = %original.key(), "nothing to patch");
            return Ok(());
        }

        let meta = original.metadata();
        let url = self.object_url::<R>(&meta.namespace, &meta.name);
        let request = self
            .client
            .patch(&url)
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(serde_json::to_vec(&patch)?);

        let response = self.authorized(request).send().await?;
        check(response, R::KIND, &original.key()).await?;
        Ok(())
    }
}

//! Docker Registry HTTP API V2 upload client

use crate::copy::{report_blob, Blob};
use crate::image::oci::{media_types, ImageReference};
use crate::{PorterError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

/// Registry client for pushing images
pub struct RegistryClient {
    client: reqwest::Client,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(PorterError::Http)?;

        Ok(Self { client })
    }

    /// Upload every blob that is not already present, then the manifest
    pub async fn push(
        &self,
        reference: &ImageReference,
        config: &Blob,
        layers: &[Blob],
        manifest: &[u8],
        quiet: bool,
    ) -> Result<()> {
        let token = self.get_auth_token(reference).await?;
        let headers = auth_headers(&token)?;

        for blob in layers.iter().chain(std::iter::once(config)) {
            if self.blob_exists(reference, blob, &headers).await? {
                report_blob(quiet, blob, true);
                continue;
            }
            self.upload_blob(reference, blob, &headers).await?;
            report_blob(quiet, blob, false);
        }

        if !quiet {
            eprintln!("Writing manifest to image destination");
        }
        self.put_manifest(reference, manifest, &headers).await
    }

    /// Get an anonymous token for a registry
    async fn get_auth_token(&self, reference: &ImageReference) -> Result<Option<String>> {
        // Docker Hub always wants a token, even for anonymous access
        if reference.registry == crate::image::oci::DEFAULT_REGISTRY {
            let url = format!(
                "https://auth.docker.io/token?service=registry.docker.io&scope=repository:{}:push,pull",
                reference.repository
            );

            let response = self.client.get(&url).send().await?;

            if response.status().is_success() {
                let body: TokenResponse = response.json().await?;
                return Ok(Some(body.token));
            }
        }

        Ok(None)
    }

    async fn blob_exists(
        &self,
        reference: &ImageReference,
        blob: &Blob,
        headers: &HeaderMap,
    ) -> Result<bool> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            reference.registry_url(),
            reference.repository,
            blob.digest()
        );

        let response = self.client.head(&url).headers(headers.clone()).send().await?;
        Ok(response.status().is_success())
    }

    /// Monolithic upload: open a session, then PUT the whole blob
    async fn upload_blob(
        &self,
        reference: &ImageReference,
        blob: &Blob,
        headers: &HeaderMap,
    ) -> Result<()> {
        let base = reference.registry_url();
        let url = format!("{}/v2/{}/blobs/uploads/", base, reference.repository);

        let response = self.client.post(&url).headers(headers.clone()).send().await?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(PorterError::Registry(format!(
                "Failed to start upload of {}: {}",
                blob.digest(),
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PorterError::Registry("Upload session has no Location header".to_string())
            })?;
        let session_url = upload_url(&base, location, blob.digest())?;

        let response = self
            .client
            .put(session_url)
            .headers(headers.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(blob.data.clone())
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(PorterError::Registry(format!(
                "Failed to upload blob {}: {}",
                blob.digest(),
                response.status()
            )));
        }

        Ok(())
    }

    async fn put_manifest(
        &self,
        reference: &ImageReference,
        manifest: &[u8],
        headers: &HeaderMap,
    ) -> Result<()> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            reference.registry_url(),
            reference.repository,
            reference.manifest_reference()
        );

        let response = self
            .client
            .put(&url)
            .headers(headers.clone())
            .header(CONTENT_TYPE, media_types::DOCKER_MANIFEST_V2)
            .body(manifest.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PorterError::Registry(format!(
                "Failed to push manifest: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

fn auth_headers(token: &Option<String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| PorterError::Registry("Invalid token".to_string()))?,
        );
    }
    Ok(headers)
}

/// Resolve the upload session `Location` against the registry and add the
/// digest query parameter. Registries may hand back relative locations.
fn upload_url(base: &str, location: &str, digest: &str) -> Result<Url> {
    let base = Url::parse(base).map_err(|e| PorterError::Registry(e.to_string()))?;
    let mut url = base
        .join(location)
        .map_err(|e| PorterError::Registry(e.to_string()))?;
    url.query_pairs_mut().append_pair("digest", digest);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_client_creation() {
        let client = RegistryClient::new("porter/test");
        assert!(client.is_ok());
    }

    #[test]
    fn test_upload_url_relative_location() {
        let url = upload_url(
            "http://localhost:5000",
            "/v2/app/blobs/uploads/1234?_state=abc",
            "sha256:00ff",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/v2/app/blobs/uploads/1234?_state=abc&digest=sha256%3A00ff"
        );
    }

    #[test]
    fn test_upload_url_absolute_location() {
        let url = upload_url(
            "https://registry.example.com",
            "https://uploads.example.com/session/9",
            "sha256:00ff",
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("uploads.example.com"));
        assert_eq!(url.query(), Some("digest=sha256%3A00ff"));
    }

    #[test]
    fn test_auth_headers() {
        assert!(auth_headers(&None).unwrap().is_empty());
        let headers = auth_headers(&Some("tok".to_string())).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }
}

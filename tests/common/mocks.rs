//! wiremock responders standing in for Drive and GitHub

use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers release creation with the requested tag and a fresh id
pub struct CreatedRelease {
    next_id: AtomicU64,
}

impl CreatedRelease {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }
}

impl Respond for CreatedRelease {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(201).set_body_json(json!({
            "id": id,
            "tag_name": body["tag_name"],
        }))
    }
}

/// Answers an upload with a download URL built from the asset name
pub struct UploadedAsset;

impl Respond for UploadedAsset {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let name = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        ResponseTemplate::new(201).set_body_json(json!({
            "browser_download_url": published_url(&name),
        }))
    }
}

/// URL the mock GitHub hands out for an asset
pub fn published_url(asset: &str) -> String {
    format!("https://github.com/octo/videos/releases/download/mock/{asset}")
}

/// Metadata lookup returning `name`
pub async fn mount_metadata(server: &MockServer, id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v3/files/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": name, "size": "5"})))
        .mount(server)
        .await;
}

/// Direct download of `id`
pub async fn mount_direct_download(server: &MockServer, id: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "video/mp4"))
        .mount(server)
        .await;
}

/// Release listing, creation and upload endpoints
pub async fn mount_github(server: &MockServer, existing_tags: &[&str]) {
    let listing: Vec<_> = existing_tags.iter().map(|t| json!({"tag_name": t})).collect();
    Mock::given(method("GET"))
        .and(path("/repos/octo/videos/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/videos/releases"))
        .respond_with(CreatedRelease::new())
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/repos/octo/videos/releases/\d+/assets$"))
        .respond_with(UploadedAsset)
        .mount(server)
        .await;
}

/// Asset uploads the mock GitHub received, as (asset name, body) in arrival order
pub async fn uploaded_assets(server: &MockServer) -> Vec<(String, Vec<u8>)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path().ends_with("/assets"))
        .map(|r| {
            let name = r
                .url
                .query_pairs()
                .find(|(k, _)| k == "name")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            (name, r.body)
        })
        .collect()
}

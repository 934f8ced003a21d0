use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured photo as reported by the monitoring service. Immutable once
/// fetched; the gallery owns the accumulated list for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub source_url: String,
    pub camera_id: String,
    pub company_id: String,
    pub project_id: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    pub id: String,
    pub name: String,
    pub project_id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Query for one page of images of a (company, project, camera) tuple.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageQuery {
    pub company_id: String,
    pub project_id: String,
    pub camera_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
    pub limit: usize,
    pub skip: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePageResponse {
    success: bool,
    message: Option<String>,
    total_count: Option<u64>,
    data: Option<Vec<ImageRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CameraListResponse {
    success: bool,
    message: Option<String>,
    data: Option<Vec<CameraRecord>>,
}

/// One page of results. `total_count` is present when the server reports it
/// and lets the paginator terminate exactly instead of via the short-page
/// heuristic.
#[derive(Debug, Clone)]
pub struct ImagePage {
    pub records: Vec<ImageRecord>,
    pub total_count: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("malformed response: missing data")]
    Malformed,
}

/// The service boundary the UI layer is given. Production uses the
/// HTTP-backed source; tests and the offline demo use the in-memory one.
pub trait ImageSource: Send + Sync {
    fn fetch_page(&self, query: &ImageQuery) -> Result<ImagePage, ApiError>;
    fn list_cameras(&self, project_id: &str) -> Result<Vec<CameraRecord>, ApiError>;
    fn fetch_photo_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

fn page_from_response(resp: ImagePageResponse) -> Result<ImagePage, ApiError> {
    if !resp.success {
        return Err(ApiError::Rejected(
            resp.message.unwrap_or_else(|| "unspecified".to_string()),
        ));
    }
    // A success payload without `data` fails closed.
    let records = resp.data.ok_or(ApiError::Malformed)?;
    Ok(ImagePage {
        records,
        total_count: resp.total_count,
    })
}

fn cameras_from_response(resp: CameraListResponse) -> Result<Vec<CameraRecord>, ApiError> {
    if !resp.success {
        return Err(ApiError::Rejected(
            resp.message.unwrap_or_else(|| "unspecified".to_string()),
        ));
    }
    resp.data.ok_or(ApiError::Malformed)
}

pub struct HttpImageSource {
    base_url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpImageSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

impl ImageSource for HttpImageSource {
    fn fetch_page(&self, query: &ImageQuery) -> Result<ImagePage, ApiError> {
        let url = format!("{}/s3/images", self.base_url);
        let resp = self.authorize(self.client.post(&url)).json(query).send()?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        page_from_response(resp.json::<ImagePageResponse>()?)
    }

    fn list_cameras(&self, project_id: &str) -> Result<Vec<CameraRecord>, ApiError> {
        let url = format!("{}/camera/get-all/{}", self.base_url, project_id);
        let resp = self.authorize(self.client.get(&url)).send()?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        cameras_from_response(resp.json::<CameraListResponse>()?)
    }

    fn fetch_photo_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.authorize(self.client.get(url)).send()?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(resp.bytes()?.to_vec())
    }
}

/// In-memory source backing tests and the offline demo. Pages are sliced from
/// per-camera vectors with the same skip/limit semantics as the service.
#[derive(Default)]
pub struct InMemoryImageSource {
    cameras: Vec<CameraRecord>,
    images: HashMap<String, Vec<ImageRecord>>,
}

impl InMemoryImageSource {
    pub fn new(cameras: Vec<CameraRecord>, images: HashMap<String, Vec<ImageRecord>>) -> Self {
        Self { cameras, images }
    }
}

impl ImageSource for InMemoryImageSource {
    fn fetch_page(&self, query: &ImageQuery) -> Result<ImagePage, ApiError> {
        let all = self
            .images
            .get(&query.camera_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let start = query.skip.min(all.len());
        let end = (start + query.limit).min(all.len());
        Ok(ImagePage {
            records: all[start..end].to_vec(),
            total_count: Some(all.len() as u64),
        })
    }

    fn list_cameras(&self, project_id: &str) -> Result<Vec<CameraRecord>, ApiError> {
        Ok(self
            .cameras
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    fn fetch_photo_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        // Deterministic placeholder pixels so the demo renders something.
        let seed = url.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let shade = 60 + (seed % 160) as u8;
        let img = image::RgbaImage::from_pixel(64, 48, image::Rgba([shade, shade, shade, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|_| ApiError::Malformed)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
pub(crate) fn test_record(id: &str, camera_id: &str) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        source_url: format!("https://img.example/{}.jpg", id),
        camera_id: camera_id.to_string(),
        company_id: "co1".to_string(),
        project_id: "pr1".to_string(),
        captured_at: Utc::now(),
        is_active: true,
        is_deleted: false,
    }
}

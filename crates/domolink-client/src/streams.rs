//! Camera directory and HLS stream URL resolution.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::api::{Camera, IntercomApi, adapt};
use crate::session::SessionManager;
use crate::transport::TransportError;

const CACHE_TTL: Duration = Duration::from_secs(30);
const CDN_BASE_URL: &str = "https://cdn.cams.is74.ru";

/// Stream resolution errors.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Unknown camera: {0}")]
    CameraNotFound(String),

    #[error("Camera {0} offers no stream")]
    NoStream(String),

    #[error("No access token available for stream authorization")]
    NoAuthToken,

    #[error(transparent)]
    Api(#[from] TransportError),
}

struct CameraCache {
    cameras: Vec<Camera>,
    fetched_at: Instant,
}

/// Cached view of the account's cameras with stream URL resolution.
///
/// Camera listings are cached for 30 s so bursts of lookups (one per
/// camera entity on a dashboard refresh) cost one backend round trip.
pub struct CameraDirectory {
    api: Arc<dyn IntercomApi>,
    session: Arc<SessionManager>,
    cache: Mutex<Option<CameraCache>>,
}

impl CameraDirectory {
    pub fn new(api: Arc<dyn IntercomApi>, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            cache: Mutex::new(None),
        }
    }

    /// All cameras, served from cache when fresh.
    pub async fn list_cameras(&self) -> Result<Vec<Camera>, StreamError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < CACHE_TTL {
                debug!(cameras = cached.cameras.len(), "serving cameras from cache");
                return Ok(cached.cameras.clone());
            }
        }

        let response = self.api.list_cameras().await?;
        let cameras = adapt::cameras_from_response(&response);
        debug!(cameras = cameras.len(), "camera list refreshed");
        *cache = Some(CameraCache {
            cameras: cameras.clone(),
            fetched_at: Instant::now(),
        });
        Ok(cameras)
    }

    /// Drop the cached listing so the next call refetches.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Look up one camera by uuid.
    pub async fn camera(&self, uuid: &str) -> Result<Camera, StreamError> {
        self.list_cameras()
            .await?
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| StreamError::CameraNotFound(uuid.to_string()))
    }

    /// Resolve the HLS playlist URL for a camera.
    ///
    /// Direct media URLs from the listing win (`realtime` selects the
    /// low-latency variant); cameras that only expose a realtime path get
    /// a CDN URL authorized with the current access token.
    pub async fn stream_url(&self, uuid: &str, realtime: bool) -> Result<String, StreamError> {
        let camera = self.camera(uuid).await?;

        let direct = if realtime {
            camera
                .hls_live_low_latency
                .as_deref()
                .or(camera.hls_live_main.as_deref())
        } else {
            camera
                .hls_live_main
                .as_deref()
                .or(camera.hls_live_low_latency.as_deref())
        };
        if let Some(url) = direct {
            return Ok(url.to_string());
        }

        let Some(path) = camera.hls_path.as_deref() else {
            return Err(StreamError::NoStream(uuid.to_string()));
        };
        let token = self
            .session
            .access_token()
            .await
            .ok_or(StreamError::NoAuthToken)?;
        let path = path.trim_start_matches('/');
        Ok(format!(
            "{CDN_BASE_URL}/{path}?uuid={uuid}&token=bearer-{token}"
        ))
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::time::Instant;

use super::error::{snippet, FetchError};
use crate::event::{Event, TrackKind};
use crate::orbit::Catalog;

pub const CELESTRAK_ACTIVE_URL: &str =
    "https://celestrak.org/NORAD/elements/gp.php?GROUP=active&FORMAT=tle";

/// Wait before retrying a download that failed and left us on the cache file.
const DOWNLOAD_RETRY: Duration = Duration::from_secs(600);

/// Supplier of the element-set catalog used for one polling cycle.
#[async_trait]
pub trait ElementSource: Send {
    async fn fetch(&mut self) -> Result<Arc<Catalog>, FetchError>;

    /// INFO/WARN events raised while fetching, oldest first.
    fn drain_notices(&mut self) -> Vec<Event> {
        Vec::new()
    }
}

/// TLE catalog downloaded from `url` and mirrored in a cache file.
///
/// The cache file's mtime decides freshness across restarts. A failed
/// download falls back to the cache file regardless of its age.
pub struct TleSource {
    http: reqwest::Client,
    url: String,
    cache_file: PathBuf,
    max_age: Duration,
    timeout: Duration,
    catalog: Option<Arc<Catalog>>,
    next_refresh: Option<Instant>,
    notices: Vec<Event>,
}

impl TleSource {
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        cache_file: impl Into<PathBuf>,
        max_age: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            cache_file: cache_file.into(),
            max_age,
            timeout,
            catalog: None,
            next_refresh: None,
            notices: Vec::new(),
        }
    }

    async fn refresh(&mut self) -> Result<Arc<Catalog>, FetchError> {
        if let Some(age) = file_age(&self.cache_file).await {
            if age < self.max_age {
                let catalog = self.load_cache().await?;
                self.next_refresh = Some(Instant::now() + (self.max_age - age));
                self.loaded(&catalog, "cache");
                return Ok(catalog);
            }
        }

        match self.download().await {
            Ok(catalog) => {
                self.next_refresh = Some(Instant::now() + self.max_age);
                self.loaded(&catalog, "download");
                Ok(catalog)
            }
            Err(download_err) => {
                log::warn!("TLE download from {} failed: {}", self.url, download_err);
                let retry = DOWNLOAD_RETRY.min(self.max_age).max(Duration::from_secs(1));
                self.next_refresh = Some(Instant::now() + retry);

                match self.load_cache().await {
                    Ok(catalog) => {
                        self.notices.push(
                            Event::warn(
                                TrackKind::SpaceObject,
                                "tle",
                                "tle_download_failed_using_cache",
                            )
                            .with("error", download_err.to_string())
                            .with("cache_file", self.cache_file.display().to_string())
                            .with("count", catalog.len()),
                        );
                        Ok(catalog)
                    }
                    Err(_) => match &self.catalog {
                        Some(previous) => {
                            self.notices.push(
                                Event::warn(TrackKind::SpaceObject, "tle", "fetch_failed")
                                    .with("error", download_err.to_string()),
                            );
                            Ok(previous.clone())
                        }
                        None => Err(FetchError::NoData(format!(
                            "download failed ({}) and no cache file at {}",
                            download_err,
                            self.cache_file.display()
                        ))),
                    },
                }
            }
        }
    }

    async fn download(&self) -> Result<Arc<Catalog>, FetchError> {
        log::info!("Downloading TLE catalog from {}", self.url);
        let response = self.http.get(&self.url).timeout(self.timeout).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: snippet(&text, 120),
            });
        }

        let catalog = Catalog::from_tle_text(&text);
        if catalog.is_empty() {
            return Err(FetchError::Decode(format!(
                "no element sets in response: {}",
                snippet(&text, 80)
            )));
        }

        if let Some(parent) = self.cache_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.cache_file, &text).await?;

        Ok(Arc::new(catalog))
    }

    async fn load_cache(&self) -> Result<Arc<Catalog>, FetchError> {
        let text = tokio::fs::read_to_string(&self.cache_file).await?;
        let catalog = Catalog::from_tle_text(&text);
        if catalog.is_empty() {
            return Err(FetchError::NoData(format!(
                "cache file {} holds no element sets",
                self.cache_file.display()
            )));
        }
        Ok(Arc::new(catalog))
    }

    fn loaded(&mut self, catalog: &Catalog, source: &str) {
        log::info!(
            "Loaded {} element sets from {} ({} skipped)",
            catalog.len(),
            source,
            catalog.skipped()
        );
        self.notices.push(
            Event::info(TrackKind::SpaceObject, "tle", "tle_loaded")
                .with("source", source)
                .with("count", catalog.len())
                .with("skipped", catalog.skipped()),
        );
    }
}

#[async_trait]
impl ElementSource for TleSource {
    async fn fetch(&mut self) -> Result<Arc<Catalog>, FetchError> {
        if let (Some(catalog), Some(at)) = (&self.catalog, self.next_refresh) {
            if Instant::now() < at {
                return Ok(catalog.clone());
            }
        }

        let catalog = self.refresh().await?;
        self.catalog = Some(catalog.clone());
        Ok(catalog)
    }

    fn drain_notices(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.notices)
    }
}

async fn file_age(path: &Path) -> Option<Duration> {
    let modified = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

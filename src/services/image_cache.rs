use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, Result};

use super::tmdb::{TmdbClient, BACKDROP_SIZE, POSTER_SIZE};

/// Which artwork variant a cached file holds. Doubles as the subdirectory
/// name under the cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Poster,
    Backdrop,
}

impl ImageKind {
    fn dir_name(self) -> &'static str {
        match self {
            ImageKind::Poster => "posters",
            ImageKind::Backdrop => "backdrops",
        }
    }
}

#[async_trait]
trait Downloader: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Vec<u8>>;
}

struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("cinelog/0.1")
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Network(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// On-disk cache for poster and backdrop images.
///
/// A (kind, movie id, size) triple always maps to the same file, so the
/// path itself is the cache key. Bytes are decoded before they are
/// persisted and the write goes through a temp file and rename, so a file
/// that exists is always a complete, decodable image.
pub struct ImageCache {
    posters_dir: PathBuf,
    backdrops_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ImageCache {
    /// Creates the cache rooted at `cache_root`, making the poster and
    /// backdrop subdirectories if needed.
    pub fn new(cache_root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_downloader(cache_root, Arc::new(HttpDownloader::new()))
    }

    fn with_downloader(
        cache_root: impl Into<PathBuf>,
        downloader: Arc<dyn Downloader>,
    ) -> Result<Self> {
        let cache_root = cache_root.into();
        let posters_dir = cache_root.join(ImageKind::Poster.dir_name());
        let backdrops_dir = cache_root.join(ImageKind::Backdrop.dir_name());
        std::fs::create_dir_all(&posters_dir)?;
        std::fs::create_dir_all(&backdrops_dir)?;
        Ok(Self {
            posters_dir,
            backdrops_dir,
            downloader,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub async fn poster(
        &self,
        movie_id: i64,
        poster_path: Option<&str>,
        tmdb: &TmdbClient,
    ) -> Result<Option<DynamicImage>> {
        self.get(ImageKind::Poster, movie_id, poster_path, POSTER_SIZE, tmdb)
            .await
    }

    pub async fn backdrop(
        &self,
        movie_id: i64,
        backdrop_path: Option<&str>,
        tmdb: &TmdbClient,
    ) -> Result<Option<DynamicImage>> {
        self.get(ImageKind::Backdrop, movie_id, backdrop_path, BACKDROP_SIZE, tmdb)
            .await
    }

    /// The image for (kind, movie, size): read from disk when cached,
    /// downloaded and cached otherwise. `Ok(None)` means the movie has no
    /// artwork of this kind.
    pub async fn get(
        &self,
        kind: ImageKind,
        movie_id: i64,
        remote_path: Option<&str>,
        size: &str,
        tmdb: &TmdbClient,
    ) -> Result<Option<DynamicImage>> {
        let path = self.image_path(kind, movie_id, size);

        // One download per path: concurrent requesters queue on the same
        // lock and find the file on disk once the winner finishes.
        let flight = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(path.clone()).or_default())
        };
        let _guard = flight.lock().await;

        if path.exists() {
            match read_image(&path) {
                Ok(img) => return Ok(Some(img)),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "cached image unreadable, re-fetching"
                    );
                }
            }
        }

        let url = match kind {
            ImageKind::Poster => tmdb.poster_url(remote_path, size),
            ImageKind::Backdrop => tmdb.backdrop_url(remote_path, size),
        };
        let Some(url) = url else {
            return Ok(None);
        };

        let bytes = self.downloader.get(&url).await?;
        let img = image::load_from_memory(&bytes)?;
        write_atomic(&path, &bytes)?;
        tracing::debug!(movie_id, size, kind = kind.dir_name(), "downloaded and cached image");
        Ok(Some(img))
    }

    /// Deletes every cached image. Per-file failures are logged and
    /// skipped so one stubborn file does not abort the sweep.
    pub fn clear_cache(&self) {
        clear_dir(&self.posters_dir);
        clear_dir(&self.backdrops_dir);
        tracing::debug!("image cache cleared");
    }

    fn image_path(&self, kind: ImageKind, movie_id: i64, size: &str) -> PathBuf {
        let dir = match kind {
            ImageKind::Poster => &self.posters_dir,
            ImageKind::Backdrop => &self.backdrops_dir,
        };
        dir.join(format!("{movie_id}_{size}.jpg"))
    }
}

fn read_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path)?;
    Ok(image::load_from_memory(&bytes)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("jpg.part");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

fn clear_dir(dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "failed to enumerate cache directory");
            return;
        }
    };
    for entry in entries.flatten() {
        if let Err(err) = std::fs::remove_file(entry.path()) {
            tracing::warn!(path = %entry.path().display(), error = %err, "failed to delete cached image");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;

    use super::*;

    enum StubResponse {
        Bytes(Vec<u8>),
        Status(StatusCode),
    }

    struct StubDownloader {
        response: StubResponse,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl StubDownloader {
        fn bytes(bytes: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                response: StubResponse::Bytes(bytes),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn status(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                response: StubResponse::Status(status),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow_bytes(bytes: Vec<u8>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                response: StubResponse::Bytes(bytes),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Downloader for StubDownloader {
        async fn get(&self, _url: &Url) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.response {
                StubResponse::Bytes(bytes) => Ok(bytes.clone()),
                StubResponse::Status(status) => Err(AppError::Network(*status)),
            }
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            1,
            1,
            image::Rgba([200, 30, 30, 255]),
        ));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn cache_with(
        dir: &Path,
        downloader: Arc<StubDownloader>,
    ) -> ImageCache {
        ImageCache::with_downloader(dir, downloader).unwrap()
    }

    #[tokio::test]
    async fn constructor_creates_both_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let _cache = cache_with(dir.path(), StubDownloader::bytes(png_bytes()));

        assert!(dir.path().join("posters").is_dir());
        assert!(dir.path().join("backdrops").is_dir());
    }

    #[tokio::test]
    async fn first_request_downloads_second_hits_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(png_bytes());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let img = cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(stub.call_count(), 1);
        assert!(dir.path().join("posters/550_w342.jpg").exists());

        let img = cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb)
            .await
            .unwrap();
        assert!(img.is_some());
        assert_eq!(stub.call_count(), 1, "second request must be served from disk");
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_download() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::slow_bytes(png_bytes(), Duration::from_millis(50));
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let (a, b) = tokio::join!(
            cache.get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb),
            cache.get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn distinct_sizes_are_distinct_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(png_bytes());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), "w342", &tmdb)
            .await
            .unwrap();
        cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), "w500", &tmdb)
            .await
            .unwrap();

        assert_eq!(stub.call_count(), 2);
        assert!(dir.path().join("posters/550_w342.jpg").exists());
        assert!(dir.path().join("posters/550_w500.jpg").exists());
    }

    #[tokio::test]
    async fn missing_remote_path_is_no_image_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(png_bytes());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let img = cache
            .get(ImageKind::Poster, 550, None, POSTER_SIZE, &tmdb)
            .await
            .unwrap();
        assert!(img.is_none());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::status(StatusCode::NOT_FOUND);
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let err = cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Network(status) if status == StatusCode::NOT_FOUND));
        assert!(!dir.path().join("posters/550_w342.jpg").exists());
    }

    #[tokio::test]
    async fn undecodable_download_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(b"not an image".to_vec());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let err = cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
        assert!(!dir.path().join("posters/550_w342.jpg").exists());
    }

    #[tokio::test]
    async fn corrupt_cached_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(png_bytes());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let path = dir.path().join("posters/550_w342.jpg");
        std::fs::write(&path, b"truncated garbage").unwrap();

        let img = cache
            .get(ImageKind::Poster, 550, Some("/abc.jpg"), POSTER_SIZE, &tmdb)
            .await
            .unwrap();
        assert!(img.is_some());
        assert_eq!(stub.call_count(), 1);

        // The corrupt file was replaced by the fresh download.
        let img = read_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[tokio::test]
    async fn backdrops_live_in_their_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(png_bytes());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        let img = cache
            .backdrop(550, Some("/xyz.jpg"), &tmdb)
            .await
            .unwrap();
        assert!(img.is_some());
        assert!(dir.path().join("backdrops/550_w780.jpg").exists());
    }

    #[tokio::test]
    async fn clear_cache_sweeps_both_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubDownloader::bytes(png_bytes());
        let cache = cache_with(dir.path(), Arc::clone(&stub));
        let tmdb = TmdbClient::new("test-key");

        cache.poster(550, Some("/abc.jpg"), &tmdb).await.unwrap();
        cache.backdrop(550, Some("/xyz.jpg"), &tmdb).await.unwrap();

        cache.clear_cache();

        assert_eq!(std::fs::read_dir(dir.path().join("posters")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("backdrops")).unwrap().count(), 0);
    }
}

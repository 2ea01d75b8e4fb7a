//! Mock acquisition provider.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{
    AudioDownload, Capability, DownloadOptions, MediaProvider, ProviderError, VideoDownload,
};

/// Scriptable in-memory provider.
///
/// Writes real files into the output directory (so safety-net size checks
/// and cleanup scans behave exactly as with a real tool) and counts every
/// download call. Unlike the binary-backed provider it never retries
/// internally: each `download_audio` call is exactly one attempt.
pub struct MockProvider {
    id: String,
    capabilities: Vec<Capability>,
    installed: AtomicBool,
    version: Option<String>,

    /// Fail this many leading video calls before succeeding.
    video_failures_left: AtomicU32,
    /// Fail this many leading audio calls before succeeding.
    audio_failures_left: AtomicU32,

    video_calls: AtomicU32,
    audio_calls: AtomicU32,
    audio_targets: Mutex<Vec<String>>,

    media_file_size: u64,
    duration_secs: Option<f64>,
    title: Option<String>,
    write_thumbnail: bool,
}

impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: vec![Capability::Video, Capability::Music],
            installed: AtomicBool::new(true),
            version: Some("mock-1.0".to_string()),
            video_failures_left: AtomicU32::new(0),
            audio_failures_left: AtomicU32::new(0),
            video_calls: AtomicU32::new(0),
            audio_calls: AtomicU32::new(0),
            audio_targets: Mutex::new(Vec::new()),
            media_file_size: 1024,
            duration_secs: Some(120.0),
            title: Some("Mock Title".to_string()),
            write_thumbnail: true,
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    pub fn with_installed(self, installed: bool) -> Self {
        self.installed.store(installed, Ordering::SeqCst);
        self
    }

    /// Fail the first `n` video downloads.
    pub fn failing_video(self, n: u32) -> Self {
        self.video_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the first `n` audio downloads.
    pub fn failing_audio(self, n: u32) -> Self {
        self.audio_failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_media_file_size(mut self, bytes: u64) -> Self {
        self.media_file_size = bytes;
        self
    }

    pub fn with_duration_secs(mut self, secs: Option<f64>) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(String::from);
        self
    }

    pub fn video_calls(&self) -> u32 {
        self.video_calls.load(Ordering::SeqCst)
    }

    pub fn audio_calls(&self) -> u32 {
        self.audio_calls.load(Ordering::SeqCst)
    }

    /// Targets passed to `download_audio`, in call order.
    pub fn audio_targets(&self) -> Vec<String> {
        self.audio_targets.lock().unwrap().clone()
    }

    fn should_fail(&self, counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
    }

    async fn write_media_file(
        &self,
        options: &DownloadOptions,
        extension: &str,
    ) -> Result<PathBuf, ProviderError> {
        tokio::fs::create_dir_all(&options.output_dir).await?;
        let path = options
            .output_dir
            .join(format!("{}.{extension}", options.request_id));
        tokio::fs::write(&path, vec![0u8; self.media_file_size as usize]).await?;
        Ok(path)
    }
}

#[async_trait]
impl MediaProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    async fn install(&self) -> Result<(), ProviderError> {
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn uninstall(&self) -> Result<(), ProviderError> {
        self.installed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn version(&self) -> Option<String> {
        self.version.clone()
    }

    async fn download_video(
        &self,
        _url: &str,
        options: &DownloadOptions,
    ) -> Result<VideoDownload, ProviderError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail(&self.video_failures_left) {
            return Err(ProviderError::tool_failed(Some(1), "ERROR: scripted failure"));
        }

        let video_path = self.write_media_file(options, "mp4").await?;
        let thumbnail_path = if self.write_thumbnail {
            let path = options
                .output_dir
                .join(format!("{}.jpg", options.request_id));
            tokio::fs::write(&path, vec![0u8; 16]).await?;
            Some(path)
        } else {
            None
        };

        Ok(VideoDownload {
            video_path,
            thumbnail_path,
            title: self.title.clone(),
            duration_secs: self.duration_secs,
        })
    }

    async fn download_audio(
        &self,
        query: &str,
        options: &DownloadOptions,
    ) -> Result<AudioDownload, ProviderError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        self.audio_targets.lock().unwrap().push(query.to_string());

        if self.should_fail(&self.audio_failures_left) {
            return Err(ProviderError::tool_failed(Some(1), "ERROR: scripted failure"));
        }

        let audio_path = self.write_media_file(options, "mp3").await?;
        Ok(AudioDownload {
            audio_path,
            duration_secs: self.duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_writes_sized_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new("mock").with_media_file_size(2048);
        let options = DownloadOptions::new(dir.path(), "req-1");

        let download = provider
            .download_video("https://e.com/v", &options)
            .await
            .unwrap();

        let metadata = std::fs::metadata(&download.video_path).unwrap();
        assert_eq!(metadata.len(), 2048);
        assert!(download.thumbnail_path.unwrap().exists());
        assert_eq!(provider.video_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_scripted_failures() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new("mock").failing_audio(2);
        let options = DownloadOptions::new(dir.path(), "req-1");

        assert!(provider.download_audio("q", &options).await.is_err());
        assert!(provider.download_audio("q", &options).await.is_err());
        assert!(provider.download_audio("q", &options).await.is_ok());
        assert_eq!(provider.audio_calls(), 3);
        assert_eq!(provider.audio_targets(), vec!["q", "q", "q"]);
    }
}

//! yt-dlp backed acquisition provider.
//!
//! Drives the yt-dlp command-line tool as a subprocess. Results travel
//! through the filesystem, not stdout: every produced file is named with
//! the request id prefix and discovered by scanning the output directory
//! after the tool exits. Errors travel through the exit code and captured
//! stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::EngineConfig;

use super::error::ProviderError;
use super::traits::MediaProvider;
use super::types::{AudioDownload, Capability, DownloadOptions, VideoDownload};

/// Provider id referenced by group configuration.
pub const YTDLP_PROVIDER_ID: &str = "yt-dlp";

/// Fixed quality policy: up to 1080p, else best available.
const VIDEO_FORMAT: &str = "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best";

/// Suffix of the metadata sidecar the tool writes next to the media file.
const SIDECAR_SUFFIX: &str = ".info.json";

/// Suffix of in-progress transfers; never a finished artifact.
const PARTIAL_SUFFIX: &str = ".part";

/// Extensions classified as thumbnails during output discovery.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Headroom factor applied when deriving a duration pre-filter from a byte
/// cap; pre-download filters are advisory, so generous beats strict.
const SIZE_FILTER_HEADROOM: f64 = 1.5;

/// Environment variable name prefixes removed before spawning the tool.
/// These leak the host's runtime configuration into the tool's embedded
/// interpreter and break its extractors in hard-to-debug ways.
const SCRUBBED_ENV_PREFIXES: &[&str] = &["PYTHON", "LD_", "DYLD_", "VIRTUAL_ENV"];

static ERROR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ERROR:[^\n]*").expect("static regex"));

/// Capability set supported by yt-dlp.
const CAPABILITIES: &[Capability] = &[Capability::Video, Capability::Music];

/// yt-dlp backed provider. Stateless; one shared instance serves all
/// concurrent acquisitions.
pub struct YtDlpProvider {
    binary_path: PathBuf,
    release_url: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
    assumed_bytes_per_sec: u64,
}

impl YtDlpProvider {
    /// Creates a provider from the engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary_path: config
                .storage
                .binaries_dir
                .join(YTDLP_PROVIDER_ID)
                .join(YTDLP_PROVIDER_ID),
            release_url: config.provider.ytdlp_release_url.clone(),
            retry_attempts: config.audio_retry.attempts.max(1),
            retry_base_delay: Duration::from_millis(config.audio_retry.base_delay_ms),
            assumed_bytes_per_sec: config.provider.assumed_bytes_per_sec.max(1),
        }
    }

    /// Where the binary lives (one directory per provider id).
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Duration pre-filter derived from a byte cap: how long a stream of
    /// the assumed density may run before it must exceed the cap, plus
    /// headroom.
    fn estimated_max_duration(&self, max_bytes: u64) -> u64 {
        (max_bytes as f64 / self.assumed_bytes_per_sec as f64 * SIZE_FILTER_HEADROOM).ceil()
            as u64
    }

    fn output_template(&self, options: &DownloadOptions) -> String {
        options
            .output_dir
            .join(format!("{}.%(ext)s", options.request_id))
            .to_string_lossy()
            .to_string()
    }

    fn push_limit_args(&self, args: &mut Vec<String>, options: &DownloadOptions) {
        if let Some(max_secs) = options.max_duration_secs {
            args.push("--match-filter".to_string());
            args.push(format!("duration <= {max_secs}"));
        }
        if let Some(max_bytes) = options.max_file_size_bytes {
            let estimated = self.estimated_max_duration(max_bytes);
            args.push("--match-filter".to_string());
            args.push(format!("duration <= {estimated}"));
            args.push("--max-filesize".to_string());
            args.push(max_bytes.to_string());
        }
    }

    /// Builds the argument list for a video acquisition.
    fn build_video_args(&self, url: &str, options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "-f".to_string(),
            VIDEO_FORMAT.to_string(),
            "--write-thumbnail".to_string(),
            "--write-info-json".to_string(),
        ];
        self.push_limit_args(&mut args, options);
        args.push("-o".to_string());
        args.push(self.output_template(options));
        args.push(url.to_string());
        args
    }

    /// Builds the argument list for an audio acquisition.
    ///
    /// Search queries get the single-result search prefix; anything that is
    /// already a URL passes through unchanged (direct-URL fallback path).
    fn build_audio_args(&self, target: &str, options: &DownloadOptions) -> Vec<String> {
        let target = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("ytsearch1:{target}")
        };

        let mut args = vec![
            "--no-playlist".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "0".to_string(),
            "--write-info-json".to_string(),
        ];
        self.push_limit_args(&mut args, options);
        args.push("-o".to_string());
        args.push(self.output_template(options));
        args.push(target);
        args
    }

    /// Spawns the tool and waits for it to exit.
    ///
    /// Success is exit code 0; anything else carries the captured stderr.
    async fn run_tool(&self, args: &[String], scrub_env: bool) -> Result<(), ProviderError> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if scrub_env {
            for (name, _) in std::env::vars_os() {
                let name_str = name.to_string_lossy();
                if SCRUBBED_ENV_PREFIXES
                    .iter()
                    .any(|prefix| name_str.starts_with(prefix))
                {
                    cmd.env_remove(&name);
                }
            }
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::NotInstalled {
                    id: YTDLP_PROVIDER_ID.to_string(),
                    path: self.binary_path.clone(),
                }
            } else {
                ProviderError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::tool_failed(
                output.status.code(),
                error_summary(&stderr),
            ));
        }

        Ok(())
    }

    /// Scans the output directory for request-prefixed files the tool
    /// produced, classified by suffix.
    async fn scan_outputs(
        &self,
        output_dir: &Path,
        request_id: &str,
    ) -> Result<ScannedOutputs, ProviderError> {
        let mut outputs = ScannedOutputs::default();

        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if !name.starts_with(request_id) {
                continue;
            }
            if name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }

            let path = entry.path();
            if name.ends_with(SIDECAR_SUFFIX) {
                outputs.sidecar = Some(path);
            } else if is_image(&path) {
                outputs.thumbnail = Some(path);
            } else {
                outputs.media.push(path);
            }
        }

        // Directory iteration order is arbitrary; keep discovery stable.
        outputs.media.sort();
        Ok(outputs)
    }

    /// One audio attempt: spawn, scan, pick the audio file, read duration.
    async fn try_audio_once(
        &self,
        target: &str,
        options: &DownloadOptions,
    ) -> Result<AudioDownload, ProviderError> {
        let args = self.build_audio_args(target, options);
        self.run_tool(&args, true).await?;

        let outputs = self
            .scan_outputs(&options.output_dir, &options.request_id)
            .await?;
        let Some(audio_path) = outputs.media.into_iter().next() else {
            return Err(ProviderError::NoOutputFile {
                request_id: options.request_id.clone(),
            });
        };

        let duration_secs = match outputs.sidecar {
            Some(sidecar) => parse_sidecar(&sidecar).await.1,
            None => None,
        };

        Ok(AudioDownload {
            audio_path,
            duration_secs,
        })
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn id(&self) -> &str {
        YTDLP_PROVIDER_ID
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn is_installed(&self) -> bool {
        tokio::fs::metadata(&self.binary_path).await.is_ok()
    }

    async fn install(&self) -> Result<(), ProviderError> {
        use tokio::io::AsyncWriteExt;

        debug!(url = %self.release_url, "installing yt-dlp");

        let mut response = reqwest::get(&self.release_url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if let Some(parent) = self.binary_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| install_failed(e.to_string()))?;
        }

        // Stream the asset to disk; release binaries run tens of megabytes.
        let mut file = tokio::fs::File::create(&self.binary_path)
            .await
            .map_err(|e| install_failed(e.to_string()))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| install_failed(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| install_failed(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                &self.binary_path,
                std::fs::Permissions::from_mode(0o755),
            )
            .await
            .map_err(|e| install_failed(e.to_string()))?;
        }

        debug!(path = %self.binary_path.display(), "yt-dlp installed");
        Ok(())
    }

    async fn uninstall(&self) -> Result<(), ProviderError> {
        match tokio::fs::remove_file(&self.binary_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::Io(e)),
        }
    }

    async fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            None
        } else {
            Some(version)
        }
    }

    async fn download_video(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<VideoDownload, ProviderError> {
        let args = self.build_video_args(url, options);
        self.run_tool(&args, false).await?;

        let outputs = self
            .scan_outputs(&options.output_dir, &options.request_id)
            .await?;
        let Some(video_path) = outputs.media.into_iter().next() else {
            return Err(ProviderError::NoOutputFile {
                request_id: options.request_id.clone(),
            });
        };

        let (title, duration_secs) = match outputs.sidecar {
            Some(sidecar) => parse_sidecar(&sidecar).await,
            None => (None, None),
        };

        Ok(VideoDownload {
            video_path,
            thumbnail_path: outputs.thumbnail,
            title,
            duration_secs,
        })
    }

    async fn download_audio(
        &self,
        query: &str,
        options: &DownloadOptions,
    ) -> Result<AudioDownload, ProviderError> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match self.try_audio_once(query, options).await {
                Ok(download) => return Ok(download),
                Err(e) => {
                    warn!(
                        attempt,
                        of = self.retry_attempts,
                        error = %e,
                        "audio acquisition attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_base_delay * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NoOutputFile {
            request_id: options.request_id.clone(),
        }))
    }
}

/// Files the tool produced for one request, classified by suffix.
#[derive(Debug, Default)]
struct ScannedOutputs {
    media: Vec<PathBuf>,
    thumbnail: Option<PathBuf>,
    sidecar: Option<PathBuf>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn install_failed(reason: String) -> ProviderError {
    ProviderError::InstallFailed {
        id: YTDLP_PROVIDER_ID.to_string(),
        reason,
    }
}

/// Condenses tool stderr into its ERROR lines, falling back to the last
/// non-empty line.
fn error_summary(stderr: &str) -> String {
    let errors: Vec<&str> = ERROR_LINE.find_iter(stderr).map(|m| m.as_str()).collect();
    if !errors.is_empty() {
        return errors.join("; ");
    }
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string()
}

/// Fields of interest in the metadata sidecar.
#[derive(Deserialize)]
struct SidecarMetadata {
    title: Option<String>,
    duration: Option<f64>,
}

/// Best-effort sidecar parse; a malformed sidecar never fails a request.
async fn parse_sidecar(path: &Path) -> (Option<String>, Option<f64>) {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not read metadata sidecar");
            return (None, None);
        }
    };
    match serde_json::from_str::<SidecarMetadata>(&content) {
        Ok(metadata) => (metadata.title, metadata.duration),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not parse metadata sidecar");
            (None, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn make_provider() -> YtDlpProvider {
        YtDlpProvider::new(&EngineConfig::default())
    }

    fn options(dir: &Path) -> DownloadOptions {
        DownloadOptions::new(dir, "req-1")
    }

    #[test]
    fn test_binary_path_is_per_provider_dir() {
        let provider = make_provider();
        assert!(provider
            .binary_path()
            .ends_with(Path::new("yt-dlp").join("yt-dlp")));
    }

    #[test]
    fn test_build_video_args_quality_and_sidecars() {
        let provider = make_provider();
        let args = provider.build_video_args(
            "https://e.com/watch?v=1",
            &options(Path::new("/tmp/media")),
        );

        assert!(args.contains(&"-f".to_string()));
        assert!(args.contains(&VIDEO_FORMAT.to_string()));
        assert!(args.contains(&"--write-thumbnail".to_string()));
        assert!(args.contains(&"--write-info-json".to_string()));
        // URL is the final operand
        assert_eq!(args.last().unwrap(), "https://e.com/watch?v=1");
        // Output template carries the request-id prefix
        assert!(args.iter().any(|a| a.contains("req-1.%(ext)s")));
        // No limits configured, no filters
        assert!(!args.contains(&"--match-filter".to_string()));
        assert!(!args.contains(&"--max-filesize".to_string()));
    }

    #[test]
    fn test_build_video_args_size_cap_derives_duration_filter() {
        let provider = make_provider();
        // 25 MB at 250 KB/s = 100s of stream, times 1.5 headroom = 150s
        let opts = options(Path::new("/tmp/media"))
            .with_max_file_size_bytes(Some(25_000_000));
        let args = provider.build_video_args("https://e.com/v", &opts);

        assert!(args.contains(&"--match-filter".to_string()));
        assert!(args.contains(&"duration <= 150".to_string()));
        assert!(args.contains(&"--max-filesize".to_string()));
        assert!(args.contains(&"25000000".to_string()));
    }

    #[test]
    fn test_build_video_args_duration_cap() {
        let provider = make_provider();
        let opts = options(Path::new("/tmp/media")).with_max_duration_secs(Some(300));
        let args = provider.build_video_args("https://e.com/v", &opts);

        assert!(args.contains(&"duration <= 300".to_string()));
        assert!(!args.contains(&"--max-filesize".to_string()));
    }

    #[test]
    fn test_estimated_max_duration_rounds_up() {
        let provider = make_provider();
        // 1000 bytes at 250_000 B/s * 1.5 = 0.006 -> ceil to 1
        assert_eq!(provider.estimated_max_duration(1000), 1);
        assert_eq!(provider.estimated_max_duration(250_000_000), 1500);
    }

    #[test]
    fn test_build_audio_args_search_prefix() {
        let provider = make_provider();
        let args =
            provider.build_audio_args("Daft Punk One More Time", &options(Path::new("/tmp")));

        assert_eq!(args.last().unwrap(), "ytsearch1:Daft Punk One More Time");
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"--audio-format".to_string()));
    }

    #[test]
    fn test_build_audio_args_url_passthrough() {
        let provider = make_provider();
        let args = provider.build_audio_args(
            "https://youtube.com/watch?v=abc",
            &options(Path::new("/tmp")),
        );
        assert_eq!(args.last().unwrap(), "https://youtube.com/watch?v=abc");
    }

    #[tokio::test]
    async fn test_scan_outputs_classifies_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "req-1.mp4",
            "req-1.jpg",
            "req-1.info.json",
            "req-1.mp4.part",
            "unrelated.mp4",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let provider = make_provider();
        let outputs = provider.scan_outputs(dir.path(), "req-1").await.unwrap();

        assert_eq!(outputs.media, vec![dir.path().join("req-1.mp4")]);
        assert_eq!(outputs.thumbnail, Some(dir.path().join("req-1.jpg")));
        assert_eq!(outputs.sidecar, Some(dir.path().join("req-1.info.json")));
    }

    #[tokio::test]
    async fn test_scan_outputs_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let provider = make_provider();
        let outputs = provider.scan_outputs(dir.path(), "req-1").await.unwrap();
        assert!(outputs.media.is_empty());
        assert!(outputs.thumbnail.is_none());
        assert!(outputs.sidecar.is_none());
    }

    #[tokio::test]
    async fn test_parse_sidecar_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req-1.info.json");
        std::fs::write(&path, r#"{"title": "A Video", "duration": 212.5}"#).unwrap();

        let (title, duration) = parse_sidecar(&path).await;
        assert_eq!(title.as_deref(), Some("A Video"));
        assert_eq!(duration, Some(212.5));
    }

    #[tokio::test]
    async fn test_parse_sidecar_malformed_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req-1.info.json");
        std::fs::write(&path, "{not json").unwrap();

        assert_eq!(parse_sidecar(&path).await, (None, None));
        assert_eq!(parse_sidecar(Path::new("/no/such/file")).await, (None, None));
    }

    #[test]
    fn test_error_summary_extracts_error_lines() {
        let stderr = "[youtube] extracting\nWARNING: throttled\nERROR: Video unavailable\n";
        assert_eq!(error_summary(stderr), "ERROR: Video unavailable");

        let stderr = "ERROR: first\nnoise\nERROR: second\n";
        assert_eq!(error_summary(stderr), "ERROR: first; ERROR: second");
    }

    #[test]
    fn test_error_summary_falls_back_to_last_line() {
        assert_eq!(error_summary("something broke\n\n"), "something broke");
        assert_eq!(error_summary(""), "no output");
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a.jpg")));
        assert!(is_image(Path::new("a.WEBP")));
        assert!(!is_image(Path::new("a.mp4")));
        assert!(!is_image(Path::new("noext")));
    }
}

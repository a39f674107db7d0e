use std::path::PathBuf;

use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{MediaResolver, ResolveError};
use crate::audio::track::Track;

/// Resolver de URLs vía el binario yt-dlp.
///
/// Extrae título y URL directa de audio con `--dump-json`; la descarga la
/// hace después el pipeline de audio, acá solo se resuelve metadata.
pub struct YtDlpResolver {
    bin: String,
    cookies: Option<PathBuf>,
    // Limitar extracciones concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    /// URL directa del formato elegido (presente con `-f`).
    url: Option<String>,
    formats: Option<Vec<Format>>,
}

#[derive(Debug, Deserialize)]
struct Format {
    url: String,
    acodec: Option<String>,
    abr: Option<f64>,
}

#[derive(Debug)]
struct Resolved {
    stream_url: String,
    title: String,
}

impl YtDlpResolver {
    pub fn new(bin: String, cookies: Option<PathBuf>) -> Self {
        Self {
            bin,
            cookies,
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Verifica que el binario responda, para avisar temprano en el arranque.
    pub async fn verify_available(&self) -> Result<(), ResolveError> {
        let output = Command::new(&self.bin)
            .arg("--version")
            .output()
            .await
            .map_err(|e| ResolveError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(ResolveError::Spawn(format!(
                "{} --version devolvió error",
                self.bin
            )));
        }

        debug!(
            "yt-dlp disponible: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    fn parse_output(raw: &str) -> Result<Resolved, ResolveError> {
        let info: YtDlpInfo =
            serde_json::from_str(raw.trim()).map_err(|e| ResolveError::Parse(e.to_string()))?;

        let stream_url = info
            .url
            .clone()
            .or_else(|| Self::best_audio_format(&info))
            .ok_or_else(|| {
                ResolveError::Extractor("la respuesta no trae ningún formato de audio".into())
            })?;

        Ok(Resolved {
            stream_url,
            title: info.title,
        })
    }

    /// Mejor formato de solo-audio por bitrate, si el campo `url` no vino.
    fn best_audio_format(info: &YtDlpInfo) -> Option<String> {
        info.formats
            .as_ref()?
            .iter()
            .filter(|f| !f.url.is_empty() && f.acodec.as_deref() != Some("none"))
            .max_by(|a, b| {
                a.abr
                    .unwrap_or(0.0)
                    .total_cmp(&b.abr.unwrap_or(0.0))
            })
            .map(|f| f.url.clone())
    }

    fn validate_url(url: &str) -> Result<(), ResolveError> {
        let parsed = url::Url::parse(url).map_err(|_| ResolveError::InvalidUrl(url.into()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResolveError::InvalidUrl(url.into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, url: &str, requested_by: UserId) -> Result<Track, ResolveError> {
        Self::validate_url(url)?;

        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Spawn(e.to_string()))?;

        info!("🔍 Resolviendo URL: {}", url);

        let mut command = Command::new(&self.bin);
        command.args([
            "--no-playlist",
            "--dump-json",
            "-f",
            "bestaudio/best",
            "--no-warnings",
        ]);
        if let Some(cookies) = &self.cookies {
            command.arg("--cookies").arg(cookies);
        }
        command.arg(url);

        let output = command
            .output()
            .await
            .map_err(|e| ResolveError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extractor(error.trim().to_string()));
        }

        let resolved = Self::parse_output(&String::from_utf8_lossy(&output.stdout))?;
        info!("✅ URL resuelta: {}", resolved.title);

        Ok(Track::new(resolved.stream_url, resolved.title, requested_by))
    }
}

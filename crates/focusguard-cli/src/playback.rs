//! Terminal notifications and sound playback through an external player.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use focusguard_core::{
    CoreError, Notification, Notifier, PlaybackError, PlaybackSurface, SoundClip, SurfaceFactory,
};
use tracing::{debug, info};

/// Prints notifications to stderr.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), CoreError> {
        let mut err = std::io::stderr().lock();
        writeln!(err, "\n[{}] {}", notification.title, notification.body)?;
        Ok(())
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

/// Creates a [`PlayerSurface`] when a player is configured, otherwise a
/// [`BellSurface`].
pub struct PlayerFactory {
    player: Option<String>,
    assets_dir: PathBuf,
}

impl PlayerFactory {
    pub fn new(player: Option<String>, assets_dir: PathBuf) -> Self {
        Self { player, assets_dir }
    }
}

#[async_trait]
impl SurfaceFactory for PlayerFactory {
    async fn create(&self) -> Result<Arc<dyn PlaybackSurface>, PlaybackError> {
        match &self.player {
            Some(player) => {
                let scratch = std::env::temp_dir().join("focusguard");
                std::fs::create_dir_all(&scratch)
                    .map_err(|e| PlaybackError::SurfaceUnavailable(e.to_string()))?;
                info!(%player, "using external player");
                Ok(Arc::new(PlayerSurface {
                    player: player.clone(),
                    assets_dir: self.assets_dir.clone(),
                    scratch,
                }))
            }
            None => Ok(Arc::new(BellSurface)),
        }
    }
}

/// Hands each clip to an external player command.
pub struct PlayerSurface {
    player: String,
    assets_dir: PathBuf,
    scratch: PathBuf,
}

impl PlayerSurface {
    fn file_for(&self, clip: SoundClip) -> Result<PathBuf, PlaybackError> {
        match clip {
            SoundClip::Asset(path) => Ok(self.assets_dir.join(path)),
            SoundClip::Bytes { mime, data } => {
                let file = self
                    .scratch
                    .join(format!("custom_sound.{}", extension_for(&mime)));
                std::fs::write(&file, data).map_err(|e| PlaybackError::PlayerFailed(e.to_string()))?;
                Ok(file)
            }
        }
    }
}

#[async_trait]
impl PlaybackSurface for PlayerSurface {
    async fn play(&self, clip: SoundClip) -> Result<(), PlaybackError> {
        let file = self.file_for(clip)?;
        if !file.exists() {
            return Err(PlaybackError::PlayerFailed(format!(
                "sound file not found: {}",
                file.display()
            )));
        }
        debug!(player = %self.player, file = %file.display(), "playing");
        let mut child = Command::new(&self.player)
            .arg(&file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlaybackError::PlayerFailed(format!("{}: {e}", self.player)))?;
        // Reap in the background; playback length is not our concern.
        tokio::task::spawn_blocking(move || child.wait());
        Ok(())
    }
}

/// Rings the terminal bell for any clip.
pub struct BellSurface;

#[async_trait]
impl PlaybackSurface for BellSurface {
    async fn play(&self, _clip: SoundClip) -> Result<(), PlaybackError> {
        let mut err = std::io::stderr().lock();
        err.write_all(b"\x07")
            .and_then(|_| err.flush())
            .map_err(|e| PlaybackError::PlayerFailed(e.to_string()))
    }
}

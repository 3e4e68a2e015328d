//! End-of-session notification and sound dispatch.
//!
//! Playback needs a long-lived surface (an audio device, a player process
//! host, ...). It is created on first use. Concurrent first uses wait on the
//! same in-flight creation instead of racing to build several; a failed
//! creation is not remembered and the next request tries again.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::error::{PlaybackError, Result};
use crate::session::SessionPhase;
use crate::settings::SoundSource;
use crate::store::{keys, Store, StoreExt};

pub const DEFAULT_ICON: &str = "images/icon128.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
}

impl Notification {
    /// Title and body for the end of a session in `ended`.
    pub fn session_ended(ended: SessionPhase, icon: &str) -> Self {
        let (title, body) = match ended {
            SessionPhase::Work => ("Work Session Over!", "Time for a break!"),
            _ => ("Break Time Over!", "Time to get back to work!"),
        };
        Self {
            title: title.to_string(),
            body: body.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// User-facing notification sink. Fire-and-forget: no retries.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Audio ready to hand to a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundClip {
    /// Bundled sound by relative path.
    Asset(String),
    /// Decoded uploaded payload.
    Bytes { mime: String, data: Vec<u8> },
}

#[async_trait]
pub trait PlaybackSurface: Send + Sync {
    async fn play(&self, clip: SoundClip) -> Result<(), PlaybackError>;
}

#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn PlaybackSurface>, PlaybackError>;
}

/// Notifier that only writes to the log. Used when notifications are off.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        info!(title = %notification.title, body = %notification.body, "session ended");
        Ok(())
    }
}

/// Surface that accepts clips and drops them.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedSurface;

#[async_trait]
impl PlaybackSurface for MutedSurface {
    async fn play(&self, clip: SoundClip) -> Result<(), PlaybackError> {
        debug!(?clip, "playback muted");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MutedSurfaceFactory;

#[async_trait]
impl SurfaceFactory for MutedSurfaceFactory {
    async fn create(&self) -> Result<Arc<dyn PlaybackSurface>, PlaybackError> {
        Ok(Arc::new(MutedSurface))
    }
}

/// Split a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<SoundClip, PlaybackError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| PlaybackError::InvalidPayload("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| PlaybackError::InvalidPayload("missing payload separator".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| PlaybackError::InvalidPayload("payload is not base64".into()))?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PlaybackError::InvalidPayload(e.to_string()))?;
    Ok(SoundClip::Bytes {
        mime: mime.to_string(),
        data,
    })
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    factory: Arc<dyn SurfaceFactory>,
    surface: OnceCell<Arc<dyn PlaybackSurface>>,
    icon: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        factory: Arc<dyn SurfaceFactory>,
    ) -> Self {
        Self {
            store,
            notifier,
            factory,
            surface: OnceCell::new(),
            icon: DEFAULT_ICON.to_string(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Whether the playback surface has been created.
    pub fn surface_ready(&self) -> bool {
        self.surface.initialized()
    }

    /// Notify that a session in `ended` finished, then play the selected sound.
    pub async fn session_ended(&self, ended: SessionPhase) {
        let notification = Notification::session_ended(ended, &self.icon);
        if let Err(e) = self.notifier.notify(&notification) {
            warn!(error = %e, "notification failed");
        }

        match SoundSource::selected(self.store.as_ref()) {
            Ok(src) => self.play(&src).await,
            Err(e) => error!(error = %e, "could not read selected sound"),
        }
    }

    /// Play `src` without touching session state.
    pub async fn preview(&self, src: &SoundSource) {
        self.play(src).await;
    }

    async fn play(&self, src: &SoundSource) {
        let clip = match self.resolve(src) {
            Ok(Some(clip)) => clip,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "sound not playable");
                return;
            }
        };
        let surface = match self.surface().await {
            Ok(surface) => surface,
            Err(e) => {
                error!(error = %e, "no playback surface");
                return;
            }
        };
        if let Err(e) = surface.play(clip).await {
            warn!(error = %e, "playback failed");
        }
    }

    /// Turn a source into a clip. `None` means nothing to play.
    fn resolve(&self, src: &SoundSource) -> Result<Option<SoundClip>> {
        match src {
            SoundSource::None => Ok(None),
            SoundSource::Preset(path) => Ok(Some(SoundClip::Asset(path.clone()))),
            SoundSource::Custom => {
                let data: Option<String> = self.store.get_or_default(keys::CUSTOM_SOUND_DATA)?;
                match data {
                    Some(url) => Ok(Some(decode_data_url(&url)?)),
                    None => {
                        debug!("custom sound selected but no payload stored");
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn surface(&self) -> Result<Arc<dyn PlaybackSurface>, PlaybackError> {
        let surface = self
            .surface
            .get_or_try_init(|| async {
                info!("creating playback surface");
                self.factory.create().await
            })
            .await?;
        Ok(Arc::clone(surface))
    }
}

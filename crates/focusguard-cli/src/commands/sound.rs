use std::path::PathBuf;

use clap::Subcommand;
use focusguard_core::settings::{remove_custom_sound, upload_custom_sound};
use focusguard_core::{keys, SoundSource, StoreExt, DEFAULT_SOUNDS};

use crate::app::{App, CmdResult};

#[derive(Subcommand)]
pub enum SoundAction {
    /// List available sounds
    List,
    /// Select a preset by name or path, `custom` or `none`
    Select { sound: String },
    /// Store an audio file as the custom sound and select it
    Upload { file: PathBuf },
    /// Remove the custom sound and go back to the default
    Remove,
    /// Play a sound (the selected one by default)
    Preview { sound: Option<String> },
}

fn mime_for(file: &std::path::Path) -> Result<&'static str, String> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => Ok("audio/mpeg"),
        "wav" => Ok("audio/wav"),
        "ogg" => Ok("audio/ogg"),
        "flac" => Ok("audio/flac"),
        "webm" => Ok("audio/webm"),
        _ => Err(format!("{} is not a supported audio file", file.display())),
    }
}

pub async fn run(action: SoundAction) -> CmdResult {
    let app = App::open()?;
    let store = app.store.as_ref();

    match action {
        SoundAction::List => {
            let selected = SoundSource::selected(store)?;
            for preset in DEFAULT_SOUNDS {
                let mark = if SoundSource::from(preset.path) == selected { "*" } else { " " };
                println!("{mark} {:<14} {}", preset.name, preset.path);
            }
            let custom: Option<String> = store.get_or_default(keys::CUSTOM_SOUND_NAME)?;
            if let Some(name) = custom {
                let mark = if selected == SoundSource::Custom { "*" } else { " " };
                println!("{mark} {:<14} {name}", "Custom");
            }
        }
        SoundAction::Select { sound } => {
            let source = SoundSource::from_user_input(&sound);
            if source == SoundSource::Custom
                && store.get(keys::CUSTOM_SOUND_DATA)?.is_none()
            {
                return Err("no custom sound uploaded".into());
            }
            source.select(store)?;
            println!("selected {}", String::from(source));
        }
        SoundAction::Upload { file } => {
            let mime = mime_for(&file)?;
            let bytes = std::fs::read(&file)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom".to_string());
            upload_custom_sound(store, &name, mime, &bytes)?;
            println!("uploaded {name} ({} bytes)", bytes.len());
        }
        SoundAction::Remove => {
            remove_custom_sound(store)?;
            println!("custom sound removed");
        }
        SoundAction::Preview { sound } => {
            let source = match sound {
                Some(s) => SoundSource::from_user_input(&s),
                None => SoundSource::selected(store)?,
            };
            app.dispatcher.preview(&source).await;
        }
    }
    Ok(())
}

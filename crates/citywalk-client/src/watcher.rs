use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::project_config::CONFIG_FILE;

/// Events sent from the watcher thread to the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    ConfigChanged(PathBuf),
    BindingsChanged(PathBuf),
}

/// Decide whether a changed path is one the game reloads.
pub fn classify(path: &Path) -> Option<WatchEvent> {
    let file_name = path.file_name()?.to_str()?;
    if file_name == CONFIG_FILE {
        return Some(WatchEvent::ConfigChanged(path.to_path_buf()));
    }
    let in_input_dir = path
        .parent()
        .and_then(|p| p.file_name())
        .map_or(false, |d| d == "input");
    if file_name == "bindings.yaml" && in_input_dir {
        return Some(WatchEvent::BindingsChanged(path.to_path_buf()));
    }
    None
}

/// Creates a file watcher on the project root and returns a receiver for
/// reload events. The watcher must be kept alive.
pub fn start_watching(
    project_root: &Path,
) -> Result<(RecommendedWatcher, mpsc::Receiver<WatchEvent>), notify::Error> {
    let (tx, rx) = mpsc::channel();

    let mut watcher =
        notify::recommended_watcher(move |result: Result<Event, notify::Error>| match result {
            Ok(event) => match event.kind {
                EventKind::Modify(_) | EventKind::Create(_) => {
                    for path in &event.paths {
                        if let Some(change) = classify(path) {
                            tracing::info!("Reloadable file changed: {:?}", path);
                            let _ = tx.send(change);
                        }
                    }
                }
                _ => {}
            },
            Err(e) => {
                tracing::error!("File watcher error: {:?}", e);
            }
        })?;

    watcher.watch(project_root, RecursiveMode::Recursive)?;
    tracing::info!("File watcher started on: {:?}", project_root);

    Ok((watcher, rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Path::new("/game/citywalk.yaml")),
            Some(WatchEvent::ConfigChanged(PathBuf::from("/game/citywalk.yaml")))
        );
        assert_eq!(
            classify(Path::new("/game/input/bindings.yaml")),
            Some(WatchEvent::BindingsChanged(PathBuf::from("/game/input/bindings.yaml")))
        );
        assert_eq!(classify(Path::new("/game/bindings.yaml")), None);
        assert_eq!(classify(Path::new("/game/assets/models/player.glb")), None);
    }
}

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Cannot watch {0}: it has no parent directory")]
    NoParent(PathBuf),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

/// Watches the directory of one file and reports changes to that file only
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    file_name: Option<std::ffi::OsString>,
}

impl FileWatcher {
    pub fn new(file: &Path) -> WatcherResult<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        // Editors often replace the file, so watch its directory
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| WatcherError::NoParent(file.to_path_buf()))?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            file_name: file.file_name().map(|n| n.to_os_string()),
        })
    }

    fn is_change_to_file(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == self.file_name)
    }

    /// Block until the watched file changes. `None` once the watcher is gone.
    pub fn next_change(&self) -> Option<Event> {
        loop {
            match self.receiver.recv() {
                Ok(Ok(event)) if self.is_change_to_file(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_file_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page-1.md");
        fs::write(&file, "- one\n").unwrap();

        let watcher = FileWatcher::new(&file).unwrap();

        let target = file.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            fs::write(dir.path().join("other.md"), "- ignored\n").unwrap();
            fs::write(target, "- two\n").unwrap();
            thread::sleep(Duration::from_millis(500));
        });

        let event = watcher.next_change();
        assert!(event.is_some());
    }
}

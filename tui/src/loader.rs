//! Reads image files off the UI thread.

use pagenote_core::commands::read_image_as_data_uri;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub data_uri: String,
    /// Natural size in px, when the file could be decoded
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub outcome: Result<LoadedImage, String>,
}

pub struct ImageLoader {
    requests: Sender<PathBuf>,
    results: Receiver<LoadResult>,
}

impl ImageLoader {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<PathBuf>();
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();
        std::thread::spawn(move || {
            while let Ok(path) = request_rx.recv() {
                let outcome = read_image_as_data_uri(&path)
                    .map(|data_uri| LoadedImage {
                        data_uri,
                        dimensions: image::image_dimensions(&path).ok(),
                    })
                    .map_err(|err| format!("Could not insert {}: {}", path.display(), err));
                if result_tx.send(LoadResult { path, outcome }).is_err() {
                    break;
                }
            }
        });
        Self {
            requests: request_tx,
            results: result_rx,
        }
    }

    pub fn request(&self, path: PathBuf) {
        log::info!("Loading image {}", path.display());
        if self.requests.send(path).is_err() {
            log::warn!("Image loader thread has stopped");
        }
    }

    /// Completed loads since the last call
    pub fn poll(&self) -> Vec<LoadResult> {
        self.results.try_iter().collect()
    }
}

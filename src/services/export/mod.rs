pub mod layout;
pub mod pdf;

use crate::core::config::{Config, ExportMode};
use crate::core::error::ExportError;
use crate::core::io::Storage;
use crate::core::state::{Episode, StoryBible};
use crate::services::generation::{EpisodeDocumentRequest, GenerationClient};
use crate::utils::text::{underscore_title, underscore_words};
use layout::LayoutOptions;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

pub struct Exporter {
    mode: ExportMode,
    output_folder: PathBuf,
    client: Arc<dyn GenerationClient>,
    storage: Arc<dyn Storage>,
}

fn story_stem(bible: &StoryBible) -> String {
    let stem = underscore_title(&bible.title);
    if stem.is_empty() {
        "Untitled_Story".to_string()
    } else {
        stem
    }
}

pub fn story_bible_filename(bible: &StoryBible) -> String {
    format!("{}_Story_Bible.pdf", story_stem(bible))
}

pub fn episode_filename(bible: &StoryBible, episode: &Episode) -> String {
    let title = underscore_words(&episode.title);
    if title.is_empty() {
        format!("{}_Episode_{}.pdf", story_stem(bible), episode.number)
    } else {
        format!("{}_Episode_{}_{}.pdf", story_stem(bible), episode.number, title)
    }
}

pub fn complete_story_filename(bible: &StoryBible) -> String {
    format!("{}_Complete_Story.pdf", story_stem(bible))
}

impl Exporter {
    pub fn new(
        config: &Config,
        client: Arc<dyn GenerationClient>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            mode: config.export.mode,
            output_folder: PathBuf::from(&config.output_folder),
            client,
            storage,
        }
    }

    fn options() -> LayoutOptions {
        LayoutOptions {
            generated_on: chrono::Local::now().format("%B %-d, %Y").to_string(),
        }
    }

    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        let path = self.output_folder.join(filename);
        let path_str = path.to_string_lossy().to_string();
        match self.storage.exists(&path_str).await {
            Ok(true) => info!("Replacing existing {}", path_str),
            Ok(false) => {}
            Err(e) => warn!("Could not check for an existing {}: {:#}", path_str, e),
        }
        self.storage
            .write(&path_str, bytes)
            .await
            .map_err(|source| ExportError::Write {
                path: path_str.clone(),
                source,
            })?;
        info!("Saved {} ({} bytes)", path_str, bytes.len());
        Ok(path)
    }

    pub async fn export_story_bible(&self, bible: &StoryBible) -> Result<PathBuf, ExportError> {
        let bytes = match self.mode {
            ExportMode::Local => pdf::encode(&layout::story_bible_document(bible, &Self::options()))?,
            ExportMode::Server => self.client.render_story_bible_document(bible).await?,
        };
        self.save(&story_bible_filename(bible), &bytes).await
    }

    pub async fn export_episode(
        &self,
        bible: &StoryBible,
        episode: &Episode,
    ) -> Result<PathBuf, ExportError> {
        let bytes = match self.mode {
            ExportMode::Local => {
                pdf::encode(&layout::episode_document(bible, episode, &Self::options()))?
            }
            ExportMode::Server => {
                let request = EpisodeDocumentRequest::new(bible, episode);
                self.client.render_episode_document(&request).await?
            }
        };
        self.save(&episode_filename(bible, episode), &bytes).await
    }

    /// Every episode in one document. The server has no endpoint for this, so
    /// it is always laid out locally.
    pub async fn export_complete_story(
        &self,
        bible: &StoryBible,
        episodes: &[Episode],
    ) -> Result<PathBuf, ExportError> {
        if self.mode == ExportMode::Server {
            warn!("Complete story export is rendered locally");
        }
        let doc = layout::complete_story_document(bible, episodes, &Self::options())?;
        let bytes = pdf::encode(&doc)?;
        self.save(&complete_story_filename(bible), &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GenerationError;
    use crate::core::io::NativeStorage;
    use crate::core::state::{Perspective, Prompt};
    use crate::services::generation::StoryBibleRequest;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct RenderClient {
        fail: bool,
        episode_requests: Mutex<Vec<(String, u32)>>,
        bible_renders: Mutex<usize>,
    }

    #[async_trait]
    impl GenerationClient for RenderClient {
        async fn request_perspectives(
            &self,
            _prompt: &Prompt,
        ) -> Result<Vec<Perspective>, GenerationError> {
            unreachable!("exporter never asks for perspectives")
        }

        async fn request_story_bible(
            &self,
            _request: &StoryBibleRequest<'_>,
        ) -> Result<StoryBible, GenerationError> {
            unreachable!("exporter never asks for a story bible")
        }

        async fn request_episode(
            &self,
            _story_bible: &StoryBible,
            _episode_number: u32,
            _previous_episodes: &[Episode],
        ) -> Result<Episode, GenerationError> {
            unreachable!("exporter never asks for episodes")
        }

        async fn render_episode_document(
            &self,
            request: &EpisodeDocumentRequest<'_>,
        ) -> Result<Vec<u8>, GenerationError> {
            if self.fail {
                return Err(GenerationError::Application {
                    message: "Failed to generate PDF".to_string(),
                });
            }
            self.episode_requests
                .lock()
                .unwrap()
                .push((request.story_title.to_string(), request.episode_number));
            Ok(b"%PDF-server-episode".to_vec())
        }

        async fn render_story_bible_document(
            &self,
            _story_bible: &StoryBible,
        ) -> Result<Vec<u8>, GenerationError> {
            *self.bible_renders.lock().unwrap() += 1;
            Ok(b"%PDF-server-bible".to_vec())
        }
    }

    fn config(dir: &Path, mode: ExportMode) -> Config {
        let mut config = Config::default();
        config.output_folder = dir.to_string_lossy().to_string();
        config.export.mode = mode;
        config
    }

    fn bible() -> StoryBible {
        StoryBible {
            title: "The Keeper's Light".to_string(),
            tagline: "Some lights should stay dark".to_string(),
            ..Default::default()
        }
    }

    fn episode(number: u32, title: &str) -> Episode {
        Episode {
            number,
            title: title.to_string(),
            content: "Intro paragraph.\n\nJohn: \"Hello there.\"".to_string(),
            scenes: vec![],
        }
    }

    #[test]
    fn test_filenames() {
        let bible = bible();
        assert_eq!(story_bible_filename(&bible), "The_Keeper's_Light_Story_Bible.pdf");
        assert_eq!(
            episode_filename(&bible, &episode(3, "What's Below?")),
            "The_Keeper's_Light_Episode_3_Whats_Below.pdf"
        );
        assert_eq!(
            complete_story_filename(&bible),
            "The_Keeper's_Light_Complete_Story.pdf"
        );
        assert_eq!(
            story_bible_filename(&StoryBible::default()),
            "Untitled_Story_Story_Bible.pdf"
        );
    }

    #[tokio::test]
    async fn test_local_exports_write_pdfs() {
        let dir = tempdir().unwrap();
        let client = Arc::new(RenderClient::default());
        let exporter = Exporter::new(
            &config(dir.path(), ExportMode::Local),
            client.clone(),
            Arc::new(NativeStorage::new()),
        );
        let bible = bible();
        let episodes = vec![episode(1, "Fog"), episode(2, "The Lamp Room")];

        let paths = vec![
            exporter.export_story_bible(&bible).await.unwrap(),
            exporter.export_episode(&bible, &episodes[1]).await.unwrap(),
            exporter
                .export_complete_story(&bible, &episodes)
                .await
                .unwrap(),
        ];
        for path in &paths {
            let bytes = std::fs::read(path).unwrap();
            assert!(bytes.starts_with(b"%PDF-1.4"), "{} is not a pdf", path.display());
        }
        assert!(paths[1].ends_with("The_Keeper's_Light_Episode_2_The_Lamp_Room.pdf"));
        assert_eq!(*client.bible_renders.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_server_exports_save_rendered_bytes() {
        let dir = tempdir().unwrap();
        let client = Arc::new(RenderClient::default());
        let exporter = Exporter::new(
            &config(dir.path(), ExportMode::Server),
            client.clone(),
            Arc::new(NativeStorage::new()),
        );
        let bible = bible();

        let path = exporter
            .export_episode(&bible, &episode(4, "Tide"))
            .await
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-server-episode");
        assert_eq!(
            *client.episode_requests.lock().unwrap(),
            [("The Keeper's Light".to_string(), 4)]
        );

        let path = exporter.export_story_bible(&bible).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-server-bible");
    }

    #[tokio::test]
    async fn test_server_render_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let client = Arc::new(RenderClient {
            fail: true,
            ..Default::default()
        });
        let exporter = Exporter::new(
            &config(dir.path(), ExportMode::Server),
            client,
            Arc::new(NativeStorage::new()),
        );

        let err = exporter
            .export_episode(&bible(), &episode(1, "Fog"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_export_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let client = Arc::new(RenderClient::default());
        let exporter = Exporter::new(
            &config(dir.path(), ExportMode::Server),
            client,
            Arc::new(NativeStorage::new()),
        );
        let target = dir.path().join(story_bible_filename(&bible()));
        std::fs::write(&target, b"stale").unwrap();

        let path = exporter.export_story_bible(&bible()).await.unwrap();
        assert_eq!(path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-server-bible");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    struct UncheckableStorage(NativeStorage);

    #[async_trait]
    impl Storage for UncheckableStorage {
        async fn write(&self, path: &str, content: &[u8]) -> anyhow::Result<()> {
            self.0.write(path, content).await
        }

        async fn exists(&self, _path: &str) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("permission denied"))
        }
    }

    #[tokio::test]
    async fn test_failed_existence_check_still_saves() {
        let dir = tempdir().unwrap();
        let exporter = Exporter::new(
            &config(dir.path(), ExportMode::Server),
            Arc::new(RenderClient::default()),
            Arc::new(UncheckableStorage(NativeStorage::new())),
        );
        let path = exporter.export_story_bible(&bible()).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-server-bible");
    }

    #[tokio::test]
    async fn test_complete_story_without_episodes_fails() {
        let dir = tempdir().unwrap();
        let exporter = Exporter::new(
            &config(dir.path(), ExportMode::Local),
            Arc::new(RenderClient::default()),
            Arc::new(NativeStorage::new()),
        );
        let err = exporter
            .export_complete_story(&bible(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Empty(_)));
    }
}

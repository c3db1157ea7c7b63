pub mod merge;
pub mod poster;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::database::{Database, MediaType};
use crate::error::AppError;
use crate::lookup::{FetchedMedia, LookupProvider, SearchHit};

pub use merge::{merge_fetched_details, MergeReport};

/// Progress and completion events from a background lookup job
#[derive(Debug)]
pub enum JobEvent {
    Progress(String),
    Finished(JobOutput),
    Failed(AppError),
}

#[derive(Debug)]
pub enum JobOutput {
    Search(Vec<SearchHit>),
    Details(Box<FetchedMedia>),
    Saved(MergeReport),
}

/// A running job. Events arrive on `rx` until `Finished` or `Failed`.
pub struct JobHandle {
    pub rx: mpsc::Receiver<JobEvent>,
    pub task: JoinHandle<()>,
}

impl JobHandle {
    /// Drain progress events until the job finishes.
    pub async fn wait<F: FnMut(&str)>(mut self, mut on_progress: F) -> Result<JobOutput, AppError> {
        while let Some(event) = self.rx.recv().await {
            match event {
                JobEvent::Progress(message) => on_progress(&message),
                JobEvent::Finished(output) => return Ok(output),
                JobEvent::Failed(e) => return Err(e),
            }
        }
        match self.task.await {
            Ok(()) => Err(AppError::Other("Job ended without a result".to_string())),
            Err(e) => Err(AppError::Other(format!("Job panicked: {}", e))),
        }
    }
}

async fn finish(tx: &mpsc::Sender<JobEvent>, result: Result<JobOutput, AppError>) {
    let event = match result {
        Ok(output) => JobEvent::Finished(output),
        Err(e) => {
            log::error!("Lookup job failed: {}", e);
            JobEvent::Failed(e)
        }
    };
    let _ = tx.send(event).await;
}

pub fn spawn_search(provider: Arc<dyn LookupProvider>, media_type: MediaType, title: String) -> JobHandle {
    let (tx, rx) = mpsc::channel(32);
    let span = tracing::info_span!("search", provider = provider.name(), %media_type, %title);
    let task = tokio::spawn(
        async move {
            let _ = tx
                .send(JobEvent::Progress(format!("Searching {} for '{}'", provider.name(), title)))
                .await;
            let result = provider
                .search_media(media_type, &title)
                .await
                .map(JobOutput::Search);
            finish(&tx, result).await;
        }
        .instrument(span),
    );
    JobHandle { rx, task }
}

pub fn spawn_fetch_details(provider: Arc<dyn LookupProvider>, media_type: MediaType, online_id: String) -> JobHandle {
    let (tx, rx) = mpsc::channel(32);
    let span = tracing::info_span!("fetch", provider = provider.name(), %media_type, %online_id);
    let task = tokio::spawn(
        async move {
            let _ = tx
                .send(JobEvent::Progress(format!("Fetching {} from {}", online_id, provider.name())))
                .await;
            let result = provider
                .get_media_details(media_type, &online_id)
                .await
                .map(|fetched| JobOutput::Details(Box::new(fetched)));
            finish(&tx, result).await;
        }
        .instrument(span),
    );
    JobHandle { rx, task }
}

/// Merge already-fetched details into `local_id` in the background.
pub fn spawn_save(
    db: Arc<Database>,
    provider: Arc<dyn LookupProvider>,
    local_id: i64,
    fetched: FetchedMedia,
    poster_root: Option<PathBuf>,
) -> JobHandle {
    let (tx, rx) = mpsc::channel(32);
    let span = tracing::info_span!("save", provider = provider.name(), local_id);
    let task = tokio::spawn(
        async move {
            let result = merge_fetched_details(
                &db,
                provider.as_ref(),
                local_id,
                &fetched,
                poster_root.as_deref(),
                Some(&tx),
            )
            .await
            .map(JobOutput::Saved);
            finish(&tx, result).await;
        }
        .instrument(span),
    );
    JobHandle { rx, task }
}

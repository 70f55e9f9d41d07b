//! Clone over smart HTTP: init -> discover -> negotiate -> transfer -> ingest -> finalize.
//! Each stage runs once; the first failure aborts the clone. Objects already
//! written stay in place since they are content addressed.

use std::fs;
use std::path::Path;

use super::{Repository, DEFAULT_BRANCH};
use crate::config::Config;
use crate::error::{CloneError, CloneStage, Error, Result, StageContext};
use crate::object::ObjectId;
use crate::pack::{decode_pack, IngestSummary, PackIngestor};
use crate::protocol::request::{self, select_capabilities};
use crate::protocol::{discover, fetch_pack, HttpClient, SideBand};

/// What a successful clone produced
#[derive(Debug)]
pub struct CloneOutcome {
    pub repository: Repository,
    pub head_branch: String,
    pub branches: Vec<(String, ObjectId)>,
    pub ingested: IngestSummary,
    pub files_checked_out: usize,
}

/// Runs one clone; built per invocation with the HTTP client it should use
pub struct CloneCoordinator<'a> {
    client: &'a dyn HttpClient,
    config: &'a Config,
}

impl<'a> CloneCoordinator<'a> {
    pub fn new(client: &'a dyn HttpClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    pub async fn run(&self, url: &str, dest: &Path) -> std::result::Result<CloneOutcome, CloneError> {
        let repository = prepare_destination(dest).at_stage(CloneStage::Init)?;
        tracing::info!("cloning {} into {}", url, dest.display());

        let advertisement = discover(self.client, url)
            .await
            .at_stage(CloneStage::Discover)?;
        let branches: Vec<(String, ObjectId)> = advertisement
            .branches()
            .map(|(name, id)| (name.to_string(), *id))
            .collect();
        let head_branch = advertisement
            .default_branch()
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        if branches.is_empty() {
            tracing::warn!("{} has no branches; created an empty repository", url);
            repository
                .refs()
                .write_head_symbolic(&head_branch)
                .at_stage(CloneStage::Finalize)?;
            return Ok(CloneOutcome {
                repository,
                head_branch,
                branches,
                ingested: IngestSummary::default(),
                files_checked_out: 0,
            });
        }

        let capabilities = select_capabilities(&advertisement.capabilities, &self.config.user_agent);
        let wants: Vec<ObjectId> = branches.iter().map(|(_, id)| *id).collect();
        let request_body = request::build(&wants, &capabilities).at_stage(CloneStage::Negotiate)?;
        let side_band = SideBand::from_requested(&capabilities);
        tracing::debug!("requesting {} tips with {:?}", wants.len(), capabilities);

        let pack = fetch_pack(self.client, url, request_body, side_band)
            .await
            .at_stage(CloneStage::Transfer)?;

        let ingested = self
            .ingest(&repository, pack, &wants)
            .await
            .at_stage(CloneStage::Ingest)?;

        let files_checked_out = self
            .finalize(&repository, &branches, &head_branch)
            .at_stage(CloneStage::Finalize)?;

        Ok(CloneOutcome {
            repository,
            head_branch,
            branches,
            ingested,
            files_checked_out,
        })
    }

    /// Decode and store the pack on a blocking worker; the decode state
    /// moves there and is owned by that task alone.
    async fn ingest(
        &self,
        repository: &Repository,
        pack: Vec<u8>,
        wants: &[ObjectId],
    ) -> Result<IngestSummary> {
        let store = repository.objects().clone();
        let show_progress = self.config.progress;
        let worker_store = store.clone();
        let summary = tokio::task::spawn_blocking(move || {
            let decoded = decode_pack(&pack)?;
            PackIngestor::new(&worker_store)
                .with_progress(show_progress)
                .ingest(&decoded)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("ingest worker failed: {}", e))))??;

        if let Some(missing) = wants.iter().find(|id| !store.exists(id)) {
            return Err(Error::corrupt_pack(format!(
                "pack does not contain requested object {}",
                missing
            )));
        }
        Ok(summary)
    }

    fn finalize(
        &self,
        repository: &Repository,
        branches: &[(String, ObjectId)],
        head_branch: &str,
    ) -> Result<usize> {
        for (name, id) in branches {
            repository.refs().write_ref(&format!("refs/heads/{}", name), id)?;
        }
        repository.refs().write_head_symbolic(head_branch)?;

        if !self.config.checkout {
            return Ok(0);
        }
        let files = repository.checkout_head()?;
        tracing::info!("checked out {} files on {}", files, head_branch);
        Ok(files)
    }
}

/// The destination may be missing or an empty directory
fn prepare_destination(dest: &Path) -> Result<Repository> {
    if dest.exists() {
        if !dest.is_dir() || fs::read_dir(dest)?.next().is_some() {
            return Err(Error::validation(format!(
                "destination {} already exists and is not an empty directory",
                dest.display()
            )));
        }
    } else {
        fs::create_dir_all(dest)?;
    }
    Repository::init(dest)
}

/// Directory name `git clone` would pick for `url`
pub fn default_directory(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty() && !name.contains(':')).then(|| name.to_string())
}

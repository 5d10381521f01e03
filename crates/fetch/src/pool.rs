//! Bounded concurrent fetching with all-or-nothing commit

use crate::{FetchRequest, Fetcher};
use futures::stream::{FuturesUnordered, StreamExt};
use prefetch_config::resources_semaphore::{acquire_semaphore_permit, create_semaphore};
use prefetch_config::Config;
use prefetch_errors::{ConsistencyError, Error};
use prefetch_events::{AppEvent, CorrelatedEmitter, EventEmitter, FailureContext, FetchEvent};
use prefetch_root::Sandbox;
use prefetch_types::validate_dependency_name;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Module content committed to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub name: String,
    pub version: String,
    /// Absolute module directory inside the cache
    pub path: PathBuf,
    /// Module directory relative to the output root
    pub relative: PathBuf,
}

/// Runs a batch of fetches with a worker limit
///
/// Fetches land in `<staging_dir>/<session>` first. Only when every fetch
/// succeeded is the staging tree merged into the cache; otherwise the
/// remaining fetches are dropped and the staging tree is removed.
#[derive(Debug, Clone)]
pub struct FetchPool {
    workers: usize,
    staging_dir: PathBuf,
    cache_dir: PathBuf,
    events: CorrelatedEmitter,
}

impl FetchPool {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            workers: config.fetch_workers(),
            staging_dir: config.paths.staging_dir.clone(),
            cache_dir: config.paths.cache_dir.clone(),
            events: CorrelatedEmitter::disabled(),
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: CorrelatedEmitter) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every request and commit the results to the cache
    ///
    /// Identical requests are fetched once. Artifacts are returned sorted
    /// by module name.
    ///
    /// # Errors
    ///
    /// Returns the first fetch failure, a sandbox error,
    /// `DirectiveError::InvalidRecord` for a name that would leave the cache,
    /// or `ConsistencyError::ConflictingModuleVersions` if one module is
    /// requested at two versions.
    pub async fn fetch_all(
        &self,
        output: &Sandbox,
        fetcher: &dyn Fetcher,
        requests: &[FetchRequest],
        session: &str,
    ) -> Result<Vec<FetchedArtifact>, Error> {
        let unique = dedupe(requests)?;
        let staging_rel = self.staging_dir.join(session);
        output.ensure_empty_dir(&staging_rel).await?;

        // Runs only if this future is dropped before cleanup below.
        let guard = scopeguard::guard(staging_rel.clone(), |rel| {
            if let Ok(staging) = output.join_within_root(&rel) {
                if staging.existed() {
                    let _ = std::fs::remove_dir_all(staging.path());
                }
            }
        });

        self.events.emit(AppEvent::Fetch(FetchEvent::BatchStarted {
            modules: unique.len(),
            workers: self.workers,
        }));

        let outcome = match self.run_workers(output, fetcher, &unique, &staging_rel).await {
            Ok(()) => self.commit(output, &unique, &staging_rel).await,
            Err(err) => Err(err),
        };

        let cleanup = output.remove_dir_all(&staging_rel).await;
        scopeguard::ScopeGuard::into_inner(guard);

        match outcome {
            Ok(artifacts) => {
                cleanup?;
                self.events.emit(AppEvent::Fetch(FetchEvent::StagingCommitted {
                    modules: artifacts.len(),
                    cache_dir: self.cache_dir.clone(),
                }));
                Ok(artifacts)
            }
            Err(err) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!(
                        staging = %staging_rel.display(),
                        error = %cleanup_err,
                        "failed to remove staging directory"
                    );
                }
                self.events.emit(AppEvent::Fetch(FetchEvent::StagingDiscarded {
                    staging_dir: staging_rel.clone(),
                }));
                Err(err)
            }
        }
    }

    async fn run_workers(
        &self,
        output: &Sandbox,
        fetcher: &dyn Fetcher,
        unique: &BTreeMap<PathBuf, &FetchRequest>,
        staging_rel: &Path,
    ) -> Result<(), Error> {
        let semaphore = create_semaphore(self.workers);
        let events = &self.events;
        let mut in_flight = FuturesUnordered::new();

        for (module_dir, request) in unique {
            let semaphore = semaphore.clone();
            let target = staging_rel.join(module_dir);

            in_flight.push(async move {
                let _permit = acquire_semaphore_permit(semaphore, "fetch").await?;
                let destination = output.create_dir_all(&target).await?;

                match fetcher.fetch(request, output, &destination).await {
                    Ok(()) => {
                        events.emit(AppEvent::Fetch(FetchEvent::Completed {
                            module: request.name.clone(),
                            version: request.version.clone(),
                            path: destination.relative().to_path_buf(),
                        }));
                        Ok(())
                    }
                    Err(err) => {
                        events.emit(AppEvent::Fetch(FetchEvent::Failed {
                            module: request.name.clone(),
                            version: request.version.clone(),
                            failure: FailureContext::from_error(&err),
                        }));
                        Err(err)
                    }
                }
            });
        }

        // Returning early drops the fetches still in flight.
        while let Some(result) = in_flight.next().await {
            result?;
        }

        Ok(())
    }

    async fn commit(
        &self,
        output: &Sandbox,
        unique: &BTreeMap<PathBuf, &FetchRequest>,
        staging_rel: &Path,
    ) -> Result<Vec<FetchedArtifact>, Error> {
        let mut artifacts = Vec::with_capacity(unique.len());

        for (module_dir, request) in unique {
            let cached = self.cache_dir.join(module_dir);
            output
                .merge_directory(staging_rel.join(module_dir), &cached)
                .await?;

            let confined = output.resolve_existing(&cached)?;
            artifacts.push(FetchedArtifact {
                name: request.name.clone(),
                version: request.version.clone(),
                path: confined.path().to_path_buf(),
                relative: confined.relative().to_path_buf(),
            });
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }
}

/// Key requests by module directory, rejecting one module at two versions
fn dedupe(requests: &[FetchRequest]) -> Result<BTreeMap<PathBuf, &FetchRequest>, Error> {
    let mut unique: BTreeMap<PathBuf, &FetchRequest> = BTreeMap::new();
    for request in requests {
        validate_dependency_name(&request.name)?;
        let module_dir = request.module_dir();
        match unique.get(&module_dir) {
            Some(existing) if existing.version != request.version => {
                return Err(ConsistencyError::ConflictingModuleVersions {
                    name: request.name.clone(),
                    first: existing.version.clone(),
                    second: request.version.clone(),
                }
                .into());
            }
            Some(_) => {}
            None => {
                unique.insert(module_dir, request);
            }
        }
    }
    Ok(unique)
}

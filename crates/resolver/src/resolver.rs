//! Resolution session orchestration

use crate::classify::{Classification, PackageClassifier};
use crate::graph::ModuleGraph;
use crate::replace::ReplaceResolver;
use prefetch_config::Config;
use prefetch_environment::{Environment, EnvironmentBuilder};
use prefetch_errors::Error;
use prefetch_events::{
    AppEvent, CorrelatedEmitter, EventEmitter, EventSender, FailureContext, ResolverEvent,
};
use prefetch_fetch::{FetchPool, FetchRequest, FetchedArtifact, Fetcher, LocalModuleFetcher};
use prefetch_root::Sandbox;
use prefetch_types::{Manifest, Package, RawDependency, ReplaceDirective};
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// Input of one resolution
#[derive(Clone, Debug)]
pub struct ResolutionRequest {
    /// Root package whose dependencies are resolved
    pub root: Package,
    /// Records in the order the manifest parser produced them
    pub dependencies: Vec<RawDependency>,
    /// Side-list replace directives
    pub directives: Vec<ReplaceDirective>,
}

impl ResolutionRequest {
    #[must_use]
    pub fn new(root: Package, dependencies: Vec<RawDependency>) -> Self {
        Self {
            root,
            dependencies,
            directives: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_directives(mut self, directives: Vec<ReplaceDirective>) -> Self {
        self.directives = directives;
        self
    }
}

/// Manifest and ownership graph of a resolution
#[derive(Clone, Debug)]
pub struct Resolution {
    pub manifest: Manifest,
    pub graph: ModuleGraph,
    /// Module-level requests, in manifest order
    pub fetches: Vec<FetchRequest>,
}

/// Everything a hermetic build needs from one session
#[derive(Clone, Debug)]
pub struct HermeticSession {
    pub session_id: String,
    pub manifest: Manifest,
    pub graph: ModuleGraph,
    pub artifacts: Vec<FetchedArtifact>,
    pub environment: Environment,
}

/// Drives replace resolution, classification, fetching and environment
/// construction for one project
///
/// The project sandbox confines local module directories; the output
/// sandbox holds the module cache and every `path` variable. Neither is
/// shared with other sessions.
pub struct ModuleGraphResolver {
    project: Sandbox,
    output: Sandbox,
    config: Config,
    events: Option<EventSender>,
}

impl ModuleGraphResolver {
    /// Create a resolver for `project_root`, writing under `output_root`
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::InvalidRoot` if either root is not an existing
    /// absolute directory, or a config error if `config` is invalid.
    pub fn new(
        project_root: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
        config: Config,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            project: Sandbox::new(project_root)?,
            output: Sandbox::new(output_root)?,
            config,
            events: None,
        })
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    #[must_use]
    pub fn project(&self) -> &Sandbox {
        &self.project
    }

    #[must_use]
    pub fn output(&self) -> &Sandbox {
        &self.output
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve `request` into a deterministic manifest
    ///
    /// Does not fetch anything. Local module directories must exist inside
    /// the project.
    ///
    /// # Errors
    ///
    /// Returns the first directive, consistency, version or sandbox error.
    /// None of them is retried.
    pub fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, Error> {
        self.resolve_with(request, &CorrelatedEmitter::new(self.events.clone()))
    }

    /// Resolve `request`, fetch every module through `fetcher` and build the
    /// isolated environment
    ///
    /// `fetcher` is responsible for its own retry policy; wrap it in a
    /// `RetryingFetcher` to retry transient failures. Its final failure
    /// aborts the session and nothing is committed to the cache.
    ///
    /// # Errors
    ///
    /// Returns any resolution error, the first fetch failure, or a sandbox
    /// or config error from environment construction.
    pub async fn prefetch(
        &self,
        request: &ResolutionRequest,
        fetcher: &dyn Fetcher,
    ) -> Result<HermeticSession, Error> {
        let session_id = Uuid::new_v4().to_string();
        let emitter =
            CorrelatedEmitter::new(self.events.clone()).with_correlation_id(session_id.clone());
        let started = Instant::now();

        emitter.emit(AppEvent::Resolver(ResolverEvent::SessionStarted {
            session_id: session_id.clone(),
            package: request.root.name.clone(),
            dependencies: request.dependencies.len(),
            directives: request.directives.len(),
        }));

        match self
            .run_session(request, fetcher, &session_id, &emitter)
            .await
        {
            Ok(session) => {
                emitter.emit(AppEvent::Resolver(ResolverEvent::SessionCompleted {
                    session_id,
                    fetched: session.artifacts.len(),
                    duration_ms: u64::try_from(started.elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                }));
                Ok(session)
            }
            Err(err) => {
                emitter.emit(AppEvent::Resolver(ResolverEvent::SessionFailed {
                    session_id,
                    failure: FailureContext::from_error(&err),
                }));
                Err(err)
            }
        }
    }

    async fn run_session(
        &self,
        request: &ResolutionRequest,
        fetcher: &dyn Fetcher,
        session_id: &str,
        emitter: &CorrelatedEmitter,
    ) -> Result<HermeticSession, Error> {
        let resolution = self.resolve_with(request, emitter)?;

        let local = LocalModuleFetcher::new(&self.project, fetcher);
        let artifacts = FetchPool::new(&self.config)
            .with_events(emitter.clone())
            .fetch_all(&self.output, &local, &resolution.fetches, session_id)
            .await?;

        let environment = EnvironmentBuilder::new(&self.output, &self.config.environment)
            .with_events(emitter.clone())
            .build()
            .await?;

        Ok(HermeticSession {
            session_id: session_id.to_string(),
            manifest: resolution.manifest,
            graph: resolution.graph,
            artifacts,
            environment,
        })
    }

    fn resolve_with(
        &self,
        request: &ResolutionRequest,
        emitter: &CorrelatedEmitter,
    ) -> Result<Resolution, Error> {
        let replacer = ReplaceResolver::with_directives(request.directives.clone())?;
        let effective = replacer.resolve(&request.dependencies)?;
        emitter.emit(AppEvent::Resolver(ResolverEvent::DirectivesApplied {
            replaced: effective.iter().filter(|d| d.is_replaced()).count(),
            renamed: effective.iter().filter(|d| d.is_renamed()).count(),
        }));

        let classification = PackageClassifier::new(&request.root).classify(effective)?;
        emitter.emit(AppEvent::Resolver(ResolverEvent::Classified {
            modules: classification.modules.len(),
            packages: classification.packages.len(),
            toolchain: classification.toolchain_count(),
        }));

        let fetches = self.fetch_requests(&classification)?;
        let graph = ModuleGraph::from_classification(&classification);

        let manifest = Manifest::new(
            request.root.clone(),
            classification
                .modules
                .iter()
                .map(|module| module.to_manifest_entry())
                .collect(),
            classification
                .packages
                .iter()
                .map(|package| package.dependency.to_manifest_entry())
                .collect(),
        );
        emitter.emit(AppEvent::Resolver(ResolverEvent::ManifestReady {
            digest: manifest.digest()?,
            modules: manifest.modules.len(),
            packages: manifest.packages.len(),
        }));

        Ok(Resolution {
            manifest,
            graph,
            fetches,
        })
    }

    /// Fetch requests for every module, in manifest order
    ///
    /// Local module directories are confined to the project here and again
    /// when they are copied.
    fn fetch_requests(&self, classification: &Classification) -> Result<Vec<FetchRequest>, Error> {
        let mut requests = classification
            .modules
            .iter()
            .map(FetchRequest::from_dependency)
            .collect::<Result<Vec<_>, Error>>()?;
        requests.sort_by(|a, b| {
            a.name
                .as_bytes()
                .cmp(b.name.as_bytes())
                .then_with(|| a.version.as_bytes().cmp(b.version.as_bytes()))
        });

        for request in &requests {
            if let Some(directory) = request.reference.local_path() {
                self.project.resolve_existing(directory)?;
            }
        }
        Ok(requests)
    }
}

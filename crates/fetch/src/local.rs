use crate::{FetchRequest, Fetcher};
use async_trait::async_trait;
use prefetch_errors::Error;
use prefetch_root::{Sandbox, SandboxedPath};

/// Copies modules that live inside the project, delegating the rest
///
/// A local module's directory is confined to the project sandbox, so a
/// version such as `../../etc` or a link out of the project fails with a
/// sandbox error instead of copying foreign files.
pub struct LocalModuleFetcher<'a> {
    project: &'a Sandbox,
    remote: &'a dyn Fetcher,
}

impl<'a> LocalModuleFetcher<'a> {
    pub fn new(project: &'a Sandbox, remote: &'a dyn Fetcher) -> Self {
        Self { project, remote }
    }
}

#[async_trait]
impl Fetcher for LocalModuleFetcher<'_> {
    async fn fetch(
        &self,
        request: &FetchRequest,
        output: &Sandbox,
        destination: &SandboxedPath,
    ) -> Result<(), Error> {
        let Some(directory) = request.reference.local_path() else {
            return self.remote.fetch(request, output, destination).await;
        };

        let copied = self
            .project
            .copy_directory(directory, output, destination.relative())
            .await?;
        tracing::debug!(module = %request.name, files = copied, "copied local module");
        Ok(())
    }
}

//! Integration tests for resolver crate

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use prefetch_config::constants::{CACHE_DOWNLOAD_DIR, STAGING_DIR};
    use prefetch_config::Config;
    use prefetch_errors::{ConsistencyError, DirectiveError, Error, FetchError, SandboxError};
    use prefetch_events::{channel, AppEvent, EventReceiver, ResolverEvent};
    use prefetch_fetch::{FetchRequest, Fetcher};
    use prefetch_resolver::*;
    use prefetch_root::{Sandbox, SandboxedPath};
    use prefetch_types::{
        DependencyKind, Package, RawDependency, ReplaceDirective, ReplacementTarget,
    };
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    /// Project and output roots owned by a single test
    struct Project {
        _project: TempDir,
        _output: TempDir,
        resolver: ModuleGraphResolver,
    }

    impl Project {
        /// Project holding the staged `k8s.io/metrics` module
        fn new() -> Self {
            let project = TempDir::new().unwrap();
            let output = TempDir::new().unwrap();
            let staged = project.path().join("staging/src/k8s.io/metrics");
            std::fs::create_dir_all(&staged).unwrap();
            std::fs::write(staged.join("go.mod"), "module k8s.io/metrics\n").unwrap();

            let resolver =
                ModuleGraphResolver::new(project.path(), output.path(), Config::default())
                    .unwrap();
            Self {
                _project: project,
                _output: output,
                resolver,
            }
        }

        fn with_events(mut self) -> (Self, EventReceiver) {
            let (tx, rx) = channel();
            self.resolver = self.resolver.with_event_sender(tx);
            (self, rx)
        }

        fn output(&self) -> &Sandbox {
            self.resolver.output()
        }
    }

    fn records(value: Value) -> Vec<RawDependency> {
        serde_json::from_value(value).unwrap()
    }

    fn sample_deps_json() -> Value {
        json!([
            {"name": "github.com/Masterminds/semver", "type": "gomod", "replaces": null, "version": "v1.4.2"},
            {"name": "github.com/kr/pretty", "type": "gomod", "replaces": null, "version": "v0.1.0"},
            {"name": "github.com/kr/pty", "type": "gomod", "replaces": null, "version": "v1.1.1"},
            {"name": "github.com/kr/text", "type": "gomod", "replaces": null, "version": "v0.1.0"},
            {"name": "github.com/op/go-logging", "type": "gomod", "replaces": null, "version": "v0.0.0-20160315200505-970db520ece7"},
            {"name": "github.com/pkg/errors", "type": "gomod", "version": "v1.0.0", "replaces": null},
            {"name": "golang.org/x/crypto", "type": "gomod", "replaces": null, "version": "v0.0.0-20190308221718-c2843e01d9a2"},
            {"name": "golang.org/x/net", "type": "gomod", "replaces": null, "version": "v0.0.0-20190311183353-d8887717615a"},
            {"name": "golang.org/x/sys", "type": "gomod", "replaces": null, "version": "v0.0.0-20190215142949-d0b11bdaac8a"},
            {"name": "golang.org/x/text", "type": "gomod", "replaces": null, "version": "v0.3.0"},
            {"name": "golang.org/x/tools", "type": "gomod", "replaces": null, "version": "v0.0.0-20190325161752-5a8dccf5b48a"},
            {"name": "gopkg.in/check.v1", "type": "gomod", "replaces": null, "version": "v1.0.0-20180628173108-788fd7840127"},
            {"name": "gopkg.in/yaml.v2", "type": "gomod", "replaces": null, "version": "v2.2.2"},
            {"name": "k8s.io/metrics", "type": "gomod", "replaces": null, "version": "./staging/src/k8s.io/metrics"}
        ])
    }

    fn sample_deps() -> Vec<RawDependency> {
        records(sample_deps_json())
    }

    fn sample_deps_replace() -> Vec<RawDependency> {
        let mut deps = sample_deps_json();
        deps[5]["replaces"] =
            json!({"name": "github.com/pkg/errors", "type": "gomod", "version": "v0.9.0"});
        records(deps)
    }

    fn sample_deps_replace_new_name() -> Vec<RawDependency> {
        let mut deps = sample_deps_json();
        deps[5] = json!({
            "name": "github.com/pkg/new_errors",
            "type": "gomod",
            "replaces": {"name": "github.com/pkg/errors", "type": "gomod", "version": "v0.9.0"},
            "version": "v1.0.0"
        });
        records(deps)
    }

    fn sample_package() -> Package {
        serde_json::from_value(json!({
            "name": "github.com/release-engineering/retrodep/v2",
            "type": "gomod",
            "version": "v2.1.1"
        }))
        .unwrap()
    }

    fn sample_pkg_deps_without_replace() -> Vec<RawDependency> {
        records(json!([
            {"name": "fmt", "type": "go-package", "version": null},
            {"name": "github.com/Masterminds/semver", "type": "go-package", "version": "v1.4.2"},
            {"name": "github.com/op/go-logging", "type": "go-package", "version": "v0.0.0-20160315200505-970db520ece7"},
            {"name": "github.com/pkg/errors", "type": "go-package", "version": "v0.8.1"},
            {"name": "github.com/release-engineering/retrodep/v2/retrodep", "type": "go-package", "version": "v2.1.1"},
            {"name": "github.com/release-engineering/retrodep/v2/retrodep/glide", "type": "go-package", "version": "v2.1.1"},
            {"name": "golang.org/x/tools/go/vcs", "type": "go-package", "version": "v0.0.0-20190325161752-5a8dccf5b48a"},
            {"name": "gopkg.in/yaml.v2", "type": "go-package", "version": "v2.2.2"}
        ]))
    }

    /// Package list agreeing with `sample_deps`
    fn consistent_pkg_deps() -> Vec<RawDependency> {
        sample_pkg_deps_without_replace()
            .into_iter()
            .map(|mut record| {
                if record.name == "github.com/pkg/errors" {
                    record.version = Some("v1.0.0".to_string());
                }
                record
            })
            .collect()
    }

    fn request(dependencies: Vec<RawDependency>) -> ResolutionRequest {
        ResolutionRequest::new(sample_package(), dependencies)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ResolverEvent> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let AppEvent::Resolver(event) = message.event {
                events.push(event);
            }
        }
        events
    }

    /// Writes a `.mod` file for every module it is asked for
    struct ModFileFetcher;

    #[async_trait]
    impl Fetcher for ModFileFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            output: &Sandbox,
            destination: &SandboxedPath,
        ) -> Result<(), Error> {
            output
                .write(
                    destination
                        .relative()
                        .join(format!("{}.mod", request.escaped_version())),
                    format!("module {}\n", request.name),
                )
                .await?;
            Ok(())
        }
    }

    /// Fails one module with a final error
    struct BrokenModuleFetcher(&'static str);

    #[async_trait]
    impl Fetcher for BrokenModuleFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            output: &Sandbox,
            destination: &SandboxedPath,
        ) -> Result<(), Error> {
            if request.name == self.0 {
                return Err(FetchError::Failed {
                    name: request.name.clone(),
                    version: request.version.clone(),
                    message: "unknown revision".to_string(),
                }
                .into());
            }
            ModFileFetcher.fetch(request, output, destination).await
        }
    }

    proptest! {
        #[test]
        fn records_without_directives_pass_through(
            entries in prop::collection::vec(
                ("[a-z]{1,8}\\.(io|com|org)/[a-z]{1,8}", "v[0-9]\\.[0-9]{1,2}\\.[0-9]{1,2}", any::<bool>()),
                0..20,
            )
        ) {
            let input: Vec<RawDependency> = entries
                .iter()
                .map(|(name, version, is_module)| {
                    let kind = if *is_module { DependencyKind::GoModule } else { DependencyKind::GoPackage };
                    RawDependency::new(name.as_str(), kind, Some(version.as_str()))
                })
                .collect();

            let effective = ReplaceResolver::new().resolve(&input).unwrap();

            prop_assert_eq!(effective.len(), input.len());
            for (raw, resolved) in input.iter().zip(&effective) {
                prop_assert_eq!(&resolved.name, &raw.name);
                prop_assert_eq!(resolved.kind, raw.kind);
                prop_assert_eq!(&resolved.version, &raw.version);
                prop_assert!(!resolved.is_replaced());
                prop_assert!(!resolved.is_renamed());
            }
        }
    }

    #[test]
    fn test_sample_deps_resolve_unchanged() {
        let project = Project::new();
        let resolution = project.resolver.resolve(&request(sample_deps())).unwrap();

        assert_eq!(resolution.manifest.modules.len(), 14);
        assert!(resolution.manifest.packages.is_empty());
        assert!(resolution
            .manifest
            .modules
            .iter()
            .all(|entry| !entry.replaced && entry.original_name.is_none()));
        assert_eq!(resolution.fetches.len(), 14);
        assert!(resolution
            .fetches
            .iter()
            .any(|fetch| fetch.reference.is_local() && fetch.name == "k8s.io/metrics"));
    }

    #[test]
    fn test_version_only_replace() {
        let project = Project::new();
        let resolution = project
            .resolver
            .resolve(&request(sample_deps_replace()))
            .unwrap();

        let errors = resolution.manifest.module("github.com/pkg/errors").unwrap();
        assert_eq!(errors.version.as_deref(), Some("v0.9.0"));
        assert!(errors.replaced);
        assert_eq!(errors.original_name, None);
    }

    #[test]
    fn test_rename_replace_keeps_original_name() {
        let project = Project::new();
        let resolution = project
            .resolver
            .resolve(&request(sample_deps_replace_new_name()))
            .unwrap();

        let errors = resolution.manifest.module("github.com/pkg/errors").unwrap();
        assert_eq!(errors.version.as_deref(), Some("v0.9.0"));
        assert_eq!(
            errors.original_name.as_deref(),
            Some("github.com/pkg/new_errors")
        );
        assert!(resolution.manifest.module("github.com/pkg/new_errors").is_none());

        let traced = resolution
            .manifest
            .by_original_name("github.com/pkg/new_errors")
            .unwrap();
        assert_eq!(traced.name, "github.com/pkg/errors");

        let node = resolution.graph.module("github.com/pkg/errors").unwrap();
        assert_eq!(node.original_name.as_deref(), Some("github.com/pkg/new_errors"));
    }

    #[test]
    fn test_side_list_directive_matches_embedded() {
        let project = Project::new();
        let embedded = project
            .resolver
            .resolve(&request(sample_deps_replace()))
            .unwrap();
        let side = project
            .resolver
            .resolve(&request(sample_deps()).with_directives(vec![ReplaceDirective::new(
                "github.com/pkg/errors",
                DependencyKind::GoModule,
                "github.com/pkg/errors",
                "v0.9.0",
            )]))
            .unwrap();

        assert_eq!(embedded.manifest, side.manifest);
    }

    #[test]
    fn test_manifest_is_sorted_bytewise() {
        let project = Project::new();
        let resolution = project.resolver.resolve(&request(sample_deps())).unwrap();

        let names: Vec<&str> = resolution
            .manifest
            .modules
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert_eq!(names[0], "github.com/Masterminds/semver");
        assert_eq!(names[1], "github.com/kr/pretty");
    }

    #[test]
    fn test_manifest_is_deterministic_across_runs_and_input_order() {
        let project = Project::new();
        let mut dependencies = sample_deps_replace_new_name();
        dependencies.extend(consistent_pkg_deps().into_iter().filter(|record| {
            record.name != "github.com/pkg/errors"
        }));

        let first = project.resolver.resolve(&request(dependencies.clone())).unwrap();
        let again = project.resolver.resolve(&request(dependencies.clone())).unwrap();

        dependencies.reverse();
        dependencies.rotate_left(3);
        let shuffled = project.resolver.resolve(&request(dependencies)).unwrap();

        assert_eq!(first.manifest, again.manifest);
        assert_eq!(first.manifest, shuffled.manifest);
        assert_eq!(
            first.manifest.digest().unwrap(),
            shuffled.manifest.digest().unwrap()
        );
        assert_eq!(
            first.manifest.to_canonical_json().unwrap(),
            shuffled.manifest.to_canonical_json().unwrap()
        );
    }

    #[test]
    fn test_package_version_mismatch_rejected() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies.extend(sample_pkg_deps_without_replace());

        let err = project.resolver.resolve(&request(dependencies)).unwrap_err();
        match err {
            Error::Consistency(ConsistencyError::VersionMismatch {
                package,
                package_version,
                module,
                module_version,
            }) => {
                assert_eq!(package, "github.com/pkg/errors");
                assert_eq!(package_version, "v0.8.1");
                assert_eq!(module, "github.com/pkg/errors");
                assert_eq!(module_version, "v1.0.0");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_package_version_checked_after_replace() {
        let project = Project::new();
        let mut dependencies = sample_deps_replace();
        dependencies.extend(consistent_pkg_deps());

        let err = project.resolver.resolve(&request(dependencies)).unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency(ConsistencyError::VersionMismatch { ref module_version, .. })
                if module_version == "v0.9.0"
        ));
    }

    #[test]
    fn test_packages_are_attributed_to_owners() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies.extend(consistent_pkg_deps());

        let resolution = project.resolver.resolve(&request(dependencies)).unwrap();
        let graph = &resolution.graph;

        assert_eq!(
            graph.owner_of("golang.org/x/tools/go/vcs").unwrap().name,
            "golang.org/x/tools"
        );
        assert_eq!(
            graph.owner_of("github.com/Masterminds/semver").unwrap().name,
            "github.com/Masterminds/semver"
        );
        assert_eq!(
            graph.main_packages(),
            [
                "github.com/release-engineering/retrodep/v2/retrodep".to_string(),
                "github.com/release-engineering/retrodep/v2/retrodep/glide".to_string(),
            ]
        );
        assert_eq!(graph.toolchain_packages(), ["fmt".to_string()]);
        assert_eq!(graph.module_count(), 14);
        assert!(graph
            .unused_modules()
            .any(|node| node.name == "k8s.io/metrics"));
        assert_eq!(resolution.manifest.packages.len(), 8);
    }

    #[test]
    fn test_package_under_original_name_is_owned_by_renamed_module() {
        let project = Project::new();
        let mut dependencies = sample_deps_replace_new_name();
        dependencies.push(RawDependency::new(
            "github.com/pkg/new_errors/internal",
            DependencyKind::GoPackage,
            Some("v0.9.0"),
        ));

        let resolution = project.resolver.resolve(&request(dependencies)).unwrap();
        assert_eq!(
            resolution
                .graph
                .owner_of("github.com/pkg/new_errors/internal")
                .unwrap()
                .name,
            "github.com/pkg/errors"
        );
    }

    #[test]
    fn test_orphan_package_rejected() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies.push(RawDependency::new(
            "example.org/unlisted/pkg",
            DependencyKind::GoPackage,
            Some("v1.0.0"),
        ));

        let err = project.resolver.resolve(&request(dependencies)).unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency(ConsistencyError::OrphanPackage { ref name, .. })
                if name == "example.org/unlisted/pkg"
        ));
    }

    #[test]
    fn test_overlapping_module_and_package_directives_rejected() {
        let project = Project::new();
        let directives = vec![
            ReplaceDirective::new(
                "github.com/pkg/errors",
                DependencyKind::GoModule,
                "github.com/pkg/errors",
                "v0.9.0",
            ),
            ReplaceDirective::new(
                "github.com/pkg/errors/wrap",
                DependencyKind::GoPackage,
                "github.com/pkg/errors/wrap",
                "v0.9.0",
            ),
        ];

        let err = project
            .resolver
            .resolve(&request(sample_deps()).with_directives(directives))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency(ConsistencyError::OverlappingDirectives { .. })
        ));
    }

    #[test]
    fn test_nested_replacement_rejected() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies[5] = RawDependency::new(
            "github.com/pkg/errors",
            DependencyKind::GoModule,
            Some("v1.0.0"),
        )
        .with_replacement(
            RawDependency::new("github.com/pkg/errs", DependencyKind::GoModule, Some("v0.9.0"))
                .with_replacement(RawDependency::new(
                    "github.com/pkg/e",
                    DependencyKind::GoModule,
                    Some("v0.1.0"),
                )),
        );

        let err = project.resolver.resolve(&request(dependencies)).unwrap_err();
        assert!(matches!(
            err,
            Error::Directive(DirectiveError::Chained { .. })
        ));
    }

    #[test]
    fn test_kind_changing_directive_rejected() {
        let project = Project::new();
        let directive = ReplaceDirective {
            source: prefetch_types::DependencyId::new(
                "github.com/pkg/errors",
                DependencyKind::GoModule,
            ),
            replacement: ReplacementTarget::new(
                "github.com/pkg/errors",
                DependencyKind::GoPackage,
                "v0.9.0",
            ),
        };

        let err = project
            .resolver
            .resolve(&request(sample_deps()).with_directives(vec![directive]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Directive(DirectiveError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_local_module_outside_project_rejected() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies[13].version = Some("../../etc".to_string());

        let err = project.resolver.resolve(&request(dependencies)).unwrap_err();
        assert!(matches!(err, Error::Sandbox(SandboxError::Escape { .. })));
    }

    #[test]
    fn test_missing_local_module_rejected() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies[13].version = Some("./staging/src/k8s.io/missing".to_string());

        let err = project.resolver.resolve(&request(dependencies)).unwrap_err();
        assert!(matches!(err, Error::Sandbox(SandboxError::NotFound { .. })));
    }

    #[test]
    fn test_missing_root_rejected() {
        let output = TempDir::new().unwrap();
        let missing = output.path().join("absent");

        let err = ModuleGraphResolver::new(&missing, output.path(), Config::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Sandbox(SandboxError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn test_resolution_events() {
        let (project, mut rx) = Project::new().with_events();
        let mut dependencies = sample_deps_replace_new_name();
        dependencies.push(RawDependency::new("fmt", DependencyKind::GoPackage, None));

        project.resolver.resolve(&request(dependencies)).unwrap();

        let events = drain(&mut rx);
        assert!(matches!(
            events[0],
            ResolverEvent::DirectivesApplied {
                replaced: 1,
                renamed: 1
            }
        ));
        assert!(matches!(
            events[1],
            ResolverEvent::Classified {
                modules: 14,
                packages: 1,
                toolchain: 1
            }
        ));
        assert!(matches!(events[2], ResolverEvent::ManifestReady { modules: 14, .. }));
    }

    #[tokio::test]
    async fn test_prefetch_builds_hermetic_session() {
        let (project, mut rx) = Project::new().with_events();
        let mut dependencies = sample_deps();
        dependencies.extend(consistent_pkg_deps());

        let session = project
            .resolver
            .prefetch(&request(dependencies), &ModFileFetcher)
            .await
            .unwrap();

        assert_eq!(session.artifacts.len(), 14);
        assert_eq!(session.manifest.modules.len(), 14);

        let output = project.output();
        let metrics = session
            .artifacts
            .iter()
            .find(|artifact| artifact.name == "k8s.io/metrics")
            .unwrap();
        assert!(metrics.path.join("go.mod").is_file());
        assert!(metrics.path.starts_with(output.root()));

        let semver = session
            .artifacts
            .iter()
            .find(|artifact| artifact.name == "github.com/Masterminds/semver")
            .unwrap();
        assert_eq!(
            semver.relative,
            std::path::Path::new(CACHE_DOWNLOAD_DIR).join("github.com/!masterminds/semver/@v")
        );
        assert!(semver.path.join("v1.4.2.mod").is_file());

        assert!(
            !output
                .exists(std::path::Path::new(STAGING_DIR).join(&session.session_id))
                .await
        );

        let env = &session.environment;
        assert_eq!(env.get("GOSUMDB"), Some("off"));
        let modcache = env.get("GOMODCACHE").unwrap();
        assert!(std::path::Path::new(modcache).is_dir());
        assert!(modcache.starts_with(output.root().to_str().unwrap()));

        let events = drain(&mut rx);
        assert!(matches!(
            events.first(),
            Some(ResolverEvent::SessionStarted { dependencies: 22, .. })
        ));
        match events.last() {
            Some(ResolverEvent::SessionCompleted {
                session_id,
                fetched,
                ..
            }) => {
                assert_eq!(session_id, &session.session_id);
                assert_eq!(*fetched, 14);
            }
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prefetch_failure_commits_nothing() {
        let (project, mut rx) = Project::new().with_events();

        let err = project
            .resolver
            .prefetch(
                &request(sample_deps()),
                &BrokenModuleFetcher("golang.org/x/net"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::Failed { .. })));

        let output = project.output();
        assert!(!output.exists(CACHE_DOWNLOAD_DIR).await);
        assert!(!output.exists("deps/gomod/pkg/mod").await);
        let staging = output.root().join(STAGING_DIR);
        assert_eq!(std::fs::read_dir(staging).unwrap().count(), 0);

        let events = drain(&mut rx);
        match events.last() {
            Some(ResolverEvent::SessionFailed { failure, .. }) => {
                assert!(!failure.retryable);
                assert!(failure.message.contains("golang.org/x/net"));
            }
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prefetch_rejects_inconsistent_input_before_fetching() {
        let project = Project::new();
        let mut dependencies = sample_deps();
        dependencies.extend(sample_pkg_deps_without_replace());

        let err = project
            .resolver
            .prefetch(&request(dependencies), &ModFileFetcher)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency(ConsistencyError::VersionMismatch { .. })
        ));
        assert!(!project.output().exists("deps").await);
    }
}

//! Integration tests for types

#[cfg(test)]
mod tests {
    use prefetch_types::*;
    use proptest::prelude::*;

    #[test]
    fn test_raw_dependency_deserialization() {
        let json = r#"{
            "name": "github.com/pkg/new_errors",
            "type": "gomod",
            "replaces": {
                "name": "github.com/pkg/errors",
                "type": "gomod",
                "version": "v0.9.0"
            },
            "version": "v1.0.0"
        }"#;
        let raw: RawDependency = serde_json::from_str(json).unwrap();
        let dep = Dependency::from_raw(&raw).unwrap();
        assert_eq!(dep.kind, DependencyKind::GoModule);
        assert_eq!(dep.version.as_deref(), Some("v1.0.0"));
        assert_eq!(dep.replaced_by.as_ref().unwrap().name, "github.com/pkg/errors");
    }

    #[test]
    fn test_package_level_without_version() {
        let raw: RawDependency =
            serde_json::from_str(r#"{"name": "fmt", "type": "go-package", "version": null}"#)
                .unwrap();
        let dep = Dependency::from_raw(&raw).unwrap();
        assert_eq!(dep.version, None);
        assert_eq!(dep.version_ref().unwrap(), None);
    }

    #[test]
    fn test_env_var_spec_serialization() {
        let spec = EnvVarSpec::path("GOCACHE", "deps/gomod");
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"name":"GOCACHE","value":"deps/gomod","kind":"path"}"#);

        let literal: EnvVarSpec =
            serde_json::from_str(r#"{"name":"GOSUMDB","value":"off","kind":"literal"}"#).unwrap();
        assert_eq!(literal.kind, EnvVarKind::Literal);
    }

    #[test]
    fn test_manifest_entry_serialization_omits_original_name() {
        let entry = ManifestEntry {
            name: "gopkg.in/yaml.v2".into(),
            kind: DependencyKind::GoModule,
            version: Some("v2.2.2".into()),
            original_name: None,
            replaced: false,
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"name":"gopkg.in/yaml.v2","type":"gomod","version":"v2.2.2","replaced":false}"#
        );
    }

    fn entry(name: &str, kind: DependencyKind, version: &str) -> ManifestEntry {
        ManifestEntry {
            name: name.into(),
            kind,
            version: Some(version.into()),
            original_name: None,
            replaced: false,
        }
    }

    #[test]
    fn test_manifest_digest_is_order_independent() {
        let root = Package::new("example.com/app", DependencyKind::GoModule, Some("v1.0.0"));
        let a = entry("golang.org/x/net", DependencyKind::GoModule, "v0.1.0");
        let b = entry("github.com/kr/pty", DependencyKind::GoModule, "v1.1.1");
        let p = entry("golang.org/x/net/html", DependencyKind::GoPackage, "v0.1.0");

        let first = Manifest::new(root.clone(), vec![a.clone(), b.clone()], vec![p.clone()]);
        let second = Manifest::new(root, vec![b, a], vec![p]);

        assert_eq!(first, second);
        assert_eq!(first.digest().unwrap(), second.digest().unwrap());
        assert_eq!(first.modules[0].name, "github.com/kr/pty");

        // go-package sorts before gomod byte-wise
        let entries = first.entries();
        assert_eq!(entries[0].kind, DependencyKind::GoPackage);
    }

    proptest! {
        #[test]
        fn prop_manifest_entries_sorted(names in prop::collection::vec("[a-z]{1,8}(/[a-z]{1,8}){0,2}", 0..20)) {
            let root = Package::new("example.com/app", DependencyKind::GoModule, None);
            let modules = names
                .iter()
                .map(|n| entry(n, DependencyKind::GoModule, "v1.0.0"))
                .collect();
            let manifest = Manifest::new(root, modules, Vec::new());
            let sorted = manifest
                .modules
                .windows(2)
                .all(|w| w[0].name.as_bytes() <= w[1].name.as_bytes());
            prop_assert!(sorted);
        }
    }
}

//! Tests for manifest construction, lookup, and the JSON wire format.

use super::*;
use std::collections::HashSet;

fn diamond() -> Manifest {
    // a -> b, a -> d, b -> c, b -> d
    Manifest::builder(7)
        .bundle(BundleRecord::new("a", "ha", 7, 10, "0000000a"))
        .bundle(BundleRecord::new("b", "hb", 7, 20, "0000000b"))
        .bundle(BundleRecord::new("c", "hc", 6, 30, "0000000c").builtin(true))
        .bundle(BundleRecord::new("d", "hd", 7, 40, "0000000d").with_tags(["dlc1"]))
        .asset("scenes/main.unity", "a")
        .asset("textures/rock.png", "c")
        .dependencies("a", ["b", "d"])
        .dependencies("b", ["c", "d"])
        .build()
        .unwrap()
}

#[test]
fn lookup_by_name_and_asset() {
    let m = diamond();
    assert_eq!(m.resource_version(), 7);
    assert_eq!(m.bundles().len(), 4);
    assert_eq!(m.bundle("c").unwrap().hash(), "hc");
    assert!(m.bundle("c").unwrap().is_builtin());
    assert!(m.bundle("zzz").is_none());
    assert_eq!(m.bundle_name_for_asset("scenes/main.unity"), Some("a"));
    assert_eq!(m.bundle_name_for_asset("missing.asset"), None);
    assert_eq!(m.dependencies("a"), &["b".to_string(), "d".to_string()]);
    assert!(m.dependencies("c").is_empty());
    assert_eq!(m.total_size(), 100);
}

#[test]
fn closure_visits_diamond_once_in_preorder() {
    let m = diamond();
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    m.collect_closure("a", &mut visited, &mut out);
    assert_eq!(out, vec!["a", "b", "c", "d"]);

    // A second root sharing the visited set adds nothing new.
    m.collect_closure("b", &mut visited, &mut out);
    assert_eq!(out.len(), 4);
}

#[test]
fn all_dependencies_excludes_main_bundle() {
    let m = diamond();
    assert_eq!(m.all_dependencies("scenes/main.unity"), vec!["b", "c", "d"]);
    assert!(m.all_dependencies("textures/rock.png").is_empty());
    assert!(m.all_dependencies("nope").is_empty());
}

#[test]
fn builtin_tags_sorted_and_deduplicated() {
    let m = Manifest::builder(1)
        .bundle(BundleRecord::new("x", "hx", 1, 1, "0").with_tags(["voice", "dlc1"]))
        .bundle(BundleRecord::new("y", "hy", 1, 1, "0").with_tags(["dlc1"]))
        .build()
        .unwrap();
    assert_eq!(m.builtin_tags(), vec!["dlc1", "voice"]);
}

#[test]
fn pure_builtin_requires_no_tags() {
    let plain = BundleRecord::new("x", "hx", 1, 1, "0").builtin(true);
    let tagged = plain.clone().with_tags(["dlc"]);
    assert!(plain.is_pure_builtin());
    assert!(!tagged.is_pure_builtin());
    assert!(!BundleRecord::new("y", "hy", 1, 1, "0").is_pure_builtin());
}

#[test]
fn rejects_duplicate_names() {
    let err = Manifest::builder(1)
        .bundle(BundleRecord::new("x", "h1", 1, 1, "0"))
        .bundle(BundleRecord::new("x", "h2", 1, 1, "0"))
        .build()
        .unwrap_err();
    assert_eq!(err, ManifestError::DuplicateBundle("x".to_string()));
}

#[test]
fn rejects_dangling_references() {
    let err = Manifest::builder(1)
        .bundle(BundleRecord::new("x", "h1", 1, 1, "0"))
        .asset("a.png", "ghost")
        .build()
        .unwrap_err();
    assert!(matches!(err, ManifestError::UnknownAssetBundle { .. }));

    let err = Manifest::builder(1)
        .bundle(BundleRecord::new("x", "h1", 1, 1, "0"))
        .dependencies("x", ["ghost"])
        .build()
        .unwrap_err();
    assert!(matches!(err, ManifestError::UnknownDependency { .. }));
}

#[test]
fn rejects_cycles_but_accepts_diamonds() {
    let err = Manifest::builder(1)
        .bundle(BundleRecord::new("x", "h1", 1, 1, "0"))
        .bundle(BundleRecord::new("y", "h2", 1, 1, "0"))
        .bundle(BundleRecord::new("z", "h3", 1, 1, "0"))
        .dependencies("x", ["y"])
        .dependencies("y", ["z"])
        .dependencies("z", ["x"])
        .build()
        .unwrap_err();
    assert!(matches!(err, ManifestError::Cycle(_)));

    let err = Manifest::builder(1)
        .bundle(BundleRecord::new("x", "h1", 1, 1, "0"))
        .dependencies("x", ["x"])
        .build()
        .unwrap_err();
    assert_eq!(err, ManifestError::Cycle("x".to_string()));

    diamond();
}

#[test]
fn json_roundtrip_is_exact() {
    let m = diamond();
    let text = to_json(&m).unwrap();
    let back = from_json(&text).unwrap();
    assert_eq!(back, m);
    assert_eq!(to_json(&back).unwrap(), text);
}

#[test]
fn from_json_rejects_invalid_manifest() {
    assert!(from_json("{ not json").is_err());
    let dangling = r#"{
        "resource_version": 2,
        "bundles": [],
        "asset_to_bundle": { "a.png": "missing" }
    }"#;
    let err = from_json(dangling).unwrap_err();
    assert!(format!("{:#}", err).contains("unknown bundle"));
}

#[test]
fn save_and_load_from_sandbox() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("patch_manifest.json");
    assert!(load_from_path(&path).unwrap().is_none());

    let m = diamond();
    save_to_path(&path, &m).unwrap();
    assert_eq!(load_from_path(&path).unwrap(), Some(m));
    assert!(!path.with_extension("json.tmp").exists());

    std::fs::write(&path, "garbage").unwrap();
    assert!(load_from_path(&path).is_err());
}

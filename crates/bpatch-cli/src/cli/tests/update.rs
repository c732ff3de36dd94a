//! Tests for `update` argument parsing and request selection.

use super::parse;
use crate::cli::commands::{build_request, UpdateArgs};
use crate::cli::{Cli, CliCommand};
use bpatch_core::resolver::Request;
use clap::Parser;

#[test]
fn cli_parse_update_minimal() {
    match parse(&["bpatch", "update", "--version", "12"]) {
        CliCommand::Update {
            resource_version,
            tag,
            asset,
            bundle,
            app_version,
        } => {
            assert_eq!(resource_version, 12);
            assert!(tag.is_empty());
            assert!(asset.is_empty());
            assert!(bundle.is_empty());
            assert_eq!(app_version, env!("CARGO_PKG_VERSION"));
        }
        _ => panic!("expected Update"),
    }
}

#[test]
fn cli_parse_update_repeated_assets() {
    match parse(&[
        "bpatch",
        "update",
        "--version",
        "3",
        "--asset",
        "ui/login.prefab",
        "--asset",
        "scenes/main.unity",
        "--app-version",
        "2.1.0",
    ]) {
        CliCommand::Update {
            asset, app_version, ..
        } => {
            assert_eq!(asset, vec!["ui/login.prefab", "scenes/main.unity"]);
            assert_eq!(app_version, "2.1.0");
        }
        _ => panic!("expected Update"),
    }
}

#[test]
fn cli_parse_update_tags() {
    match parse(&["bpatch", "update", "--version", "3", "--tag", "dlc1", "--tag", "voice"]) {
        CliCommand::Update { tag, .. } => assert_eq!(tag, vec!["dlc1", "voice"]),
        _ => panic!("expected Update"),
    }
}

#[test]
fn cli_update_requires_version() {
    assert!(Cli::try_parse_from(["bpatch", "update"]).is_err());
}

#[test]
fn cli_update_rejects_mixed_selectors() {
    assert!(Cli::try_parse_from([
        "bpatch", "update", "--version", "1", "--tag", "dlc", "--asset", "a.prefab"
    ])
    .is_err());
    assert!(Cli::try_parse_from([
        "bpatch", "update", "--version", "1", "--asset", "a.prefab", "--bundle", "b"
    ])
    .is_err());
}

#[test]
fn request_prefers_explicit_selectors() {
    let args = UpdateArgs {
        assets: vec!["a.prefab".to_string()],
        ..UpdateArgs::default()
    };
    assert_eq!(
        build_request(&args, &["dlc".to_string()]),
        Some(Request::Assets(vec!["a.prefab".to_string()]))
    );

    let args = UpdateArgs {
        bundles: vec!["core".to_string()],
        ..UpdateArgs::default()
    };
    assert_eq!(
        build_request(&args, &[]),
        Some(Request::Bundles(vec!["core".to_string()]))
    );
}

#[test]
fn request_falls_back_to_configured_tags_then_everything() {
    let args = UpdateArgs::default();
    assert_eq!(
        build_request(&args, &["dlc".to_string()]),
        Some(Request::Tags(vec!["dlc".to_string()]))
    );
    assert_eq!(build_request(&args, &[]), None);
}

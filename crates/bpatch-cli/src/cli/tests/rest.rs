//! Tests for status, verify, checksum, clear-cache.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_status() {
    match parse(&["bpatch", "status"]) {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_verify() {
    match parse(&[
        "bpatch",
        "verify",
        "/tmp/bundle.bin",
        "--size",
        "1024",
        "--checksum",
        "CBF43926",
    ]) {
        CliCommand::Verify {
            path,
            size,
            checksum,
        } => {
            assert_eq!(path, PathBuf::from("/tmp/bundle.bin"));
            assert_eq!(size, 1024);
            assert_eq!(checksum, "CBF43926");
        }
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_verify_requires_size_and_checksum() {
    assert!(Cli::try_parse_from(["bpatch", "verify", "/tmp/x"]).is_err());
    assert!(Cli::try_parse_from(["bpatch", "verify", "/tmp/x", "--size", "nope", "--checksum", "0"]).is_err());
}

#[test]
fn cli_parse_checksum() {
    match parse(&["bpatch", "checksum", "/tmp/foo.iso"]) {
        CliCommand::Checksum { path } => assert_eq!(path, PathBuf::from("/tmp/foo.iso")),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_clear_cache() {
    match parse(&["bpatch", "clear-cache"]) {
        CliCommand::ClearCache => {}
        _ => panic!("expected ClearCache"),
    }
}

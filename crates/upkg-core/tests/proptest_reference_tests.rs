//! Property-based tests for reference parsing.
//!
//! These pin the behavioral contract of the parser:
//! - The package name is always the final path component
//! - The version is the tag, or `latest` when there is none
//! - A registry port is never mistaken for a tag

// Integration tests can use unwrap/expect for cleaner assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use upkg_core::{DEFAULT_VERSION, Error, PackageReference};

// =============================================================================
// Strategies
// =============================================================================

fn host_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("localhost".to_string()),
        Just("ghcr.io".to_string()),
        "[a-z]{1,10}\\.[a-z]{2,3}".prop_map(String::from),
    ]
}

fn port_strategy() -> impl Strategy<Value = Option<u16>> {
    prop::option::of(1u16..=65535)
}

fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}([._-][a-z0-9]{1,4}){0,2}".prop_map(String::from)
}

fn tag_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}".prop_map(String::from),
        "[A-Za-z0-9_][A-Za-z0-9._-]{0,20}".prop_map(String::from),
    ]
}

fn registry(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn org_form_yields_repo_and_tag(
        host in host_strategy(),
        port in port_strategy(),
        org in segment_strategy(),
        repo in segment_strategy(),
        tag in tag_strategy(),
    ) {
        let registry = registry(&host, port);
        let raw = format!("{registry}/{org}/{repo}:{tag}");
        let parsed = PackageReference::parse(&raw).unwrap();

        prop_assert_eq!(parsed.registry(), registry.as_str());
        prop_assert_eq!(parsed.repository_path(), org.as_str());
        prop_assert_eq!(parsed.name(), repo.as_str());
        prop_assert_eq!(parsed.version(), tag.as_str());
        prop_assert!(parsed.has_explicit_tag());
        prop_assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn missing_tag_defaults_to_latest(
        host in host_strategy(),
        port in port_strategy(),
        repo in segment_strategy(),
    ) {
        let registry = registry(&host, port);
        let parsed = PackageReference::parse(&format!("{registry}/{repo}")).unwrap();

        prop_assert_eq!(parsed.registry(), registry.as_str());
        prop_assert_eq!(parsed.repository_path(), "");
        prop_assert_eq!(parsed.name(), repo.as_str());
        prop_assert_eq!(parsed.version(), DEFAULT_VERSION);
        prop_assert!(!parsed.has_explicit_tag());
    }

    #[test]
    fn single_segment_is_rejected(repo in segment_strategy(), tag in tag_strategy()) {
        let result = PackageReference::parse(&format!("{repo}:{tag}"));
        prop_assert!(matches!(result, Err(Error::InvalidReference { .. })), "single segment must be rejected");
    }

    #[test]
    fn four_segments_are_rejected(
        host in host_strategy(),
        a in segment_strategy(),
        b in segment_strategy(),
        c in segment_strategy(),
    ) {
        let result = PackageReference::parse(&format!("{host}/{a}/{b}/{c}"));
        prop_assert!(matches!(result, Err(Error::InvalidReference { .. })), "four segments must be rejected");
    }

    #[test]
    fn dot_segments_are_rejected(
        host in host_strategy(),
        dots in prop_oneof![Just("."), Just("..")],
        repo in segment_strategy(),
    ) {
        for raw in [format!("{host}/{dots}/{repo}"), format!("{host}/{repo}/{dots}"), format!("{host}/{dots}")] {
            let result = PackageReference::parse(&raw);
            prop_assert!(matches!(result, Err(Error::InvalidReference { .. })), "{} must be rejected", raw);
        }
    }

    #[test]
    fn parse_is_deterministic(
        host in host_strategy(),
        org in segment_strategy(),
        repo in segment_strategy(),
    ) {
        let raw = format!("{host}/{org}/{repo}");
        prop_assert_eq!(
            PackageReference::parse(&raw).unwrap(),
            PackageReference::parse(&raw).unwrap()
        );
    }
}

//! Property-based tests for the permission algebra.
//!
//! These tests use proptest to verify that the reference permission kinds
//! satisfy the partial-order laws the stack walker relies on.

use cas_permission::{
    permissions_equal, CodeAccessCheck, Endpoint, FileAccess, FilePermission, NetworkAccess,
    NetworkHost, NetworkPermission, NetworkPort, Permission,
};
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Strategy for generating paths from a small tree so prefixes collide often
fn arb_path() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "/",
        "/srv",
        "/srv/data",
        "/srv/data/reports",
        "/srv/database",
        "/home",
        "/home/user",
        "/srv/data/../database",
        "/home/./user/..",
    ])
}

fn arb_file_access() -> impl Strategy<Value = FileAccess> {
    (0u8..16).prop_map(FileAccess::from_bits_truncate)
}

fn arb_file_permission() -> impl Strategy<Value = FilePermission> {
    prop_oneof![
        1 => Just(FilePermission::unrestricted()),
        8 => prop::collection::vec((arb_file_access(), arb_path()), 0..4).prop_map(|entries| {
            entries
                .into_iter()
                .fold(FilePermission::none(), |permission, (access, path)| permission.with(access, path))
        }),
    ]
}

fn arb_host() -> impl Strategy<Value = NetworkHost> {
    prop_oneof![
        Just(NetworkHost::Any),
        Just(NetworkHost::domain("example.com")),
        Just(NetworkHost::domain("api.example.com")),
        Just(NetworkHost::domain("example.org")),
        Just(NetworkHost::IpAddress("127.0.0.1".parse().unwrap())),
    ]
}

fn arb_port() -> impl Strategy<Value = NetworkPort> {
    prop_oneof![
        Just(NetworkPort::Any),
        Just(NetworkPort::Port(80)),
        Just(NetworkPort::Port(443)),
        Just(NetworkPort::Range(80, 443)),
        Just(NetworkPort::Range(400, 500)),
    ]
}

fn arb_network_permission() -> impl Strategy<Value = NetworkPermission> {
    let access = prop_oneof![Just(NetworkAccess::Connect), Just(NetworkAccess::Accept)];
    prop_oneof![
        1 => Just(NetworkPermission::unrestricted()),
        8 => prop::collection::vec((access, arb_host(), arb_port()), 0..4).prop_map(|entries| {
            entries.into_iter().fold(NetworkPermission::none(), |permission, (access, host, port)| {
                permission.with(access, Endpoint::new(host, port))
            })
        }),
    ]
}

fn assert_laws(a: &dyn Permission, b: &dyn Permission, c: &dyn Permission) -> Result<(), TestCaseError> {
    // Reflexivity
    prop_assert!(a.is_subset_of(Some(a)).unwrap());

    // Equality is exactly the double subset relation
    let double_subset = a.is_subset_of(Some(b)).unwrap() && b.is_subset_of(Some(a)).unwrap();
    prop_assert_eq!(permissions_equal(Some(a), Some(b)), double_subset);

    // Intersection lies below both operands
    match a.intersect(Some(b)).unwrap() {
        Some(common) => {
            prop_assert!(common.is_subset_of(Some(a)).unwrap());
            prop_assert!(common.is_subset_of(Some(b)).unwrap());
            prop_assert!(!common.is_bottom());
        },
        None => {
            // Nothing in common means a permission below both is bottom
            if a.is_subset_of(Some(b)).unwrap() {
                prop_assert!(a.is_bottom());
            }
        },
    }

    // Union lies above both operands
    let merged = a.union(Some(b)).unwrap();
    prop_assert!(a.is_subset_of(Some(&*merged)).unwrap());
    prop_assert!(b.is_subset_of(Some(&*merged)).unwrap());

    // Transitivity through intersection and union
    if let Some(common) = a.intersect(Some(b)).unwrap() {
        let wider = a.union(Some(c)).unwrap();
        prop_assert!(common.is_subset_of(Some(&*wider)).unwrap());
    }

    // A non-bottom permission inside a denied set is caught by the deny check
    if a.is_subset_of(Some(b)).unwrap() && !a.is_bottom() {
        prop_assert!(!a.check_deny(Some(b)).unwrap());
    }

    Ok(())
}

proptest! {
    #[test]
    fn prop_file_laws(
        a in arb_file_permission(),
        b in arb_file_permission(),
        c in arb_file_permission(),
    ) {
        init_test_logging();
        assert_laws(&a, &b, &c)?;
    }

    #[test]
    fn prop_network_laws(
        a in arb_network_permission(),
        b in arb_network_permission(),
        c in arb_network_permission(),
    ) {
        init_test_logging();
        assert_laws(&a, &b, &c)?;
    }

    #[test]
    fn prop_union_with_nothing_is_an_equal_copy(a in arb_file_permission()) {
        let copy = a.copy();
        let merged = a.union(None).unwrap();

        prop_assert!(permissions_equal(Some(&*merged), Some(&*copy)));
        prop_assert!(permissions_equal(Some(&*merged), Some(&a)));
        prop_assert!(!std::ptr::addr_eq(&*merged as *const dyn Permission, &a as *const FilePermission));
    }

    #[test]
    fn prop_bottom_matches_subset_of_nothing(a in arb_file_permission()) {
        prop_assert_eq!(a.is_bottom(), a.is_subset_of(None).unwrap());
        prop_assert_eq!(a.is_bottom(), a.intersect(Some(&a)).unwrap().is_none());
    }
}

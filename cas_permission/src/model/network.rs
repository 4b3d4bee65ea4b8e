//! Network permission model.
//!
//! This module defines a reference permission kind for network access,
//! split into outbound (`connect`) and inbound (`accept`) endpoints.

use std::any::Any;
use std::collections::BTreeSet;
use std::net::IpAddr;
use serde::{Serialize, Deserialize};
use cas_core::error::PermissionError;
use cas_core::kind::PermissionKind;

use super::permission::{default_union, downcast_same_kind, Permission};

/// A network host specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkHost {
    /// A specific IPv4 or IPv6 address.
    IpAddress(IpAddr),

    /// A domain name, covering its subdomains. Compared case-insensitively
    /// and without a trailing dot, however it was built.
    Domain(String),

    /// Any host.
    Any,
}

impl NetworkHost {
    /// Create a domain host. Domain names are compared case-insensitively.
    pub fn domain(name: impl AsRef<str>) -> Self {
        Self::Domain(canonical_domain(name.as_ref()))
    }

    /// Check if every host matched by `other` is matched by this host.
    pub fn covers(&self, other: &NetworkHost) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::IpAddress(a), Self::IpAddress(b)) => a == b,
            (Self::Domain(parent), Self::Domain(child)) => {
                let parent = canonical_domain(parent);
                let child = canonical_domain(child);
                child == parent || child.ends_with(&format!(".{}", parent))
            },
            _ => false,
        }
    }

    /// The most general host covered by both hosts, if any.
    fn meet(&self, other: &NetworkHost) -> Option<NetworkHost> {
        if self.covers(other) {
            Some(other.clone())
        } else if other.covers(self) {
            Some(self.clone())
        } else {
            None
        }
    }
}

fn canonical_domain(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// A network port specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkPort {
    /// A specific port.
    Port(u16),

    /// An inclusive range of ports.
    Range(u16, u16),

    /// Any port.
    Any,
}

impl NetworkPort {
    fn bounds(&self) -> (u16, u16) {
        match *self {
            Self::Port(port) => (port, port),
            Self::Range(start, end) => (start.min(end), start.max(end)),
            Self::Any => (u16::MIN, u16::MAX),
        }
    }

    /// Check if every port matched by `other` is matched by this port.
    pub fn covers(&self, other: &NetworkPort) -> bool {
        let (lo, hi) = self.bounds();
        let (other_lo, other_hi) = other.bounds();
        lo <= other_lo && other_hi <= hi
    }

    /// The ports matched by both specifications, if any.
    fn meet(&self, other: &NetworkPort) -> Option<NetworkPort> {
        let (lo, hi) = self.bounds();
        let (other_lo, other_hi) = other.bounds();
        let (lo, hi) = (lo.max(other_lo), hi.min(other_hi));

        match (lo, hi) {
            (lo, hi) if lo > hi => None,
            (lo, hi) if lo == hi => Some(Self::Port(lo)),
            (u16::MIN, u16::MAX) => Some(Self::Any),
            (lo, hi) => Some(Self::Range(lo, hi)),
        }
    }
}

/// A host and port pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// The host.
    pub host: NetworkHost,

    /// The port.
    pub port: NetworkPort,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: NetworkHost, port: NetworkPort) -> Self {
        Self { host, port }
    }

    /// Check if every connection matched by `other` is matched by this endpoint.
    pub fn covers(&self, other: &Endpoint) -> bool {
        self.host.covers(&other.host) && self.port.covers(&other.port)
    }

    fn meet(&self, other: &Endpoint) -> Option<Endpoint> {
        Some(Self {
            host: self.host.meet(&other.host)?,
            port: self.port.meet(&other.port)?,
        })
    }
}

/// Direction of a network access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkAccess {
    /// Outbound connections.
    Connect,

    /// Inbound connections.
    Accept,
}

/// A permission that grants access to the network.
///
/// Coverage is decided per endpoint: a granted endpoint must cover a
/// demanded one on its own. Two adjacent port ranges are not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPermission {
    /// Whether every connection in either direction is granted.
    unrestricted: bool,

    /// Endpoints outbound connections may target.
    connect: BTreeSet<Endpoint>,

    /// Endpoints inbound connections may arrive on.
    accept: BTreeSet<Endpoint>,
}

impl NetworkPermission {
    /// Create a network permission granting every connection.
    pub fn unrestricted() -> Self {
        Self {
            unrestricted: true,
            ..Self::default()
        }
    }

    /// Create a network permission granting nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create an outbound-only network permission.
    ///
    /// # Arguments
    ///
    /// * `endpoints` - The endpoints that may be connected to.
    ///
    /// # Returns
    ///
    /// A new outbound-only network permission.
    pub fn connect_to(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Self {
            connect: endpoints.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Create an inbound-only network permission.
    pub fn accept_on(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Self {
            accept: endpoints.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Grant `access` to `endpoint` in addition to what is already granted.
    pub fn add(&mut self, access: NetworkAccess, endpoint: Endpoint) {
        if self.unrestricted {
            return;
        }
        match access {
            NetworkAccess::Connect => self.connect.insert(endpoint),
            NetworkAccess::Accept => self.accept.insert(endpoint),
        };
    }

    /// Builder form of [`NetworkPermission::add`].
    pub fn with(mut self, access: NetworkAccess, endpoint: Endpoint) -> Self {
        self.add(access, endpoint);
        self
    }

    /// Whether every connection is granted.
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// The endpoints granted for `access`.
    pub fn endpoints(&self, access: NetworkAccess) -> &BTreeSet<Endpoint> {
        match access {
            NetworkAccess::Connect => &self.connect,
            NetworkAccess::Accept => &self.accept,
        }
    }

    /// Check if a connection to `host:port` in direction `access` is granted.
    pub fn permits(&self, access: NetworkAccess, host: &NetworkHost, port: u16) -> bool {
        if self.unrestricted {
            return true;
        }
        let requested = Endpoint::new(host.clone(), NetworkPort::Port(port));
        self.endpoints(access).iter().any(|granted| granted.covers(&requested))
    }

    fn grants_nothing(&self) -> bool {
        !self.unrestricted && self.connect.is_empty() && self.accept.is_empty()
    }

    fn covered_by(ours: &BTreeSet<Endpoint>, theirs: &BTreeSet<Endpoint>) -> bool {
        ours.iter().all(|endpoint| theirs.iter().any(|granted| granted.covers(endpoint)))
    }

    fn meet_all(ours: &BTreeSet<Endpoint>, theirs: &BTreeSet<Endpoint>) -> BTreeSet<Endpoint> {
        ours.iter()
            .flat_map(|a| theirs.iter().filter_map(move |b| a.meet(b)))
            .collect()
    }
}

impl Permission for NetworkPermission {
    fn kind(&self) -> PermissionKind {
        PermissionKind::Network
    }

    fn copy(&self) -> Box<dyn Permission> {
        Box::new(self.clone())
    }

    fn intersect(
        &self,
        other: Option<&dyn Permission>,
    ) -> Result<Option<Box<dyn Permission>>, PermissionError> {
        let Some(other) = other else {
            return Ok(None);
        };
        let other = downcast_same_kind(self, other)?;

        let common = if self.unrestricted {
            other.clone()
        } else if other.unrestricted {
            self.clone()
        } else {
            Self {
                unrestricted: false,
                connect: Self::meet_all(&self.connect, &other.connect),
                accept: Self::meet_all(&self.accept, &other.accept),
            }
        };

        if common.grants_nothing() {
            Ok(None)
        } else {
            Ok(Some(Box::new(common)))
        }
    }

    fn is_subset_of(&self, other: Option<&dyn Permission>) -> Result<bool, PermissionError> {
        let Some(other) = other else {
            return Ok(self.grants_nothing());
        };
        let other = downcast_same_kind(self, other)?;

        if other.unrestricted {
            return Ok(true);
        }
        if self.unrestricted {
            return Ok(false);
        }

        Ok(Self::covered_by(&self.connect, &other.connect)
            && Self::covered_by(&self.accept, &other.accept))
    }

    fn union(&self, other: Option<&dyn Permission>) -> Result<Box<dyn Permission>, PermissionError> {
        let Some(other) = other.filter(|other| self.verify_type(Some(*other))) else {
            return default_union(self, other);
        };
        let other = downcast_same_kind(self, other)?;

        if self.unrestricted || other.unrestricted {
            return Ok(Box::new(Self::unrestricted()));
        }

        Ok(Box::new(Self {
            unrestricted: false,
            connect: self.connect.union(&other.connect).cloned().collect(),
            accept: self.accept.union(&other.accept).cloned().collect(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn https(host: &str) -> Endpoint {
        Endpoint::new(NetworkHost::domain(host), NetworkPort::Port(443))
    }

    #[test]
    fn test_raw_domain_variant_compares_canonically() {
        let raw = NetworkHost::Domain("Example.COM.".into());
        let built = NetworkHost::domain("example.com");

        assert!(raw.covers(&built));
        assert!(built.covers(&raw));
        assert!(raw.covers(&NetworkHost::Domain("API.example.com".into())));
        assert!(!raw.covers(&NetworkHost::domain("badexample.com")));

        let granted = NetworkPermission::connect_to([Endpoint::new(raw, NetworkPort::Any)]);
        let demanded = NetworkPermission::connect_to([https("api.example.com")]);
        assert!(demanded.is_subset_of(Some(&granted)).unwrap());
    }

    #[test]
    fn test_host_coverage() {
        let parent = NetworkHost::domain("Example.com");
        assert!(parent.covers(&NetworkHost::domain("api.example.com")));
        assert!(parent.covers(&NetworkHost::domain("example.com.")));
        assert!(!parent.covers(&NetworkHost::domain("badexample.com")));
        assert!(!parent.covers(&NetworkHost::Any));
        assert!(NetworkHost::Any.covers(&parent));
    }

    #[test]
    fn test_port_meet() {
        let range = NetworkPort::Range(8000, 8100);
        assert_eq!(range.meet(&NetworkPort::Port(8080)), Some(NetworkPort::Port(8080)));
        assert_eq!(range.meet(&NetworkPort::Range(8050, 9000)), Some(NetworkPort::Range(8050, 8100)));
        assert_eq!(range.meet(&NetworkPort::Port(22)), None);
        assert_eq!(NetworkPort::Any.meet(&NetworkPort::Any), Some(NetworkPort::Any));
    }

    #[test]
    fn test_permits() {
        let permission = NetworkPermission::connect_to([Endpoint::new(
            NetworkHost::domain("example.com"),
            NetworkPort::Range(80, 443),
        )]);

        assert!(permission.permits(NetworkAccess::Connect, &NetworkHost::domain("www.example.com"), 443));
        assert!(!permission.permits(NetworkAccess::Connect, &NetworkHost::domain("example.org"), 443));
        assert!(!permission.permits(NetworkAccess::Accept, &NetworkHost::domain("example.com"), 80));
    }

    #[test]
    fn test_subset_is_per_direction() {
        let outbound = NetworkPermission::connect_to([https("example.com")]);
        let inbound = NetworkPermission::accept_on([https("example.com")]);
        let wide = NetworkPermission::connect_to([Endpoint::new(NetworkHost::Any, NetworkPort::Any)]);

        assert!(outbound.is_subset_of(Some(&wide)).unwrap());
        assert!(!inbound.is_subset_of(Some(&wide)).unwrap());
        assert!(!wide.is_subset_of(Some(&outbound)).unwrap());
    }

    #[test]
    fn test_intersect_narrows_endpoints() {
        let a = NetworkPermission::connect_to([Endpoint::new(
            NetworkHost::domain("example.com"),
            NetworkPort::Any,
        )]);
        let b = NetworkPermission::connect_to([https("api.example.com"), https("example.org")]);

        let common = a.intersect(Some(&b)).unwrap().unwrap();
        let common = common.as_any().downcast_ref::<NetworkPermission>().unwrap();
        assert_eq!(
            common.endpoints(NetworkAccess::Connect).iter().collect::<Vec<_>>(),
            vec![&https("api.example.com")]
        );
        assert!(common.is_subset_of(Some(&a)).unwrap());
        assert!(common.is_subset_of(Some(&b)).unwrap());
    }

    #[test]
    fn test_intersect_disjoint_is_none() {
        let a = NetworkPermission::connect_to([https("example.com")]);
        let b = NetworkPermission::accept_on([https("example.com")]);
        assert!(a.intersect(Some(&b)).unwrap().is_none());
    }

    #[test]
    fn test_union() {
        let a = NetworkPermission::connect_to([https("example.com")]);
        let b = NetworkPermission::accept_on([https("example.org")]);

        let merged = a.union(Some(&b)).unwrap();
        assert!(a.is_subset_of(Some(&*merged)).unwrap());
        assert!(b.is_subset_of(Some(&*merged)).unwrap());
        assert!(!merged.is_subset_of(Some(&a)).unwrap());
    }

    #[test]
    fn test_bottom() {
        assert!(NetworkPermission::none().is_subset_of(None).unwrap());
        assert!(!NetworkPermission::unrestricted().is_subset_of(None).unwrap());
        assert!(NetworkPermission::unrestricted()
            .intersect(Some(&NetworkPermission::none()))
            .unwrap()
            .is_none());
    }
}

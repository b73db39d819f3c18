/*
    Classifier - maps a raw announced identifier to a trust category

    Rules are evaluated top to bottom and the first match wins:

      1. SelfIdentity   raw (trimmed) equals our own full identifier
      2. ServerManaged  raw contains a cloud platform marker (e.g. "appspot")
      3. TrustedPeer    raw starts with "<our account>/"
      4. AnonymousPeer  raw contains '@'
      5. GeneralDirect  anything else, parsed as host:port

    Matching and building are separate steps: a rule only decides whether it
    applies, then the category builds (and validates) its value. A candidate
    that matches a rule but fails to build is rejected outright rather than
    falling through to the next rule.
*/

use std::fmt;

use super::errors::ClassificationError;
use super::identifier::{account_of, DirectEndpoint, PeerUri};

/// Trust category of a classified candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Our own identifier; never admitted anywhere
    SelfIdentity,
    /// Cloud hosted proxy, fixed at the well-known port
    ServerManaged(DirectEndpoint),
    /// Peer in our own account namespace
    TrustedPeer(PeerUri),
    /// Any other peer
    AnonymousPeer(PeerUri),
    /// Bare `host:port` proxy
    GeneralDirect(DirectEndpoint),
}

/// Category tag without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    SelfIdentity,
    ServerManaged,
    TrustedPeer,
    AnonymousPeer,
    GeneralDirect,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::SelfIdentity => "self",
            CategoryKind::ServerManaged => "server_managed",
            CategoryKind::TrustedPeer => "trusted_peer",
            CategoryKind::AnonymousPeer => "anonymous_peer",
            CategoryKind::GeneralDirect => "general_direct",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Classification {
    pub fn kind(&self) -> CategoryKind {
        match self {
            Classification::SelfIdentity => CategoryKind::SelfIdentity,
            Classification::ServerManaged(_) => CategoryKind::ServerManaged,
            Classification::TrustedPeer(_) => CategoryKind::TrustedPeer,
            Classification::AnonymousPeer(_) => CategoryKind::AnonymousPeer,
            Classification::GeneralDirect(_) => CategoryKind::GeneralDirect,
        }
    }
}

type Matcher = fn(&str, &Classifier) -> bool;

/// One row of the rule table
struct Rule {
    kind: CategoryKind,
    matches: Matcher,
}

const RULES: &[Rule] = &[
    Rule {
        kind: CategoryKind::SelfIdentity,
        matches: |raw, c| raw == c.self_identifier,
    },
    Rule {
        kind: CategoryKind::ServerManaged,
        matches: |raw, c| c.cloud_markers.iter().any(|m| raw.contains(m.as_str())),
    },
    Rule {
        kind: CategoryKind::TrustedPeer,
        matches: |raw, c| raw.starts_with(&c.namespace_prefix),
    },
    Rule {
        kind: CategoryKind::AnonymousPeer,
        matches: |raw, _| raw.contains('@'),
    },
    Rule {
        kind: CategoryKind::GeneralDirect,
        matches: |_, _| true,
    },
];

/// Classifies announced identifiers relative to our own identity
#[derive(Debug, Clone)]
pub struct Classifier {
    self_identifier: String,
    namespace_prefix: String,
    cloud_markers: Vec<String>,
    server_managed_port: u16,
}

impl Classifier {
    /// Create a classifier for the given full self identifier
    /// (`bob@example.com/-lan-ABCD`)
    pub fn new(
        self_identifier: impl Into<String>,
        cloud_markers: Vec<String>,
        server_managed_port: u16,
    ) -> Self {
        let self_identifier = self_identifier.into().trim().to_string();
        let namespace_prefix = format!("{}/", account_of(&self_identifier));
        Self {
            self_identifier,
            namespace_prefix,
            cloud_markers,
            server_managed_port,
        }
    }

    pub fn self_identifier(&self) -> &str {
        &self.self_identifier
    }

    /// `true` if the identifier is our own
    pub fn is_self(&self, raw: &str) -> bool {
        raw.trim() == self.self_identifier
    }

    /// Classify a raw candidate identifier
    pub fn classify(&self, raw: &str) -> Result<Classification, ClassificationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ClassificationError::Empty);
        }

        let rule = RULES
            .iter()
            .find(|rule| (rule.matches)(raw, self))
            .map(|rule| rule.kind)
            .unwrap_or(CategoryKind::GeneralDirect);

        self.build(rule, raw)
    }

    fn build(&self, kind: CategoryKind, raw: &str) -> Result<Classification, ClassificationError> {
        Ok(match kind {
            CategoryKind::SelfIdentity => Classification::SelfIdentity,
            CategoryKind::ServerManaged => Classification::ServerManaged(DirectEndpoint::new(
                raw,
                raw,
                self.server_managed_port,
            )),
            CategoryKind::TrustedPeer => Classification::TrustedPeer(PeerUri::parse(raw)?),
            CategoryKind::AnonymousPeer => Classification::AnonymousPeer(PeerUri::parse(raw)?),
            CategoryKind::GeneralDirect => Classification::GeneralDirect(DirectEndpoint::parse(raw)?),
        })
    }
}

//! RSpec policy hook.
//!
//! Incoming allocation requests and outgoing RSpecs pass through a named
//! chain. A chain returns the (possibly rewritten) RSpec or vetoes the call.

use std::fmt;

use async_trait::async_trait;

use crate::config::InterfaceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Incoming,
    Outgoing,
    ForwardIncoming,
    ForwardOutgoing,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Incoming => "INCOMING",
            Chain::Outgoing => "OUTGOING",
            Chain::ForwardIncoming => "FORWARD-INCOMING",
            Chain::ForwardOutgoing => "FORWARD-OUTGOING",
        }
    }

    /// Aggregates run the plain chains, slice managers the forwarding ones.
    pub fn incoming(interface: InterfaceKind) -> Self {
        match interface {
            InterfaceKind::Aggregate => Chain::Incoming,
            InterfaceKind::Slicemgr => Chain::ForwardIncoming,
        }
    }

    pub fn outgoing(interface: InterfaceKind) -> Self {
        match interface {
            InterfaceKind::Aggregate => Chain::Outgoing,
            InterfaceKind::Slicemgr => Chain::ForwardOutgoing,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("{chain} chain rejected the rspec: {reason}")]
    Rejected { chain: Chain, reason: String },

    /// The filter itself failed, e.g. on an RSpec it could not read.
    #[error("policy filter failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait PolicyFilter: Send + Sync {
    async fn run_chain(
        &self,
        chain: Chain,
        target_hrn: &str,
        caller_hrn: &str,
        rspec: &str,
    ) -> Result<String, PolicyError>;
}

/// Returns every RSpec unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl PolicyFilter for PassThrough {
    async fn run_chain(
        &self,
        _chain: Chain,
        _target_hrn: &str,
        _caller_hrn: &str,
        rspec: &str,
    ) -> Result<String, PolicyError> {
        Ok(rspec.to_string())
    }
}

/// Vetoes any RSpec on the listed chains that mentions one of the
/// blacklisted strings (typically component URNs).
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    chains: Vec<Chain>,
    denied: Vec<String>,
}

impl Blacklist {
    pub fn new(chains: &[Chain]) -> Self {
        Blacklist {
            chains: chains.to_vec(),
            denied: Vec::new(),
        }
    }

    pub fn deny(mut self, needle: impl Into<String>) -> Self {
        self.denied.push(needle.into());
        self
    }
}

#[async_trait]
impl PolicyFilter for Blacklist {
    async fn run_chain(
        &self,
        chain: Chain,
        target_hrn: &str,
        caller_hrn: &str,
        rspec: &str,
    ) -> Result<String, PolicyError> {
        if !self.chains.contains(&chain) {
            return Ok(rspec.to_string());
        }
        match self.denied.iter().find(|d| rspec.contains(d.as_str())) {
            Some(hit) => Err(PolicyError::Rejected {
                chain,
                reason: format!("{caller_hrn} may not use {hit} on {target_hrn}"),
            }),
            None => Ok(rspec.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_follow_interface() {
        assert_eq!(Chain::incoming(InterfaceKind::Aggregate), Chain::Incoming);
        assert_eq!(
            Chain::outgoing(InterfaceKind::Slicemgr).to_string(),
            "FORWARD-OUTGOING"
        );
    }

    #[tokio::test]
    async fn blacklist_only_watches_its_chains() {
        let policy = Blacklist::new(&[Chain::Incoming]).deny("node+bad");
        let rspec = "<rspec><node component_id=\"urn:publicid:IDN+x+node+bad\"/></rspec>";
        let vetoed = policy.run_chain(Chain::Incoming, "x", "x.alice", rspec).await;
        assert!(matches!(vetoed, Err(PolicyError::Rejected { chain: Chain::Incoming, .. })));
        let passed = policy.run_chain(Chain::Outgoing, "x", "x.alice", rspec).await;
        assert_eq!(passed.unwrap(), rspec);
        assert_eq!(
            PassThrough.run_chain(Chain::Incoming, "x", "y", rspec).await.unwrap(),
            rspec
        );
    }
}

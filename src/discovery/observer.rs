//! Receivers of scan results.

use crate::core::ScoutResult;
use crate::discovery::head::{Head, Revision};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Names one head an observer is interested in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeadSelector {
    Branch {
        name: String,
    },
    Tag {
        name: String,
    },
    /// Every strategy of one pull request
    PullRequest {
        number: u64,
        #[serde(default)]
        source_owner: Option<String>,
        #[serde(default)]
        source_branch: Option<String>,
        #[serde(default)]
        target_branch: Option<String>,
    },
}

impl HeadSelector {
    pub fn branch(name: impl Into<String>) -> Self {
        HeadSelector::Branch { name: name.into() }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        HeadSelector::Tag { name: name.into() }
    }

    pub fn pull_request(number: u64) -> Self {
        HeadSelector::PullRequest {
            number,
            source_owner: None,
            source_branch: None,
            target_branch: None,
        }
    }

    pub fn matches(&self, head: &Head) -> bool {
        match (self, head) {
            (HeadSelector::Branch { name }, Head::Branch { name: head_name }) => name == head_name,
            (HeadSelector::Tag { name }, Head::Tag(tag)) => *name == tag.name,
            (HeadSelector::PullRequest { number, .. }, Head::PullRequest(pr)) => *number == pr.number,
            _ => false,
        }
    }
}

/// An accepted head with its revision and trust
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub head: Head,
    pub revision: Revision,
    pub trusted: bool,
}

/// Receives accepted heads from a scan
#[async_trait]
pub trait HeadObserver: Send {
    /// Heads the observer wants; `None` means all of them
    fn includes(&self) -> Option<Vec<HeadSelector>> {
        None
    }

    async fn observe(&mut self, observation: Observation) -> ScoutResult<()>;

    /// `false` once the observer needs nothing more
    fn is_observing(&self) -> bool {
        true
    }
}

/// Collects observations in memory, one per head
#[derive(Debug, Default)]
pub struct CollectingObserver {
    includes: Option<Vec<HeadSelector>>,
    limit: Option<usize>,
    seen: HashSet<Head>,
    observations: Vec<Observation>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only collect the selected heads
    pub fn including(mut self, selectors: Vec<HeadSelector>) -> Self {
        self.includes = Some(selectors);
        self
    }

    /// Stop observing after `limit` heads
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    /// Names of the collected heads in observation order
    pub fn head_names(&self) -> Vec<String> {
        self.observations
            .iter()
            .map(|o| o.head.name().to_string())
            .collect()
    }
}

#[async_trait]
impl HeadObserver for CollectingObserver {
    fn includes(&self) -> Option<Vec<HeadSelector>> {
        self.includes.clone()
    }

    async fn observe(&mut self, observation: Observation) -> ScoutResult<()> {
        if self.seen.insert(observation.head.clone()) {
            self.observations.push(observation);
        }
        Ok(())
    }

    fn is_observing(&self) -> bool {
        self.limit
            .map(|limit| self.observations.len() < limit)
            .unwrap_or(true)
    }
}

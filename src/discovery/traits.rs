//! Source traits: the configurable policy units a scan is built from.

use crate::discovery::checkout::CheckoutSpec;
use crate::discovery::context::DiscoveryContext;
use crate::discovery::filter::{Authority, ForkTrust, HeadFilter, HeadRegex, Prefilter};
use crate::discovery::head::{CheckoutStrategy, HeadKind};
use crate::notification::NotificationStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which origin branches are discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchDiscoveryStrategy {
    /// Branches that are not also filed as pull requests
    #[default]
    ExcludePullRequests,
    /// Only branches that are also filed as pull requests
    OnlyPullRequests,
    AllBranches,
}

fn default_strategies() -> BTreeSet<CheckoutStrategy> {
    BTreeSet::from([CheckoutStrategy::Merge])
}

fn default_includes() -> String {
    "*".to_string()
}

/// One policy unit of a scan
///
/// Traits are applied in order to a [`DiscoveryContext`]; every trait is a
/// pure `context -> context` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceTrait {
    BranchDiscovery {
        #[serde(default)]
        strategy: BranchDiscoveryStrategy,
    },
    OriginPullRequestDiscovery {
        #[serde(default = "default_strategies")]
        strategies: BTreeSet<CheckoutStrategy>,
    },
    ForkPullRequestDiscovery {
        #[serde(default = "default_strategies")]
        strategies: BTreeSet<CheckoutStrategy>,
        #[serde(default)]
        trust: ForkTrust,
    },
    TagDiscovery,
    WildcardHeadFilter {
        #[serde(default = "default_includes")]
        includes: String,
        #[serde(default)]
        excludes: String,
    },
    RegexHeadFilter {
        pattern: HeadRegex,
    },
    PullRequestLabelFilter {
        #[serde(default = "default_includes")]
        includes: String,
        #[serde(default)]
        excludes: String,
    },
    IgnoreDraftPullRequests,
    HeadAgeFilter {
        max_days_old: i64,
    },
    NotificationStrategies {
        strategies: Vec<NotificationStrategy>,
    },
    PreventNotifications,
    /// Keep scanning past heads whose processing fails
    IgnoreHeadErrors {
        #[serde(default)]
        branches: bool,
        #[serde(default)]
        pull_requests: bool,
        #[serde(default)]
        tags: bool,
    },
    SshCheckout {
        #[serde(default)]
        credentials_id: Option<String>,
    },
}

impl SourceTrait {
    /// Contribute to a discovery context
    pub fn decorate(&self, ctx: DiscoveryContext) -> DiscoveryContext {
        match self {
            SourceTrait::BranchDiscovery { strategy } => {
                let ctx = ctx.want_branches(true).with_authority(Authority::Branch);
                match strategy {
                    BranchDiscoveryStrategy::ExcludePullRequests => ctx
                        .want_origin_prs(true)
                        .with_filter(HeadFilter::ExcludeOriginPullRequestBranches),
                    BranchDiscoveryStrategy::OnlyPullRequests => ctx
                        .want_origin_prs(true)
                        .with_filter(HeadFilter::OnlyOriginPullRequestBranches),
                    BranchDiscoveryStrategy::AllBranches => ctx,
                }
            }
            SourceTrait::OriginPullRequestDiscovery { strategies } => ctx
                .want_origin_prs(true)
                .with_origin_pr_strategies(strategies.iter().copied())
                .with_authority(Authority::OriginPullRequest),
            SourceTrait::ForkPullRequestDiscovery { strategies, trust } => ctx
                .want_fork_prs(true)
                .with_fork_pr_strategies(strategies.iter().copied())
                .with_authority(Authority::ForkPullRequest(*trust)),
            SourceTrait::TagDiscovery => ctx.want_tags(true).with_authority(Authority::Tag),
            SourceTrait::WildcardHeadFilter { includes, excludes } => {
                ctx.with_prefilter(Prefilter::Wildcard {
                    includes: includes.clone(),
                    excludes: excludes.clone(),
                })
            }
            SourceTrait::RegexHeadFilter { pattern } => {
                ctx.with_prefilter(Prefilter::Regex(pattern.clone()))
            }
            SourceTrait::PullRequestLabelFilter { includes, excludes } => {
                ctx.with_filter(HeadFilter::PullRequestLabels {
                    includes: includes.clone(),
                    excludes: excludes.clone(),
                })
            }
            SourceTrait::IgnoreDraftPullRequests => ctx.with_filter(HeadFilter::IgnoreDrafts),
            SourceTrait::HeadAgeFilter { max_days_old } => ctx
                .with_filter(HeadFilter::HeadAge {
                    max_days_old: *max_days_old,
                })
                .with_authority(Authority::OriginHeads),
            SourceTrait::NotificationStrategies { strategies } => {
                ctx.with_notification_strategies(strategies.clone())
            }
            SourceTrait::PreventNotifications => ctx.with_notification_strategies(Vec::new()),
            SourceTrait::IgnoreHeadErrors {
                branches,
                pull_requests,
                tags,
            } => ctx.with_ignored_head_errors(
                [
                    (*branches, HeadKind::Branch),
                    (*pull_requests, HeadKind::PullRequest),
                    (*tags, HeadKind::Tag),
                ]
                .into_iter()
                .filter_map(|(ignore, kind)| ignore.then_some(kind)),
            ),
            SourceTrait::SshCheckout { .. } => ctx,
        }
    }

    /// Contribute to how a discovered head is checked out
    pub fn decorate_checkout(&self, spec: CheckoutSpec) -> CheckoutSpec {
        match self {
            SourceTrait::SshCheckout { credentials_id } => spec.over_ssh(credentials_id.clone()),
            _ => spec,
        }
    }
}

/// The traits a new source starts with
pub fn default_traits() -> Vec<SourceTrait> {
    vec![
        SourceTrait::BranchDiscovery {
            strategy: BranchDiscoveryStrategy::ExcludePullRequests,
        },
        SourceTrait::OriginPullRequestDiscovery {
            strategies: default_strategies(),
        },
        SourceTrait::ForkPullRequestDiscovery {
            strategies: default_strategies(),
            trust: ForkTrust::Contributors,
        },
    ]
}

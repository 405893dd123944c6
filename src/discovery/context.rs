//! Accumulates what source traits ask a scan to do.

use crate::discovery::filter::{Authority, HeadFilter, Prefilter};
use crate::discovery::head::{CheckoutStrategy, HeadKind};
use crate::discovery::traits::SourceTrait;
use crate::notification::NotificationStrategy;
use std::collections::BTreeSet;

/// Discovery settings built by folding traits over a fresh context
///
/// "Want" flags only ever go from `false` to `true`. Notifications are
/// disabled exactly when the strategy list is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryContext {
    want_branches: bool,
    want_tags: bool,
    want_origin_prs: bool,
    want_fork_prs: bool,
    origin_pr_strategies: BTreeSet<CheckoutStrategy>,
    fork_pr_strategies: BTreeSet<CheckoutStrategy>,
    prefilters: Vec<Prefilter>,
    filters: Vec<HeadFilter>,
    authorities: Vec<Authority>,
    notification_strategies: Vec<NotificationStrategy>,
    ignored_head_errors: BTreeSet<HeadKind>,
}

impl Default for DiscoveryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryContext {
    pub fn new() -> Self {
        Self {
            want_branches: false,
            want_tags: false,
            want_origin_prs: false,
            want_fork_prs: false,
            origin_pr_strategies: BTreeSet::new(),
            fork_pr_strategies: BTreeSet::new(),
            prefilters: Vec::new(),
            filters: Vec::new(),
            authorities: Vec::new(),
            notification_strategies: vec![NotificationStrategy::Default],
            ignored_head_errors: BTreeSet::new(),
        }
    }

    /// Apply traits in order
    pub fn apply(self, traits: &[SourceTrait]) -> Self {
        traits.iter().fold(self, |ctx, t| t.decorate(ctx))
    }

    pub fn want_branches(mut self, include: bool) -> Self {
        self.want_branches |= include;
        self
    }

    pub fn want_tags(mut self, include: bool) -> Self {
        self.want_tags |= include;
        self
    }

    pub fn want_origin_prs(mut self, include: bool) -> Self {
        self.want_origin_prs |= include;
        self
    }

    pub fn want_fork_prs(mut self, include: bool) -> Self {
        self.want_fork_prs |= include;
        self
    }

    pub fn with_origin_pr_strategies(
        mut self,
        strategies: impl IntoIterator<Item = CheckoutStrategy>,
    ) -> Self {
        self.origin_pr_strategies.extend(strategies);
        self
    }

    pub fn with_fork_pr_strategies(
        mut self,
        strategies: impl IntoIterator<Item = CheckoutStrategy>,
    ) -> Self {
        self.fork_pr_strategies.extend(strategies);
        self
    }

    pub fn with_prefilter(mut self, prefilter: Prefilter) -> Self {
        self.prefilters.push(prefilter);
        self
    }

    pub fn with_filter(mut self, filter: HeadFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authorities.push(authority);
        self
    }

    /// Skip heads of these kinds that fail to process
    pub fn with_ignored_head_errors(mut self, kinds: impl IntoIterator<Item = HeadKind>) -> Self {
        self.ignored_head_errors.extend(kinds);
        self
    }

    /// Add a strategy unless an equal one is already registered
    pub fn with_notification_strategy(mut self, strategy: NotificationStrategy) -> Self {
        if !self.notification_strategies.contains(&strategy) {
            self.notification_strategies.push(strategy);
        }
        self
    }

    /// Replace the strategy list; an empty list disables notifications
    pub fn with_notification_strategies(mut self, strategies: Vec<NotificationStrategy>) -> Self {
        self.notification_strategies.clear();
        strategies
            .into_iter()
            .fold(self, |ctx, s| ctx.with_notification_strategy(s))
    }

    pub fn wants_branches(&self) -> bool {
        self.want_branches
    }

    pub fn wants_tags(&self) -> bool {
        self.want_tags
    }

    pub fn wants_origin_prs(&self) -> bool {
        self.want_origin_prs
    }

    pub fn wants_fork_prs(&self) -> bool {
        self.want_fork_prs
    }

    pub fn wants_prs(&self) -> bool {
        self.want_origin_prs || self.want_fork_prs
    }

    pub fn origin_pr_strategies(&self) -> &BTreeSet<CheckoutStrategy> {
        &self.origin_pr_strategies
    }

    pub fn fork_pr_strategies(&self) -> &BTreeSet<CheckoutStrategy> {
        &self.fork_pr_strategies
    }

    pub fn prefilters(&self) -> &[Prefilter] {
        &self.prefilters
    }

    pub fn filters(&self) -> &[HeadFilter] {
        &self.filters
    }

    pub fn authorities(&self) -> &[Authority] {
        &self.authorities
    }

    pub fn notification_strategies(&self) -> &[NotificationStrategy] {
        &self.notification_strategies
    }

    pub fn ignored_head_errors(&self) -> &BTreeSet<HeadKind> {
        &self.ignored_head_errors
    }

    pub fn notifications_disabled(&self) -> bool {
        self.notification_strategies.is_empty()
    }
}

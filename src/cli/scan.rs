use clap::Args;
use ghscout::core::ScoutResult;
use ghscout::di::ServiceContainer;
use ghscout::discovery::{
    run as run_scan, CheckoutSpec, CollectingObserver, HeadObserver, HeadSelector, Observation,
    ScanSummary,
};
use ghscout::notification::{self, BuildOutcome, BuildResult};
use serde::Serialize;
use std::path::Path;
use tokio::sync::watch;

#[derive(Args, Debug, Default)]
pub struct ScanOptions {
    /// Only this branch (repeatable)
    #[arg(long = "branch")]
    pub branches: Vec<String>,
    /// Only this tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Only this pull request number (repeatable)
    #[arg(long = "pr")]
    pub pull_requests: Vec<u64>,
    /// Stop after this many heads
    #[arg(long)]
    pub limit: Option<usize>,
    /// Print how each head would be checked out
    #[arg(long)]
    pub checkout: bool,
    /// Publish commit statuses for trusted heads
    #[arg(long)]
    pub notify: bool,
    /// Build result to report with --notify (omit for "scheduled")
    #[arg(long, value_parser = parse_build_result, requires = "notify")]
    pub build_result: Option<BuildResult>,
    /// Build URL to link from the statuses
    #[arg(long, requires = "notify")]
    pub build_url: Option<String>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_build_result(value: &str) -> Result<BuildResult, String> {
    match value.to_ascii_lowercase().replace('-', "_").as_str() {
        "success" => Ok(BuildResult::Success),
        "unstable" => Ok(BuildResult::Unstable),
        "failure" => Ok(BuildResult::Failure),
        "aborted" => Ok(BuildResult::Aborted),
        "not_built" => Ok(BuildResult::NotBuilt),
        other => Err(format!(
            "unknown build result '{}' (expected success, unstable, failure, aborted or not_built)",
            other
        )),
    }
}

impl ScanOptions {
    fn selectors(&self) -> Option<Vec<HeadSelector>> {
        let selectors: Vec<HeadSelector> = self
            .branches
            .iter()
            .map(HeadSelector::branch)
            .chain(self.tags.iter().map(HeadSelector::tag))
            .chain(self.pull_requests.iter().map(|n| HeadSelector::pull_request(*n)))
            .collect();
        (!selectors.is_empty()).then_some(selectors)
    }
}

#[derive(Serialize)]
struct HeadReport {
    #[serde(flatten)]
    observation: Observation,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkout: Option<CheckoutSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statuses_published: Option<usize>,
}

#[derive(Serialize)]
struct ScanReport {
    repository: String,
    summary: ScanSummary,
    heads: Vec<HeadReport>,
}

pub async fn run(config: Option<&Path>, options: ScanOptions) -> ScoutResult<()> {
    let container = ServiceContainer::new(config)?;

    let mut observer = CollectingObserver::new();
    if let Some(selectors) = options.selectors() {
        observer = observer.including(selectors);
    }
    if let Some(limit) = options.limit {
        observer = observer.with_limit(limit);
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let request = container
        .discovery_request(observer.includes())?
        .with_cancellation(cancel_rx);
    let summary = run_scan(&request, &mut observer).await;
    let repository = match &summary {
        Ok(_) if options.checkout => request.repository().await?,
        _ => None,
    };
    let strategies = request.notification_strategies().to_vec();
    request.close();
    let summary = summary?;

    let build = options.build_result.map(|result| BuildOutcome {
        url: options.build_url.clone(),
        result: Some(result),
    });

    let mut heads = Vec::new();
    for observation in observer.into_observations() {
        let checkout = match &repository {
            Some(repository) => {
                match CheckoutSpec::for_head(
                    repository,
                    &observation.head,
                    &observation.revision,
                    None,
                ) {
                    Ok(spec) => Some(spec.apply(container.config().traits())),
                    Err(e) => {
                        tracing::warn!(head = %observation.head, error = %e, "no checkout");
                        None
                    }
                }
            }
            None => None,
        };

        let statuses_published = if options.notify && observation.trusted {
            let payloads = notification::compute(
                &strategies,
                &observation.head,
                build.as_ref(),
                options.build_url.as_deref(),
            );
            Some(
                notification::publish(
                    container.client.as_ref(),
                    &observation.revision,
                    &payloads,
                )
                .await?,
            )
        } else {
            None
        };

        heads.push(HeadReport {
            observation,
            checkout,
            statuses_published,
        });
    }

    let report = ScanReport {
        repository: container.config().repository()?.to_string(),
        summary,
        heads,
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("Scanned {}", report.repository);
    println!();

    if report.heads.is_empty() {
        println!("  No heads discovered");
    }
    for head in &report.heads {
        let observation = &head.observation;
        let trust = if observation.trusted { "" } else { "  (untrusted)" };
        println!(
            "  {:<13} {:<28} {}{}",
            observation.head.kind().to_string(),
            observation.head.name(),
            observation.revision,
            trust
        );
        if let Some(checkout) = &head.checkout {
            println!("      remote:  {}", checkout.remote_url);
            for refspec in &checkout.refspecs {
                println!("      refspec: {}", refspec);
            }
            println!("      commit:  {}", checkout.checkout_ref);
            if let Some(merge) = &checkout.merge_with {
                println!("      merge:   {} @ {}", merge.remote_branch, merge.base_sha);
            }
        }
        if let Some(published) = head.statuses_published {
            println!("      statuses published: {}", published);
        }
    }

    let summary = &report.summary;
    println!();
    println!(
        "✓ {} pull requests, {} branches, {} tags ({} excluded, {} untrusted, {} skipped)",
        summary.pull_requests,
        summary.branches,
        summary.tags,
        summary.excluded,
        summary.untrusted,
        summary.skipped
    );
}

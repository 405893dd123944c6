use chrono::{TimeZone, Utc};
use clap::Args;
use ghscout::core::{ScoutError, ScoutResult};
use ghscout::di::{RemoteClient, ServiceContainer};
use ghscout::discovery::head::{CheckoutStrategy, Head, MergeHash, PullRequestOrigin, Revision};
use ghscout::discovery::scan::pull_request_head;
use ghscout::probe::{CachingContentProbe, FileKind, ProbeStat};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ProbeOptions {
    /// Path inside the repository, e.g. `Jenkinsfile` or `ci/build.yaml`
    pub path: String,
    /// Branch to probe (defaults to the repository's default branch)
    #[arg(long, conflicts_with_all = ["tag", "pr"])]
    pub branch: Option<String>,
    /// Tag to probe
    #[arg(long, conflicts_with_all = ["branch", "pr"])]
    pub tag: Option<String>,
    /// Pull request to probe (its merge commit unless --head is given)
    #[arg(long, conflicts_with_all = ["branch", "tag"])]
    pub pr: Option<u64>,
    /// Probe the pull request head instead of the merge result
    #[arg(long, requires = "pr")]
    pub head: bool,
    /// Print the file content instead of its status
    #[arg(long)]
    pub read: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    head: &'a Head,
    git_ref: &'a str,
    path: &'a str,
    #[serde(flatten)]
    stat: ProbeStat,
    last_modified: i64,
}

pub async fn run(config: Option<&Path>, options: ProbeOptions) -> ScoutResult<()> {
    let container = ServiceContainer::new(config)?;
    let client = container.client();
    let (head, revision) = resolve(client.as_ref(), &options).await?;

    let probe = CachingContentProbe::new(client, head, Some(revision));
    let result = report(&probe, &options).await;
    probe.close();
    result
}

async fn report(probe: &CachingContentProbe, options: &ProbeOptions) -> ScoutResult<()> {
    if options.read {
        let content = probe.read(&options.path).await?.ok_or_else(|| {
            ScoutError::NotFound(format!("{} at {}", options.path, probe.head()))
        })?;
        std::io::stdout().write_all(&content)?;
        return Ok(());
    }

    let stat = probe.stat(&options.path).await?;
    let last_modified = probe.last_modified().await;

    if options.json {
        let report = ProbeReport {
            head: probe.head(),
            git_ref: probe.git_ref(),
            path: &options.path,
            stat,
            last_modified,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} at {} ({})", options.path, probe.head(), probe.git_ref());
    match stat.kind {
        FileKind::Nonexistent => {
            println!("  ✗ does not exist");
            if let Some(alternative) = &stat.alternative_path {
                println!("  Did you mean {}?", alternative);
            }
        }
        FileKind::File => println!("  ✓ file"),
        FileKind::Directory => println!("  ✓ directory"),
        FileKind::Symlink => println!("  ✓ symlink"),
        FileKind::Other => println!("  ✓ exists (submodule or other)"),
    }
    if let Some(modified) = Utc.timestamp_millis_opt(last_modified).single() {
        if last_modified > 0 {
            println!("  last modified: {}", modified.to_rfc3339());
        }
    }
    Ok(())
}

/// Head and revision the options point at
async fn resolve(client: &dyn RemoteClient, options: &ProbeOptions) -> ScoutResult<(Head, Revision)> {
    if let Some(number) = options.pr {
        let pr = client
            .pull_request(number)
            .await?
            .ok_or_else(|| ScoutError::NotFound(format!("pull request #{}", number)))?;
        let repository = client
            .repository()
            .await?
            .ok_or_else(|| ScoutError::NotFound("repository".to_string()))?;
        let origin = if pr
            .source_owner()
            .is_some_and(|owner| owner.eq_ignore_ascii_case(&repository.owner.login))
        {
            PullRequestOrigin::Origin
        } else {
            PullRequestOrigin::Fork
        };
        let strategy = if options.head {
            CheckoutStrategy::Head
        } else {
            CheckoutStrategy::Merge
        };
        let revision = Revision::PullRequest {
            base_sha: pr.base.sha.clone(),
            head_sha: pr.head.sha.clone(),
            merge: MergeHash::Unresolved,
        };
        return Ok((pull_request_head(&pr, origin, strategy, false), revision));
    }

    if let Some(name) = &options.tag {
        let tag = client
            .tag(name)
            .await?
            .ok_or_else(|| ScoutError::NotFound(format!("tag {}", name)))?;
        return Ok((
            Head::tag(name.clone(), 0),
            Revision::Tag {
                sha: tag.commit.sha,
            },
        ));
    }

    let name = match &options.branch {
        Some(name) => name.clone(),
        None => {
            client
                .repository()
                .await?
                .ok_or_else(|| ScoutError::NotFound("repository".to_string()))?
                .default_branch
        }
    };
    let branch = client
        .branch(&name)
        .await?
        .ok_or_else(|| ScoutError::NotFound(format!("branch {}", name)))?;
    Ok((
        Head::branch(name),
        Revision::Branch {
            sha: branch.commit.sha,
        },
    ))
}

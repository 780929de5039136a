//! Engine integration tests against the in-memory fake hosting backend.

mod test_utils;

use repopin::engine::orchestrator::{Pacing, RunOutcome, SyncOrchestrator};
use repopin::engine::rewrite;
use repopin::engine::strategy::CommitStrategy;
use repopin::engine::{SYNC_MARKER, SyncStatus};
use repopin::hosting::{HostingApi, RepoRef};
use test_utils::FakeHosting;

fn repo(name: &str) -> RepoRef {
    RepoRef::new("alice", name)
}

#[tokio::test]
async fn run_is_skipped_without_any_mutation_when_order_matches() {
    let hosting = FakeHosting::new();
    let desired = vec![repo("alpha"), repo("beta"), repo("gamma")];
    for r in &desired {
        hosting.seed_repo(r, "main", &["init"]);
    }
    // seed_repo appends in call order, so the listing already matches
    let orchestrator = SyncOrchestrator::new(hosting.as_ref(), Pacing::none(), 30);

    let outcome = orchestrator
        .run(&desired, 3, CommitStrategy::Revert)
        .await
        .expect("run succeeds");

    match outcome {
        RunOutcome::Skipped { current, .. } => assert_eq!(current, desired),
        RunOutcome::Completed(_) => panic!("expected skip"),
    }
    assert_eq!(hosting.mutation_count(), 0);
}

#[tokio::test]
async fn revert_bump_preserves_tree_and_marks_both_commits() {
    let hosting = FakeHosting::new();
    let r = repo("alpha");
    hosting.seed_repo(&r, "main", &["init", "feat: work"]);
    let original_head = hosting.head_sha(&r, "main").expect("seeded head");
    let original_tree = hosting.commit(&original_head).expect("commit").tree;

    let head = CommitStrategy::Revert
        .bump(hosting.as_ref(), &r, 1, 1)
        .await
        .expect("bump succeeds");

    assert_ne!(head.sha, original_head);
    assert_eq!(head.tree, original_tree);
    let history = hosting.history(&r, "main");
    assert!(history[0].contains(SYNC_MARKER));
    assert!(history[1].contains(SYNC_MARKER));
    assert_eq!(history[2], "feat: work");
}

#[tokio::test]
async fn branch_merge_bump_leaves_no_temporary_branch() {
    let hosting = FakeHosting::new();
    let r = repo("alpha");
    hosting.seed_repo(&r, "main", &["init"]);

    let head = CommitStrategy::BranchMerge
        .bump(hosting.as_ref(), &r, 1, 1)
        .await
        .expect("bump succeeds");

    assert!(head.message.contains(SYNC_MARKER));
    assert_eq!(head.parents.len(), 2);
    assert_eq!(hosting.branches(&r), vec!["main".to_string()]);
    assert_eq!(hosting.head_sha(&r, "main"), Some(head.sha));
}

#[tokio::test]
async fn cleanup_removes_synthetic_commits_and_restores_tree() {
    let hosting = FakeHosting::new();
    let r = repo("alpha");
    hosting.seed_repo(&r, "main", &["init", "feat: a", "feat: b"]);
    let original_head = hosting.head_sha(&r, "main").expect("seeded head");
    let original_tree = hosting.commit(&original_head).expect("commit").tree;

    CommitStrategy::Revert
        .bump(hosting.as_ref(), &r, 1, 1)
        .await
        .expect("bump succeeds");
    assert_eq!(hosting.history(&r, "main").len(), 5);

    let report = rewrite::cleanup(hosting.as_ref(), &r, 30)
        .await
        .expect("cleanup succeeds");

    assert_eq!(report.removed, 2);
    let history = hosting.history(&r, "main");
    assert_eq!(history, vec!["feat: b", "feat: a", "init"]);
    assert!(history.iter().all(|m| !m.contains(SYNC_MARKER)));
    let new_head = report.new_head.expect("rewritten head");
    assert_eq!(hosting.commit(&new_head).expect("commit").tree, original_tree);
}

#[tokio::test]
async fn cleanup_records_backup_ref_before_rewriting() {
    let hosting = FakeHosting::new();
    let r = repo("alpha");
    hosting.seed_repo(&r, "main", &["init"]);
    CommitStrategy::Revert
        .bump(hosting.as_ref(), &r, 1, 1)
        .await
        .expect("bump succeeds");
    let pre_rewrite_head = hosting.head_sha(&r, "main").expect("head");

    rewrite::cleanup(hosting.as_ref(), &r, 30)
        .await
        .expect("cleanup succeeds");

    let backups: Vec<String> = hosting
        .branches(&r)
        .into_iter()
        .filter(|b| b.starts_with("repopin-backup-"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(hosting.head_sha(&r, &backups[0]), Some(pre_rewrite_head));
}

#[tokio::test]
async fn cleanup_handles_marked_root_commit() {
    let hosting = FakeHosting::new();
    let r = repo("alpha");
    hosting.seed_repo(&r, "main", &["init [repopin]", "feat: real work"]);

    let report = rewrite::cleanup(hosting.as_ref(), &r, 30)
        .await
        .expect("cleanup succeeds");

    assert_eq!(report.removed, 1);
    assert_eq!(hosting.history(&r, "main"), vec!["feat: real work"]);
    let new_head = report.new_head.expect("rewritten head");
    assert!(hosting.commit(&new_head).expect("commit").parents.is_empty());
}

#[tokio::test]
async fn cleanup_refuses_to_rewrite_all_synthetic_window() {
    let hosting = FakeHosting::new();
    let r = repo("alpha");
    hosting.seed_repo(
        &r,
        "main",
        &["chore: pin [repopin]", "revert: restore [repopin]"],
    );
    let head = hosting.head_sha(&r, "main");

    let report = rewrite::cleanup(hosting.as_ref(), &r, 30)
        .await
        .expect("cleanup succeeds");

    assert_eq!(report.removed, 0);
    assert!(report.new_head.is_none());
    assert_eq!(hosting.head_sha(&r, "main"), head);
    assert_eq!(hosting.mutation_count(), 0);
}

#[tokio::test]
async fn partial_failure_is_isolated_per_repository() {
    let hosting = FakeHosting::new();
    let desired = vec![repo("alpha"), repo("beta"), repo("gamma")];
    // Seed in reverse so the order check does not short-circuit the run.
    for r in desired.iter().rev() {
        hosting.seed_repo(r, "main", &["init"]);
    }
    hosting.fail_create_commit_for(&repo("beta"));
    let orchestrator = SyncOrchestrator::new(hosting.as_ref(), Pacing::none(), 30);

    let outcome = orchestrator
        .run(&desired, 3, CommitStrategy::Revert)
        .await
        .expect("run succeeds");

    let summary = match outcome {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Skipped { .. } => panic!("expected a full run"),
    };
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.status(), "partial");
    // Results come back in desired order.
    assert_eq!(summary.results[0].repository, "alice/alpha");
    assert_eq!(summary.results[1].repository, "alice/beta");
    assert_eq!(summary.results[1].status, SyncStatus::Error);
    assert!(summary.results[1].error.is_some());
    assert_eq!(summary.results[2].status, SyncStatus::Success);
}

#[tokio::test]
async fn run_reorders_listing_with_first_desired_repo_on_top() {
    let hosting = FakeHosting::new();
    let desired = vec![repo("alpha"), repo("beta")];
    for r in desired.iter().rev() {
        hosting.seed_repo(r, "main", &["init"]);
    }
    let orchestrator = SyncOrchestrator::new(hosting.as_ref(), Pacing::none(), 30);

    let outcome = orchestrator
        .run(&desired, 2, CommitStrategy::Revert)
        .await
        .expect("run succeeds");

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    let listing = hosting
        .list_repos_by_recency()
        .await
        .expect("listing");
    assert_eq!(listing[0], repo("alpha"));
    assert_eq!(listing[1], repo("beta"));
}

#[tokio::test]
async fn run_cleans_marked_commits_it_created() {
    let hosting = FakeHosting::new();
    let desired = vec![repo("alpha"), repo("beta")];
    for r in desired.iter().rev() {
        hosting.seed_repo(r, "main", &["init", "feat: work"]);
    }
    let orchestrator = SyncOrchestrator::new(hosting.as_ref(), Pacing::none(), 30);

    let outcome = orchestrator
        .run(&desired, 2, CommitStrategy::BranchMerge)
        .await
        .expect("run succeeds");

    let summary = match outcome {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Skipped { .. } => panic!("expected a full run"),
    };
    assert_eq!(summary.cleaned, 2);
    for r in &desired {
        let history = hosting.history(r, "main");
        assert!(history.iter().all(|m| !m.contains(SYNC_MARKER)), "{:?}", history);
    }
}

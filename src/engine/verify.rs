//! Order verification short-circuit.
//!
//! Fetches the remote "recently updated" ordering and compares it against
//! the desired ordering. When they already agree, the orchestrator performs
//! zero mutations — the strategies alter history and must not run when
//! nothing would change.

use std::collections::HashSet;

use tracing::debug;

use crate::hosting::{HostingApi, HostingError, RepoRef};

/// Remote ordering of the managed repositories plus the verdict.
#[derive(Debug, Clone)]
pub struct OrderCheck {
    pub already_ordered: bool,
    pub current_order: Vec<RepoRef>,
}

/// Fetch the current ordering of the managed set and compare the first
/// `top_n` positions against `desired`.
pub async fn check_order(
    api: &dyn HostingApi,
    desired: &[RepoRef],
    top_n: usize,
) -> Result<OrderCheck, HostingError> {
    let managed: HashSet<&RepoRef> = desired.iter().collect();

    let current_order: Vec<RepoRef> = api
        .list_repos_by_recency()
        .await?
        .into_iter()
        .filter(|repo| managed.contains(repo))
        .collect();

    let already_ordered = is_already_ordered(&current_order, desired, top_n);
    debug!(
        already_ordered,
        current = current_order.len(),
        desired = desired.len(),
        "Verified remote repository ordering"
    );

    Ok(OrderCheck {
        already_ordered,
        current_order,
    })
}

/// Positional comparison of the first `top_n` entries. True only if both
/// sequences are long enough and every position matches exactly.
pub fn is_already_ordered(current: &[RepoRef], desired: &[RepoRef], top_n: usize) -> bool {
    if current.len() < top_n || desired.len() < top_n {
        return false;
    }
    current.iter().take(top_n).eq(desired.iter().take(top_n))
}

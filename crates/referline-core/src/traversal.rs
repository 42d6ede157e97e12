//! Lazy traversals over the repositories.
//!
//! Both streams fetch on demand and are finite. Neither is restartable:
//! each call walks the store from scratch and sees whatever state the
//! store has at the time each item is pulled.

use std::collections::HashSet;

use futures::stream::{self, Stream, TryStreamExt};
use uuid::Uuid;

use crate::error::{ReferlineError, ReferlineResult};
use crate::models::actor::{Actor, ActorRole};
use crate::models::referral::ReferralEdge;
use crate::repository::{ActorRepository, Pagination, ReferralRepository};

struct AncestorCursor {
    current: Option<Uuid>,
    seen: HashSet<Uuid>,
    depth: usize,
}

async fn next_ancestor<R: ReferralRepository>(
    repo: &R,
    mut cursor: AncestorCursor,
    child_id: Uuid,
    max_depth: usize,
) -> ReferlineResult<Option<(ReferralEdge, AncestorCursor)>> {
    let Some(current) = cursor.current else {
        return Ok(None);
    };
    let Some(parent_id) = repo.get_parent(current).await? else {
        return Ok(None);
    };

    if !cursor.seen.insert(parent_id) {
        return Err(ReferlineError::Internal(format!(
            "referral cycle detected at actor {parent_id}"
        )));
    }
    cursor.depth += 1;
    if cursor.depth > max_depth {
        return Err(ReferlineError::Internal(format!(
            "ancestor chain of {child_id} exceeds {max_depth} levels"
        )));
    }

    let edge = repo.get_edge(parent_id).await?;
    cursor.current = Some(parent_id);
    Ok(Some((edge, cursor)))
}

/// Referral edges of every ancestor of `child_id`, immediate parent first,
/// ending at the root.
///
/// Fails with `NotFound` if `child_id` (or any ancestor) has no recorded
/// edge, and with `Internal` on a cycle or when more than `max_depth`
/// ancestors are found.
pub fn ancestor_edges<R: ReferralRepository>(
    repo: &R,
    child_id: Uuid,
    max_depth: usize,
) -> impl Stream<Item = ReferlineResult<ReferralEdge>> + Send + '_ {
    let cursor = AncestorCursor {
        current: Some(child_id),
        seen: HashSet::from([child_id]),
        depth: 0,
    };
    stream::try_unfold(cursor, move |cursor| {
        next_ancestor(repo, cursor, child_id, max_depth)
    })
}

/// Ancestor ids of `child_id`, immediate parent first.
pub fn walk_ancestors<R: ReferralRepository>(
    repo: &R,
    child_id: Uuid,
    max_depth: usize,
) -> impl Stream<Item = ReferlineResult<Uuid>> + Send + '_ {
    ancestor_edges(repo, child_id, max_depth).map_ok(|edge| edge.child_id)
}

async fn next_page<A: ActorRepository>(
    repo: &A,
    role: ActorRole,
    limit: u64,
    offset: Option<u64>,
) -> ReferlineResult<Option<(Vec<Actor>, Option<u64>)>> {
    let Some(offset) = offset else {
        return Ok(None);
    };
    let page = repo.list_by_role(role, Pagination { offset, limit }).await?;
    if page.items.is_empty() {
        return Ok(None);
    }
    let fetched = page.items.len() as u64;
    let next = (fetched == limit).then_some(offset + fetched);
    Ok(Some((page.items, next)))
}

/// Every actor with `role`, fetched one page at a time.
pub fn actors_by_role<A: ActorRepository>(
    repo: &A,
    role: ActorRole,
    page_size: u64,
) -> impl Stream<Item = ReferlineResult<Actor>> + Send + '_ {
    let limit = page_size.max(1);
    stream::try_unfold(Some(0u64), move |offset| next_page(repo, role, limit, offset))
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Actor, ReferlineError>)))
        .try_flatten()
}

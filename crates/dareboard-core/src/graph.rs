use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use dareboard_db::models::{EdgeRow, ProfileRow};
use dareboard_db::ops;
use dareboard_db::relationships::query_edges_between;
use dareboard_types::api::{FriendEntry, FriendRequestOutcome, FriendsResponse};
use dareboard_types::models::{EdgeStatus, RelationshipStatus};

use crate::{Rejection, Result, Social, SocialError, TxOp, now_ms};

/// One user's view of the relationship edges touching them.
#[derive(Debug, Clone)]
pub struct RelationshipGraph {
    me: Uuid,
    edges: Vec<EdgeRow>,
}

impl RelationshipGraph {
    pub fn new(me: Uuid, mut edges: Vec<EdgeRow>) -> Self {
        edges.retain(|e| e.from_user.id == me || e.to_user.id == me);
        Self { me, edges }
    }

    pub fn me(&self) -> Uuid {
        self.me
    }

    fn outgoing(&self) -> impl Iterator<Item = &EdgeRow> {
        self.edges.iter().filter(move |e| e.from_user.id == self.me)
    }

    fn incoming(&self) -> impl Iterator<Item = &EdgeRow> {
        self.edges.iter().filter(move |e| e.to_user.id == self.me)
    }

    pub fn friends(&self) -> Vec<FriendEntry> {
        unique_peers(
            self.outgoing().filter(|e| e.status == EdgeStatus::Accepted),
            |e| &e.to_user,
        )
    }

    pub fn incoming_requests(&self) -> Vec<FriendEntry> {
        unique_peers(
            self.incoming().filter(|e| e.status == EdgeStatus::Pending),
            |e| &e.from_user,
        )
    }

    pub fn outgoing_requests(&self) -> Vec<FriendEntry> {
        unique_peers(
            self.outgoing().filter(|e| e.status == EdgeStatus::Pending),
            |e| &e.to_user,
        )
    }

    pub fn friend_count(&self) -> usize {
        self.friends().len()
    }

    pub fn is_friend(&self, other: Uuid) -> bool {
        self.outgoing()
            .any(|e| e.to_user.id == other && e.status == EdgeStatus::Accepted)
    }

    pub fn status_with(&self, other: Uuid) -> RelationshipStatus {
        pair_status(self.me, other, &self.edges)
    }

    pub fn edges_with(&self, other: Uuid) -> Vec<&EdgeRow> {
        self.edges
            .iter()
            .filter(|e| e.from_user.id == other || e.to_user.id == other)
            .collect()
    }

    pub fn to_response(&self) -> FriendsResponse {
        let friends = self.friends();
        FriendsResponse {
            friend_count: friends.len(),
            friends,
            incoming_requests: self.incoming_requests(),
            outgoing_requests: self.outgoing_requests(),
        }
    }
}

fn unique_peers<'a>(
    edges: impl Iterator<Item = &'a EdgeRow>,
    peer: impl Fn(&'a EdgeRow) -> &'a ProfileRow,
) -> Vec<FriendEntry> {
    let mut seen = HashSet::new();
    edges
        .filter_map(|edge| {
            let profile = peer(edge);
            seen.insert(profile.id).then(|| FriendEntry {
                profile: profile.summary(),
                relationship_id: edge.id,
            })
        })
        .collect()
}

fn find_edge(edges: &[EdgeRow], from: Uuid, to: Uuid) -> Option<&EdgeRow> {
    edges
        .iter()
        .find(|e| e.from_user.id == from && e.to_user.id == to)
}

/// Status of `me` towards `other`. The outgoing edge wins over the incoming one.
pub fn pair_status(me: Uuid, other: Uuid, edges: &[EdgeRow]) -> RelationshipStatus {
    if let Some(out) = find_edge(edges, me, other) {
        return match out.status {
            EdgeStatus::Accepted => RelationshipStatus::Accepted,
            EdgeStatus::Pending => RelationshipStatus::PendingOutgoing,
        };
    }
    match find_edge(edges, other, me).map(|e| e.status) {
        Some(EdgeStatus::Accepted) => RelationshipStatus::Accepted,
        Some(EdgeStatus::Pending) => RelationshipStatus::PendingIncoming,
        None => RelationshipStatus::None,
    }
}

// -- Planners --
//
// Pure functions from the current edges between two users to the batch that
// moves them to the next valid state.

/// Accept `other`'s pending request. An existing outgoing edge (left behind by
/// an older double-request) is flipped instead of duplicated.
fn accept_ops(me: Uuid, other: Uuid, edges: &[EdgeRow], new_id: Uuid, at: i64) -> Option<Vec<TxOp>> {
    let incoming = find_edge(edges, other, me).filter(|e| e.status == EdgeStatus::Pending)?;
    let mut ops = vec![TxOp::AcceptRelationship { id: incoming.id, at }];

    match find_edge(edges, me, other) {
        Some(out) if out.status == EdgeStatus::Pending => {
            ops.push(TxOp::AcceptRelationship { id: out.id, at });
        }
        Some(_) => {}
        None => ops.push(TxOp::CreateRelationship {
            id: new_id,
            from_user: me,
            to_user: other,
            status: EdgeStatus::Accepted,
            at,
        }),
    }
    Some(ops)
}

pub fn plan_send_request(
    me: Uuid,
    to: Uuid,
    edges: &[EdgeRow],
    new_id: Uuid,
    at: i64,
) -> std::result::Result<(Vec<TxOp>, FriendRequestOutcome), Rejection> {
    match pair_status(me, to, edges) {
        RelationshipStatus::None => Ok((
            vec![TxOp::CreateRelationship {
                id: new_id,
                from_user: me,
                to_user: to,
                status: EdgeStatus::Pending,
                at,
            }],
            FriendRequestOutcome::Requested,
        )),
        RelationshipStatus::PendingIncoming => accept_ops(me, to, edges, new_id, at)
            .map(|ops| (ops, FriendRequestOutcome::AutoAccepted))
            .ok_or(Rejection::AlreadyRelated),
        RelationshipStatus::PendingOutgoing | RelationshipStatus::Accepted => {
            Err(Rejection::AlreadyRelated)
        }
    }
}

pub fn plan_accept(
    me: Uuid,
    from: Uuid,
    edges: &[EdgeRow],
    new_id: Uuid,
    at: i64,
) -> std::result::Result<Vec<TxOp>, Rejection> {
    accept_ops(me, from, edges, new_id, at).ok_or(Rejection::NoPendingRequest)
}

pub fn plan_ignore(me: Uuid, from: Uuid, edges: &[EdgeRow]) -> std::result::Result<Vec<TxOp>, Rejection> {
    find_edge(edges, from, me)
        .filter(|e| e.status == EdgeStatus::Pending)
        .map(|e| vec![TxOp::DeleteRelationship { id: e.id }])
        .ok_or(Rejection::NoPendingRequest)
}

/// Every edge between the pair goes, in both directions.
pub fn plan_unfriend(edges: &[EdgeRow]) -> Vec<TxOp> {
    edges
        .iter()
        .map(|e| TxOp::DeleteRelationship { id: e.id })
        .collect()
}

impl Social {
    pub fn relationship_graph(&self, me: Uuid) -> Result<RelationshipGraph> {
        Ok(RelationshipGraph::new(me, self.db().relationships_touching(me)?))
    }

    /// A request still being submitted reads as `PendingOutgoing` before it commits.
    pub fn relationship_status(&self, me: Uuid, other: Uuid) -> Result<RelationshipStatus> {
        let locked = self
            .existing_session(me)
            .is_some_and(|session| session.friend_locks.contains(&other));
        if locked {
            return Ok(RelationshipStatus::PendingOutgoing);
        }
        let edges = self.db().relationships_between(me, other)?;
        Ok(pair_status(me, other, &edges))
    }

    pub fn send_friend_request(&self, me: Uuid, to: Uuid) -> Result<FriendRequestOutcome> {
        self.require_profile(me)?;
        if me == to {
            return Err(Rejection::SelfTarget.into());
        }
        if self.db().get_profile(to)?.is_none() {
            return Err(Rejection::UnknownUser.into());
        }

        let session = self.session(me);
        if !session.try_record_friend_request(Instant::now(), &self.config().friend_requests) {
            warn!(user_id = %me, "Friend request rate limit reached");
            return Err(Rejection::RateLimited.into());
        }
        let _guard = session
            .friend_locks
            .try_acquire(to)
            .ok_or(SocialError::Rejected(Rejection::InFlight))?;

        let (id, at) = (Uuid::new_v4(), now_ms());
        let outcome = self.db().transact(|tx| {
            let edges = query_edges_between(tx, me, to)?;
            let (batch, outcome) = plan_send_request(me, to, &edges, id, at)?;
            ops::apply(tx, &batch)?;
            Ok::<_, SocialError>(outcome)
        })?;

        match outcome {
            FriendRequestOutcome::Requested => {
                info!(event = "friend_request_sent", from_user = %me, to_user = %to);
            }
            FriendRequestOutcome::AutoAccepted => {
                info!(event = "friend_request_accepted", from_user = %to, to_user = %me, auto = true);
            }
        }
        Ok(outcome)
    }

    pub fn accept_friend_request(&self, me: Uuid, from: Uuid) -> Result<()> {
        self.require_profile(me)?;
        let session = self.session(me);
        let _guard = session
            .friend_locks
            .try_acquire(from)
            .ok_or(SocialError::Rejected(Rejection::InFlight))?;

        let (id, at) = (Uuid::new_v4(), now_ms());
        self.db().transact(|tx| {
            let edges = query_edges_between(tx, me, from)?;
            let batch = plan_accept(me, from, &edges, id, at)?;
            ops::apply(tx, &batch)?;
            Ok::<_, SocialError>(())
        })?;

        info!(event = "friend_request_accepted", from_user = %from, to_user = %me);
        Ok(())
    }

    pub fn ignore_friend_request(&self, me: Uuid, from: Uuid) -> Result<()> {
        self.require_profile(me)?;
        self.db().transact(|tx| {
            let edges = query_edges_between(tx, me, from)?;
            let batch = plan_ignore(me, from, &edges)?;
            ops::apply(tx, &batch)?;
            Ok::<_, SocialError>(())
        })?;

        info!(event = "friend_request_ignored", from_user = %from, to_user = %me);
        Ok(())
    }

    /// Returns how many edges were removed; zero when there was nothing to remove.
    pub fn unfriend(&self, me: Uuid, other: Uuid) -> Result<usize> {
        self.require_profile(me)?;
        let removed = self.db().transact(|tx| {
            let edges = query_edges_between(tx, me, other)?;
            let batch = plan_unfriend(&edges);
            ops::apply(tx, &batch)?;
            Ok::<_, SocialError>(batch.len())
        })?;

        if removed > 0 {
            info!(event = "friend_removed", user_id = %me, friend_id = %other, edges = removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SocialConfig;
    use crate::rate_limit::RateLimitConfig;
    use crate::testing::{friends, social, social_with, user};
    use std::time::Duration;

    fn assert_pair_valid(social: &Social, a: Uuid, b: Uuid) {
        let edges = social.db().relationships_between(a, b).unwrap();
        match edges.as_slice() {
            [] => {}
            [only] => assert_eq!(only.status, EdgeStatus::Pending, "lone edge must be pending"),
            [x, y] => {
                assert_eq!(x.status, EdgeStatus::Accepted);
                assert_eq!(y.status, EdgeStatus::Accepted);
                assert_eq!(x.from_user.id, y.to_user.id);
                assert_eq!(x.to_user.id, y.from_user.id);
            }
            more => panic!("{} edges between one pair", more.len()),
        }
    }

    fn rejection<T: std::fmt::Debug>(result: Result<T>) -> Rejection {
        match result {
            Err(SocialError::Rejected(r)) => r,
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[test]
    fn request_then_accept_is_symmetric() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));

        assert_eq!(s.send_friend_request(a, b).unwrap(), FriendRequestOutcome::Requested);
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::PendingOutgoing);
        assert_eq!(s.relationship_status(b, a).unwrap(), RelationshipStatus::PendingIncoming);

        s.accept_friend_request(b, a).unwrap();
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::Accepted);
        assert_eq!(s.relationship_status(b, a).unwrap(), RelationshipStatus::Accepted);

        let ga = s.relationship_graph(a).unwrap();
        let gb = s.relationship_graph(b).unwrap();
        assert!(ga.is_friend(b) && gb.is_friend(a));
        assert_eq!(ga.friend_count(), 1);
        assert_eq!(ga.friends()[0].profile.name, "bob");
        assert!(ga.outgoing_requests().is_empty());
        assert!(gb.incoming_requests().is_empty());
        assert_eq!(ga.edges_with(b).len(), 2);
    }

    #[test]
    fn target_requested_first_is_auto_accepted() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));

        s.send_friend_request(b, a).unwrap();
        assert_eq!(s.send_friend_request(a, b).unwrap(), FriendRequestOutcome::AutoAccepted);
        assert_pair_valid(&s, a, b);
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::Accepted);
        assert_eq!(s.relationship_status(b, a).unwrap(), RelationshipStatus::Accepted);
    }

    #[test]
    fn guards_reject_without_writing() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        let ghost = Uuid::new_v4();

        assert_eq!(rejection(s.send_friend_request(ghost, a)), Rejection::ProfileMissing);
        assert_eq!(rejection(s.send_friend_request(a, a)), Rejection::SelfTarget);
        assert_eq!(rejection(s.send_friend_request(a, ghost)), Rejection::UnknownUser);

        s.send_friend_request(a, b).unwrap();
        assert_eq!(rejection(s.send_friend_request(a, b)), Rejection::AlreadyRelated);
        assert_eq!(rejection(s.accept_friend_request(a, b)), Rejection::NoPendingRequest);
        assert_eq!(rejection(s.ignore_friend_request(a, b)), Rejection::NoPendingRequest);
        assert_eq!(s.db().relationships_between(a, b).unwrap().len(), 1);
    }

    #[test]
    fn status_lookup_leaves_no_session_behind() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));

        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::None);
        assert!(s.existing_session(a).is_none());
    }

    #[test]
    fn in_flight_request_reads_as_pending_and_blocks_duplicates() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));

        let session = s.session(a);
        let guard = session.friend_locks.try_acquire(b).unwrap();
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::PendingOutgoing);
        assert_eq!(rejection(s.send_friend_request(a, b)), Rejection::InFlight);

        drop(guard);
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::None);
        s.send_friend_request(a, b).unwrap();
    }

    #[test]
    fn rate_limit_counts_attempts_per_sender() {
        let s = social_with(SocialConfig {
            friend_requests: RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(3600),
            },
        });
        let a = user(&s, "ada");
        let peers: Vec<Uuid> = ["bob", "cy", "dee"].iter().map(|n| user(&s, n)).collect();

        s.send_friend_request(a, peers[0]).unwrap();
        // A refused duplicate still spends an attempt.
        assert_eq!(rejection(s.send_friend_request(a, peers[0])), Rejection::AlreadyRelated);
        assert_eq!(rejection(s.send_friend_request(a, peers[1])), Rejection::RateLimited);
        assert_eq!(s.relationship_status(a, peers[1]).unwrap(), RelationshipStatus::None);

        // Other senders have their own window.
        s.send_friend_request(peers[2], peers[1]).unwrap();
    }

    #[test]
    fn ignore_deletes_the_request() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        s.send_friend_request(a, b).unwrap();

        s.ignore_friend_request(b, a).unwrap();
        assert!(s.db().relationships_between(a, b).unwrap().is_empty());
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::None);
    }

    #[test]
    fn unfriend_is_idempotent() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        friends(&s, a, b);

        assert_eq!(s.unfriend(a, b).unwrap(), 2);
        assert!(s.db().relationships_between(a, b).unwrap().is_empty());
        assert_eq!(s.unfriend(a, b).unwrap(), 0);
        assert!(s.db().relationships_between(a, b).unwrap().is_empty());
    }

    #[test]
    fn accept_repairs_double_pending() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        let pending = |from, to| TxOp::CreateRelationship {
            id: Uuid::new_v4(),
            from_user: from,
            to_user: to,
            status: EdgeStatus::Pending,
            at: 1,
        };
        s.db()
            .transact(|tx| ops::apply(tx, &[pending(a, b), pending(b, a)]))
            .unwrap();

        s.accept_friend_request(b, a).unwrap();
        assert_pair_valid(&s, a, b);
        assert_eq!(s.relationship_status(a, b).unwrap(), RelationshipStatus::Accepted);
    }

    #[test]
    fn friends_list_deduplicates_by_profile() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        friends(&s, a, b);

        let mut edges = s.db().relationships_touching(a).unwrap();
        let dup = edges
            .iter()
            .find(|e| e.from_user.id == a)
            .cloned()
            .unwrap();
        edges.push(dup);

        let graph = RelationshipGraph::new(a, edges);
        assert_eq!(graph.friends().len(), 1);
        assert_eq!(graph.to_response().friend_count, 1);
    }

    #[test]
    fn every_short_operation_sequence_keeps_the_pair_valid() {
        #[derive(Debug, Clone, Copy)]
        enum Op {
            Send,
            Accept,
            Ignore,
            Unfriend,
        }
        const OPS: [Op; 4] = [Op::Send, Op::Accept, Op::Ignore, Op::Unfriend];
        // (op, actor is A?)
        let moves: Vec<(Op, bool)> = OPS
            .iter()
            .flat_map(|op| [(*op, true), (*op, false)])
            .collect();

        let depth = 4;
        let total = moves.len().pow(depth);
        for n in 0..total {
            let s = social();
            let (a, b) = (user(&s, "ada"), user(&s, "bob"));

            let mut code = n;
            let mut trace = Vec::new();
            for _ in 0..depth {
                let (op, actor_is_a) = moves[code % moves.len()];
                code /= moves.len();
                let (me, other) = if actor_is_a { (a, b) } else { (b, a) };

                let result = match op {
                    Op::Send => s.send_friend_request(me, other).map(|_| ()),
                    Op::Accept => s.accept_friend_request(me, other),
                    Op::Ignore => s.ignore_friend_request(me, other),
                    Op::Unfriend => s.unfriend(me, other).map(|_| ()),
                };
                trace.push((op, actor_is_a));
                if let Err(SocialError::Store(e)) = result {
                    panic!("store error after {:?}: {}", trace, e);
                }
                assert_pair_valid(&s, a, b);
            }
        }
    }
}

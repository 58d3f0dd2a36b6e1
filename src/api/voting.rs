use rocket::{
    serde::json::{self, Json},
    Route,
};

use crate::engine::VoteLedger;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Voter},
        history::HistoryEntry,
        vote::{BallotRequest, VoteReceipt, VoteStatus},
    },
    mongodb::Id,
};
use crate::verification::{require_verified, Verifier};

use super::body;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, vote_status, own_history]
}

/// Verify the voter's identity, then record their vote.
#[post("/elections/<election_id>/vote", data = "<ballot>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    ballot: std::result::Result<Json<BallotRequest>, json::Error<'_>>,
    verifier: Verifier,
    ledger: VoteLedger,
) -> Result<Json<VoteReceipt>> {
    let ballot = body(ballot)?;
    let voter_id = token.id();

    // Don't bother the verifier for a vote that can't be cast.
    if ledger.has_voted(election_id, voter_id).await? {
        return Err(Error::DuplicateVote {
            election_id,
            voter_id,
        });
    }

    require_verified(&verifier, voter_id, &ballot.live_frames).await?;
    let vote = ledger
        .cast_vote(election_id, voter_id, &ballot.candidate_id)
        .await?;
    Ok(Json(vote.into()))
}

#[get("/elections/<election_id>/vote", rank = 2)]
async fn vote_status(
    token: AuthToken<Voter>,
    election_id: Id,
    ledger: VoteLedger,
) -> Result<Json<VoteStatus>> {
    let has_voted = ledger.has_voted(election_id, token.id()).await?;
    Ok(Json(VoteStatus { has_voted }))
}

#[get("/voter/history")]
async fn own_history(
    token: AuthToken<Voter>,
    ledger: VoteLedger,
) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(ledger.history(token.id()).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::join_all,
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use super::*;

    use crate::api::test_utils::{admin_cookie, error_kind, json, voter_cookie};
    use crate::model::{
        common::election::{ElectionState, NOTA, NOTA_NAME},
        db::election::Election,
    };
    use crate::store::Store;

    async fn cast<'c>(
        client: &'c Client,
        election_id: Id,
        voter_id: Id,
        ballot: &BallotRequest,
    ) -> LocalResponse<'c> {
        client
            .post(uri!(cast_vote(election_id)))
            .cookie(voter_cookie(client, voter_id))
            .header(ContentType::JSON)
            .body(serde_json::to_string(ballot).unwrap())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn cast_and_check(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        let voter = Id::new();

        let response = client
            .get(uri!(vote_status(election.id)))
            .cookie(voter_cookie(&client, voter))
            .dispatch()
            .await;
        let status: VoteStatus = json(response, Status::Ok).await;
        assert!(!status.has_voted);

        let response = cast(&client, election.id, voter, &BallotRequest::example("bob")).await;
        let receipt: VoteReceipt = json(response, Status::Ok).await;
        assert_eq!(*receipt.election_id, election.id);
        assert_eq!(receipt.candidate_id, "bob");

        let response = client
            .get(uri!(vote_status(election.id)))
            .cookie(voter_cookie(&client, voter))
            .dispatch()
            .await;
        let status: VoteStatus = json(response, Status::Ok).await;
        assert!(status.has_voted);

        // A second vote is refused.
        let again = BallotRequest::example("alice");
        let response = cast(&client, election.id, voter, &again).await;
        assert_eq!(error_kind(response, Status::Conflict).await, "duplicate_vote");

        let totals = store.totals(election.id).await.unwrap();
        assert_eq!(totals.get("bob"), Some(&1));
        assert_eq!(totals.get("alice"), None);
    }

    #[backend_test]
    async fn concurrent_voters_are_all_counted(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        let choices = ["alice", "bob", NOTA];
        let ballots = choices.map(BallotRequest::example);

        let casts = (0..30).map(|i| cast(&client, election.id, Id::new(), &ballots[i % 3]));
        for response in join_all(casts).await {
            assert_eq!(Status::Ok, response.status());
        }

        assert_eq!(store.vote_count(election.id).await.unwrap(), 30);
        let totals = store.totals(election.id).await.unwrap();
        for choice in choices {
            assert_eq!(totals.get(choice), Some(&10));
        }
    }

    #[backend_test]
    async fn closed_and_upcoming_elections_refuse_votes(client: Client, store: Store) {
        for state in [ElectionState::Upcoming, ElectionState::Closed] {
            let election = Election::example_with_state(state);
            store.insert_election(&election).await.unwrap();

            let ballot = BallotRequest::example("alice");
            let response = cast(&client, election.id, Id::new(), &ballot).await;
            assert_eq!(
                error_kind(response, Status::UnprocessableEntity).await,
                "invalid_state"
            );
            assert_eq!(store.vote_count(election.id).await.unwrap(), 0);
        }
    }

    #[backend_test]
    async fn bad_ballots(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();

        let unknown = BallotRequest::example("mallory");
        let response = cast(&client, election.id, Id::new(), &unknown).await;
        assert_eq!(error_kind(response, Status::NotFound).await, "not_found");

        let no_frames = BallotRequest {
            live_frames: vec![],
            ..BallotRequest::example("alice")
        };
        let response = cast(&client, election.id, Id::new(), &no_frames).await;
        assert_eq!(error_kind(response, Status::BadRequest).await, "validation");

        let ballot = BallotRequest::example("alice");
        let response = cast(&client, Id::new(), Id::new(), &ballot).await;
        assert_eq!(error_kind(response, Status::NotFound).await, "not_found");

        assert_eq!(store.vote_count(election.id).await.unwrap(), 0);
    }

    #[backend_test(deny_identity)]
    async fn failed_verification_writes_nothing(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        let voter = Id::new();

        let response = cast(&client, election.id, voter, &BallotRequest::example("alice")).await;
        assert_eq!(
            error_kind(response, Status::Forbidden).await,
            "verification_failed"
        );
        assert!(store.vote(election.id, voter).await.unwrap().is_none());
        assert!(store.totals(election.id).await.unwrap().is_empty());
    }

    #[backend_test]
    async fn only_voters_cast(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();

        let response = client
            .post(uri!(cast_vote(election.id)))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&BallotRequest::example("alice")).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(store.vote_count(election.id).await.unwrap(), 0);
    }

    #[backend_test]
    async fn history_of_own_votes(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        let voter = Id::new();

        let response = cast(&client, election.id, voter, &BallotRequest::example(NOTA)).await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get(uri!(own_history))
            .cookie(voter_cookie(&client, voter))
            .dispatch()
            .await;
        let history: Vec<HistoryEntry> = json(response, Status::Ok).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].election_title, election.metadata.title);
        assert_eq!(history[0].candidate_name, NOTA_NAME);
    }
}

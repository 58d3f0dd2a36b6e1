use rocket::{
    serde::json::{self, Json},
    Route,
};

use crate::engine::{
    CandidateRegistry, ElectionStateMachine, ResultsPublisher, TallyAggregator, VoteLedger,
};
use crate::error::Result;
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        election::{
            CandidateDescription, CandidateSpec, ElectionDescription, ElectionPatch,
            ElectionResults, ElectionSpec,
        },
        history::HistoryEntry,
        vote::VoteStatus,
    },
    mongodb::Id,
};

use super::body;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        update_election,
        replace_candidates,
        close_election,
        announce_results,
        withdraw_results,
        reconcile_tally,
        voter_vote_status,
        voter_history,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: std::result::Result<Json<ElectionSpec>, json::Error<'_>>,
    machine: ElectionStateMachine,
) -> Result<Json<ElectionDescription>> {
    let election = machine.create(body(spec)?).await?;
    Ok(Json(election.into()))
}

#[put("/elections/<election_id>", data = "<patch>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    patch: std::result::Result<Json<ElectionPatch>, json::Error<'_>>,
    machine: ElectionStateMachine,
) -> Result<Json<ElectionDescription>> {
    let election = machine.update(election_id, body(patch)?).await?;
    Ok(Json(election.into()))
}

#[put("/elections/<election_id>/candidates", data = "<drafts>", format = "json")]
async fn replace_candidates(
    _token: AuthToken<Admin>,
    election_id: Id,
    drafts: std::result::Result<Json<Vec<CandidateSpec>>, json::Error<'_>>,
    registry: CandidateRegistry,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = registry.upsert_candidates(election_id, body(drafts)?).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[post("/elections/<election_id>/close")]
async fn close_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    machine: ElectionStateMachine,
) -> Result<Json<ElectionDescription>> {
    let election = machine.close(election_id).await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/announce")]
async fn announce_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    publisher: ResultsPublisher,
) -> Result<Json<ElectionDescription>> {
    let election = publisher.announce(election_id).await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/withdraw")]
async fn withdraw_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    publisher: ResultsPublisher,
) -> Result<Json<ElectionDescription>> {
    let election = publisher.withdraw(election_id).await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/reconcile")]
async fn reconcile_tally(
    _token: AuthToken<Admin>,
    election_id: Id,
    tally: TallyAggregator,
) -> Result<Json<ElectionResults>> {
    Ok(Json(tally.reconcile(election_id).await?))
}

#[get("/elections/<election_id>/vote?<voter>", rank = 1)]
async fn voter_vote_status(
    _token: AuthToken<Admin>,
    election_id: Id,
    voter: Id,
    ledger: VoteLedger,
) -> Result<Json<VoteStatus>> {
    let has_voted = ledger.has_voted(election_id, voter).await?;
    Ok(Json(VoteStatus { has_voted }))
}

#[get("/voters/<voter_id>/history")]
async fn voter_history(
    _token: AuthToken<Admin>,
    voter_id: Id,
    ledger: VoteLedger,
) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(ledger.history(voter_id).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;

    use crate::api::test_utils::{admin_cookie, error_kind, json, voter_cookie};
    use crate::model::{
        common::election::{ElectionState, NOTA},
        db::{election::Election, vote::Vote},
    };
    use crate::store::Store;

    async fn create(client: &Client, spec: &ElectionSpec) -> ElectionDescription {
        let response = client
            .post(uri!(create_election))
            .cookie(admin_cookie(client))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        json(response, Status::Ok).await
    }

    #[backend_test]
    async fn create_and_fetch_election(client: Client, store: Store) {
        let description = create(&client, &ElectionSpec::example()).await;
        assert_eq!(description.title, "Student Council President");
        assert_eq!(description.status, ElectionState::Active);
        assert!(!description.results_announced);
        assert_eq!(description.candidates.len(), 3);
        assert!(description.code.starts_with("ELEC"));

        let stored = store.election(*description.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.code, description.code);
    }

    #[backend_test]
    async fn create_rejects_bad_input(client: Client, store: Store) {
        // Only one candidate.
        let spec = ElectionSpec {
            candidates: vec![CandidateSpec::example1()],
            ..ElectionSpec::example()
        };
        let response = client
            .post(uri!(create_election))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::BadRequest).await, "validation");

        // Not even JSON.
        let response = client
            .post(uri!(create_election))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body("{\"title\": ")
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::BadRequest).await, "validation");

        assert!(store.elections().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn voters_cannot_administer(client: Client, store: Store) {
        let response = client
            .post(uri!(create_election))
            .cookie(voter_cookie(&client, Id::new()))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&ElectionSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&ElectionSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        assert!(store.elections().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn status_changes_are_monotonic(client: Client) {
        let description =
            create(&client, &ElectionSpec::with_status(ElectionState::Upcoming)).await;

        let response = client
            .post(uri!(close_election(*description.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let closed: ElectionDescription = json(response, Status::Ok).await;
        assert_eq!(closed.status, ElectionState::Closed);

        let patch = ElectionPatch {
            status: Some(ElectionState::Active),
            ..Default::default()
        };
        let response = client
            .put(uri!(update_election(*description.id)))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&patch).unwrap())
            .dispatch()
            .await;
        assert_eq!(
            error_kind(response, Status::UnprocessableEntity).await,
            "invalid_state"
        );
    }

    #[backend_test]
    async fn update_unknown_election(client: Client) {
        let response = client
            .put(uri!(update_election(Id::new())))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body("{}")
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::NotFound).await, "not_found");
    }

    #[backend_test]
    async fn candidates_are_replaced_wholesale(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        store
            .record_vote(&Vote::new(election.id, Id::new(), "carol".to_string()))
            .await
            .unwrap();

        let drafts = vec![
            CandidateSpec {
                id: Some("alice".to_string()),
                ..CandidateSpec::example1()
            },
            CandidateSpec::example3(),
        ];
        let response = client
            .put(uri!(replace_candidates(election.id)))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&drafts).unwrap())
            .dispatch()
            .await;
        let candidates: Vec<CandidateDescription> = json(response, Status::Ok).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "alice");
        assert_ne!(candidates[1].id, "bob");

        // Carol's vote outlives her candidacy.
        assert_eq!(store.totals(election.id).await.unwrap().get("carol"), Some(&1));

        let response = client
            .put(uri!(replace_candidates(election.id)))
            .cookie(admin_cookie(&client))
            .header(ContentType::JSON)
            .body("[]")
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::BadRequest).await, "validation");
    }

    #[backend_test]
    async fn announce_and_withdraw(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();

        // Withdrawing needs a closed election.
        let response = client
            .post(uri!(withdraw_results(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(
            error_kind(response, Status::UnprocessableEntity).await,
            "invalid_state"
        );

        for _ in 0..2 {
            let response = client
                .post(uri!(announce_results(election.id)))
                .cookie(admin_cookie(&client))
                .dispatch()
                .await;
            let announced: ElectionDescription = json(response, Status::Ok).await;
            assert_eq!(announced.status, ElectionState::Closed);
            assert!(announced.results_announced);
        }

        let response = client
            .post(uri!(withdraw_results(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let withdrawn: ElectionDescription = json(response, Status::Ok).await;
        assert_eq!(withdrawn.status, ElectionState::Closed);
        assert!(!withdrawn.results_announced);
    }

    #[backend_test]
    async fn reconcile_recounts(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        for candidate in ["alice", "bob", "bob", NOTA] {
            store
                .record_vote(&Vote::new(election.id, Id::new(), candidate.to_string()))
                .await
                .unwrap();
        }

        let response = client
            .post(uri!(reconcile_tally(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let results: ElectionResults = json(response, Status::Ok).await;
        assert_eq!(results.total_votes, 4);
        assert_eq!(results.nota_votes, 1);
        assert_eq!(results.winner.id.as_deref(), Some("bob"));
        assert_eq!(results.runner.unwrap().id.as_deref(), Some("alice"));
    }

    #[backend_test]
    async fn admin_sees_any_voter(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        let voter = Id::new();
        store
            .record_vote(&Vote::new(election.id, voter, "carol".to_string()))
            .await
            .unwrap();

        let response = client
            .get(format!("/elections/{}/vote?voter={voter}", election.id))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let status: VoteStatus = json(response, Status::Ok).await;
        assert!(status.has_voted);

        let response = client
            .get(format!("/elections/{}/vote?voter={}", election.id, Id::new()))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let status: VoteStatus = json(response, Status::Ok).await;
        assert!(!status.has_voted);

        let response = client
            .get(uri!(voter_history(voter)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let history: Vec<HistoryEntry> = json(response, Status::Ok).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].candidate_name, "Carol Singh");
    }
}

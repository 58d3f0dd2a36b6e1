use rocket::{serde::json::Json, Route};

use crate::engine::{Audience, CandidateRegistry, ElectionStateMachine, ResultsPublisher};
use crate::error::Result;
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        election::{CandidateDescription, ElectionDescription, ElectionResults, ElectionSummary},
    },
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        get_election,
        get_election_by_code,
        list_candidates,
        results_admin,
        results_non_admin,
    ]
}

#[get("/elections")]
async fn list_elections(machine: ElectionStateMachine) -> Result<Json<Vec<ElectionSummary>>> {
    let elections = machine.list().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(
    election_id: Id,
    machine: ElectionStateMachine,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(machine.get(election_id).await?.into()))
}

// Ranked below the `/elections/<election_id>/...` routes it overlaps with.
#[get("/elections/code/<code>", rank = 3)]
async fn get_election_by_code(
    code: &str,
    machine: ElectionStateMachine,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(machine.by_code(code).await?.into()))
}

#[get("/elections/<election_id>/candidates")]
async fn list_candidates(
    election_id: Id,
    registry: CandidateRegistry,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = registry.list_candidates(election_id).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>/results", rank = 1)]
async fn results_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    publisher: ResultsPublisher,
) -> Result<Json<ElectionResults>> {
    Ok(Json(publisher.results(election_id, Audience::Admin).await?))
}

#[get("/elections/<election_id>/results", rank = 2)]
async fn results_non_admin(
    election_id: Id,
    publisher: ResultsPublisher,
) -> Result<Json<ElectionResults>> {
    Ok(Json(publisher.results(election_id, Audience::Public).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;

    use crate::api::test_utils::{admin_cookie, error_kind, json, voter_cookie};
    use crate::model::{
        api::election::Standing,
        common::election::{ElectionState, NOTA},
        db::{election::Election, vote::Vote},
    };
    use crate::store::{LifecycleChange, Store};

    async fn with_votes(store: &Store, state: ElectionState, votes: &[&str]) -> Election {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();
        for candidate in votes {
            store
                .record_vote(&Vote::new(election.id, Id::new(), candidate.to_string()))
                .await
                .unwrap();
        }
        let change = LifecycleChange {
            state: Some(state),
            ..Default::default()
        };
        store
            .change_lifecycle(election.id, change)
            .await
            .unwrap()
            .unwrap()
    }

    #[backend_test]
    async fn lookups(client: Client, store: Store) {
        let election = Election::active_example();
        store.insert_election(&election).await.unwrap();

        let response = client.get(uri!(list_elections)).dispatch().await;
        let summaries: Vec<ElectionSummary> = json(response, Status::Ok).await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(*summaries[0].id, election.id);

        let response = client.get(uri!(get_election(election.id))).dispatch().await;
        let description: ElectionDescription = json(response, Status::Ok).await;
        assert_eq!(description.code, election.metadata.code);

        let response = client
            .get(uri!(get_election_by_code(election.metadata.code.as_str())))
            .dispatch()
            .await;
        let by_code: ElectionDescription = json(response, Status::Ok).await;
        assert_eq!(by_code, description);

        let response = client.get(uri!(list_candidates(election.id))).dispatch().await;
        let candidates: Vec<CandidateDescription> = json(response, Status::Ok).await;
        let ids = candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["alice", "bob", "carol"]);

        let response = client.get(uri!(get_election(Id::new()))).dispatch().await;
        assert_eq!(error_kind(response, Status::NotFound).await, "not_found");
        let response = client
            .get(uri!(get_election_by_code("ELEC000000000000")))
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::NotFound).await, "not_found");
    }

    #[backend_test]
    async fn unannounced_results_are_forbidden(client: Client, store: Store) {
        let election = with_votes(&store, ElectionState::Closed, &["alice"]).await;

        let response = client
            .get(uri!(results_non_admin(election.id)))
            .cookie(voter_cookie(&client, Id::new()))
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::Forbidden).await, "forbidden");

        let response = client
            .get(uri!(results_non_admin(election.id)))
            .dispatch()
            .await;
        assert_eq!(error_kind(response, Status::Forbidden).await, "forbidden");

        let response = client
            .get(uri!(results_admin(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let results: ElectionResults = json(response, Status::Ok).await;
        assert_eq!(results.total_votes, 1);
    }

    #[backend_test]
    async fn announced_results_are_public(client: Client, store: Store) {
        let election = with_votes(
            &store,
            ElectionState::Closed,
            &["alice", "bob", "alice", "bob", NOTA],
        )
        .await;
        let change = LifecycleChange {
            results_announced: Some(true),
            ..Default::default()
        };
        store.change_lifecycle(election.id, change).await.unwrap();

        let response = client
            .get(uri!(results_non_admin(election.id)))
            .dispatch()
            .await;
        let results: ElectionResults = json(response, Status::Ok).await;
        assert!(results.results_announced);
        assert_eq!(results.total_votes, 5);
        assert_eq!(results.nota_votes, 1);
        assert_eq!(results.winner.id.as_deref(), Some("alice"));
        assert_eq!(results.runner.unwrap().id.as_deref(), Some("bob"));
        let counts = results.candidates.iter().map(|c| c.votes).collect::<Vec<_>>();
        assert_eq!(counts, [2, 2, 0]);
    }

    #[backend_test]
    async fn admin_sees_empty_results(client: Client, store: Store) {
        let election = with_votes(&store, ElectionState::Active, &[]).await;

        let response = client
            .get(uri!(results_admin(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        let results: ElectionResults = json(response, Status::Ok).await;
        assert_eq!(results.winner, Standing::no_votes_yet());
        assert!(results.runner.is_none());
    }
}

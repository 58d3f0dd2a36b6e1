use mongodb::{
    bson::{doc, from_document, Document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionState},
    db::{candidate_totals::CandidateTotals, election::Election, vote::Vote},
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, is_retryable_error, Coll, Id},
};

use super::{ElectionStore, LifecycleChange, Totals};

/// A store backed by a MongoDB replica set.
///
/// Multi-document transactions are used for the vote ledger, so the server
/// must be a replica set (a single-node one is fine).
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    votes: Coll<Vote>,
    totals: Coll<CandidateTotals>,
}

impl MongoStore {
    /// Wrap the given database, creating any missing indexes.
    pub async fn new(client: Client, db: &Database) -> Result<Self> {
        ensure_indexes_exist(db).await?;
        Ok(Self {
            client,
            elections: Coll::from_db(db),
            votes: Coll::from_db(db),
            totals: Coll::from_db(db),
        })
    }

    async fn start_transaction(&self) -> Result<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session
            .start_transaction(None)
            .await
            .map_err(transaction_error)?;
        Ok(session)
    }
}

/// One group of the ledger recount aggregation.
#[derive(Debug, Deserialize)]
struct LedgerCount {
    #[serde(rename = "_id")]
    candidate_id: CandidateId,
    votes: u64,
}

/// Aggregation pipeline counting an election's ledger entries per candidate.
fn recount_pipeline(election_id: Id) -> Vec<Document> {
    vec![
        doc! { "$match": { "election_id": election_id } },
        doc! { "$group": { "_id": "$candidate_id", "votes": { "$sum": 1_i64 } } },
    ]
}

/// Classify an error raised inside a transaction.
fn transaction_error(err: DbError) -> Error {
    if is_retryable_error(&err) {
        Error::Conflict(err.to_string())
    } else {
        Error::Db(err)
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn insert_election(&self, election: &Election) -> Result<bool> {
        match self.elections.insert_one(election, None).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key_error(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn election_by_code(&self, code: &str) -> Result<Option<Election>> {
        Ok(self.elections.find_one(doc! { "code": code }, None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let elections = self
            .elections
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn replace_election(&self, election: &Election) -> Result<bool> {
        let result = self
            .elections
            .replace_one(election.id.as_doc(), election, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn change_lifecycle(
        &self,
        id: Id,
        change: LifecycleChange,
    ) -> Result<Option<Election>> {
        let mut fields = Document::new();
        if let Some(state) = change.state {
            fields.insert("state", state);
        }
        if let Some(announced) = change.results_announced {
            fields.insert("results_announced", announced);
        }
        if fields.is_empty() {
            return self.election(id).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let election = self
            .elections
            .find_one_and_update(id.as_doc(), doc! { "$set": fields }, options)
            .await?;
        Ok(election)
    }

    async fn record_vote(&self, vote: &Vote) -> Result<()> {
        let mut session = self.start_transaction().await?;

        // Writing to the election document makes a concurrent lifecycle change
        // conflict with this transaction, so the state seen here is the state
        // at commit.
        let open = doc! {
            "_id": vote.election_id,
            "state": ElectionState::Active,
        };
        let touch = doc! {
            "$inc": { "ballot_seq": 1_i64 }
        };
        let gate = self
            .elections
            .update_one_with_session(open, touch, None, &mut session)
            .await
            .map_err(transaction_error)?;
        if gate.matched_count == 0 {
            // Dropping the session without committing aborts the transaction.
            drop(session);
            let election = self
                .election(vote.election_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("Election {}", vote.election_id)))?;
            election.require_open()?;
            // It opened in the meantime.
            return Err(Error::Conflict(format!(
                "Election {} changed state during the vote",
                vote.election_id
            )));
        }

        if let Err(err) = self
            .votes
            .insert_one_with_session(vote, None, &mut session)
            .await
        {
            return Err(if is_duplicate_key_error(&err) {
                Error::DuplicateVote {
                    election_id: vote.election_id,
                    voter_id: vote.voter_id,
                }
            } else {
                transaction_error(err)
            });
        }

        let filter = doc! {
            "election_id": vote.election_id,
            "candidate_id": &vote.candidate_id,
        };
        let update = doc! {
            "$inc": { "votes": 1_i64 }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        self.totals
            .update_one_with_session(filter, update, options, &mut session)
            .await
            .map_err(|err| {
                // Two first votes for the same candidate can race to create its totals.
                if is_duplicate_key_error(&err) {
                    Error::Conflict(err.to_string())
                } else {
                    transaction_error(err)
                }
            })?;

        session
            .commit_transaction()
            .await
            .map_err(transaction_error)?;
        Ok(())
    }

    async fn vote(&self, election_id: Id, voter_id: Id) -> Result<Option<Vote>> {
        let filter = doc! {
            "election_id": election_id,
            "voter_id": voter_id,
        };
        Ok(self.votes.find_one(filter, None).await?)
    }

    async fn vote_count(&self, election_id: Id) -> Result<u64> {
        let count = self
            .votes
            .count_documents(doc! { "election_id": election_id }, None)
            .await?;
        Ok(count)
    }

    async fn votes_by_voter(&self, voter_id: Id) -> Result<Vec<Vote>> {
        let options = FindOptions::builder().sort(doc! { "cast_at": -1 }).build();
        let votes = self
            .votes
            .find(doc! { "voter_id": voter_id }, options)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn totals(&self, election_id: Id) -> Result<Totals> {
        let totals = self
            .totals
            .find(doc! { "election_id": election_id }, None)
            .await?
            .map_ok(|t| (t.candidate_id, t.votes))
            .try_collect()
            .await?;
        Ok(totals)
    }

    async fn reconcile_totals(&self, election_id: Id) -> Result<Totals> {
        let mut session = self.start_transaction().await?;

        // Recount from the ledger.
        let mut recounted = Totals::new();
        let mut cursor = self
            .votes
            .aggregate_with_session(recount_pipeline(election_id), None, &mut session)
            .await
            .map_err(transaction_error)?;
        while let Some(group) = cursor.next(&mut session).await {
            let group = group.map_err(transaction_error)?;
            let count: LedgerCount = from_document(group).map_err(DbError::from)?;
            recounted.insert(count.candidate_id, count.votes);
        }

        // Overwrite the running totals.
        let filter = doc! { "election_id": election_id };
        self.totals
            .delete_many_with_session(filter, None, &mut session)
            .await
            .map_err(transaction_error)?;
        if !recounted.is_empty() {
            let new_totals = recounted
                .iter()
                .map(|(candidate_id, votes)| {
                    CandidateTotals::new(election_id, candidate_id.clone(), *votes)
                })
                .collect::<Vec<_>>();
            self.totals
                .insert_many_with_session(new_totals, None, &mut session)
                .await
                .map_err(transaction_error)?;
        }

        session
            .commit_transaction()
            .await
            .map_err(transaction_error)?;
        Ok(recounted)
    }
}

use defenserama_types::api::TrialWithVotes;
use defenserama_types::models::{Accusation, Character, Trial, TrialDetail, Vote};
use rand::RngCore;

use crate::error::StoreResult;
use crate::leaderboard;
use crate::models::{
    CharacterFilter, NewAccusation, NewCharacter, NewTrial, NewUser, NewVote, TrialFilter, UserRow,
};
use crate::random::pick_random;

/// Persistence contract shared by the SQLite and in-memory backends.
///
/// Calls block; async callers go through `spawn_blocking`. Every write is
/// durable by the time the call returns.
pub trait Store: Send + Sync {
    /// True when no users, characters or accusations exist yet.
    fn is_empty(&self) -> StoreResult<bool>;

    // -- Users --

    fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>>;
    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>>;
    /// Fails with `Duplicate` when the username is taken.
    fn create_user(&self, user: NewUser) -> StoreResult<UserRow>;

    // -- Characters --

    fn get_character(&self, id: i64) -> StoreResult<Option<Character>>;
    fn list_characters(&self, filter: &CharacterFilter) -> StoreResult<Vec<Character>>;
    fn create_character(&self, character: NewCharacter) -> StoreResult<Character>;

    // -- Accusations --

    fn get_accusation(&self, id: i64) -> StoreResult<Option<Accusation>>;
    fn list_accusations(&self) -> StoreResult<Vec<Accusation>>;
    fn create_accusation(&self, accusation: NewAccusation) -> StoreResult<Accusation>;

    // -- Trials --

    fn get_trial(&self, id: i64) -> StoreResult<Option<Trial>>;
    fn list_trials(&self, filter: &TrialFilter) -> StoreResult<Vec<Trial>>;
    fn get_trial_detail(&self, id: i64) -> StoreResult<Option<TrialDetail>>;
    /// The joined trial and its votes, read as one snapshot so the tally
    /// always matches the vote list.
    fn get_trial_with_votes(&self, id: i64) -> StoreResult<Option<TrialWithVotes>>;
    /// Trials matching `filter`, joined with their character and accusation.
    fn trial_details(&self, filter: &TrialFilter) -> StoreResult<Vec<TrialDetail>>;
    /// Starts at zero karma, active, ending three days from now.
    fn create_trial(&self, trial: NewTrial) -> StoreResult<Trial>;
    /// Clears `is_active`. Closing a closed trial succeeds and changes nothing.
    fn end_trial(&self, id: i64) -> StoreResult<Trial>;

    // -- Votes --

    fn get_vote(&self, id: i64) -> StoreResult<Option<Vote>>;
    fn get_vote_by_user_and_trial(&self, user_id: i64, trial_id: i64)
        -> StoreResult<Option<Vote>>;
    fn list_votes_for_trial(&self, trial_id: i64) -> StoreResult<Vec<Vote>>;

    /// Records a verdict and applies it to the trial tally and the
    /// character's karma as one unit.
    ///
    /// Fails with `NotFound` for an unknown trial or user and with
    /// `Duplicate` when the user already voted on the trial; neither
    /// failure mutates anything.
    fn cast_vote(&self, vote: NewVote) -> StoreResult<Vote>;

    // -- Projections --

    fn top_defenders(&self, limit: usize) -> StoreResult<Vec<Character>> {
        let all = self.list_characters(&CharacterFilter::default())?;
        Ok(leaderboard::top_defenders(all, limit))
    }

    fn hall_of_plain(&self, limit: usize) -> StoreResult<Vec<Character>> {
        let all = self.list_characters(&CharacterFilter::default())?;
        Ok(leaderboard::hall_of_plain(all, limit))
    }

    fn random_accusation(&self, rng: &mut dyn RngCore) -> StoreResult<Option<Accusation>> {
        Ok(pick_random(self.list_accusations()?, rng))
    }
}

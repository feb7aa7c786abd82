use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use defenserama_types::api::TrialWithVotes;
use defenserama_types::models::{
    Accusation, Character, DEFAULT_USER_AVATAR, Trial, TrialDetail, Vote,
};
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    CharacterFilter, NewAccusation, NewCharacter, NewTrial, NewUser, NewVote, TrialFilter, UserRow,
};
use crate::store::Store;

/// Non-persistent `Store`. Every table sits behind one lock, so each call
/// is atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<UserRow>,
    characters: Vec<Character>,
    accusations: Vec<Accusation>,
    trials: Vec<Trial>,
    votes: Vec<Vote>,
}

/// Rows are never deleted, so ids are dense and start at 1.
fn next_id<T>(rows: &[T]) -> i64 {
    rows.len() as i64 + 1
}

fn find<'a, T>(rows: &'a [T], id: i64, row_id: impl Fn(&T) -> i64) -> Option<&'a T> {
    rows.iter().find(|r| row_id(*r) == id)
}

impl MemoryState {
    fn user(&self, id: i64) -> Option<&UserRow> {
        find(&self.users, id, |u| u.id)
    }

    fn character(&self, id: i64) -> Option<&Character> {
        find(&self.characters, id, |c| c.id)
    }

    fn accusation(&self, id: i64) -> Option<&Accusation> {
        find(&self.accusations, id, |a| a.id)
    }

    fn trial(&self, id: i64) -> Option<&Trial> {
        find(&self.trials, id, |t| t.id)
    }

    fn vote_by_pair(&self, user_id: i64, trial_id: i64) -> Option<&Vote> {
        self.votes
            .iter()
            .find(|v| v.user_id == user_id && v.trial_id == trial_id)
    }

    fn require_user(&self, id: i64) -> StoreResult<()> {
        self.user(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    fn detail(&self, trial: &Trial) -> StoreResult<TrialDetail> {
        let character = self
            .character(trial.character_id)
            .ok_or_else(|| StoreError::not_found("character", trial.character_id))?;
        let accusation = self
            .accusation(trial.accusation_id)
            .ok_or_else(|| StoreError::not_found("accusation", trial.accusation_id))?;
        Ok(TrialDetail::new(
            trial.clone(),
            character.clone(),
            accusation.clone(),
        ))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store lock poisoned: {}", e).into())
    }
}

impl Store for MemoryStore {
    fn is_empty(&self) -> StoreResult<bool> {
        let state = self.lock()?;
        Ok(state.users.is_empty() && state.characters.is_empty() && state.accusations.is_empty())
    }

    // -- Users --

    fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>> {
        Ok(self.lock()?.user(id).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    fn create_user(&self, user: NewUser) -> StoreResult<UserRow> {
        let mut state = self.lock()?;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("Username already taken".into()));
        }
        let row = UserRow {
            id: next_id(&state.users),
            username: user.username,
            password: user.password,
            karma: 0,
            text_avatar: user
                .text_avatar
                .unwrap_or_else(|| DEFAULT_USER_AVATAR.to_string()),
            created_at: Utc::now(),
        };
        state.users.push(row.clone());
        Ok(row)
    }

    // -- Characters --

    fn get_character(&self, id: i64) -> StoreResult<Option<Character>> {
        Ok(self.lock()?.character(id).cloned())
    }

    fn list_characters(&self, filter: &CharacterFilter) -> StoreResult<Vec<Character>> {
        let state = self.lock()?;
        Ok(state
            .characters
            .iter()
            .filter(|c| filter.matches(c.user_id))
            .cloned()
            .collect())
    }

    fn create_character(&self, character: NewCharacter) -> StoreResult<Character> {
        let mut state = self.lock()?;
        if let Some(user_id) = character.user_id {
            state.require_user(user_id)?;
        }
        let created = Character {
            id: next_id(&state.characters),
            name: character.name,
            kind: character.kind,
            description: character.description,
            text_avatar: character.text_avatar,
            user_id: character.user_id,
            karma: 0,
            created_at: Utc::now(),
        };
        state.characters.push(created.clone());
        Ok(created)
    }

    // -- Accusations --

    fn get_accusation(&self, id: i64) -> StoreResult<Option<Accusation>> {
        Ok(self.lock()?.accusation(id).cloned())
    }

    fn list_accusations(&self) -> StoreResult<Vec<Accusation>> {
        Ok(self.lock()?.accusations.clone())
    }

    fn create_accusation(&self, accusation: NewAccusation) -> StoreResult<Accusation> {
        let mut state = self.lock()?;
        if let Some(user_id) = accusation.created_by {
            state.require_user(user_id)?;
        }
        let created = Accusation {
            id: next_id(&state.accusations),
            content: accusation.content,
            is_custom: accusation.is_custom,
            created_by: accusation.created_by,
            created_at: Utc::now(),
        };
        state.accusations.push(created.clone());
        Ok(created)
    }

    // -- Trials --

    fn get_trial(&self, id: i64) -> StoreResult<Option<Trial>> {
        Ok(self.lock()?.trial(id).cloned())
    }

    fn list_trials(&self, filter: &TrialFilter) -> StoreResult<Vec<Trial>> {
        let state = self.lock()?;
        Ok(state
            .trials
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn get_trial_detail(&self, id: i64) -> StoreResult<Option<TrialDetail>> {
        let state = self.lock()?;
        state.trial(id).map(|t| state.detail(t)).transpose()
    }

    fn get_trial_with_votes(&self, id: i64) -> StoreResult<Option<TrialWithVotes>> {
        let state = self.lock()?;
        let Some(trial) = state.trial(id) else {
            return Ok(None);
        };
        let detail = state.detail(trial)?;
        let votes = state
            .votes
            .iter()
            .filter(|v| v.trial_id == id)
            .cloned()
            .collect();
        Ok(Some(TrialWithVotes { detail, votes }))
    }

    fn trial_details(&self, filter: &TrialFilter) -> StoreResult<Vec<TrialDetail>> {
        let state = self.lock()?;
        state
            .trials
            .iter()
            .filter(|t| filter.matches(t))
            .map(|t| state.detail(t))
            .collect()
    }

    fn create_trial(&self, trial: NewTrial) -> StoreResult<Trial> {
        let mut state = self.lock()?;
        if state.character(trial.character_id).is_none() {
            return Err(StoreError::not_found("character", trial.character_id));
        }
        if state.accusation(trial.accusation_id).is_none() {
            return Err(StoreError::not_found("accusation", trial.accusation_id));
        }
        if let Some(user_id) = trial.user_id {
            state.require_user(user_id)?;
        }

        let created_at = Utc::now();
        let created = Trial {
            id: next_id(&state.trials),
            character_id: trial.character_id,
            accusation_id: trial.accusation_id,
            defense_title: trial.defense_title,
            defense_content: trial.defense_content,
            user_id: trial.user_id,
            karma_innocent: 0,
            karma_guilty: 0,
            is_active: true,
            end_time: Trial::end_time_for(created_at),
            created_at,
        };
        state.trials.push(created.clone());
        Ok(created)
    }

    fn end_trial(&self, id: i64) -> StoreResult<Trial> {
        let mut state = self.lock()?;
        let trial = state
            .trials
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::not_found("trial", id))?;
        trial.is_active = false;
        Ok(trial.clone())
    }

    // -- Votes --

    fn get_vote(&self, id: i64) -> StoreResult<Option<Vote>> {
        Ok(find(&self.lock()?.votes, id, |v| v.id).cloned())
    }

    fn get_vote_by_user_and_trial(
        &self,
        user_id: i64,
        trial_id: i64,
    ) -> StoreResult<Option<Vote>> {
        Ok(self.lock()?.vote_by_pair(user_id, trial_id).cloned())
    }

    fn list_votes_for_trial(&self, trial_id: i64) -> StoreResult<Vec<Vote>> {
        let state = self.lock()?;
        Ok(state
            .votes
            .iter()
            .filter(|v| v.trial_id == trial_id)
            .cloned()
            .collect())
    }

    fn cast_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let mut state = self.lock()?;

        let character_id = state
            .trial(vote.trial_id)
            .map(|t| t.character_id)
            .ok_or_else(|| StoreError::not_found("trial", vote.trial_id))?;
        state.require_user(vote.user_id)?;

        if state.vote_by_pair(vote.user_id, vote.trial_id).is_some() {
            warn!(
                "User {} already voted on trial {}",
                vote.user_id, vote.trial_id
            );
            return Err(StoreError::Duplicate(
                "User already voted on this trial".into(),
            ));
        }

        // Everything below runs under the same guard; no early returns past this point.
        let created = Vote {
            id: next_id(&state.votes),
            trial_id: vote.trial_id,
            user_id: vote.user_id,
            is_innocent: vote.is_innocent,
            created_at: Utc::now(),
        };
        state.votes.push(created.clone());

        if let Some(trial) = state.trials.iter_mut().find(|t| t.id == vote.trial_id) {
            if vote.is_innocent {
                trial.karma_innocent += 1;
            } else {
                trial.karma_guilty += 1;
            }
        }
        if let Some(character) = state.characters.iter_mut().find(|c| c.id == character_id) {
            character.karma += created.karma_delta();
        }

        Ok(created)
    }
}

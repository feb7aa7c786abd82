use chrono::Utc;
use defenserama_types::api::TrialWithVotes;
use defenserama_types::models::{
    Accusation, Character, DEFAULT_USER_AVATAR, Trial, TrialDetail, Vote,
};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info, warn};

use crate::Database;
use crate::error::{StoreError, StoreResult, is_unique_violation};
use crate::models::{
    CharacterFilter, NewAccusation, NewCharacter, NewTrial, NewUser, NewVote, TrialFilter, UserRow,
};
use crate::store::Store;

const USER_COLS: &str = "id, username, password, karma, text_avatar, created_at";
const CHARACTER_COLS: &str = "id, name, type, description, text_avatar, user_id, karma, created_at";
const ACCUSATION_COLS: &str = "id, content, is_custom, created_by, created_at";
const TRIAL_COLS: &str = "id, character_id, accusation_id, defense_title, defense_content, user_id, \
     karma_innocent, karma_guilty, is_active, end_time, created_at";
const VOTE_COLS: &str = "id, trial_id, user_id, is_innocent, created_at";

const CHARACTER_WIDTH: usize = 8;
const TRIAL_WIDTH: usize = 11;

impl Store for Database {
    fn is_empty(&self) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let rows: i64 = conn.query_row(
                "SELECT (SELECT COUNT(*) FROM users)
                      + (SELECT COUNT(*) FROM characters)
                      + (SELECT COUNT(*) FROM accusations)",
                [],
                |r| r.get(0),
            )?;
            Ok(rows == 0)
        })
    }

    // -- Users --

    fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], map_user).optional()?)
        })
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLS} FROM users WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], map_user).optional()?)
        })
    }

    fn create_user(&self, user: NewUser) -> StoreResult<UserRow> {
        let created_at = Utc::now();
        let text_avatar = user
            .text_avatar
            .unwrap_or_else(|| DEFAULT_USER_AVATAR.to_string());

        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, password, karma, text_avatar, created_at)
                 VALUES (?1, ?2, 0, ?3, ?4)",
                params![user.username, user.password, text_avatar, created_at],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::Duplicate("Username already taken".into()));
                }
                Err(e) => return Err(e.into()),
            }

            let row = UserRow {
                id: conn.last_insert_rowid(),
                username: user.username,
                password: user.password,
                karma: 0,
                text_avatar,
                created_at,
            };
            info!("Registered user {} ({})", row.id, row.username);
            Ok(row)
        })
    }

    // -- Characters --

    fn get_character(&self, id: i64) -> StoreResult<Option<Character>> {
        self.with_conn(|conn| query_character(conn, id))
    }

    fn list_characters(&self, filter: &CharacterFilter) -> StoreResult<Vec<Character>> {
        self.with_conn(|conn| {
            let rows = match filter.user_id {
                Some(user_id) => {
                    let sql = format!(
                        "SELECT {CHARACTER_COLS} FROM characters WHERE user_id = ?1 ORDER BY id"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([user_id], |r| map_character(r, 0))?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let sql = format!("SELECT {CHARACTER_COLS} FROM characters ORDER BY id");
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([], |r| map_character(r, 0))?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(rows)
        })
    }

    fn create_character(&self, character: NewCharacter) -> StoreResult<Character> {
        let created_at = Utc::now();

        self.with_conn_mut(|conn| {
            if let Some(user_id) = character.user_id {
                require_row(conn, "users", "user", user_id)?;
            }

            conn.execute(
                "INSERT INTO characters (name, type, description, text_avatar, user_id, karma, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    character.name,
                    character.kind,
                    character.description,
                    character.text_avatar,
                    character.user_id,
                    created_at,
                ],
            )?;

            Ok(Character {
                id: conn.last_insert_rowid(),
                name: character.name,
                kind: character.kind,
                description: character.description,
                text_avatar: character.text_avatar,
                user_id: character.user_id,
                karma: 0,
                created_at,
            })
        })
    }

    // -- Accusations --

    fn get_accusation(&self, id: i64) -> StoreResult<Option<Accusation>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ACCUSATION_COLS} FROM accusations WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], |r| map_accusation(r, 0)).optional()?)
        })
    }

    fn list_accusations(&self) -> StoreResult<Vec<Accusation>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ACCUSATION_COLS} FROM accusations ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |r| map_accusation(r, 0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn create_accusation(&self, accusation: NewAccusation) -> StoreResult<Accusation> {
        let created_at = Utc::now();

        self.with_conn_mut(|conn| {
            if let Some(user_id) = accusation.created_by {
                require_row(conn, "users", "user", user_id)?;
            }

            conn.execute(
                "INSERT INTO accusations (content, is_custom, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    accusation.content,
                    accusation.is_custom,
                    accusation.created_by,
                    created_at,
                ],
            )?;

            Ok(Accusation {
                id: conn.last_insert_rowid(),
                content: accusation.content,
                is_custom: accusation.is_custom,
                created_by: accusation.created_by,
                created_at,
            })
        })
    }

    // -- Trials --

    fn get_trial(&self, id: i64) -> StoreResult<Option<Trial>> {
        self.with_conn(|conn| query_trial(conn, id))
    }

    fn get_trial_detail(&self, id: i64) -> StoreResult<Option<TrialDetail>> {
        self.with_conn(|conn| {
            let mut details = query_details(conn, "WHERE t.id = ?1", vec![id])?;
            Ok(details.pop())
        })
    }

    fn get_trial_with_votes(&self, id: i64) -> StoreResult<Option<TrialWithVotes>> {
        // Both reads happen under the one connection lock, so no vote lands in between.
        self.with_conn(|conn| {
            let Some(detail) = query_details(conn, "WHERE t.id = ?1", vec![id])?.pop() else {
                return Ok(None);
            };
            let votes = query_votes(conn, id)?;
            Ok(Some(TrialWithVotes { detail, votes }))
        })
    }

    fn list_trials(&self, filter: &TrialFilter) -> StoreResult<Vec<Trial>> {
        let (where_sql, values) = trial_where(filter);
        self.with_conn(|conn| {
            let sql = format!("SELECT {TRIAL_COLS} FROM trials t {where_sql} ORDER BY t.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), |r| map_trial(r, 0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn trial_details(&self, filter: &TrialFilter) -> StoreResult<Vec<TrialDetail>> {
        let (where_sql, values) = trial_where(filter);
        self.with_conn(|conn| query_details(conn, &where_sql, values))
    }

    fn create_trial(&self, trial: NewTrial) -> StoreResult<Trial> {
        let created_at = Utc::now();
        let end_time = Trial::end_time_for(created_at);

        self.with_conn_mut(|conn| {
            require_row(conn, "characters", "character", trial.character_id)?;
            require_row(conn, "accusations", "accusation", trial.accusation_id)?;
            if let Some(user_id) = trial.user_id {
                require_row(conn, "users", "user", user_id)?;
            }

            conn.execute(
                "INSERT INTO trials (character_id, accusation_id, defense_title, defense_content,
                                     user_id, karma_innocent, karma_guilty, is_active, end_time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 1, ?6, ?7)",
                params![
                    trial.character_id,
                    trial.accusation_id,
                    trial.defense_title,
                    trial.defense_content,
                    trial.user_id,
                    end_time,
                    created_at,
                ],
            )?;

            let created = Trial {
                id: conn.last_insert_rowid(),
                character_id: trial.character_id,
                accusation_id: trial.accusation_id,
                defense_title: trial.defense_title,
                defense_content: trial.defense_content,
                user_id: trial.user_id,
                karma_innocent: 0,
                karma_guilty: 0,
                is_active: true,
                end_time,
                created_at,
            };
            info!(
                "Trial {} opened for character {} (ends {})",
                created.id, created.character_id, created.end_time
            );
            Ok(created)
        })
    }

    fn end_trial(&self, id: i64) -> StoreResult<Trial> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("UPDATE trials SET is_active = 0 WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(StoreError::not_found("trial", id));
            }
            query_trial(conn, id)?.ok_or_else(|| StoreError::not_found("trial", id))
        })
    }

    // -- Votes --

    fn get_vote(&self, id: i64) -> StoreResult<Option<Vote>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {VOTE_COLS} FROM votes WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], map_vote).optional()?)
        })
    }

    fn get_vote_by_user_and_trial(
        &self,
        user_id: i64,
        trial_id: i64,
    ) -> StoreResult<Option<Vote>> {
        self.with_conn(|conn| query_vote_by_pair(conn, user_id, trial_id))
    }

    fn list_votes_for_trial(&self, trial_id: i64) -> StoreResult<Vec<Vote>> {
        self.with_conn(|conn| query_votes(conn, trial_id))
    }

    fn cast_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let created_at = Utc::now();

        self.with_conn_mut(|conn| {
            // The vote row and both counter updates commit together or not at all.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let character_id: i64 = tx
                .query_row(
                    "SELECT character_id FROM trials WHERE id = ?1",
                    [vote.trial_id],
                    |r| r.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::not_found("trial", vote.trial_id))?;
            require_row(&tx, "users", "user", vote.user_id)?;

            if query_vote_by_pair(&tx, vote.user_id, vote.trial_id)?.is_some() {
                warn!(
                    "User {} already voted on trial {}",
                    vote.user_id, vote.trial_id
                );
                return Err(duplicate_vote());
            }

            let inserted = tx.execute(
                "INSERT INTO votes (trial_id, user_id, is_innocent, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![vote.trial_id, vote.user_id, vote.is_innocent, created_at],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Err(duplicate_vote()),
                Err(e) => return Err(e.into()),
            }
            let cast = Vote {
                id: tx.last_insert_rowid(),
                trial_id: vote.trial_id,
                user_id: vote.user_id,
                is_innocent: vote.is_innocent,
                created_at,
            };

            let tally = if cast.is_innocent {
                "UPDATE trials SET karma_innocent = karma_innocent + 1 WHERE id = ?1"
            } else {
                "UPDATE trials SET karma_guilty = karma_guilty + 1 WHERE id = ?1"
            };
            tx.execute(tally, [cast.trial_id])?;
            tx.execute(
                "UPDATE characters SET karma = karma + ?1 WHERE id = ?2",
                [cast.karma_delta(), character_id],
            )?;

            tx.commit()?;

            debug!(
                "Vote {} on trial {} by user {} (innocent: {})",
                cast.id, cast.trial_id, cast.user_id, cast.is_innocent
            );
            Ok(cast)
        })
    }
}

fn duplicate_vote() -> StoreError {
    StoreError::Duplicate("User already voted on this trial".into())
}

/// Fails with `NotFound` unless `table` has a row with `id`.
fn require_row(conn: &Connection, table: &str, entity: &'static str, id: i64) -> StoreResult<()> {
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
    conn.query_row(&sql, [id], |_| Ok(()))
        .optional()?
        .ok_or_else(|| StoreError::not_found(entity, id))
}

fn query_character(conn: &Connection, id: i64) -> StoreResult<Option<Character>> {
    let sql = format!("SELECT {CHARACTER_COLS} FROM characters WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], |r| map_character(r, 0)).optional()?)
}

fn query_trial(conn: &Connection, id: i64) -> StoreResult<Option<Trial>> {
    let sql = format!("SELECT {TRIAL_COLS} FROM trials WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], |r| map_trial(r, 0)).optional()?)
}

fn query_votes(conn: &Connection, trial_id: i64) -> StoreResult<Vec<Vote>> {
    let sql = format!("SELECT {VOTE_COLS} FROM votes WHERE trial_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([trial_id], map_vote)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_vote_by_pair(conn: &Connection, user_id: i64, trial_id: i64) -> StoreResult<Option<Vote>> {
    let sql = format!("SELECT {VOTE_COLS} FROM votes WHERE user_id = ?1 AND trial_id = ?2");
    Ok(conn
        .query_row(&sql, [user_id, trial_id], map_vote)
        .optional()?)
}

/// WHERE clause over the `t` alias plus its positional values.
fn trial_where(filter: &TrialFilter) -> (String, Vec<i64>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if filter.active_only {
        clauses.push("t.is_active = 1".to_string());
    }
    if let Some(character_id) = filter.character_id {
        values.push(character_id);
        clauses.push(format!("t.character_id = ?{}", values.len()));
    }
    if let Some(user_id) = filter.user_id {
        values.push(user_id);
        clauses.push(format!("t.user_id = ?{}", values.len()));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

fn query_details(
    conn: &Connection,
    where_sql: &str,
    values: Vec<i64>,
) -> StoreResult<Vec<TrialDetail>> {
    // JOIN character and accusation in a single query (no N+1)
    let sql = format!(
        "SELECT {}, {}, {}
         FROM trials t
         JOIN characters c ON c.id = t.character_id
         JOIN accusations a ON a.id = t.accusation_id
         {where_sql}
         ORDER BY t.id",
        prefixed("t", TRIAL_COLS),
        prefixed("c", CHARACTER_COLS),
        prefixed("a", ACCUSATION_COLS),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            let trial = map_trial(row, 0)?;
            let character = map_character(row, TRIAL_WIDTH)?;
            let accusation = map_accusation(row, TRIAL_WIDTH + CHARACTER_WIDTH)?;
            Ok(TrialDetail::new(trial, character, accusation))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn prefixed(alias: &str, cols: &str) -> String {
    cols.split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        karma: row.get(3)?,
        text_avatar: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_character(row: &Row<'_>, at: usize) -> rusqlite::Result<Character> {
    Ok(Character {
        id: row.get(at)?,
        name: row.get(at + 1)?,
        kind: row.get(at + 2)?,
        description: row.get(at + 3)?,
        text_avatar: row.get(at + 4)?,
        user_id: row.get(at + 5)?,
        karma: row.get(at + 6)?,
        created_at: row.get(at + 7)?,
    })
}

fn map_accusation(row: &Row<'_>, at: usize) -> rusqlite::Result<Accusation> {
    Ok(Accusation {
        id: row.get(at)?,
        content: row.get(at + 1)?,
        is_custom: row.get(at + 2)?,
        created_by: row.get(at + 3)?,
        created_at: row.get(at + 4)?,
    })
}

fn map_trial(row: &Row<'_>, at: usize) -> rusqlite::Result<Trial> {
    Ok(Trial {
        id: row.get(at)?,
        character_id: row.get(at + 1)?,
        accusation_id: row.get(at + 2)?,
        defense_title: row.get(at + 3)?,
        defense_content: row.get(at + 4)?,
        user_id: row.get(at + 5)?,
        karma_innocent: row.get(at + 6)?,
        karma_guilty: row.get(at + 7)?,
        is_active: row.get(at + 8)?,
        end_time: row.get(at + 9)?,
        created_at: row.get(at + 10)?,
    })
}

fn map_vote(row: &Row<'_>) -> rusqlite::Result<Vote> {
    Ok(Vote {
        id: row.get(0)?,
        trial_id: row.get(1)?,
        user_id: row.get(2)?,
        is_innocent: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn setup() -> (Arc<Database>, i64) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let character = db
            .create_character(NewCharacter {
                name: "Darth Vader".into(),
                kind: "VILLAIN".into(),
                description: "Breathing heavily in court".into(),
                text_avatar: "(-_-)".into(),
                user_id: None,
            })
            .unwrap();
        let accusation = db
            .create_accusation(NewAccusation {
                content: "stealing the Death Star's toilet paper".into(),
                is_custom: false,
                created_by: None,
            })
            .unwrap();
        let trial = db
            .create_trial(NewTrial {
                character_id: character.id,
                accusation_id: accusation.id,
                defense_title: "Force choke? Never".into(),
                defense_content: "I only breathe loudly".into(),
                user_id: None,
            })
            .unwrap();
        (db, trial.id)
    }

    #[test]
    fn concurrent_duplicate_votes_count_once() {
        let (db, trial_id) = setup();
        let user = db
            .create_user(NewUser {
                username: "racer".into(),
                password: "hash".into(),
                text_avatar: None,
            })
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                thread::spawn(move || {
                    db.cast_vote(NewVote {
                        user_id: user.id,
                        trial_id,
                        is_innocent: i % 2 == 0,
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, StoreError::Duplicate(_)))
        );

        let trial = db.get_trial(trial_id).unwrap().unwrap();
        assert_eq!(trial.total_votes(), 1);
        assert_eq!(db.list_votes_for_trial(trial_id).unwrap().len(), 1);

        let character = db.get_character(trial.character_id).unwrap().unwrap();
        assert_eq!(character.karma.abs(), 1);
    }

    #[test]
    fn unique_constraint_guards_votes_table() {
        let (db, trial_id) = setup();
        let user = db
            .create_user(NewUser {
                username: "direct".into(),
                password: "hash".into(),
                text_avatar: None,
            })
            .unwrap();
        db.cast_vote(NewVote {
            user_id: user.id,
            trial_id,
            is_innocent: true,
        })
        .unwrap();

        let raw = db.with_conn(|conn| {
            Ok(conn.execute(
                "INSERT INTO votes (trial_id, user_id, is_innocent, created_at) VALUES (?1, ?2, 0, ?3)",
                params![trial_id, user.id, Utc::now()],
            ))
        });
        let err = raw.unwrap().unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn timestamps_round_trip_through_sqlite() {
        let (db, trial_id) = setup();
        let trial = db.get_trial(trial_id).unwrap().unwrap();
        assert_eq!(trial.end_time, Trial::end_time_for(trial.created_at));
    }

    #[test]
    fn prefixed_columns() {
        assert_eq!(prefixed("v", "id, trial_id"), "v.id, v.trial_id");
    }
}

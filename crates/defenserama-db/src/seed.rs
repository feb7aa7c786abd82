use tracing::info;

use crate::error::StoreResult;
use crate::models::{NewAccusation, NewCharacter};
use crate::store::Store;

const SEED_ACCUSATIONS: &[&str] = &[
    "stealing all the Death Star's toilet paper during the galactic pandemic of 3077",
    "secretly replacing all lightsabers with glow sticks at the Jedi Academy party",
    "using the Infinity Stones to make all pizza toppings pineapple",
    "hacking into Hogwarts' Wi-Fi to download pirated movies",
    "selling fake Time Turner watches on Galactic eBay",
    "intentionally provided vague directions to Mordor to extend his book deal and increase merchandise sales",
    "allegedly used his shield as a dinner plate and consumed 47 pizzas without sharing with the Avengers",
    "teaching younglings to say 'wazzup' instead of 'may the force be with you'",
];

// (name, type, description, text avatar)
const SEED_CHARACTERS: &[(&str, &str, &str, &str)] = &[
    (
        "Darth Vader",
        "VILLAIN",
        "Formerly known as Anakin Skywalker, now breathing heavily in court and using The Force to object.",
        "(-_-)",
    ),
    (
        "Wonder Woman",
        "HERO",
        "Amazon princess with a lasso of truth that makes courtroom testimony painfully honest.",
        "⌒(✿❦✿)⌒",
    ),
    (
        "Sherlock Holmes",
        "DETECTIVE",
        "Master detective who can deduce your life story but can't deduce why he's being sued.",
        "(⌐■_■)🔍",
    ),
    (
        "Captain America",
        "HERO",
        "Super soldier with a shield that doubles as dinner plate for pizza parties.",
        "[◎]ᕦ(ò_óˇ)ᕤ",
    ),
    (
        "Gandalf",
        "WIZARD",
        "Grey wizard with questionable GPS skills and a tendency to arrive precisely when he means to.",
        "≧❂≦✧*",
    ),
];

/// Inserts the system accusations and characters into an empty store.
/// Returns whether anything was inserted.
pub fn seed_if_empty(store: &dyn Store) -> StoreResult<bool> {
    if !store.is_empty()? {
        info!("Store already has data, skipping seed");
        return Ok(false);
    }

    for content in SEED_ACCUSATIONS {
        store.create_accusation(NewAccusation {
            content: content.to_string(),
            is_custom: false,
            created_by: None,
        })?;
    }

    for (name, kind, description, avatar) in SEED_CHARACTERS {
        store.create_character(NewCharacter {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            text_avatar: avatar.to_string(),
            user_id: None,
        })?;
    }

    info!(
        "Seeded {} accusations and {} characters",
        SEED_ACCUSATIONS.len(),
        SEED_CHARACTERS.len()
    );
    Ok(true)
}

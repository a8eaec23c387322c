use std::collections::HashSet;

use thiserror::Error;

/// Codenames handed out to players. Short, lowercase and easy to type on a phone.
pub const CODENAMES: &[&str] = &[
    "ball", "eight", "tiger", "comb", "cat", "dog", "table", "chair", "book", "street",
    "park", "glass", "plate", "roof", "floor", "cable", "bulb", "cloud", "rain", "bucket",
    "car", "bike", "boat", "steam", "plant", "stone", "frame", "door", "map", "key",
    "notes", "profile", "tower", "clock", "metal", "paper", "tape", "radio", "lantern", "basket",
    "helmet", "glove", "box", "filter", "motor", "bench", "field", "stamp", "suit", "lead",
];

pub const MISSIONS: &[&str] = &[
    // Words
    "Get someone to say the word 'okay'.",
    "Get someone to say 'tomorrow'.",
    "Get someone to say 'yes' without asking them directly.",
    "Get someone to say 'no' in reply to something you said.",
    "Get someone to mention a capital city.",
    "Get someone to say 'secret'.",
    "Get someone to say 'mission'.",
    "Get someone to say 'blue'.",
    "Get someone to say 'green'.",
    "Get someone to say 'code'.",
    "Get someone to say 'team'.",
    "Get someone to mention the weather.",
    "Get someone to say 'problem'.",
    "Get someone to say 'solution'.",
    "Get someone to say 'idea'.",
    "Get someone to say 'important'.",
    "Get someone to say 'weird'.",
    "Get someone to say 'fast'.",
    "Get someone to say 'slow'.",
    "Get someone to say 'left'.",
    "Get someone to say 'right'.",
    "Get someone to say 'always'.",
    "Get someone to say 'never'.",
    "Get someone to say 'perfect'.",
    "Get someone to say 'almost'.",
    "Get someone to say 'wait'.",
    "Get someone to say 'later'.",
    // Borrowing and objects
    "Get someone to lend you a pen.",
    "Get someone to give you a sheet of paper.",
    "Borrow a phone charger.",
    "Get someone to offer you a chair.",
    "Get someone to hand you a jacket.",
    "Get someone to offer you gum or a sweet.",
    "Get someone to lend you their glasses for a moment.",
    "Get someone to pass you the salt.",
    "Get someone to lend you a marker.",
    "Get someone to hand you a glass.",
    "Get someone to lend you an umbrella.",
    "Get someone to lend you their watch for a second.",
    "Get someone to pass you the remote.",
    "Get someone to lend you a notebook.",
    // Actions
    "Get someone to open a window.",
    "Get someone to close a door.",
    "Get someone to switch on a light.",
    "Get someone to propose a toast.",
    "Get someone to clap.",
    "Get someone to whistle.",
    "Get someone to sing a line of a song.",
    "Get someone to count to five out loud.",
    "Get someone to take a photo.",
    "Get someone to ask you to repeat something.",
    "Get someone to laugh at a pun.",
    "Get someone to wave at you.",
    "Get someone to give you a high five.",
    "Get someone to give you a fist bump.",
    "Get someone to swap seats with you.",
    "Get someone to yawn without suggesting it.",
    "Get someone to hum a tune.",
    "Get someone to knock on the table.",
    "Get someone to close their eyes for a second.",
    "Get someone to imitate an animal sound.",
    // Looking and pointing
    "Get someone to look at the ceiling.",
    "Get someone to look at the floor.",
    "Get someone to look out of a window.",
    "Get someone to check the time.",
    "Get someone to point at a door.",
    "Get someone to check their pocket.",
    "Get someone to look at their shoes.",
    "Get someone to read a sign out loud.",
    "Get someone to touch their nose.",
    "Get someone to look under the table.",
    "Get someone to count the people in the room.",
    // Questions and courtesy
    "Get someone to ask you the time.",
    "Get someone to ask you your name.",
    "Get someone to ask what you do for a living.",
    "Get someone to ask where you are from.",
    "Get someone to compliment you on something small.",
    "Get someone to thank you twice.",
    "Get someone to recommend you a song.",
    "Get someone to recommend you a series.",
    "Get someone to recommend you a restaurant.",
    "Get someone to ask for your opinion.",
    "Get someone to tell you a joke.",
    "Get someone to tell you an anecdote.",
    "Get someone to say 'well played'.",
    "Get someone to ask about your weekend plans.",
    "Get someone to ask about your hobbies.",
    // Small challenges
    "Get someone to stack three objects.",
    "Get someone to fold a piece of paper in three.",
    "Get someone to draw a circle and a square.",
    "Get someone to explain a simple rule to you.",
    "Get someone to tell a story in ten seconds.",
    "Get someone to make up a word.",
    "Get someone to tell you their favourite colour.",
    "Get someone to guess a number between 1 and 5.",
    "Get someone to choose between two options you offer.",
    "Get someone to share a fun fact.",
    "Get someone to strike a funny pose.",
    "Get someone to say 'I don't believe it'.",
    "Get someone to say 'could be'.",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no codenames")]
    NoCodenames,
    #[error("catalog has no missions")]
    NoMissions,
    #[error("blank codename in catalog")]
    BlankCodename,
    #[error("codename {0:?} appears more than once")]
    DuplicateCodename(String),
}

/// Read-only source of codenames and mission prompts for a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    codenames: Vec<String>,
    missions: Vec<String>,
}

impl Catalog {
    /// Builds a catalog, rejecting blank codenames and codenames that only
    /// differ by letter case, since logins compare case-insensitively.
    pub fn new<C, M>(codenames: C, missions: M) -> Result<Self, CatalogError>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        let codenames: Vec<String> = codenames.into_iter().map(Into::into).collect();
        let missions: Vec<String> = missions.into_iter().map(Into::into).collect();

        if codenames.is_empty() {
            return Err(CatalogError::NoCodenames);
        }
        if missions.is_empty() {
            return Err(CatalogError::NoMissions);
        }

        let mut seen = HashSet::new();
        for name in &codenames {
            if name.trim().is_empty() || name.trim() != name {
                return Err(CatalogError::BlankCodename);
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(CatalogError::DuplicateCodename(name.clone()));
            }
        }

        Ok(Self {
            codenames,
            missions,
        })
    }

    pub fn builtin() -> Self {
        Self {
            codenames: CODENAMES.iter().map(|s| s.to_string()).collect(),
            missions: MISSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn codenames(&self) -> &[String] {
        &self.codenames
    }

    pub fn missions(&self) -> &[String] {
        &self.missions
    }

    /// Case-insensitive membership check, used to keep the admin identifier
    /// from shadowing a codename.
    pub fn contains_codename(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.codenames.iter().any(|c| c.to_lowercase() == name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::collections::HashMap;
use std::error::Error;

static WORDS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/words/lists");

/// Languages a round can be played in. Drives the word list, the classifier
/// prompt and the UI strings.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[value(alias = "en")]
    English,
    #[value(alias = "it")]
    Italian,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Italian];

    /// Two letter code, also the file stem of the embedded word list
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Italian => "it",
        }
    }

    /// The other language, for the in-game switcher
    pub fn next(self) -> Language {
        match self {
            Language::English => Language::Italian,
            Language::Italian => Language::English,
        }
    }

    /// Label used when the classifier answers with nothing usable
    pub fn undefined_label(&self) -> &'static str {
        match self {
            Language::English => "undefined",
            Language::Italian => "indefinito",
        }
    }
}

/// Source of target words for new rounds
pub trait WordSource {
    /// Must not fail: a round cannot start without a word.
    fn next_word(&self, language: Language) -> String;
}

#[derive(Deserialize, Clone, Debug)]
pub struct WordList {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

/// Word lists embedded in the binary, one per language
#[derive(Debug, Clone)]
pub struct WordBank {
    lists: HashMap<Language, WordList>,
}

impl WordBank {
    pub fn new() -> Self {
        let lists = Language::ALL
            .iter()
            .map(|lang| {
                let list = read_list_from_file(&format!("{}.json", lang.code()))
                    .unwrap_or_else(|e| panic!("embedded word list for {lang} is broken: {e}"));
                (*lang, list)
            })
            .collect();
        Self { lists }
    }

    pub fn list(&self, language: Language) -> &WordList {
        &self.lists[&language]
    }
}

impl Default for WordBank {
    fn default() -> Self {
        Self::new()
    }
}

impl WordSource for WordBank {
    fn next_word(&self, language: Language) -> String {
        let mut rng = rand::thread_rng();
        self.list(language)
            .words
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| language.undefined_label().to_string())
    }
}

fn read_list_from_file(file_name: &str) -> Result<WordList, Box<dyn Error>> {
    let file = WORDS_DIR
        .get_file(file_name)
        .ok_or_else(|| format!("word list {file_name} not found"))?;

    let file_as_str = file
        .contents_utf8()
        .ok_or("unable to interpret word list as a string")?;

    Ok(from_str(file_as_str)?)
}

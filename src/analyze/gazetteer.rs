// src/analyze/gazetteer.rs

use std::{fs, path::Path};

use crate::error::{Result, SourceError};

/// Reference list of place names used to spot geographic columns by value.
pub trait Gazetteer: Send + Sync {
    /// Case-insensitive: does `value` contain a known place name?
    fn matches(&self, value: &str) -> bool;
}

/// Bulgarian districts and major cities, Cyrillic and Latin spellings.
const BULGARIAN_PLACES: &[&str] = &[
    "софия", "пловдив", "варна", "бургас", "русе", "стара загора", "плевен", "сливен",
    "добрич", "шумен", "перник", "хасково", "монтана", "ямбол", "видин", "враца",
    "благоевград", "кърджали", "кюстендил", "ловеч", "разград", "силистра", "смолян",
    "търговище", "габрово", "пазарджик", "велико търново", "sofia", "plovdiv", "varna",
    "burgas", "ruse", "stara zagora", "pleven", "sliven", "dobrich", "shumen", "pernik",
    "haskovo", "montana", "yambol", "vidin", "vratsa", "blagoevgrad", "kardzhali",
    "kyustendil", "lovech", "razgrad", "silistra", "smolyan", "targovishte", "gabrovo",
    "pazardzhik", "veliko tarnovo",
];

/// A plain list of lower-cased place names matched by substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceList {
    names: Vec<String>,
}

impl Default for PlaceList {
    fn default() -> Self {
        Self::new(BULGARIAN_PLACES.iter().copied())
    }
}

impl PlaceList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// One place name per line; blank lines and `#` comments are ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SourceError::Config(format!("reading {}: {}", path.display(), e)))?;
        Ok(Self::new(
            text.lines().filter(|l| !l.trim_start().starts_with('#')),
        ))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Gazetteer for PlaceList {
    fn matches(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        self.names.iter().any(|n| lower.contains(n.as_str()))
    }
}

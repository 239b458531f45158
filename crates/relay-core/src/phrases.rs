//! Objection phrase dictionary.
//!
//! An ordered, immutable list of trigger phrases and their scripted
//! rebuttals. Matching is case-insensitive substring containment, scanned in
//! insertion order: the first-inserted phrase contained in the input wins,
//! even when a later phrase is longer or more specific.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RelayError, Result};

/// A trigger phrase and the response shown when it is heard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PhraseEntry {
    phrase: String,
    response: String,
}

impl PhraseEntry {
    /// Build an entry, rejecting a blank or non-lowercase phrase and a blank
    /// response.
    pub fn new(phrase: impl Into<String>, response: impl Into<String>) -> Result<Self> {
        let phrase = phrase.into();
        let response = response.into();

        if phrase.trim().is_empty() {
            return Err(RelayError::Dictionary(
                "trigger phrase must not be empty".to_string(),
            ));
        }
        if phrase.to_lowercase() != phrase {
            return Err(RelayError::Dictionary(format!(
                "trigger phrase '{}' must be lowercase",
                phrase
            )));
        }
        if response.trim().is_empty() {
            return Err(RelayError::Dictionary(format!(
                "response for '{}' must not be empty",
                phrase
            )));
        }

        Ok(Self { phrase, response })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn response(&self) -> &str {
        &self.response
    }
}

/// On-disk dictionary format: an ordered `[[entries]]` array.
#[derive(Debug, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    phrase: String,
    response: String,
}

/// The fixed set of trigger phrases, in insertion order.
#[derive(Clone, Debug)]
pub struct PhraseDictionary {
    entries: Vec<PhraseEntry>,
}

impl PhraseDictionary {
    /// Build a dictionary from `(phrase, response)` pairs, keeping their order.
    ///
    /// Fails on an empty list, a duplicate phrase, or any entry that
    /// [`PhraseEntry::new`] rejects.
    pub fn new<I, P, R>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (phrase, response) in pairs {
            let entry = PhraseEntry::new(phrase, response)?;
            if !seen.insert(entry.phrase.clone()) {
                return Err(RelayError::Dictionary(format!(
                    "duplicate trigger phrase '{}'",
                    entry.phrase
                )));
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(RelayError::Dictionary(
                "dictionary has no entries".to_string(),
            ));
        }

        Ok(Self { entries })
    }

    /// The stock sales-objection dictionary.
    pub fn builtin() -> Self {
        let entries = BUILTIN_OBJECTIONS
            .iter()
            .map(|(phrase, response)| PhraseEntry {
                phrase: (*phrase).to_string(),
                response: (*response).to_string(),
            })
            .collect();
        Self { entries }
    }

    /// Load a dictionary from a TOML file of `[[entries]]` tables.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: DictionaryFile = toml::from_str(&content)?;
        let dictionary = Self::new(file.entries.into_iter().map(|e| (e.phrase, e.response)))?;
        info!(
            entries = dictionary.len(),
            "Phrase dictionary loaded from {}",
            path.display()
        );
        Ok(dictionary)
    }

    /// Find the first entry whose phrase occurs in the case-folded `text`.
    pub fn lookup(&self, text: &str) -> Option<&PhraseEntry> {
        if text.is_empty() {
            return None;
        }
        let folded = text.to_lowercase();
        self.entries
            .iter()
            .find(|entry| folded.contains(entry.phrase.as_str()))
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[PhraseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PhraseDictionary {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_OBJECTIONS: &[(&str, &str)] = &[
    (
        "too expensive",
        "I understand that cost is a key consideration. Could you tell me what a reasonable budget looks like for a solution like this?",
    ),
    (
        "don't have time",
        "I appreciate you're busy. I can make this quick. What's the best time for a short, 5-minute call next week?",
    ),
    (
        "need to think about it",
        "That's fair. What specific information do you need to review before making a decision?",
    ),
    (
        "not interested",
        "I understand. Could you help me understand what's not a fit so I don't waste your time in the future?",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> PhraseDictionary {
        PhraseDictionary::new([("too expensive", "R1"), ("not interested", "R2")]).unwrap()
    }

    #[test]
    fn test_builtin_order_and_invariants() {
        let dict = PhraseDictionary::builtin();
        let phrases: Vec<&str> = dict.entries().iter().map(PhraseEntry::phrase).collect();
        assert_eq!(
            phrases,
            vec![
                "too expensive",
                "don't have time",
                "need to think about it",
                "not interested"
            ]
        );

        // The builtin table bypasses `new`; make sure it would pass it anyway.
        let rebuilt = PhraseDictionary::new(
            dict.entries()
                .iter()
                .map(|e| (e.phrase().to_string(), e.response().to_string())),
        );
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn test_lookup_substring_match() {
        let dict = sample();
        let hit = dict.lookup("honestly this is too expensive for us").unwrap();
        assert_eq!(hit.phrase(), "too expensive");
        assert_eq!(hit.response(), "R1");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let dict = sample();
        let hit = dict.lookup("We are NOT Interested, thanks").unwrap();
        assert_eq!(hit.response(), "R2");
    }

    #[test]
    fn test_lookup_first_inserted_wins() {
        let dict = sample();
        let text = "I think it's too expensive and not interested";
        for _ in 0..10 {
            assert_eq!(dict.lookup(text).unwrap().phrase(), "too expensive");
        }

        // Reversed insertion order flips the winner.
        let reversed =
            PhraseDictionary::new([("not interested", "R2"), ("too expensive", "R1")]).unwrap();
        assert_eq!(reversed.lookup(text).unwrap().phrase(), "not interested");
    }

    #[test]
    fn test_lookup_prefers_order_over_length() {
        let dict = PhraseDictionary::new([
            ("time", "short"),
            ("don't have time", "long"),
        ])
        .unwrap();
        assert_eq!(dict.lookup("I don't have time").unwrap().response(), "short");
    }

    #[test]
    fn test_lookup_no_match() {
        let dict = sample();
        assert!(dict.lookup("completely unrelated text").is_none());
        assert!(dict.lookup("").is_none());
        assert!(dict.lookup("   ").is_none());
    }

    #[test]
    fn test_lookup_does_not_stem_or_fuzz() {
        let dict = sample();
        assert!(dict.lookup("too expense").is_none());
        assert!(dict.lookup("tooexpensive").is_none());
    }

    #[test]
    fn test_rejects_invalid_entries() {
        assert!(PhraseEntry::new("", "R").is_err());
        assert!(PhraseEntry::new("  ", "R").is_err());
        assert!(PhraseEntry::new("Too Expensive", "R").is_err());
        assert!(PhraseEntry::new("too expensive", "").is_err());
        assert!(PhraseEntry::new("too expensive", " \n").is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let dup = PhraseDictionary::new([("a b", "1"), ("a b", "2")]);
        assert!(matches!(dup, Err(RelayError::Dictionary(msg)) if msg.contains("duplicate")));

        let empty: Result<PhraseDictionary> = PhraseDictionary::new(Vec::<(String, String)>::new());
        assert!(empty.is_err());
    }

    #[test]
    fn test_load_from_toml_preserves_order() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[entries]]
phrase = "send me an email"
response = "Happy to. What should the email cover so it's worth your time?"

[[entries]]
phrase = "email"
response = "generic"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let dict = PhraseDictionary::load(file.path()).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(
            dict.lookup("just send me an email").unwrap().phrase(),
            "send me an email"
        );
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[[entries]]\nphrase = \"Upper\"\nresponse = \"x\"\n").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            PhraseDictionary::load(file.path()),
            Err(RelayError::Dictionary(_))
        ));

        assert!(matches!(
            PhraseDictionary::load(Path::new("/nonexistent/phrases.toml")),
            Err(RelayError::Io(_))
        ));
    }
}

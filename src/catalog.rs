//! In-memory casting catalog
//!
//! Three tables loaded from CSV: `talents.csv`, `topics.csv` and
//! `experts.csv`. Rows live in `Vec` arenas with `HashMap` indexes built
//! once per load. [`Catalog::reload`] builds a fresh set of tables and
//! swaps them in whole, so readers never see a half-loaded catalog.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::classifier::{Intent, tokenize};
use crate::{Error, Result};

const TALENTS_FILE: &str = "talents.csv";
const TOPICS_FILE: &str = "topics.csv";
const EXPERTS_FILE: &str = "experts.csv";

/// Topics shipped with the binary, used when no catalog directory is set
const BUILTIN_TOPICS: &str = "\
intent,title,answer
contract,Standard engagement terms,\"Our standard engagement covers the shoot days, usage rights for the agreed media and territory, and a cancellation window of 48 hours. Extended usage or buyouts are quoted separately.\"
schedule,Booking and availability,\"Send us the shoot dates, location and the roles you need. We confirm talent availability within one business day and hold dates for 72 hours.\"
pricing,Fees and quotes,\"Fees depend on the role, usage and number of shoot days. Share your budget range and we will put together a quote with options.\"
general,How we work,\"We help productions find talent, agree contracts, schedule shoots and connect with industry experts. Tell us about your project to get started.\"
";

/// A performer on the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Talent {
    pub id: String,
    pub name: String,
    /// Primary category (e.g. "actor", "model", "voice")
    pub category: String,
    #[serde(default)]
    pub location: String,
    /// Semicolon-separated skill tags
    #[serde(default)]
    pub tags: String,
}

impl Talent {
    fn tag_list(&self) -> impl Iterator<Item = String> + '_ {
        self.tags
            .split(';')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }
}

/// Canned knowledge for one intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Intent label this topic answers
    pub intent: String,
    pub title: String,
    pub answer: String,
}

/// An industry expert available for introductions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    pub name: String,
    pub specialty: String,
    #[serde(default)]
    pub bio: String,
}

/// Row counts after a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub talents: usize,
    pub topics: usize,
    pub experts: usize,
}

/// One consistent generation of catalog tables
#[derive(Debug, Default)]
struct Tables {
    talents: Vec<Talent>,
    topics: Vec<Topic>,
    experts: Vec<Expert>,
    /// Lowercased category or tag to talent rows
    talents_by_term: HashMap<String, Vec<usize>>,
    /// Intent to topic row; first row wins
    topic_by_intent: HashMap<Intent, usize>,
    /// Lowercased specialty word to expert rows
    experts_by_term: HashMap<String, Vec<usize>>,
}

impl Tables {
    fn build(talents: Vec<Talent>, topics: Vec<Topic>, experts: Vec<Expert>) -> Self {
        let mut talents_by_term: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, talent) in talents.iter().enumerate() {
            let mut terms: Vec<String> = tokenize(&talent.category);
            terms.extend(talent.tag_list().flat_map(|t| tokenize(&t)));
            terms.sort_unstable();
            terms.dedup();
            for term in terms {
                talents_by_term.entry(term).or_default().push(idx);
            }
        }

        let mut topic_by_intent = HashMap::new();
        for (idx, topic) in topics.iter().enumerate() {
            match Intent::from_str_value(topic.intent.trim()) {
                Some(intent) => {
                    topic_by_intent.entry(intent).or_insert(idx);
                }
                None => tracing::warn!(intent = %topic.intent, "skipping topic with unknown intent"),
            }
        }

        let mut experts_by_term: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, expert) in experts.iter().enumerate() {
            let mut terms = tokenize(&expert.specialty);
            terms.sort_unstable();
            terms.dedup();
            for term in terms {
                experts_by_term.entry(term).or_default().push(idx);
            }
        }

        Self {
            talents,
            topics,
            experts,
            talents_by_term,
            topic_by_intent,
            experts_by_term,
        }
    }

    fn counts(&self) -> CatalogCounts {
        CatalogCounts {
            talents: self.talents.len(),
            topics: self.topics.len(),
            experts: self.experts.len(),
        }
    }
}

/// Catalog of talents, knowledge topics and experts
#[derive(Debug)]
pub struct Catalog {
    dir: Option<PathBuf>,
    tables: RwLock<Arc<Tables>>,
}

impl Catalog {
    /// Catalog with only the built-in topics
    ///
    /// # Errors
    ///
    /// Returns error if the built-in table fails to parse
    pub fn builtin() -> Result<Self> {
        let tables = load_tables(None)?;
        Ok(Self {
            dir: None,
            tables: RwLock::new(Arc::new(tables)),
        })
    }

    /// Load the catalog from a directory of CSV files
    ///
    /// Missing files yield empty tables (built-in topics for `topics.csv`).
    ///
    /// # Errors
    ///
    /// Returns error if a present file cannot be read or parsed
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let tables = load_tables(Some(&dir))?;
        let counts = tables.counts();
        tracing::info!(
            dir = %dir.display(),
            talents = counts.talents,
            topics = counts.topics,
            experts = counts.experts,
            "catalog loaded"
        );
        Ok(Self {
            dir: Some(dir),
            tables: RwLock::new(Arc::new(tables)),
        })
    }

    /// Re-read the CSV files and swap the tables in
    ///
    /// On failure the previous tables stay in place.
    ///
    /// # Errors
    ///
    /// Returns error if a file cannot be read or parsed
    pub fn reload(&self) -> Result<CatalogCounts> {
        let tables = load_tables(self.dir.as_deref())?;
        let counts = tables.counts();
        let mut guard = self
            .tables
            .write()
            .map_err(|_| Error::Catalog("catalog lock poisoned".to_string()))?;
        *guard = Arc::new(tables);
        drop(guard);

        tracing::info!(
            talents = counts.talents,
            topics = counts.topics,
            experts = counts.experts,
            "catalog reloaded"
        );
        Ok(counts)
    }

    /// Current row counts
    #[must_use]
    pub fn counts(&self) -> CatalogCounts {
        self.snapshot().counts()
    }

    fn snapshot(&self) -> Arc<Tables> {
        match self.tables.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Knowledge topic for an intent
    #[must_use]
    pub fn topic(&self, intent: Intent) -> Option<Topic> {
        let tables = self.snapshot();
        tables
            .topic_by_intent
            .get(&intent)
            .map(|&idx| tables.topics[idx].clone())
    }

    /// Talents whose category or tags match the query terms
    ///
    /// Ranked by matched terms, with a bonus for `location`; ties break by
    /// name. Talents matching no term are never returned.
    #[must_use]
    pub fn find_talents(&self, terms: &[String], location: Option<&str>, limit: usize) -> Vec<Talent> {
        let tables = self.snapshot();
        let mut scores: HashMap<usize, usize> = HashMap::new();
        for term in terms {
            if let Some(rows) = tables.talents_by_term.get(term.as_str()) {
                for &idx in rows {
                    *scores.entry(idx).or_default() += 2;
                }
            }
        }

        let location = location.map(str::to_lowercase);
        let mut ranked: Vec<(usize, usize)> = scores
            .into_iter()
            .map(|(idx, score)| {
                let here = location
                    .as_deref()
                    .is_some_and(|loc| tables.talents[idx].location.to_lowercase() == loc);
                (idx, score + usize::from(here))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| tables.talents[a.0].name.cmp(&tables.talents[b.0].name))
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(idx, _)| tables.talents[idx].clone())
            .collect()
    }

    /// Experts whose specialty mentions any of the terms
    ///
    /// With no match, returns the first `limit` experts on file.
    #[must_use]
    pub fn find_experts(&self, terms: &[String], limit: usize) -> Vec<Expert> {
        let tables = self.snapshot();
        let mut rows: Vec<usize> = terms
            .iter()
            .filter_map(|t| tables.experts_by_term.get(t.as_str()))
            .flatten()
            .copied()
            .collect();
        rows.sort_unstable();
        rows.dedup();

        if rows.is_empty() {
            return tables.experts.iter().take(limit).cloned().collect();
        }
        rows.into_iter()
            .take(limit)
            .map(|idx| tables.experts[idx].clone())
            .collect()
    }
}

fn load_tables(dir: Option<&Path>) -> Result<Tables> {
    let talents = match dir {
        Some(dir) => read_optional(&dir.join(TALENTS_FILE))?,
        None => Vec::new(),
    };
    let topics = match dir.map(|d| d.join(TOPICS_FILE)).filter(|p| p.exists()) {
        Some(path) => read_csv(std::fs::File::open(&path)?, &path)?,
        None => read_csv(BUILTIN_TOPICS.as_bytes(), Path::new("<builtin topics>"))?,
    };
    let experts = match dir {
        Some(dir) => read_optional(&dir.join(EXPERTS_FILE))?,
        None => Vec::new(),
    };
    Ok(Tables::build(talents, topics, experts))
}

fn read_optional<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "catalog file not found, table left empty");
        return Ok(Vec::new());
    }
    read_csv(std::fs::File::open(path)?, path)
}

fn read_csv<T: for<'de> Deserialize<'de>, R: Read>(reader: R, path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| Error::Catalog(format!("{}: {e}", path.display())))
}

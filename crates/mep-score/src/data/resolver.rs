//! Maps a logical dataset and a term onto a file on disk.
//!
//! Candidates are tried in order: the optimized per-term export, the legacy
//! `<ordinal> term/` directory, then the consolidated dataset which callers
//! filter down to the requested term while decoding.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::terms::{Term, TermId};

/// Which candidate location satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverTier {
    Optimized,
    LegacyTermDirectory,
    Consolidated,
}

impl ResolverTier {
    /// Whether rows outside the requested term can appear in files of this tier.
    pub fn requires_term_filter(self) -> bool {
        matches!(self, ResolverTier::Consolidated)
    }
}

impl fmt::Display for ResolverTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolverTier::Optimized => "optimized",
            ResolverTier::LegacyTermDirectory => "legacy_term_directory",
            ResolverTier::Consolidated => "consolidated",
        };
        f.write_str(label)
    }
}

/// Outcome of probing a single candidate location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub tier: ResolverTier,
    pub found: bool,
}

/// A resolved dataset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    pub tier: ResolverTier,
}

/// One way of locating a dataset file for a term.
pub trait ResolveStrategy: Send + Sync {
    fn resolve(&self, dataset: &str, term: &Term) -> Candidate;
}

/// `<root>/<dataset>_term<N>.json`
#[derive(Debug, Clone)]
pub struct OptimizedTermFile {
    root: PathBuf,
}

impl OptimizedTermFile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResolveStrategy for OptimizedTermFile {
    fn resolve(&self, dataset: &str, term: &Term) -> Candidate {
        let path = self
            .root
            .join(format!("{dataset}_term{}.json", term.id.0));
        check_candidate(path, ResolverTier::Optimized)
    }
}

/// `<root>/<N>th term/<dataset>.json`
#[derive(Debug, Clone)]
pub struct LegacyTermDirectory {
    root: PathBuf,
}

impl LegacyTermDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResolveStrategy for LegacyTermDirectory {
    fn resolve(&self, dataset: &str, term: &Term) -> Candidate {
        let path = self
            .root
            .join(term.id.ordinal_label())
            .join(format!("{dataset}.json"));
        check_candidate(path, ResolverTier::LegacyTermDirectory)
    }
}

/// `<root>/<dataset>.json`, spanning every term.
#[derive(Debug, Clone)]
pub struct ConsolidatedFile {
    root: PathBuf,
}

impl ConsolidatedFile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResolveStrategy for ConsolidatedFile {
    fn resolve(&self, dataset: &str, _term: &Term) -> Candidate {
        let path = self.root.join(format!("{dataset}.json"));
        check_candidate(path, ResolverTier::Consolidated)
    }
}

fn check_candidate(path: PathBuf, tier: ResolverTier) -> Candidate {
    let found = path.metadata().map(|meta| meta.is_file()).unwrap_or(false);
    Candidate { path, tier, found }
}

/// Error returned when no candidate location holds the dataset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("dataset `{dataset}` not found for term {term} (tried {})", join_paths(.tried))]
    NotFound {
        dataset: String,
        term: TermId,
        tried: Vec<PathBuf>,
    },
    #[error("`{0}` is not a valid dataset name")]
    InvalidDataset(String),
}

pub(crate) fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered list of strategies; the first usable candidate wins.
pub struct TermDataResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl TermDataResolver {
    /// Optimized, legacy and consolidated tiers rooted at `data_dir`.
    pub fn standard(data_dir: impl AsRef<Path>) -> Self {
        let root = data_dir.as_ref();
        Self::with_strategies(vec![
            Box::new(OptimizedTermFile::new(root)),
            Box::new(LegacyTermDirectory::new(root)),
            Box::new(ConsolidatedFile::new(root)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// First candidate that exists and can be opened for reading.
    pub fn resolve(&self, dataset: &str, term: &Term) -> Result<Resolution, ResolveError> {
        self.first_candidate(dataset, term, true)
    }

    /// Like [`resolve`](Self::resolve) but only inspects file metadata, so a
    /// warm cache can confirm its entry without opening anything.
    pub fn locate(&self, dataset: &str, term: &Term) -> Result<Resolution, ResolveError> {
        self.first_candidate(dataset, term, false)
    }

    fn first_candidate(
        &self,
        dataset: &str,
        term: &Term,
        require_readable: bool,
    ) -> Result<Resolution, ResolveError> {
        if !is_valid_dataset_name(dataset) {
            return Err(ResolveError::InvalidDataset(dataset.to_string()));
        }

        let mut tried = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let candidate = strategy.resolve(dataset, term);
            let usable =
                candidate.found && (!require_readable || File::open(&candidate.path).is_ok());
            if usable {
                tracing::debug!(
                    dataset,
                    term = %term.id,
                    tier = %candidate.tier,
                    path = %candidate.path.display(),
                    "resolved dataset"
                );
                return Ok(Resolution {
                    path: candidate.path,
                    tier: candidate.tier,
                });
            }
            tried.push(candidate.path);
        }

        Err(ResolveError::NotFound {
            dataset: dataset.to_string(),
            term: term.id,
            tried,
        })
    }
}

impl fmt::Debug for TermDataResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermDataResolver")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

fn is_valid_dataset_name(dataset: &str) -> bool {
    !dataset.is_empty()
        && dataset
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

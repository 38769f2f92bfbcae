//! # Puzzle Catalog
//!
//! The immutable, load-once description of a hunt: puzzle definitions,
//! the unlock topology and the set grouping.
//!
//! A `Catalog` can only be obtained through validation (`Catalog::new`,
//! `Catalog::from_toml_str`, `Catalog::load`) or from the compiled-in
//! `Catalog::builtin()` hunt, which is covered by a validation test.
//!
//! ## Invariants
//!
//! - Puzzle ids are unique and non-zero
//! - Display positions are unique and within `1..=grid_size`
//! - Every id referenced by an unlock rule or a hint exists
//! - The unlock topology is acyclic
//! - Every answer survives submission normalization unchanged
//!
//! Set membership is the static grouping given by each puzzle's `set_id`.

use crate::primitives::DEFAULT_GRID_SIZE;
use crate::submission::normalize_answer;
use crate::{Hint, Prerequisites, PuzzleDefinition, PuzzleId, SetId, VersalError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Maximum catalog file size accepted by `Catalog::load` (1 MB).
const MAX_CATALOG_FILE_SIZE: u64 = 1024 * 1024;

static START: Prerequisites = Prerequisites::Start;

// =============================================================================
// UNLOCK TOPOLOGY
// =============================================================================

/// Directed unlock graph: puzzle id → prerequisite expression.
///
/// Puzzles without an entry are start nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockTopology {
    rules: BTreeMap<PuzzleId, Prerequisites>,
}

impl UnlockTopology {
    /// Create an empty topology (every puzzle is a start node).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Each puzzle requires the single previous one.
    #[must_use]
    pub fn linear(chain: &[PuzzleId]) -> Self {
        let mut topology = Self::new();
        for pair in chain.windows(2) {
            topology = topology.with_rule(pair[1], Prerequisites::All(BTreeSet::from([pair[0]])));
        }
        topology
    }

    /// Every puzzle of a tier requires all puzzles of the previous tier.
    #[must_use]
    pub fn tiered(tiers: &[Vec<PuzzleId>]) -> Self {
        let mut topology = Self::new();
        for pair in tiers.windows(2) {
            let gate: BTreeSet<PuzzleId> = pair[0].iter().copied().collect();
            for &id in &pair[1] {
                topology = topology.with_rule(id, Prerequisites::All(gate.clone()));
            }
        }
        topology
    }

    /// Set the rule for one puzzle, replacing any existing rule.
    #[must_use]
    pub fn with_rule(mut self, id: PuzzleId, rule: Prerequisites) -> Self {
        self.rules.insert(id, rule);
        self
    }

    /// The prerequisite expression of a puzzle (`Start` when absent).
    #[must_use]
    pub fn prerequisites(&self, id: PuzzleId) -> &Prerequisites {
        self.rules.get(&id).unwrap_or(&START)
    }

    /// Iterate over the explicit rules.
    pub fn rules(&self) -> impl Iterator<Item = (PuzzleId, &Prerequisites)> {
        self.rules.iter().map(|(id, rule)| (*id, rule))
    }

    /// Puzzles whose rule mentions `id`.
    pub fn successors(&self, id: PuzzleId) -> impl Iterator<Item = PuzzleId> + '_ {
        self.rules
            .iter()
            .filter(move |(_, rule)| rule.ids().any(|p| p == id))
            .map(|(succ, _)| *succ)
    }

    /// Reject self references and cycles (Kahn's algorithm).
    fn check_acyclic(&self, ids: &BTreeSet<PuzzleId>) -> Result<(), VersalError> {
        let mut in_degree: BTreeMap<PuzzleId, usize> = ids.iter().map(|id| (*id, 0)).collect();
        for (id, rule) in &self.rules {
            let preds: BTreeSet<PuzzleId> = rule.ids().collect();
            if preds.contains(id) {
                return Err(VersalError::InvalidCatalog(format!(
                    "puzzle {id} requires itself"
                )));
            }
            if let Some(degree) = in_degree.get_mut(id) {
                *degree = preds.len();
            }
        }

        let mut ready: VecDeque<PuzzleId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0usize;

        while let Some(id) = ready.pop_front() {
            visited += 1;
            for succ in self.successors(id) {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.push_back(succ);
                    }
                }
            }
        }

        if visited != ids.len() {
            let stuck: Vec<String> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(VersalError::InvalidCatalog(format!(
                "unlock topology has a cycle through puzzles [{}]",
                stuck.join(", ")
            )));
        }
        Ok(())
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Validated, immutable hunt configuration.
#[derive(Debug, Clone)]
pub struct Catalog {
    puzzles: BTreeMap<PuzzleId, PuzzleDefinition>,
    topology: UnlockTopology,
    sets: BTreeMap<SetId, BTreeSet<PuzzleId>>,
    slots: BTreeMap<u32, PuzzleId>,
    grid_size: u32,
}

impl Catalog {
    /// Build and validate a catalog.
    pub fn new(
        puzzles: Vec<PuzzleDefinition>,
        topology: UnlockTopology,
        grid_size: u32,
    ) -> Result<Self, VersalError> {
        if puzzles.is_empty() {
            return Err(VersalError::InvalidCatalog(
                "catalog has no puzzles".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut positions = BTreeSet::new();
        for puzzle in &puzzles {
            if puzzle.id.0 == 0 {
                return Err(VersalError::InvalidCatalog(
                    "puzzle ids start at 1".to_string(),
                ));
            }
            if !seen.insert(puzzle.id) {
                return Err(VersalError::InvalidCatalog(format!(
                    "duplicate puzzle id {}",
                    puzzle.id
                )));
            }
            if puzzle.display_position == 0 || puzzle.display_position > grid_size {
                return Err(VersalError::InvalidCatalog(format!(
                    "puzzle {} has display position {} outside 1..={}",
                    puzzle.id, puzzle.display_position, grid_size
                )));
            }
            if !positions.insert(puzzle.display_position) {
                return Err(VersalError::InvalidCatalog(format!(
                    "display position {} is used twice",
                    puzzle.display_position
                )));
            }
            if puzzle.answer.trim().is_empty() {
                return Err(VersalError::InvalidCatalog(format!(
                    "puzzle {} has an empty answer",
                    puzzle.id
                )));
            }
            // Submissions are normalized; an answer that normalization
            // would alter can never be matched.
            if normalize_answer(&puzzle.answer) != puzzle.answer.trim().to_lowercase() {
                return Err(VersalError::InvalidCatalog(format!(
                    "puzzle {} has an answer no submission can match",
                    puzzle.id
                )));
            }
        }

        for (id, rule) in topology.rules() {
            if !seen.contains(&id) {
                return Err(VersalError::InvalidCatalog(format!(
                    "unlock rule for unknown puzzle {id}"
                )));
            }
            if let Some(missing) = rule.ids().find(|p| !seen.contains(p)) {
                return Err(VersalError::InvalidCatalog(format!(
                    "puzzle {id} requires unknown puzzle {missing}"
                )));
            }
        }

        for puzzle in &puzzles {
            if let Some(target) = puzzle.hint.as_ref().and_then(|h| h.target_id)
                && !seen.contains(&target)
            {
                return Err(VersalError::InvalidCatalog(format!(
                    "puzzle {} hints at unknown puzzle {}",
                    puzzle.id, target
                )));
            }
        }

        topology.check_acyclic(&seen)?;

        Ok(Self::assemble(puzzles, topology, grid_size))
    }

    /// Index already-validated parts.
    fn assemble(puzzles: Vec<PuzzleDefinition>, topology: UnlockTopology, grid_size: u32) -> Self {
        let mut sets: BTreeMap<SetId, BTreeSet<PuzzleId>> = BTreeMap::new();
        let mut slots = BTreeMap::new();
        let mut by_id = BTreeMap::new();
        for puzzle in puzzles {
            sets.entry(puzzle.set_id).or_default().insert(puzzle.id);
            slots.insert(puzzle.display_position, puzzle.id);
            by_id.insert(puzzle.id, puzzle);
        }
        Self {
            puzzles: by_id,
            topology,
            sets,
            slots,
            grid_size,
        }
    }

    /// Parse and validate a TOML catalog.
    pub fn from_toml_str(source: &str) -> Result<Self, VersalError> {
        let file: CatalogFile =
            toml::from_str(source).map_err(|e| VersalError::InvalidCatalog(e.to_string()))?;
        file.into_catalog()
    }

    /// Read, parse and validate a TOML catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VersalError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .map_err(|e| VersalError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
        if metadata.len() > MAX_CATALOG_FILE_SIZE {
            return Err(VersalError::InvalidCatalog(format!(
                "catalog file is {} bytes, maximum is {}",
                metadata.len(),
                MAX_CATALOG_FILE_SIZE
            )));
        }
        let source = std::fs::read_to_string(path)
            .map_err(|e| VersalError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
        let catalog = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            puzzles = catalog.len(),
            sets = catalog.sets.len(),
            "Loaded puzzle catalog"
        );
        Ok(catalog)
    }

    /// Look up a puzzle.
    #[must_use]
    pub fn puzzle(&self, id: PuzzleId) -> Option<&PuzzleDefinition> {
        self.puzzles.get(&id)
    }

    /// Check if the catalog defines a puzzle.
    #[must_use]
    pub fn contains(&self, id: PuzzleId) -> bool {
        self.puzzles.contains_key(&id)
    }

    /// All puzzles in id order.
    pub fn puzzles(&self) -> impl Iterator<Item = &PuzzleDefinition> {
        self.puzzles.values()
    }

    /// Number of puzzles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    /// A validated catalog is never empty; provided for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    /// The unlock graph.
    #[must_use]
    pub fn topology(&self) -> &UnlockTopology {
        &self.topology
    }

    /// Members of a set, if the set exists.
    #[must_use]
    pub fn set_members(&self, set: SetId) -> Option<&BTreeSet<PuzzleId>> {
        self.sets.get(&set)
    }

    /// All sets with their members, in set order.
    pub fn sets(&self) -> impl Iterator<Item = (SetId, &BTreeSet<PuzzleId>)> {
        self.sets.iter().map(|(id, members)| (*id, members))
    }

    /// Number of display slots.
    #[must_use]
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// The puzzle shown in a display slot.
    #[must_use]
    pub fn puzzle_at(&self, position: u32) -> Option<&PuzzleDefinition> {
        self.slots.get(&position).and_then(|id| self.puzzles.get(id))
    }

    /// The compiled-in nine-puzzle hunt.
    ///
    /// Three independent paths of three puzzles (`{1,4,7}`, `{2,5,8}`,
    /// `{3,6,9}`). Puzzle 8 is the capstone and opens as soon as any of
    /// 5, 7 or 9 is solved.
    #[must_use]
    pub fn builtin() -> Self {
        let puzzles = vec![
            builtin_puzzle(1, "The Foundation", "r/Math", 1, 5, Some((4, "r/Science", "Every theory starts with an experiment. Head to r/Science."))),
            builtin_puzzle(2, "The Archive", "r/History", 2, 1, Some((5, "r/Geography", "Old maps hide new routes. Continue in r/Geography."))),
            builtin_puzzle(3, "The Cipher", "r/Codes", 3, 9, Some((6, "r/Chemistry", "Some keys are written in elements. Try r/Chemistry."))),
            builtin_puzzle(4, "The Experiment", "r/Science", 1, 3, Some((7, "r/Biology", "Life follows the method. Look in r/Biology."))),
            builtin_puzzle(5, "The Map", "r/Geography", 2, 7, Some((8, "r/Linguistics", "Every place has a name. Decode it in r/Linguistics."))),
            builtin_puzzle(6, "The Formula", "r/Chemistry", 3, 2, Some((9, "r/Art", "Mix the right colours in r/Art."))),
            builtin_puzzle(7, "The Organism", "r/Biology", 1, 4, Some((8, "r/Linguistics", "Even cells speak a language. Finish in r/Linguistics."))),
            builtin_puzzle(8, "The Tongue", "r/Linguistics", 2, 6, None),
            builtin_puzzle(9, "The Canvas", "r/Art", 3, 8, Some((8, "r/Linguistics", "A picture is worth a word. Finish in r/Linguistics."))),
        ];

        let topology = UnlockTopology::linear(&[PuzzleId(1), PuzzleId(4), PuzzleId(7)])
            .with_rule(PuzzleId(5), Prerequisites::All(BTreeSet::from([PuzzleId(2)])))
            .with_rule(PuzzleId(6), Prerequisites::All(BTreeSet::from([PuzzleId(3)])))
            .with_rule(PuzzleId(9), Prerequisites::All(BTreeSet::from([PuzzleId(6)])))
            .with_rule(
                PuzzleId(8),
                Prerequisites::Any(BTreeSet::from([PuzzleId(5), PuzzleId(7), PuzzleId(9)])),
            );

        Self::assemble(puzzles, topology, DEFAULT_GRID_SIZE)
    }
}

fn builtin_puzzle(
    id: u32,
    title: &str,
    location: &str,
    set: u32,
    position: u32,
    hint: Option<(u32, &str, &str)>,
) -> PuzzleDefinition {
    PuzzleDefinition {
        id: PuzzleId(id),
        title: title.to_string(),
        location: location.to_string(),
        link: Some(format!("https://reddit.com/{location}/post{id}")),
        answer: id.to_string(),
        hint: hint.map(|(target, label, text)| Hint {
            text: text.to_string(),
            target_id: Some(PuzzleId(target)),
            target_label: label.to_string(),
        }),
        set_id: SetId(set),
        display_position: position,
        image_piece: Some(format!("piece-{id}")),
    }
}

// =============================================================================
// TOML FORMAT
// =============================================================================

/// On-disk catalog layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_grid_size")]
    grid_size: u32,
    puzzles: Vec<PuzzleEntry>,
}

fn default_grid_size() -> u32 {
    DEFAULT_GRID_SIZE
}

/// One `[[puzzles]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PuzzleEntry {
    id: PuzzleId,
    title: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    link: Option<String>,
    answer: String,
    #[serde(default)]
    hint: Option<Hint>,
    set_id: SetId,
    display_position: u32,
    #[serde(default)]
    image_piece: Option<String>,
    #[serde(default)]
    unlock: Prerequisites,
}

impl CatalogFile {
    fn into_catalog(self) -> Result<Catalog, VersalError> {
        let mut topology = UnlockTopology::new();
        let mut puzzles = Vec::with_capacity(self.puzzles.len());
        for entry in self.puzzles {
            if entry.unlock != Prerequisites::Start {
                topology = topology.with_rule(entry.id, entry.unlock);
            }
            puzzles.push(PuzzleDefinition {
                id: entry.id,
                title: entry.title,
                location: entry.location,
                link: entry.link,
                answer: entry.answer,
                hint: entry.hint,
                set_id: entry.set_id,
                display_position: entry.display_position,
                image_piece: entry.image_piece,
            });
        }
        Catalog::new(puzzles, topology, self.grid_size)
    }
}

// =============================================================================
// TESTS
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ExchangeError, ExchangeResult};

/// ABO blood group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BloodType {
    #[serde(alias = "o")]
    O,
    #[serde(alias = "a")]
    A,
    #[serde(alias = "b")]
    B,
    #[serde(alias = "ab", alias = "Ab", alias = "aB")]
    AB,
}

impl BloodType {
    /// All four groups in display order (O, A, B, AB)
    pub const ALL: [BloodType; 4] = [BloodType::O, BloodType::A, BloodType::B, BloodType::AB];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::O => "O",
            BloodType::A => "A",
            BloodType::B => "B",
            BloodType::AB => "AB",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            BloodType::O => 0,
            BloodType::A => 1,
            BloodType::B => 2,
            BloodType::AB => 3,
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = ExchangeError;

    fn from_str(s: &str) -> ExchangeResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "O" => Ok(BloodType::O),
            "A" => Ok(BloodType::A),
            "B" => Ok(BloodType::B),
            "AB" => Ok(BloodType::AB),
            _ => Err(ExchangeError::InvalidBloodType {
                value: s.to_string(),
            }),
        }
    }
}

lazy_static::lazy_static! {
    static ref ABO_TABLE: CompatibilityTable = CompatibilityTable::from_rows(&[
        (BloodType::O, &BloodType::ALL[..]),
        (BloodType::A, &[BloodType::A, BloodType::AB][..]),
        (BloodType::B, &[BloodType::B, BloodType::AB][..]),
        (BloodType::AB, &[BloodType::AB][..]),
    ]);
}

/// Donor -> recipients lookup.
///
/// Rows are indexed by donor, columns by recipient. The table is not
/// symmetric: `O` gives to everyone but only receives from `O`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityTable {
    grid: [[bool; 4]; 4],
}

impl CompatibilityTable {
    /// The standard ABO table, shared process-wide
    pub fn abo() -> &'static CompatibilityTable {
        &ABO_TABLE
    }

    pub fn from_rows(rows: &[(BloodType, &[BloodType])]) -> Self {
        let mut grid = [[false; 4]; 4];
        for (donor, recipients) in rows {
            for recipient in recipients.iter() {
                grid[donor.index()][recipient.index()] = true;
            }
        }
        Self { grid }
    }

    pub fn can_donate(&self, donor: BloodType, recipient: BloodType) -> bool {
        self.grid[donor.index()][recipient.index()]
    }

    /// Recipients a donor may give to, in `BloodType::ALL` order
    pub fn recipients_of(&self, donor: BloodType) -> Vec<BloodType> {
        BloodType::ALL
            .iter()
            .copied()
            .filter(|recipient| self.can_donate(donor, *recipient))
            .collect()
    }
}

/// One donor/recipient unit registered together
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Pair {
    pub donor: BloodType,
    pub recipient: BloodType,
}

impl Pair {
    pub fn new(donor: BloodType, recipient: BloodType) -> Self {
        Self { donor, recipient }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.donor, self.recipient)
    }
}

impl FromStr for Pair {
    type Err = ExchangeError;

    /// Parses `DONOR:RECIPIENT`, e.g. `O:A` or `ab:b`
    fn from_str(s: &str) -> ExchangeResult<Self> {
        let (donor, recipient) = s.split_once(':').ok_or_else(|| ExchangeError::InvalidPair {
            value: s.to_string(),
        })?;
        let invalid = |_| ExchangeError::InvalidPair {
            value: s.to_string(),
        };
        Ok(Pair {
            donor: donor.parse().map_err(invalid)?,
            recipient: recipient.parse().map_err(invalid)?,
        })
    }
}

/// Directed cycle over `len` pairs: next(i) = (i mod len) + 1, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeCycle {
    len: usize,
}

impl ExchangeCycle {
    pub fn new(len: usize) -> ExchangeResult<Self> {
        if len == 0 {
            return Err(ExchangeError::EmptyBoard);
        }
        Ok(Self { len })
    }

    pub fn next(&self, i: usize) -> usize {
        (i % self.len) + 1
    }

    /// `(from, to)` for every edge, in edge order
    pub fn edges(self) -> impl Iterator<Item = (usize, usize)> {
        (1..=self.len).map(move |i| (i, self.next(i)))
    }
}

/// The pairs taking part in one exchange, indexed 1..=N
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExchangeBoard {
    pairs: Vec<Pair>,
}

impl ExchangeBoard {
    pub fn new(pairs: Vec<Pair>) -> ExchangeResult<Self> {
        if pairs.is_empty() {
            return Err(ExchangeError::EmptyBoard);
        }
        Ok(Self { pairs })
    }

    /// Caller guarantees `pairs` is non-empty
    pub(crate) fn from_nonempty(pairs: Vec<Pair>) -> Self {
        debug_assert!(!pairs.is_empty());
        Self { pairs }
    }

    /// The canonical three-way exchange
    pub fn three(first: Pair, second: Pair, third: Pair) -> Self {
        Self {
            pairs: vec![first, second, third],
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn cycle(&self) -> ExchangeCycle {
        ExchangeCycle {
            len: self.pairs.len(),
        }
    }

    /// Same board shifted by one position: pair i moves to slot i+1
    pub fn rotated(&self) -> Self {
        let mut pairs = self.pairs.clone();
        pairs.rotate_right(1);
        Self { pairs }
    }
}

/// Which same-pair semantic an evaluation enforces
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SamePairRule {
    /// A registered pair must itself be blood-type compatible
    #[default]
    #[value(alias = "compatible")]
    MustBeCompatible,
    /// A registered pair must be incompatible, otherwise it needs no exchange
    #[value(alias = "incompatible")]
    MustBeIncompatible,
}

impl fmt::Display for SamePairRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamePairRule::MustBeCompatible => f.write_str("must-be-compatible"),
            SamePairRule::MustBeIncompatible => f.write_str("must-be-incompatible"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    SamePairIncompatible,
    SamePairUnnecessary,
    CycleBreak,
}

impl DiagnosticKind {
    pub fn tag(&self) -> &'static str {
        match self {
            DiagnosticKind::SamePairIncompatible => "same-pair-incompatible",
            DiagnosticKind::SamePairUnnecessary => "same-pair-unnecessary",
            DiagnosticKind::CycleBreak => "cycle-break",
        }
    }

    pub fn is_same_pair(&self) -> bool {
        !matches!(self, DiagnosticKind::CycleBreak)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single flagged problem. For same-pair kinds both indices are equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub donor_pair: usize,
    pub recipient_pair: usize,
    pub donor: BloodType,
    pub recipient: BloodType,
    pub message: String,
}

/// Pass/fail of the edge from pair `edge` to pair `to_pair`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeOutcome {
    pub edge: usize,
    pub to_pair: usize,
    pub donor: BloodType,
    pub recipient: BloodType,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationResult {
    pub feasible: bool,
    pub rule: SamePairRule,
    pub diagnostics: Vec<Diagnostic>,
    pub edges: Vec<EdgeOutcome>,
}

impl EvaluationResult {
    pub fn failed_edges(&self) -> impl Iterator<Item = &EdgeOutcome> {
        self.edges.iter().filter(|edge| !edge.passed)
    }

    pub fn same_pair_flags(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind.is_same_pair())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abo_table_rows() {
        let table = CompatibilityTable::abo();
        assert_eq!(table.recipients_of(BloodType::O), BloodType::ALL.to_vec());
        assert_eq!(
            table.recipients_of(BloodType::A),
            vec![BloodType::A, BloodType::AB]
        );
        assert_eq!(
            table.recipients_of(BloodType::B),
            vec![BloodType::B, BloodType::AB]
        );
        assert_eq!(table.recipients_of(BloodType::AB), vec![BloodType::AB]);
    }

    #[test]
    fn test_universal_donor_and_recipient() {
        let table = CompatibilityTable::abo();
        for t in BloodType::ALL {
            assert!(table.can_donate(t, BloodType::AB), "{} -> AB", t);
            assert!(table.can_donate(BloodType::O, t), "O -> {}", t);
            assert!(table.can_donate(t, t), "{} is reflexive", t);
        }
    }

    #[test]
    fn test_table_not_symmetric() {
        let table = CompatibilityTable::abo();
        assert!(table.can_donate(BloodType::O, BloodType::A));
        assert!(!table.can_donate(BloodType::A, BloodType::O));
        assert!(!table.can_donate(BloodType::A, BloodType::B));
        assert!(!table.can_donate(BloodType::B, BloodType::A));
    }

    #[test]
    fn test_blood_type_parsing() {
        assert_eq!("ab".parse::<BloodType>().unwrap(), BloodType::AB);
        assert_eq!(" o ".parse::<BloodType>().unwrap(), BloodType::O);
        assert!(matches!(
            "C".parse::<BloodType>(),
            Err(ExchangeError::InvalidBloodType { .. })
        ));
        assert!("A+".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_pair_parsing() {
        let pair: Pair = "O:ab".parse().unwrap();
        assert_eq!(pair, Pair::new(BloodType::O, BloodType::AB));
        assert_eq!(pair.to_string(), "O→AB");
        assert!(matches!(
            "OA".parse::<Pair>(),
            Err(ExchangeError::InvalidPair { .. })
        ));
        assert!("O:Z".parse::<Pair>().is_err());
    }

    #[test]
    fn test_cycle_successor() -> ExchangeResult<()> {
        let cycle = ExchangeCycle::new(3)?;
        assert_eq!(cycle.next(1), 2);
        assert_eq!(cycle.next(2), 3);
        assert_eq!(cycle.next(3), 1);
        let edges: Vec<_> = ExchangeCycle::new(4)?.edges().collect();
        assert_eq!(edges, vec![(1, 2), (2, 3), (3, 4), (4, 1)]);
        Ok(())
    }

    #[test]
    fn test_cycle_needs_a_pair() {
        assert!(matches!(ExchangeCycle::new(0), Err(ExchangeError::EmptyBoard)));
        let lone = ExchangeCycle::new(1).unwrap();
        assert_eq!(lone.next(1), 1);
        assert_eq!(lone.edges().collect::<Vec<_>>(), vec![(1, 1)]);
    }

    #[test]
    fn test_board_rejects_empty() {
        assert!(matches!(
            ExchangeBoard::new(vec![]),
            Err(ExchangeError::EmptyBoard)
        ));
    }

    #[test]
    fn test_board_cycle_and_rotation() {
        let a = Pair::new(BloodType::O, BloodType::A);
        let b = Pair::new(BloodType::A, BloodType::B);
        let c = Pair::new(BloodType::B, BloodType::O);
        let board = ExchangeBoard::three(a, b, c);
        assert_eq!(board.cycle(), ExchangeCycle::new(3).unwrap());
        assert_eq!(board.rotated().pairs(), &[c, a, b]);
    }

    #[test]
    fn test_diagnostic_kind_tags_serialize() {
        let json = serde_json::to_string(&DiagnosticKind::SamePairUnnecessary).unwrap();
        assert_eq!(json, "\"same-pair-unnecessary\"");
        assert_eq!(DiagnosticKind::CycleBreak.tag(), "cycle-break");
    }
}

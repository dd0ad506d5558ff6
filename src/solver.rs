use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ExchangeError, ExchangeResult};
use crate::evaluator::FeasibilityEvaluator;
use crate::types::*;

pub const MIN_PAIRS: usize = 1;
pub const MAX_PAIRS: usize = 6;

/// Blood types the solver may assign
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TypeDomain {
    /// O, A, B and AB
    #[default]
    Full,
    /// Only A and B
    Reduced,
}

impl TypeDomain {
    pub fn types(&self) -> &'static [BloodType] {
        match self {
            TypeDomain::Full => &BloodType::ALL,
            TypeDomain::Reduced => &[BloodType::A, BloodType::B],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub pairs: usize,
    pub domain: TypeDomain,
    pub rule: SamePairRule,
    pub examined: u64,
    pub feasible_count: u64,
    /// First feasible assignment in enumeration order
    pub witness: Option<Vec<Pair>>,
    /// Set only when there is no witness
    pub conflicts: Option<ConflictReport>,
}

/// Which constraint family rules out the assignments of an infeasible search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictReport {
    /// Assignments where every pair satisfies the same-pair rule
    pub same_pair_satisfiable: u64,
    /// Assignments where every cycle edge passes
    pub cycle_satisfiable: u64,
    /// For edge i (index i-1): same-pair-valid assignments that edge i breaks
    pub edge_rejections: Vec<u64>,
    /// Same-pair-valid assignment breaking the fewest edges
    pub closest: Option<NearMiss>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NearMiss {
    pub pairs: Vec<Pair>,
    pub broken_edges: Vec<usize>,
}

struct ConflictTally {
    same_pair: u64,
    cycle: u64,
    edges: Vec<u64>,
    /// (broken edge count, assignment number)
    closest: Option<(usize, u64)>,
}

impl ConflictTally {
    fn new(edges: usize) -> Self {
        Self {
            same_pair: 0,
            cycle: 0,
            edges: vec![0; edges],
            closest: None,
        }
    }

    fn offer_closest(&mut self, candidate: (usize, u64)) {
        if self.closest.map_or(true, |best| candidate < best) {
            self.closest = Some(candidate);
        }
    }

    fn merge(mut self, other: ConflictTally) -> Self {
        self.same_pair += other.same_pair;
        self.cycle += other.cycle;
        for (mine, theirs) in self.edges.iter_mut().zip(other.edges) {
            *mine += theirs;
        }
        if let Some(candidate) = other.closest {
            self.offer_closest(candidate);
        }
        self
    }
}

impl SolveOutcome {
    pub fn is_feasible(&self) -> bool {
        self.witness.is_some()
    }
}

/// Exhaustive search for type assignments that make the cycle feasible.
///
/// Assignments are numbered so that pair 1's donor is the most significant
/// digit, followed by pair 1's recipient, pair 2's donor, and so on. The
/// witness is always the lowest-numbered feasible assignment.
pub struct AssignmentSolver {
    pairs: usize,
    domain: TypeDomain,
    rule: SamePairRule,
}

impl AssignmentSolver {
    pub fn new(pairs: usize, domain: TypeDomain, rule: SamePairRule) -> ExchangeResult<Self> {
        if !(MIN_PAIRS..=MAX_PAIRS).contains(&pairs) {
            return Err(ExchangeError::PairCountOutOfRange {
                count: pairs,
                min: MIN_PAIRS,
                max: MAX_PAIRS,
            });
        }
        Ok(Self {
            pairs,
            domain,
            rule,
        })
    }

    pub fn assignment_count(&self) -> u64 {
        (self.domain.types().len() as u64).pow(2 * self.pairs as u32)
    }

    pub fn solve(&self) -> SolveOutcome {
        let evaluator = FeasibilityEvaluator::abo(self.rule);
        let total = self.assignment_count();

        info!(
            "Searching {} assignments for {} pairs ({:?} domain, {})",
            total, self.pairs, self.domain, self.rule
        );

        let feasible_count = (0..total)
            .into_par_iter()
            .filter(|&n| evaluator.is_feasible(&self.decode(n)))
            .count() as u64;

        let witness = (0..total)
            .into_par_iter()
            .find_first(|&n| evaluator.is_feasible(&self.decode(n)))
            .map(|n| self.decode(n).pairs().to_vec());

        info!("Found {} feasible assignments", feasible_count);

        let conflicts = match witness {
            Some(_) => None,
            None => Some(self.explain(&evaluator)),
        };

        SolveOutcome {
            pairs: self.pairs,
            domain: self.domain,
            rule: self.rule,
            examined: total,
            feasible_count,
            witness,
            conflicts,
        }
    }

    /// Count each constraint family on its own, and find the assignment
    /// that keeps the same-pair rule while breaking the fewest edges.
    fn explain(&self, evaluator: &FeasibilityEvaluator) -> ConflictReport {
        let tally = (0..self.assignment_count())
            .into_par_iter()
            .fold(
                || ConflictTally::new(self.pairs),
                |mut tally, n| {
                    let board = self.decode(n);
                    let broken: Vec<usize> = evaluator.broken_edges(&board).collect();
                    if broken.is_empty() {
                        tally.cycle += 1;
                    }
                    if evaluator.same_pairs_hold(&board) {
                        tally.same_pair += 1;
                        for edge in &broken {
                            tally.edges[edge - 1] += 1;
                        }
                        tally.offer_closest((broken.len(), n));
                    }
                    tally
                },
            )
            .reduce(|| ConflictTally::new(self.pairs), ConflictTally::merge);

        debug!(
            "Same-pair rule admits {}, cycle admits {}",
            tally.same_pair, tally.cycle
        );

        let closest = tally.closest.map(|(_, n)| {
            let board = self.decode(n);
            NearMiss {
                broken_edges: evaluator.broken_edges(&board).collect(),
                pairs: board.pairs().to_vec(),
            }
        });

        ConflictReport {
            same_pair_satisfiable: tally.same_pair,
            cycle_satisfiable: tally.cycle,
            edge_rejections: tally.edges,
            closest,
        }
    }

    fn decode(&self, mut n: u64) -> ExchangeBoard {
        let types = self.domain.types();
        let base = types.len() as u64;
        let mut digits = vec![BloodType::O; 2 * self.pairs];
        for slot in digits.iter_mut().rev() {
            *slot = types[(n % base) as usize];
            n /= base;
        }
        let pairs = digits
            .chunks_exact(2)
            .map(|chunk| Pair::new(chunk[0], chunk[1]))
            .collect();
        ExchangeBoard::from_nonempty(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BloodType::*;

    #[test]
    fn test_pair_count_bounds() {
        assert!(matches!(
            AssignmentSolver::new(0, TypeDomain::Full, SamePairRule::default()),
            Err(ExchangeError::PairCountOutOfRange { count: 0, .. })
        ));
        assert!(AssignmentSolver::new(7, TypeDomain::Full, SamePairRule::default()).is_err());
        assert!(AssignmentSolver::new(6, TypeDomain::Reduced, SamePairRule::default()).is_ok());
    }

    #[test]
    fn test_decode_order() {
        let solver = AssignmentSolver::new(3, TypeDomain::Full, SamePairRule::default()).unwrap();
        assert_eq!(solver.decode(0).pairs(), &[Pair::new(O, O); 3]);
        assert_eq!(solver.decode(1).pairs()[2], Pair::new(O, A));
        assert_eq!(solver.decode(4).pairs()[2], Pair::new(A, O));
        assert_eq!(solver.decode(solver.assignment_count() - 1).pairs(), &[Pair::new(AB, AB); 3]);
    }

    #[test]
    fn test_odd_cycle_infeasible_when_pairs_must_be_incompatible() {
        for domain in [TypeDomain::Full, TypeDomain::Reduced] {
            let outcome = AssignmentSolver::new(3, domain, SamePairRule::MustBeIncompatible)
                .unwrap()
                .solve();
            assert!(!outcome.is_feasible(), "{:?}", domain);
            assert_eq!(outcome.feasible_count, 0);
        }
    }

    #[test]
    fn test_odd_cycle_conflicts_explained() {
        let outcome = AssignmentSolver::new(3, TypeDomain::Full, SamePairRule::MustBeIncompatible)
            .unwrap()
            .solve();
        let conflicts = outcome.conflicts.expect("infeasible search reports conflicts");

        // Each family is satisfiable alone; only together do they clash.
        assert_eq!(conflicts.same_pair_satisfiable, 343);
        assert_eq!(conflicts.cycle_satisfiable, 729);
        assert_eq!(conflicts.edge_rejections, vec![287, 287, 287]);
        assert_eq!(
            conflicts.closest,
            Some(NearMiss {
                pairs: vec![Pair::new(A, O), Pair::new(B, A), Pair::new(A, B)],
                broken_edges: vec![3],
            })
        );

        let reduced = AssignmentSolver::new(3, TypeDomain::Reduced, SamePairRule::MustBeIncompatible)
            .unwrap()
            .solve()
            .conflicts
            .unwrap();
        assert_eq!(reduced.same_pair_satisfiable, 8);
        assert_eq!(reduced.cycle_satisfiable, 8);
        assert_eq!(reduced.edge_rejections, vec![4, 4, 4]);
        assert_eq!(
            reduced.closest.map(|c| c.broken_edges),
            Some(vec![1])
        );
    }

    #[test]
    fn test_feasible_search_has_no_conflicts() {
        let outcome = AssignmentSolver::new(3, TypeDomain::Full, SamePairRule::MustBeCompatible)
            .unwrap()
            .solve();
        assert!(outcome.conflicts.is_none());
    }

    #[test]
    fn test_two_way_swap_witness() {
        let outcome = AssignmentSolver::new(2, TypeDomain::Full, SamePairRule::MustBeIncompatible)
            .unwrap()
            .solve();
        assert_eq!(outcome.feasible_count, 2);
        assert_eq!(
            outcome.witness,
            Some(vec![Pair::new(A, B), Pair::new(B, A)])
        );
    }

    #[test]
    fn test_compatible_rule_counts() {
        let outcome = AssignmentSolver::new(3, TypeDomain::Full, SamePairRule::MustBeCompatible)
            .unwrap()
            .solve();
        assert_eq!(outcome.examined, 4096);
        assert_eq!(outcome.feasible_count, 324);
        assert_eq!(outcome.witness, Some(vec![Pair::new(O, O); 3]));

        let reduced = AssignmentSolver::new(3, TypeDomain::Reduced, SamePairRule::MustBeCompatible)
            .unwrap()
            .solve();
        assert_eq!(reduced.examined, 64);
        assert_eq!(reduced.feasible_count, 2);
        assert_eq!(reduced.witness, Some(vec![Pair::new(A, A); 3]));
    }
}

use tracing::{debug, trace};

use crate::types::*;

/// Blood-type feasibility check for a directed exchange cycle
pub struct FeasibilityEvaluator<'a> {
    table: &'a CompatibilityTable,
    rule: SamePairRule,
}

impl<'a> FeasibilityEvaluator<'a> {
    pub fn new(table: &'a CompatibilityTable, rule: SamePairRule) -> Self {
        Self { table, rule }
    }

    /// Evaluator over the standard ABO table
    pub fn abo(rule: SamePairRule) -> FeasibilityEvaluator<'static> {
        FeasibilityEvaluator::new(CompatibilityTable::abo(), rule)
    }

    pub fn rule(&self) -> SamePairRule {
        self.rule
    }

    /// Run the same-pair pass, then the cycle pass, and aggregate.
    ///
    /// Diagnostics come out in evaluation order: same-pair flags by pair
    /// index, followed by cycle breaks by edge index.
    pub fn evaluate(&self, board: &ExchangeBoard) -> EvaluationResult {
        let mut diagnostics = self.check_same_pairs(board);
        let same_pair_ok = diagnostics.is_empty();

        let edges = self.check_cycle(board);
        diagnostics.extend(edges.iter().filter(|e| !e.passed).map(cycle_break));

        let feasible = same_pair_ok && edges.iter().all(|e| e.passed);
        debug!(
            "Evaluated {} pairs under {}: feasible={}, {} diagnostics",
            board.len(),
            self.rule,
            feasible,
            diagnostics.len()
        );

        EvaluationResult {
            feasible,
            rule: self.rule,
            diagnostics,
            edges,
        }
    }

    /// Only the verdict, without building messages
    pub fn is_feasible(&self, board: &ExchangeBoard) -> bool {
        self.same_pairs_hold(board) && self.broken_edges(board).next().is_none()
    }

    /// True when no pair is flagged by the same-pair rule
    pub fn same_pairs_hold(&self, board: &ExchangeBoard) -> bool {
        board
            .pairs()
            .iter()
            .all(|pair| self.same_pair_flag(pair).is_none())
    }

    /// Indices of the cycle edges whose donor cannot give to the next recipient
    pub fn broken_edges<'b>(&'b self, board: &'b ExchangeBoard) -> impl Iterator<Item = usize> + 'b {
        let pairs = board.pairs();
        board.cycle().edges().filter_map(move |(from, to)| {
            (!self.table.can_donate(pairs[from - 1].donor, pairs[to - 1].recipient)).then_some(from)
        })
    }

    fn check_same_pairs(&self, board: &ExchangeBoard) -> Vec<Diagnostic> {
        board
            .pairs()
            .iter()
            .enumerate()
            .filter_map(|(i, pair)| {
                let index = i + 1;
                self.same_pair_flag(pair).map(|kind| Diagnostic {
                    kind,
                    donor_pair: index,
                    recipient_pair: index,
                    donor: pair.donor,
                    recipient: pair.recipient,
                    message: same_pair_message(kind, index, pair),
                })
            })
            .collect()
    }

    fn same_pair_flag(&self, pair: &Pair) -> Option<DiagnosticKind> {
        let compatible = self.table.can_donate(pair.donor, pair.recipient);
        match (self.rule, compatible) {
            (SamePairRule::MustBeCompatible, false) => Some(DiagnosticKind::SamePairIncompatible),
            (SamePairRule::MustBeIncompatible, true) => Some(DiagnosticKind::SamePairUnnecessary),
            _ => None,
        }
    }

    fn check_cycle(&self, board: &ExchangeBoard) -> Vec<EdgeOutcome> {
        let pairs = board.pairs();
        board
            .cycle()
            .edges()
            .map(|(from, to)| {
                let donor = pairs[from - 1].donor;
                let recipient = pairs[to - 1].recipient;
                let passed = self.table.can_donate(donor, recipient);
                trace!("Edge {}: donor {} -> recipient {} passed={}", from, donor, recipient, passed);
                EdgeOutcome {
                    edge: from,
                    to_pair: to,
                    donor,
                    recipient,
                    passed,
                }
            })
            .collect()
    }
}

/// Evaluate with the standard rule (pairs must be compatible)
pub fn evaluate(board: &ExchangeBoard, table: &CompatibilityTable) -> EvaluationResult {
    FeasibilityEvaluator::new(table, SamePairRule::default()).evaluate(board)
}

fn same_pair_message(kind: DiagnosticKind, index: usize, pair: &Pair) -> String {
    match kind {
        DiagnosticKind::SamePairUnnecessary => format!(
            "Pair {}: Donor {} is compatible with Recipient {}, so they shouldn't be in the exchange",
            index, pair.donor, pair.recipient
        ),
        _ => format!(
            "Pair {}: Donor {} incompatible with Recipient {}",
            index, pair.donor, pair.recipient
        ),
    }
}

fn cycle_break(edge: &EdgeOutcome) -> Diagnostic {
    Diagnostic {
        kind: DiagnosticKind::CycleBreak,
        donor_pair: edge.edge,
        recipient_pair: edge.to_pair,
        donor: edge.donor,
        recipient: edge.recipient,
        message: format!(
            "Donor {} ({}) cannot donate to Recipient {} ({})",
            edge.edge, edge.donor, edge.to_pair, edge.recipient
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BloodType::*;

    fn board(pairs: [(BloodType, BloodType); 3]) -> ExchangeBoard {
        let [a, b, c] = pairs.map(|(d, r)| Pair::new(d, r));
        ExchangeBoard::three(a, b, c)
    }

    #[test]
    fn test_all_ab_is_feasible() {
        let result = evaluate(&board([(AB, AB), (AB, AB), (AB, AB)]), CompatibilityTable::abo());
        assert!(result.feasible);
        assert!(result.diagnostics.is_empty());
        assert!(result.edges.iter().all(|e| e.passed));
    }

    #[test]
    fn test_o_donors_ab_recipients_is_feasible() {
        let result = evaluate(&board([(O, AB), (O, AB), (O, AB)]), CompatibilityTable::abo());
        assert!(result.feasible);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_mixed_cycle_reports_each_edge() {
        let result = evaluate(&board([(O, A), (A, B), (B, O)]), CompatibilityTable::abo());
        assert!(!result.feasible);

        let kinds: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| (d.kind, d.donor_pair, d.recipient_pair))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (DiagnosticKind::SamePairIncompatible, 2, 2),
                (DiagnosticKind::SamePairIncompatible, 3, 3),
                (DiagnosticKind::CycleBreak, 2, 3),
                (DiagnosticKind::CycleBreak, 3, 1),
            ]
        );

        let passed: Vec<_> = result.edges.iter().map(|e| e.passed).collect();
        assert_eq!(passed, vec![true, false, false]);
        assert_eq!(
            result.diagnostics[2].message,
            "Donor 2 (A) cannot donate to Recipient 3 (O)"
        );
    }

    #[test]
    fn test_same_pair_incompatible_forces_infeasible() {
        // Cycle edges all pass; only pair 1 is wrong.
        let result = evaluate(&board([(A, B), (O, AB), (O, AB)]), CompatibilityTable::abo());
        assert!(!result.feasible);
        assert!(result.edges.iter().all(|e| e.passed));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::SamePairIncompatible);
        assert_eq!(result.diagnostics[0].donor_pair, 1);
        assert_eq!(
            result.diagnostics[0].message,
            "Pair 1: Donor A incompatible with Recipient B"
        );
    }

    #[test]
    fn test_must_be_incompatible_flags_compatible_pairs() {
        let evaluator = FeasibilityEvaluator::abo(SamePairRule::MustBeIncompatible);
        let result = evaluator.evaluate(&board([(AB, AB), (AB, AB), (AB, AB)]));
        assert!(!result.feasible);
        assert_eq!(result.same_pair_flags().count(), 3);
        assert!(result
            .same_pair_flags()
            .all(|d| d.kind == DiagnosticKind::SamePairUnnecessary));
        assert_eq!(result.failed_edges().count(), 0);
    }

    #[test]
    fn test_must_be_incompatible_two_way_swap() {
        let evaluator = FeasibilityEvaluator::abo(SamePairRule::MustBeIncompatible);
        let swap = ExchangeBoard::new(vec![Pair::new(A, B), Pair::new(B, A)]).unwrap();
        let result = evaluator.evaluate(&swap);
        assert!(result.feasible);
        assert_eq!(result.edges.len(), 2);
    }

    #[test]
    fn test_single_pair_cycle_is_self_loop() {
        let lone = ExchangeBoard::new(vec![Pair::new(B, A)]).unwrap();
        let result = evaluate(&lone, CompatibilityTable::abo());
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].to_pair, 1);
        assert!(!result.feasible);
    }

    #[test]
    fn test_is_feasible_agrees_with_evaluate() {
        for rule in [SamePairRule::MustBeCompatible, SamePairRule::MustBeIncompatible] {
            let evaluator = FeasibilityEvaluator::abo(rule);
            for d1 in BloodType::ALL {
                for r2 in BloodType::ALL {
                    let b = board([(d1, A), (B, r2), (O, AB)]);
                    assert_eq!(evaluator.is_feasible(&b), evaluator.evaluate(&b).feasible);
                }
            }
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let b = board([(O, A), (A, B), (B, O)]);
        let evaluator = FeasibilityEvaluator::abo(SamePairRule::MustBeCompatible);
        assert_eq!(evaluator.evaluate(&b), evaluator.evaluate(&b));
    }

    #[test]
    fn test_rotation_preserves_verdict() {
        let evaluator = FeasibilityEvaluator::abo(SamePairRule::MustBeCompatible);
        for d in BloodType::ALL {
            for r in BloodType::ALL {
                let b = board([(d, r), (A, AB), (O, A)]);
                let original = evaluator.evaluate(&b);
                let rotated = evaluator.evaluate(&b.rotated());
                assert_eq!(original.feasible, rotated.feasible);
                assert_eq!(original.failed_edges().count(), rotated.failed_edges().count());
            }
        }
    }
}

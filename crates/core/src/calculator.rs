use common::error::Error;
use common::types::{CrossRate, RatePath, RateSnapshot};
use tracing::info;

use crate::floyd::ClosedFormSolution;
use crate::search;

/// Which solver answers cross-rate requests for the current snapshot.
///
/// Flipped exclusively by the closed-form solver's negative-cycle check:
/// `ClosedForm` while the snapshot is arbitrage-free, `ExhaustiveSearch`
/// once an arbitrage cycle invalidates the shortest-path formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ClosedForm,
    ExhaustiveSearch,
}

/// Composition root of the rate engine: owns the current snapshot, the
/// derived all-pairs solution, and the active mode, and translates between
/// asset IDs and internal vertex indices at the boundary.
///
/// Not internally synchronized. Callers serialize access (the engine crate
/// does so through its admission queue); `cross_rate` only needs `&self`,
/// `set_snapshot` needs exclusive access.
pub struct CrossRateCalculator {
    snapshot: RateSnapshot,
    solution: Option<ClosedFormSolution>,
    mode: Mode,
    worker_count: Option<usize>,
}

impl Default for CrossRateCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossRateCalculator {
    /// A calculator with no snapshot yet: every request answers `NotFound`
    /// until the first feed delivery.
    pub fn new() -> Self {
        CrossRateCalculator {
            snapshot: RateSnapshot::empty(),
            solution: None,
            mode: Mode::ExhaustiveSearch,
            worker_count: None,
        }
    }

    /// Pins the exhaustive search's worker-pool size instead of deriving it
    /// from the machine's parallelism. Used by tests and benchmarks.
    pub fn with_worker_count(worker_count: usize) -> Self {
        CrossRateCalculator {
            worker_count: Some(worker_count.max(1)),
            ..Self::new()
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn snapshot(&self) -> &RateSnapshot {
        &self.snapshot
    }

    /// Replaces the snapshot wholesale and eagerly recomputes the derived
    /// solution, so the per-request path stays a pure lookup whenever the
    /// graph is arbitrage-free.
    pub fn set_snapshot(&mut self, snapshot: RateSnapshot) {
        self.solution = ClosedFormSolution::solve(&snapshot);
        self.mode = if self.solution.is_some() {
            Mode::ClosedForm
        } else {
            Mode::ExhaustiveSearch
        };
        self.snapshot = snapshot;

        info!(
            vertices = self.snapshot.len(),
            mode = ?self.mode,
            "snapshot replaced"
        );
    }

    /// Best achievable conversion from `source_id` to `target_id`, scaled
    /// by `amount`.
    ///
    /// Fails with `NotFound` when either asset is absent from the mapping,
    /// the snapshot has fewer than 2 vertices, or no path exists in the
    /// active mode.
    pub fn cross_rate(
        &self,
        source_id: &str,
        target_id: &str,
        amount: f64,
    ) -> Result<CrossRate, Error> {
        let assets = self.snapshot.assets();

        let (Some(source), Some(target)) = (assets.index_of(source_id), assets.index_of(target_id))
        else {
            return Err(Error::NotFound);
        };
        if self.snapshot.len() < 2 {
            return Err(Error::NotFound);
        }

        let result = match self.mode {
            Mode::ClosedForm => {
                let solution = self
                    .solution
                    .as_ref()
                    .expect("mode is ClosedForm only when a solution exists");
                solution.route(source, target)
            }
            Mode::ExhaustiveSearch => {
                let workers = self
                    .worker_count
                    .unwrap_or_else(|| search::default_worker_count(self.snapshot.len()));
                search::best_simple_path(&self.snapshot, source, target, workers)?
            }
        };

        let Some(RatePath { path, rate }) = result else {
            return Err(Error::NotFound);
        };

        let path = path
            .into_iter()
            .map(|index| {
                assets
                    .id_of(index)
                    .expect("solver paths only contain snapshot vertices")
                    .to_string()
            })
            .collect();

        Ok(CrossRate {
            path,
            rate: rate * amount,
        })
    }
}

#[cfg(test)]
mod calculator_tests {
    use super::*;
    use common::types::{AssetBook, Quote};

    const TOLERANCE: f64 = 1e-9;

    fn snapshot(ids: &[&str], quotes: &[(&str, &str, f64)]) -> RateSnapshot {
        let book = AssetBook::from_ids(ids.iter().map(|s| s.to_string())).unwrap();
        let quotes: Vec<Quote> = quotes
            .iter()
            .map(|&(base, quote, rate)| Quote {
                base: base.to_string(),
                quote: quote.to_string(),
                rate,
            })
            .collect();
        RateSnapshot::from_quotes(book, &quotes)
    }

    fn assert_approx_eq(a: f64, b: f64) {
        assert!((a - b).abs() < TOLERANCE, "{} != {}", a, b);
    }

    fn no_arbitrage_calculator() -> CrossRateCalculator {
        // Scenario A: A->B=2, B->C=3, C->A=0.1; loop product 0.6 < 1.
        let mut calculator = CrossRateCalculator::with_worker_count(2);
        calculator.set_snapshot(snapshot(
            &["A", "B", "C"],
            &[("A", "B", 2.0), ("B", "C", 3.0), ("C", "A", 0.1)],
        ));
        calculator
    }

    fn arbitrage_calculator() -> CrossRateCalculator {
        // Scenario B: A->B=2, B->C=2, C->A=1; loop product 4 > 1.
        let mut calculator = CrossRateCalculator::with_worker_count(2);
        calculator.set_snapshot(snapshot(
            &["A", "B", "C"],
            &[("A", "B", 2.0), ("B", "C", 2.0), ("C", "A", 1.0)],
        ));
        calculator
    }

    #[test]
    fn scenario_a_closed_form_path_and_rate() {
        let calculator = no_arbitrage_calculator();
        assert_eq!(calculator.mode(), Mode::ClosedForm);

        let result = calculator.cross_rate("A", "C", 1.0).unwrap();
        assert_eq!(result.path, vec!["A", "B", "C"]);
        assert_approx_eq(result.rate, 6.0);
    }

    #[test]
    fn scenario_b_arbitrage_flips_to_search_and_still_answers() {
        let calculator = arbitrage_calculator();
        assert_eq!(calculator.mode(), Mode::ExhaustiveSearch);

        let result = calculator.cross_rate("A", "C", 1.0).unwrap();
        assert_eq!(result.path, vec!["A", "B", "C"]);
        assert_approx_eq(result.rate, 4.0);
    }

    #[test]
    fn scenario_c_amount_scales_the_rate() {
        let calculator = no_arbitrage_calculator();

        let result = calculator.cross_rate("A", "C", 100.0).unwrap();
        assert_approx_eq(result.rate, 600.0);
        assert_eq!(result.path, vec!["A", "B", "C"]);
    }

    #[test]
    fn scenario_d_unknown_asset_is_not_found() {
        let calculator = no_arbitrage_calculator();

        assert_eq!(
            calculator.cross_rate("A", "UNKNOWN", 1.0),
            Err(Error::NotFound)
        );
        assert_eq!(
            calculator.cross_rate("UNKNOWN", "A", 1.0),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn repeated_requests_are_deterministic() {
        let calculator = arbitrage_calculator();

        let first = calculator.cross_rate("A", "C", 1.0).unwrap();
        for _ in 0..5 {
            assert_eq!(calculator.cross_rate("A", "C", 1.0).unwrap(), first);
        }
    }

    #[test]
    fn fresh_calculator_answers_not_found() {
        let calculator = CrossRateCalculator::new();
        assert_eq!(calculator.cross_rate("A", "B", 1.0), Err(Error::NotFound));
    }

    #[test]
    fn single_vertex_snapshot_is_not_found() {
        let mut calculator = CrossRateCalculator::with_worker_count(1);
        calculator.set_snapshot(snapshot(&["A"], &[]));

        assert_eq!(calculator.cross_rate("A", "A", 1.0), Err(Error::NotFound));
    }

    #[test]
    fn unreachable_pair_is_not_found_in_both_modes() {
        let mut calculator = CrossRateCalculator::with_worker_count(2);

        calculator.set_snapshot(snapshot(&["A", "B", "C"], &[("A", "B", 2.0)]));
        assert_eq!(calculator.mode(), Mode::ClosedForm);
        assert_eq!(calculator.cross_rate("A", "C", 1.0), Err(Error::NotFound));

        // Same reachability hole, but with an arbitrage loop on the side so
        // the exhaustive search serves the request.
        calculator.set_snapshot(snapshot(
            &["A", "B", "C"],
            &[("A", "B", 2.0), ("B", "A", 2.0)],
        ));
        assert_eq!(calculator.mode(), Mode::ExhaustiveSearch);
        assert_eq!(calculator.cross_rate("A", "C", 1.0), Err(Error::NotFound));
    }

    #[test]
    fn snapshot_replacement_can_flip_mode_back() {
        let mut calculator = CrossRateCalculator::with_worker_count(2);

        calculator.set_snapshot(snapshot(
            &["A", "B"],
            &[("A", "B", 2.0), ("B", "A", 2.0)],
        ));
        assert_eq!(calculator.mode(), Mode::ExhaustiveSearch);

        calculator.set_snapshot(snapshot(
            &["A", "B"],
            &[("A", "B", 2.0), ("B", "A", 0.4)],
        ));
        assert_eq!(calculator.mode(), Mode::ClosedForm);

        let result = calculator.cross_rate("A", "B", 1.0).unwrap();
        assert_approx_eq(result.rate, 2.0);
    }
}

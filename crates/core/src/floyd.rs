use common::numeric::rate_from_distance;
use common::types::{RatePath, RateSnapshot};
use tracing::{debug, info};

/// All-pairs shortest-path closure over the log-transformed rate matrix.
///
/// Floyd-Warshall runs once per snapshot, not per request, so the O(V^3)
/// cost is amortized across arbitrarily many cross-rate lookups. Alongside
/// the distance matrix a successor matrix is maintained so any optimal path
/// can be reconstructed in O(path length):
///
/// - `successor[i][j] = Some(j)` when the edge `i -> j` exists,
/// - on relaxation through `k`, `successor[i][j] = successor[i][k]`,
/// - `None` means `j` is unreachable from `i`.
///
/// A cycle whose rate product exceeds 1 shows up as a negative-sum cycle in
/// log space, which makes shortest distances unbounded below. `solve`
/// detects that case on the diagonal and declines, discarding the matrices.
#[derive(Debug, Clone)]
pub struct ClosedFormSolution {
    num_vertices: usize,
    distance: Vec<Vec<f64>>,
    successor: Vec<Vec<Option<usize>>>,
}

impl ClosedFormSolution {
    /// Runs the closure over `snapshot.log_rates()`.
    ///
    /// Returns `None` when the snapshot contains an arbitrage cycle: any
    /// `distance[i][i] != 0` after the closure means some cycle through `i`
    /// has negative total log-weight, i.e. a rate product above 1, and the
    /// minimum-sum formulation no longer yields meaningful answers.
    pub fn solve(snapshot: &RateSnapshot) -> Option<Self> {
        let n = snapshot.len();
        let log_rates = snapshot.log_rates();

        let mut distance: Vec<Vec<f64>> = log_rates.to_vec();
        let mut successor: Vec<Vec<Option<usize>>> = vec![vec![None; n]; n];

        for (i, row) in distance.iter().enumerate() {
            for (j, &weight) in row.iter().enumerate() {
                if weight.is_finite() {
                    successor[i][j] = Some(j);
                }
            }
        }

        for k in 0..n {
            for i in 0..n {
                let through_k = distance[i][k];
                if !through_k.is_finite() {
                    continue;
                }
                let hop = successor[i][k];
                for j in 0..n {
                    let relaxed = through_k + distance[k][j];
                    if relaxed < distance[i][j] {
                        distance[i][j] = relaxed;
                        successor[i][j] = hop;
                    }
                }
            }
        }

        let has_arbitrage_cycle = (0..n).any(|i| distance[i][i] != 0.0);

        if has_arbitrage_cycle {
            info!("arbitrage cycle detected, discarding all-pairs closure");
            return None;
        }

        debug!(vertices = n, "all-pairs closure complete, no arbitrage cycle");
        Some(ClosedFormSolution {
            num_vertices: n,
            distance,
            successor,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn distance(&self, source: usize, target: usize) -> f64 {
        self.distance[source][target]
    }

    /// Reconstructs the optimal path from `source` to `target` by walking
    /// the successor matrix.
    ///
    /// Returns `None` when the first successor lookup hits the unreachable
    /// sentinel. The reported rate is the raw product along the path,
    /// recovered as `2^(-distance[source][target])`, never the log distance
    /// itself.
    pub fn route(&self, source: usize, target: usize) -> Option<RatePath> {
        self.successor[source][target]?;

        let mut path = vec![source];
        let mut current = source;

        while current != target {
            current = self.successor[current][target]?;
            path.push(current);

            // A successor chain longer than V vertices means the matrix is
            // corrupt; bail out rather than loop forever.
            if path.len() > self.num_vertices {
                return None;
            }
        }

        Some(RatePath {
            path,
            rate: rate_from_distance(self.distance[source][target]),
        })
    }
}

use std::collections::HashMap;
use std::f64;

use crate::error::Error;
use crate::numeric::log2_weight;

/// Sentinel stored in the raw rate matrix where no edge exists.
pub const NO_EDGE: f64 = -1.0;

/// A single observed pairwise rate: 1 unit of `base` buys `rate` units of
/// `quote`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub base: String,
    pub quote: String,
    pub rate: f64,
}

/// Bijective mapping between vertex indices `0..n-1` and asset IDs.
///
/// Both directions are O(1): index -> ID through a dense vector, ID -> index
/// through a hash map. Construction fails on duplicate IDs so the mapping
/// stays injective both ways.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetBook {
    ids: Vec<String>,
    indices: HashMap<String, usize>,
}

impl AssetBook {
    pub fn from_ids<I>(ids: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let ids: Vec<String> = ids.into_iter().collect();
        let mut indices = HashMap::with_capacity(ids.len());

        for (index, id) in ids.iter().enumerate() {
            if indices.insert(id.clone(), index).is_some() {
                return Err(Error::DuplicateAsset(id.clone()));
            }
        }

        Ok(AssetBook { ids, indices })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.indices.get(id).copied()
    }
}

/// Immutable rate-graph snapshot.
///
/// Holds two parallel `n x n` matrices over the same vertex set:
/// - `rates[i][j]`: the raw conversion rate, `NO_EDGE` where no market
///   exists, `1.0` on the diagonal.
/// - `log_rates[i][j]`: `-log2(rate)`, `+infinity` where no market exists,
///   `0.0` on the diagonal.
///
/// A snapshot is never mutated in place; the rate-acquisition side replaces
/// it wholesale.
#[derive(Debug, Clone, Default)]
pub struct RateSnapshot {
    rates: Vec<Vec<f64>>,
    log_rates: Vec<Vec<f64>>,
    assets: AssetBook,
}

impl RateSnapshot {
    /// The zero-vertex snapshot a calculator holds before the first feed
    /// delivery. Every lookup against it resolves to `NotFound`.
    pub fn empty() -> Self {
        RateSnapshot::default()
    }

    /// Assembles a snapshot from pre-built matrices, validating that both
    /// are square and match the asset book's dimension.
    pub fn from_parts(
        rates: Vec<Vec<f64>>,
        log_rates: Vec<Vec<f64>>,
        assets: AssetBook,
    ) -> Result<Self, Error> {
        let n = assets.len();

        for matrix in [&rates, &log_rates] {
            if matrix.len() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: matrix.len(),
                });
            }
            for row in matrix {
                if row.len() != n {
                    return Err(Error::DimensionMismatch {
                        expected: n,
                        found: row.len(),
                    });
                }
            }
        }

        Ok(RateSnapshot {
            rates,
            log_rates,
            assets,
        })
    }

    /// Builds both matrices from a list of observed quotes.
    ///
    /// Quotes naming assets outside the book and quotes with non-positive
    /// rates are treated as "no edge"; a failed rate probe must never poison
    /// the rest of the snapshot. When the same pair is quoted twice the
    /// latest quote wins.
    pub fn from_quotes(assets: AssetBook, quotes: &[Quote]) -> Self {
        let n = assets.len();

        let mut rates = vec![vec![NO_EDGE; n]; n];
        let mut log_rates = vec![vec![f64::INFINITY; n]; n];
        for i in 0..n {
            rates[i][i] = 1.0;
            log_rates[i][i] = 0.0;
        }

        for quote in quotes {
            let (Some(i), Some(j)) = (assets.index_of(&quote.base), assets.index_of(&quote.quote))
            else {
                continue;
            };
            if i == j || quote.rate <= 0.0 {
                continue;
            }
            rates[i][j] = quote.rate;
            log_rates[i][j] = log2_weight(quote.rate);
        }

        RateSnapshot {
            rates,
            log_rates,
            assets,
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &AssetBook {
        &self.assets
    }

    pub fn rate(&self, from: usize, to: usize) -> f64 {
        self.rates[from][to]
    }

    pub fn log_rate(&self, from: usize, to: usize) -> f64 {
        self.log_rates[from][to]
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        // Strictly positive: every real rate is > 0 and both sentinels
        // (NO_EDGE and a stray 0.0) must read as "no market".
        self.rates[from][to] > 0.0
    }

    pub fn rates(&self) -> &[Vec<f64>] {
        &self.rates
    }

    pub fn log_rates(&self) -> &[Vec<f64>] {
        &self.log_rates
    }
}

/// Conversion result keyed by internal vertex indices.
#[derive(Debug, Clone, PartialEq)]
pub struct RatePath {
    pub path: Vec<usize>,
    pub rate: f64,
}

/// Conversion result keyed by asset IDs, as surfaced to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossRate {
    pub path: Vec<String>,
    pub rate: f64,
}

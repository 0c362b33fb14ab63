use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No conversion exists for the requested pair: unknown asset ID, a
    /// snapshot with fewer than 2 vertices, or an unreachable target.
    NotFound,

    /// A snapshot matrix does not match the asset book's dimension.
    DimensionMismatch { expected: usize, found: usize },

    /// The same asset ID was registered twice while building an asset book.
    DuplicateAsset(String),

    /// A search session died before exploring its full tree, usually
    /// because a worker panicked mid-branch.
    SearchSessionFailed(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "No cross rate exists for the requested pair."),

            Error::DimensionMismatch { expected, found } => write!(
                f,
                "Snapshot matrix is {found}x{found} but the asset book holds {expected} assets."
            ),

            Error::DuplicateAsset(id) => {
                write!(f, "Asset ID '{id}' appears more than once in the asset book.")
            }

            Error::SearchSessionFailed(worker) => {
                write!(f, "Search session aborted: worker {worker} failed.")
            }
        }
    }
}

impl std::error::Error for Error {}

use std::error;
use std::fmt;

/// Error returned when attempting to convert an invalid byte/character into
/// a `Nucleotide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNucleotide(pub u8);

impl fmt::Display for InvalidNucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid nucleotide byte: {} ('{}')", self.0, self.0 as char)
    }
}

impl error::Error for InvalidNucleotide {}

/// Errors from reference-genome manipulation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceError {
    /// Neither filter criterion was given.
    NoFilterCriterion,
    /// Both filter criteria were given; exactly one is allowed.
    ConflictingFilterCriteria,
    /// The proportion to keep must lie in (0, 1].
    InvalidProportion(f64),
    /// The minimum size exceeds every chromosome.
    MinSizeTooLarge { min_size: usize, largest: usize },
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFilterCriterion => {
                write!(f, "Specify > 0 for min_size or out_prop")
            }
            Self::ConflictingFilterCriteria => {
                write!(f, "Specify > 0 for min_size OR out_prop, not both")
            }
            Self::InvalidProportion(p) => {
                write!(f, "out_prop must be between 0 and 1, got {p}")
            }
            Self::MinSizeTooLarge { min_size, largest } => write!(
                f,
                "No chromosome reaches the minimum size {min_size}; the largest is {largest}"
            ),
        }
    }
}

impl error::Error for ReferenceError {}

/// Errors from constructing a categorical sampler.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerError {
    /// No weights were provided, or all weights are zero.
    EmptyWeights,
    /// A weight was negative or non-finite.
    InvalidWeight(f64),
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWeights => write!(f, "Sampler weights are empty or sum to zero"),
            Self::InvalidWeight(w) => write!(f, "Invalid sampler weight: {w}"),
        }
    }
}

impl error::Error for SamplerError {}

/// Errors from building a substitution-rate model.
#[derive(Debug, Clone, PartialEq)]
pub enum RateModelError {
    /// A custom rate matrix did not have 4x4 shape.
    MatrixShape { rows: usize, cols: usize },
    /// An off-diagonal rate was negative.
    NegativeRate { row: usize, col: usize, value: f64 },
    /// A row summed to a positive value (rows must sum to <= 0; the
    /// diagonal absorbs both substitution and indel mass).
    RowSum { row: usize, sum: f64 },
    /// Equilibrium frequencies were negative or did not sum to 1.
    BadFrequencies { sum: f64 },
    /// Indel rate > 0 but both relative-length vectors are empty.
    MissingIndelLengths,
    /// A scalar parameter was outside its valid range.
    InvalidParameter(&'static str, f64),
}

impl fmt::Display for RateModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatrixShape { rows, cols } => {
                write!(f, "Rate matrix must be 4x4, got {rows}x{cols}")
            }
            Self::NegativeRate { row, col, value } => {
                write!(f, "Negative rate at ({row}, {col}): {value}")
            }
            Self::RowSum { row, sum } => {
                write!(f, "Rate-matrix row {row} sums to {sum} (must be <= 0)")
            }
            Self::BadFrequencies { sum } => {
                write!(f, "Equilibrium frequencies must be >= 0 and sum to 1, got sum {sum}")
            }
            Self::MissingIndelLengths => write!(
                f,
                "If indel rate > 0, the relative rates of insertions and \
                 deletions cannot both be of length 0"
            ),
            Self::InvalidParameter(name, value) => {
                write!(f, "Invalid value for {name}: {value}")
            }
        }
    }
}

impl error::Error for RateModelError {}

/// Errors from validating site-rate (gamma) regions.
#[derive(Debug, Clone, PartialEq)]
pub enum GammaError {
    /// End-point and multiplier columns have different lengths.
    ColumnMismatch { ends: usize, values: usize },
    /// A region list has no entries.
    EmptyRegions,
    /// End points must be positive and strictly increasing.
    NonIncreasingEnds { index: usize },
    /// A multiplier was negative.
    NegativeWeight { index: usize, value: f64 },
    /// The last end point must equal the chromosome size.
    LastEndMismatch { last: usize, seq_size: usize },
    /// The tiling region size was zero.
    ZeroRegionSize,
    /// Number of region lists does not match the number of chromosomes.
    CountMismatch { regions: usize, chroms: usize },
}

impl fmt::Display for GammaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnMismatch { ends, values } => write!(
                f,
                "Site-rate regions need matching end and multiplier columns \
                 ({ends} ends vs {values} multipliers)"
            ),
            Self::EmptyRegions => write!(f, "Site-rate regions cannot be empty"),
            Self::NonIncreasingEnds { index } => write!(
                f,
                "Site-rate end points must be positive and strictly increasing \
                 (violated at index {index})"
            ),
            Self::NegativeWeight { index, value } => write!(
                f,
                "Site-rate multipliers must be >= 0, got {value} at index {index}"
            ),
            Self::LastEndMismatch { last, seq_size } => write!(
                f,
                "Last site-rate end point ({last}) must equal the chromosome size ({seq_size})"
            ),
            Self::ZeroRegionSize => write!(f, "Gamma region size cannot be zero"),
            Self::CountMismatch { regions, chroms } => write!(
                f,
                "Number of site-rate region lists ({regions}) must match the \
                 number of chromosomes ({chroms})"
            ),
        }
    }
}

impl error::Error for GammaError {}

/// Errors from validating phylogeny inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum PhylogenyError {
    /// No trees were provided.
    EmptyPhylogeny,
    /// Number of chromosomes in the phylogeny does not match the reference.
    ChromCountMismatch { trees: usize, chroms: usize },
    /// Edge matrix and branch-length vector disagree.
    EdgeCountMismatch { edges: usize, lens: usize },
    /// Tip-label vector does not have `n_tips` entries.
    TipCountMismatch { n_tips: usize, labels: usize },
    /// An edge referenced a node index that cannot exist.
    NodeOutOfRange { index: usize, n_nodes: usize },
    /// A branch length was negative or non-finite.
    InvalidBranchLength { index: usize, value: f64 },
    /// A tip label in one tree is absent from the output ordering.
    UnknownTipLabel(String),
    /// A tree range does not fit inside its chromosome.
    InvalidRange { start: usize, end: usize, seq_size: usize },
}

impl fmt::Display for PhylogenyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPhylogeny => write!(f, "Empty phylogenetic information provided"),
            Self::ChromCountMismatch { trees, chroms } => write!(
                f,
                "Phylogenetic info must be of the same length ({trees}) as the \
                 number of chromosomes in the reference genome ({chroms})"
            ),
            Self::EdgeCountMismatch { edges, lens } => write!(
                f,
                "Edge matrix has {edges} rows but branch-length vector has {lens} entries"
            ),
            Self::TipCountMismatch { n_tips, labels } => write!(
                f,
                "Tree declares {n_tips} tips but has {labels} tip labels"
            ),
            Self::NodeOutOfRange { index, n_nodes } => write!(
                f,
                "Edge references node {index}, but only {n_nodes} nodes exist"
            ),
            Self::InvalidBranchLength { index, value } => write!(
                f,
                "Branch length at edge {index} must be a non-negative number, got {value}"
            ),
            Self::UnknownTipLabel(label) => {
                write!(f, "Tip label '{label}' not found in the variant ordering")
            }
            Self::InvalidRange { start, end, seq_size } => write!(
                f,
                "Tree range [{start}, {end}) does not fit in a chromosome of size {seq_size}"
            ),
        }
    }
}

impl error::Error for PhylogenyError {}

/// Top-level error for genome evolution.
#[derive(Debug, Clone, PartialEq)]
pub enum EvolveError {
    Phylogeny(PhylogenyError),
    Gamma(GammaError),
    RateModel(RateModelError),
}

impl fmt::Display for EvolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phylogeny(e) => write!(f, "Phylogeny error: {e}"),
            Self::Gamma(e) => write!(f, "Site-rate error: {e}"),
            Self::RateModel(e) => write!(f, "Rate-model error: {e}"),
        }
    }
}

impl error::Error for EvolveError {}

impl From<PhylogenyError> for EvolveError {
    fn from(e: PhylogenyError) -> Self {
        Self::Phylogeny(e)
    }
}

impl From<GammaError> for EvolveError {
    fn from(e: GammaError) -> Self {
        Self::Gamma(e)
    }
}

impl From<RateModelError> for EvolveError {
    fn from(e: RateModelError) -> Self {
        Self::RateModel(e)
    }
}

/// Errors from configuring the read simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencingError {
    /// A probability was outside [0, 1].
    InvalidProbability(&'static str, f64),
    /// Read length must be positive.
    ZeroReadLength,
    /// Fragment-length parameters must be positive.
    InvalidFragmentLength(&'static str, f64),
    /// A quality profile's tables disagree with the read length.
    ProfileShape { expected: usize, got: usize },
    /// The genome to sequence has no non-empty chromosomes.
    EmptyGenome,
}

impl fmt::Display for SequencingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProbability(name, p) => {
                write!(f, "Invalid probability for {name}: {p} (must be in [0, 1])")
            }
            Self::ZeroReadLength => write!(f, "Read length must be positive"),
            Self::InvalidFragmentLength(name, v) => {
                write!(f, "Invalid fragment-length parameter {name}: {v}")
            }
            Self::ProfileShape { expected, got } => write!(
                f,
                "Quality profile covers {got} positions but the read length is {expected}"
            ),
            Self::EmptyGenome => write!(f, "Cannot sequence an empty genome"),
        }
    }
}

impl error::Error for SequencingError {}

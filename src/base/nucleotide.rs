use core::fmt;

use crate::errors::InvalidNucleotide;
use serde::{Deserialize, Serialize};

/// Uppercase base characters in index order.
pub const BASES: [u8; 4] = *b"TCAG";

/// Map from an ASCII byte to a base index (0-3), or 4 for anything else
/// (including `N`). Mirrors the lookup the mutation samplers use to skip
/// non-standard characters.
pub const BASE_INDEX: [u8; 256] = build_base_index();

const fn build_base_index() -> [u8; 256] {
    let mut map = [4u8; 256];
    map[b'T' as usize] = 0;
    map[b't' as usize] = 0;
    map[b'C' as usize] = 1;
    map[b'c' as usize] = 1;
    map[b'A' as usize] = 2;
    map[b'a' as usize] = 2;
    map[b'G' as usize] = 3;
    map[b'g' as usize] = 3;
    map
}

/// A DNA nucleotide base.
///
/// `Nucleotide` is a compact, Copyable representation of DNA bases backed by
/// a single byte (u8). The mapping of variants to integers is stable and used
/// throughout the crate (T=0, C=1, A=2, G=3); it is the same ordering as the
/// equilibrium-frequency vector (pi_T, pi_C, pi_A, pi_G) accepted by the
/// rate models. Use the conversion functions to go between bytes/chars and
/// `Nucleotide`; ambiguous characters such as `N` have no variant and are
/// handled at the byte level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Nucleotide {
    T = 0,
    C = 1,
    A = 2,
    G = 3,
}

impl Nucleotide {
    /// Convert from u8 index (0-3)
    #[inline(always)]
    pub const fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::T),
            1 => Some(Self::C),
            2 => Some(Self::A),
            3 => Some(Self::G),
            _ => None,
        }
    }

    /// Convert to the compact u8 index (0-3).
    #[inline(always)]
    pub const fn to_index(self) -> u8 {
        self as u8
    }

    /// Convert from an ASCII byte (`b'T'`, `b'C'`, `b'A'`, `b'G'`), also
    /// accepting lowercase. Returns `None` for non-standard characters,
    /// including `N`.
    #[inline]
    pub const fn from_ascii(byte: u8) -> Option<Self> {
        match byte {
            b'T' | b't' => Some(Self::T),
            b'C' | b'c' => Some(Self::C),
            b'A' | b'a' => Some(Self::A),
            b'G' | b'g' => Some(Self::G),
            _ => None,
        }
    }

    /// Convert to an uppercase ASCII byte representing this nucleotide.
    #[inline(always)]
    pub const fn to_ascii(self) -> u8 {
        BASES[self as usize]
    }

    /// Convert to an uppercase `char` representing this nucleotide.
    #[inline(always)]
    pub const fn to_char(self) -> char {
        self.to_ascii() as char
    }

    /// Return the complementary base (A <-> T, C <-> G).
    #[inline(always)]
    pub const fn complement(self) -> Self {
        match self {
            Self::T => Self::A,
            Self::A => Self::T,
            Self::C => Self::G,
            Self::G => Self::C,
        }
    }

    /// Return true if the nucleotide is a purine (A or G).
    #[inline(always)]
    pub const fn is_purine(self) -> bool {
        matches!(self, Self::A | Self::G)
    }

    /// Return true if the nucleotide is a pyrimidine (C or T).
    #[inline(always)]
    pub const fn is_pyrimidine(self) -> bool {
        matches!(self, Self::C | Self::T)
    }
}

impl TryFrom<u8> for Nucleotide {
    type Error = InvalidNucleotide;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_ascii(byte).ok_or(InvalidNucleotide(byte))
    }
}

impl From<Nucleotide> for u8 {
    #[inline(always)]
    fn from(nuc: Nucleotide) -> u8 {
        nuc.to_index()
    }
}

impl From<Nucleotide> for char {
    #[inline(always)]
    fn from(nuc: Nucleotide) -> char {
        nuc.to_char()
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Reverse-complement a byte sequence in place. `N` (and any other
/// non-standard byte) maps to `N`.
pub fn reverse_complement(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = match Nucleotide::from_ascii(*b) {
            Some(n) => n.complement().to_ascii(),
            None => b'N',
        };
    }
}

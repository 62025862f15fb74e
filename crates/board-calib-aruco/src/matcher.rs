//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub id: u32,
    /// Rotation `0..=3` such that `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance after rotation.
    pub hamming: u8,
}

/// Brute-force matcher over all ids and the four rotations of each code.
///
/// Rotated codes are precomputed once; with 50 codes a lookup is 200 XORs.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// `max_hamming` is clamped to the dictionary's correction capacity so a
    /// corrupted code can never be matched to the wrong id.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let rotated = dict
            .codes
            .iter()
            .map(|&base| [0, 1, 2, 3].map(|rot| rotate_code_u64(base, dict.marker_size, rot)))
            .collect();

        Self {
            dict,
            max_hamming: max_hamming.min(dict.max_correction_bits),
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Best match within `max_hamming`, exact matches short-circuit.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                let m = Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                };
                if h == 0 {
                    return Some(m);
                }
                if best.map_or(true, |prev| m.hamming < prev.hamming) {
                    best = Some(m);
                }
            }
        }

        best
    }
}

/// Rotate a row-major code (`idx = y * n + x`) by `rot` quarter turns.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= ((code >> (sy * n + sx)) & 1) << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DICT_4X4_50;

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let r = (0..4).fold(code, |c, _| rotate_code_u64(c, 8, 1));
        assert_eq!(code, r);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let matcher = Matcher::new(DICT_4X4_50, 0);
        let observed = rotate_code_u64(DICT_4X4_50.codes[9], 4, 3);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!((m.id, m.rotation, m.hamming), (9, 3, 0));
    }

    #[test]
    fn single_bit_error_is_corrected() {
        let matcher = Matcher::new(DICT_4X4_50, 1);
        let observed = DICT_4X4_50.codes[12] ^ (1 << 5);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!((m.id, m.hamming), (12, 1));
    }

    #[test]
    fn requested_tolerance_is_clamped() {
        let matcher = Matcher::new(DICT_4X4_50, 6);
        assert_eq!(matcher.max_hamming(), 1);
        assert!(matcher.match_code(0).is_none());
    }
}

//! Marker dictionaries.

/// A fixed square-marker dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dictionary {
    pub name: &'static str,
    /// Inner bits per side (the black border is not counted).
    pub marker_size: usize,
    /// Largest Hamming error the dictionary can correct unambiguously.
    pub max_correction_bits: u8,
    /// One code per marker id, row-major with bit `y * marker_size + x`,
    /// **white = 1**.
    pub codes: &'static [u64],
}

impl Dictionary {
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Inner bit at `(x, y)`; `true` is white.
    #[inline]
    pub fn bit(&self, code: u64, x: usize, y: usize) -> bool {
        (code >> (y * self.marker_size + x)) & 1 == 1
    }
}

/// The 4x4, 50-marker dictionary used on the board (OpenCV `DICT_4X4_50`).
///
/// Minimum distance between any two codes in any rotation is 4, so one bit
/// error is correctable.
pub const DICT_4X4_50: Dictionary = Dictionary {
    name: "DICT_4X4_50",
    marker_size: 4,
    max_correction_bits: 1,
    codes: &DICT_4X4_50_CODES,
};

const DICT_4X4_50_CODES: [u64; 50] = [
    0x4cad, 0x59f0, 0xb4cc, 0x6299, 0x792a, 0xb39e, 0x7479, 0x4f23, 0x5b7f, 0x6af3, //
    0x899f, 0xe588, 0xed70, 0xf054, 0x8d24, 0x7c64, 0xa662, 0x0066, 0x7a36, 0xf56e, //
    0xd161, 0xd40d, 0xab33, 0x41bb, 0xe27f, 0x8e29, 0x2735, 0x2aa5, 0xc484, 0xf62c, //
    0xa822, 0x4dea, 0xf379, 0xd30f, 0x7510, 0x9490, 0xae18, 0xff20, 0x6fb0, 0x5a38, //
    0x18e8, 0x1454, 0x314c, 0x4d1c, 0x1724, 0xd774, 0xfcb4, 0x26d2, 0x740a, 0xc80a,
];

/// Look up an embedded dictionary by its OpenCV name.
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    match name {
        "DICT_4X4_50" => Some(DICT_4X4_50),
        _ => None,
    }
}

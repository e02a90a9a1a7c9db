use crate::register;
use crate::types;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Index {index} is out of range (the table has {length} entries)")]
    OutOfRange { index: usize, length: usize },
}

/// A resolution and its frame timing, in lines.
#[derive(Debug)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
    pub frame_length_default: u32,
    pub frame_length_minimum: u32,
    pub registers: register::RegisterList,
}

impl Mode {
    pub fn vertical_blank_default(&self) -> u32 {
        self.frame_length_default - self.height
    }

    pub fn vertical_blank_minimum(&self) -> u32 {
        self.frame_length_minimum - self.height
    }

    pub fn is_consistent(&self, minimum_vertical_blank: u32) -> bool {
        self.frame_length_minimum <= self.frame_length_default
            && self.frame_length_minimum >= self.height + minimum_vertical_blank
    }

    pub fn frame_size(&self) -> types::FrameSizeRange {
        types::FrameSizeRange {
            min_width: self.width,
            max_width: self.width,
            min_height: self.height,
            max_height: self.height,
        }
    }

    fn distance(&self, width: u32, height: u32) -> u64 {
        (self.width as i64 - width as i64).unsigned_abs()
            + (self.height as i64 - height as i64).unsigned_abs()
    }
}

/// Modes supported by a sensor, the first one is the default.
pub struct Catalog {
    modes: &'static [Mode],
}

impl Catalog {
    pub const fn new(modes: &'static [Mode]) -> Self {
        assert!(!modes.is_empty(), "a catalog needs at least one mode");
        Self { modes }
    }

    pub fn modes(&self) -> &'static [Mode] {
        self.modes
    }

    pub fn default_mode(&self) -> &'static Mode {
        &self.modes[0]
    }

    pub fn position(&self, mode: &Mode) -> Option<usize> {
        self.modes
            .iter()
            .position(|candidate| std::ptr::eq(candidate, mode))
    }

    /// Nearest mode by the sum of width and height differences, the first one wins ties.
    pub fn select_mode(&self, width: u32, height: u32) -> &'static Mode {
        let mut best = &self.modes[0];
        for mode in &self.modes[1..] {
            if mode.distance(width, height) < best.distance(width, height) {
                best = mode;
            }
        }
        best
    }

    pub fn enumerate_sizes(&self, index: usize) -> Result<types::FrameSizeRange, Error> {
        self.modes
            .get(index)
            .map(Mode::frame_size)
            .ok_or(Error::OutOfRange {
                index,
                length: self.modes.len(),
            })
    }
}

/// Flip-correct variant of the requested code's base pattern. Unknown codes fall back to the first group.
pub fn select_format(requested_code: u32, vflip: bool, hflip: bool) -> types::FormatCode {
    let index = types::FormatCode::ALL
        .iter()
        .position(|format_code| format_code.code() == requested_code)
        .unwrap_or(0);
    let variant = (if vflip { 2 } else { 0 }) | (if hflip { 1 } else { 0 });
    types::FormatCode::ALL[(index & !3) | variant]
}

/// One entry per base pattern, adjusted for the current flips.
pub fn enumerate_formats(
    index: usize,
    vflip: bool,
    hflip: bool,
) -> Result<types::FormatCode, Error> {
    let groups = types::FormatCode::ALL.len() / types::FormatCode::GROUP_LENGTH;
    if index >= groups {
        return Err(Error::OutOfRange {
            index,
            length: groups,
        });
    }
    Ok(select_format(
        types::FormatCode::ALL[index * types::FormatCode::GROUP_LENGTH].code(),
        vflip,
        hflip,
    ))
}

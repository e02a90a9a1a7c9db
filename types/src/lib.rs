/// Raw bayer media-bus codes.
///
/// The discriminants are the media-bus numeric codes, so hosts can exchange raw `u32` values.
/// [`FormatCode::ALL`] holds four codes per base pattern in the order
/// no flip, horizontal flip, vertical flip, both flips.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FormatCode {
    Sbggr8 = 0x3001,
    Sgrbg8 = 0x3002,
    Sgbrg8 = 0x3013,
    Srggb8 = 0x3014,
    Sbggr10 = 0x3007,
    Sgrbg10 = 0x300A,
    Sgbrg10 = 0x300E,
    Srggb10 = 0x300F,
}

impl FormatCode {
    pub const ALL: [FormatCode; 8] = [
        FormatCode::Srggb10,
        FormatCode::Sgrbg10,
        FormatCode::Sgbrg10,
        FormatCode::Sbggr10,
        FormatCode::Srggb8,
        FormatCode::Sgrbg8,
        FormatCode::Sgbrg8,
        FormatCode::Sbggr8,
    ];

    pub const GROUP_LENGTH: usize = 4;

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|format_code| format_code.code() == code)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Position in [`FormatCode::ALL`].
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|format_code| *format_code == self)
            .unwrap_or(0)
    }

    pub fn bits_per_sample(self) -> u8 {
        match self {
            FormatCode::Srggb10
            | FormatCode::Sgrbg10
            | FormatCode::Sgbrg10
            | FormatCode::Sbggr10 => 10,
            FormatCode::Srggb8 | FormatCode::Sgrbg8 | FormatCode::Sgbrg8 | FormatCode::Sbggr8 => 8,
        }
    }
}

impl From<FormatCode> for u32 {
    fn from(format_code: FormatCode) -> Self {
        format_code.code()
    }
}

impl std::fmt::Display for FormatCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormatCode::Sbggr8 => "SBGGR8_1X8",
            FormatCode::Sgrbg8 => "SGRBG8_1X8",
            FormatCode::Sgbrg8 => "SGBRG8_1X8",
            FormatCode::Srggb8 => "SRGGB8_1X8",
            FormatCode::Sbggr10 => "SBGGR10_1X10",
            FormatCode::Sgrbg10 => "SGRBG10_1X10",
            FormatCode::Sgbrg10 => "SGBRG10_1X10",
            FormatCode::Srggb10 => "SRGGB10_1X10",
        };
        write!(formatter, "{name} ({:#06X})", self.code())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub code: FormatCode,
}

/// A format request from a host, the code may be any media-bus value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FormatRequest {
    pub width: u32,
    pub height: u32,
    pub code: u32,
}

impl From<FrameFormat> for FormatRequest {
    fn from(format: FrameFormat) -> Self {
        Self {
            width: format.width,
            height: format.height,
            code: format.code.code(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameSizeRange {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

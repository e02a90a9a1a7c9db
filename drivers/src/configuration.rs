#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unsupported number of data lanes (expected {expected}, got {got})")]
    DataLanes { expected: u8, got: u8 },

    #[error("Unsupported link frequencies (expected {expected:?}, got {got:?})")]
    LinkFrequencies { expected: &'static [u64], got: Vec<u64> },

    #[error("External clock frequency {frequency} Hz is outside [{minimum}, {maximum}] Hz")]
    ClockFrequency {
        frequency: u32,
        minimum: u32,
        maximum: u32,
    },
}

/// Board description of the sensor's output link and input clock.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub data_lanes: u8,
    pub link_frequencies: std::borrow::Cow<'static, [u64]>,
    pub clock_frequency: u32,
}

/// What a sensor accepts from the board. The clock tolerance is in parts per hundred.
#[derive(Debug, Clone, Copy)]
pub struct Requirements {
    pub data_lanes: u8,
    pub link_frequencies: &'static [u64],
    pub clock_frequency: u32,
    pub clock_tolerance_percent: u32,
}

impl Requirements {
    pub const fn clock_range(&self) -> std::ops::RangeInclusive<u32> {
        let delta = self.clock_frequency / 100 * self.clock_tolerance_percent;
        (self.clock_frequency - delta)..=(self.clock_frequency + delta)
    }

    /// The endpoint a board meeting the requirements exactly would declare.
    pub const fn endpoint(&self) -> Endpoint {
        Endpoint {
            data_lanes: self.data_lanes,
            link_frequencies: std::borrow::Cow::Borrowed(self.link_frequencies),
            clock_frequency: self.clock_frequency,
        }
    }
}

impl Endpoint {
    pub fn validate(&self, requirements: &Requirements) -> Result<(), Error> {
        if self.data_lanes != requirements.data_lanes {
            return Err(Error::DataLanes {
                expected: requirements.data_lanes,
                got: self.data_lanes,
            });
        }
        if *self.link_frequencies != *requirements.link_frequencies {
            return Err(Error::LinkFrequencies {
                expected: requirements.link_frequencies,
                got: self.link_frequencies.to_vec(),
            });
        }
        let range = requirements.clock_range();
        if !range.contains(&self.clock_frequency) {
            return Err(Error::ClockFrequency {
                frequency: self.clock_frequency,
                minimum: *range.start(),
                maximum: *range.end(),
            });
        }
        Ok(())
    }
}

use crate::catalog;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("{id} is read-only")]
    ReadOnly { id: Id },

    #[error("{id} cannot change while the sensor is streaming")]
    Grabbed { id: Id },

    #[error("{value} is out of range for {id} (expected a value in [{minimum}, {maximum}])")]
    OutOfRange {
        id: Id,
        value: i64,
        minimum: i64,
        maximum: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub value: i64,
    pub minimum: i64,
    pub maximum: i64,
    pub step: i64,
    pub default: i64,
    pub read_only: bool,
    pub grabbed: bool,
}

impl Control {
    const fn new(minimum: i64, maximum: i64, step: i64, default: i64) -> Self {
        Self {
            value: default,
            minimum,
            maximum,
            step,
            default,
            read_only: false,
            grabbed: false,
        }
    }

    const fn fixed(value: i64) -> Self {
        Self {
            value,
            minimum: value,
            maximum: value,
            step: 1,
            default: value,
            read_only: true,
            grabbed: false,
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.minimum && value <= self.maximum
    }

    /// Returns true if the current value changed, which happens when it falls outside the
    /// new range and is reset to the new default.
    fn modify_range(&mut self, minimum: i64, maximum: i64, step: i64, default: i64) -> bool {
        self.minimum = minimum;
        self.maximum = maximum;
        self.step = step;
        self.default = default;
        if self.contains(self.value) {
            false
        } else {
            self.value = default;
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub minimum: i64,
    pub maximum: i64,
    pub default: i64,
}

/// Sensor constants that bound the controls. Frame and line lengths are in lines and pixels.
#[derive(Debug)]
pub struct Limits {
    pub frame_length_maximum: u32,
    pub line_length: u32,
    pub exposure_minimum: u32,
    pub exposure_default: u32,
    /// Lines between the end of the exposure and the end of the frame.
    pub exposure_guard: u32,
    pub analog_gain: Range,
    pub digital_gain: Range,
    pub link_frequencies: &'static [i64],
    pub test_patterns: &'static [&'static str],
}

macro_rules! controls {
    ($($name:ident),+ $(,)?) => {
        paste::paste! {
            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
            pub enum Id {
                $(
                    [<$name:camel>],
                )+
            }

            impl Id {
                pub const ALL: &'static [Id] = &[$(Id::[<$name:camel>],)+];
            }

            impl std::fmt::Display for Id {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        $(
                            Self::[<$name:camel>] => write!(formatter, stringify!($name)),
                        )+
                    }
                }
            }

            #[derive(Debug, Clone, PartialEq, Eq)]
            pub struct ControlSet {
                $(
                    pub $name: Control,
                )+
            }

            impl ControlSet {
                pub fn get(&self, id: Id) -> &Control {
                    match id {
                        $(
                            Id::[<$name:camel>] => &self.$name,
                        )+
                    }
                }

                fn get_mut(&mut self, id: Id) -> &mut Control {
                    match id {
                        $(
                            Id::[<$name:camel>] => &mut self.$name,
                        )+
                    }
                }
            }
        }
    }
}

controls! {
    pixel_rate,
    link_frequency,
    vertical_blank,
    horizontal_blank,
    exposure,
    analog_gain,
    digital_gain,
    horizontal_flip,
    vertical_flip,
    test_pattern,
}

/// Control values and ranges, kept consistent with the current mode.
///
/// Vertical blanking bounds the exposure: the exposure must end `exposure_guard` lines
/// before the frame does. Mode changes and vertical blanking writes both re-establish this.
#[derive(Debug, Clone)]
pub struct Controls {
    set: ControlSet,
    limits: &'static Limits,
}

impl Controls {
    pub fn new(limits: &'static Limits, pixel_rate: i64, mode: &catalog::Mode) -> Self {
        let mut controls = Self {
            set: ControlSet {
                pixel_rate: Control::fixed(pixel_rate),
                link_frequency: Control {
                    read_only: true,
                    ..Control::new(0, limits.link_frequencies.len() as i64 - 1, 1, 0)
                },
                vertical_blank: Control::new(0, 0, 1, 0),
                horizontal_blank: Control::fixed(0),
                exposure: Control::new(
                    limits.exposure_minimum as i64,
                    limits.exposure_default as i64,
                    1,
                    limits.exposure_default as i64,
                ),
                analog_gain: Control::new(
                    limits.analog_gain.minimum,
                    limits.analog_gain.maximum,
                    1,
                    limits.analog_gain.default,
                ),
                digital_gain: Control::new(
                    limits.digital_gain.minimum,
                    limits.digital_gain.maximum,
                    1,
                    limits.digital_gain.default,
                ),
                horizontal_flip: Control::new(0, 1, 1, 0),
                vertical_flip: Control::new(0, 1, 1, 0),
                test_pattern: Control::new(0, limits.test_patterns.len() as i64 - 1, 1, 0),
            },
            limits,
        };
        controls.set_mode(mode);
        controls
    }

    pub fn get(&self, id: Id) -> &Control {
        self.set.get(id)
    }

    pub fn value(&self, id: Id) -> i64 {
        self.set.get(id).value
    }

    pub fn control_set(&self) -> &ControlSet {
        &self.set
    }

    pub fn limits(&self) -> &'static Limits {
        self.limits
    }

    pub fn hflip(&self) -> bool {
        self.set.horizontal_flip.value != 0
    }

    pub fn vflip(&self) -> bool {
        self.set.vertical_flip.value != 0
    }

    pub fn link_frequency(&self) -> i64 {
        self.limits.link_frequencies[self.set.link_frequency.value as usize]
    }

    pub fn test_pattern_name(&self) -> &'static str {
        self.limits.test_patterns[self.set.test_pattern.value as usize]
    }

    /// Controls pushed to the sensor when streaming starts, in order.
    pub fn writable(&self) -> impl Iterator<Item = Id> + '_ {
        Id::ALL
            .iter()
            .copied()
            .filter(|id| !self.set.get(*id).read_only)
    }

    /// Resets blanking and exposure for a new mode and returns the controls whose value changed,
    /// in write order.
    pub fn set_mode(&mut self, mode: &catalog::Mode) -> Vec<Id> {
        let mut changed = Vec::new();
        let height = mode.height as i64;
        let vertical_blank_default = mode.vertical_blank_default() as i64;
        let vertical_blank = &mut self.set.vertical_blank;
        vertical_blank.modify_range(
            mode.vertical_blank_minimum() as i64,
            self.limits.frame_length_maximum as i64 - height,
            1,
            vertical_blank_default,
        );
        vertical_blank.value = vertical_blank_default;
        if self.update_exposure_range(mode.frame_length_default as i64) {
            changed.push(Id::Exposure);
        }
        changed.push(Id::VerticalBlank);
        let horizontal_blank = self.limits.line_length as i64 - mode.width as i64;
        self.set.horizontal_blank = Control::fixed(horizontal_blank);
        changed
    }

    /// Validates and stores a value, then returns the controls whose value changed in write order.
    /// A clamped exposure comes before the frame length that forced it, so the exposure never
    /// exceeds the frame on the sensor.
    ///
    /// Nothing changes when the value is rejected.
    pub fn set_value(
        &mut self,
        mode: &catalog::Mode,
        id: Id,
        value: i64,
    ) -> Result<Vec<Id>, Error> {
        let control = self.set.get_mut(id);
        if control.read_only {
            return Err(Error::ReadOnly { id });
        }
        if control.grabbed {
            return Err(Error::Grabbed { id });
        }
        if !control.contains(value) {
            return Err(Error::OutOfRange {
                id,
                value,
                minimum: control.minimum,
                maximum: control.maximum,
            });
        }
        let value_changed = control.value != value;
        control.value = value;
        let mut changed = Vec::new();
        if id == Id::VerticalBlank && self.update_exposure_range(mode.height as i64 + value) {
            changed.push(Id::Exposure);
        }
        if value_changed {
            changed.push(id);
        }
        Ok(changed)
    }

    /// Puts back values and ranges saved with [`Controls::control_set`], after the sensor
    /// refused the matching writes.
    pub fn restore(&mut self, set: ControlSet) {
        self.set = set;
    }

    /// Flips cannot change while streaming since they change the bayer order.
    pub fn grab_flips(&mut self, grabbed: bool) {
        self.set.horizontal_flip.grabbed = grabbed;
        self.set.vertical_flip.grabbed = grabbed;
    }

    fn update_exposure_range(&mut self, frame_length: i64) -> bool {
        let maximum = frame_length - self.limits.exposure_guard as i64;
        let default = maximum.min(self.limits.exposure_default as i64);
        let exposure = &mut self.set.exposure;
        exposure.modify_range(exposure.minimum, maximum, exposure.step, default)
    }
}

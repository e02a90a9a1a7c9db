use crate::controls;
use crate::types;

/// Host-facing capabilities of a sensor.
///
/// Every method takes the device by reference, so a device shared between threads needs a lock
/// around it (one lock per device).
pub trait Sensor: Sized {
    type Configuration;
    type Error;
    type Properties;

    const PROPERTIES: Self::Properties;

    fn current_configuration(&self) -> Self::Configuration;

    fn enumerate_formats(&self, index: usize) -> Result<types::FormatCode, Self::Error>;

    /// Sizes are only listed for the current flip variant of the code's base pattern.
    fn enumerate_sizes(
        &self,
        code: u32,
        index: usize,
    ) -> Result<types::FrameSizeRange, Self::Error>;

    fn get_format(&self) -> types::FrameFormat;

    /// The format [`Sensor::set_format`] would select, without changing anything.
    fn try_format(&self, request: types::FormatRequest) -> types::FrameFormat;

    fn set_format(&mut self, request: types::FormatRequest) -> Result<types::FrameFormat, Self::Error>;

    fn control(&self, id: controls::Id) -> controls::Control;

    fn set_control(&mut self, id: controls::Id, value: i64) -> Result<(), Self::Error>;

    fn start_stream(&mut self) -> Result<(), Self::Error>;

    fn stop_stream(&mut self);

    fn set_stream(&mut self, enable: bool) -> Result<(), Self::Error> {
        if enable {
            self.start_stream()
        } else {
            self.stop_stream();
            Ok(())
        }
    }

    fn suspend(&mut self);

    fn resume(&mut self) -> Result<(), Self::Error>;

    fn is_streaming(&self) -> bool;

    fn is_powered(&self) -> bool;
}

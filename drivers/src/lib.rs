pub mod bus;
pub mod catalog;
pub mod configuration;
pub mod controls;
pub mod device;
pub mod devices;
pub mod mock;
pub mod power;
pub mod properties;
pub mod register;

pub use bincode;
pub use camera_sensor_types as types;
pub use embedded_hal;
pub use serde;

pub use device::Sensor;
pub use devices::open;
pub use devices::Configuration;
pub use devices::Device;
pub use devices::Error;
pub use devices::Type;

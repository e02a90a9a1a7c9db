use crate::bus;
use crate::controls;
use crate::device::Sensor;
use crate::power;
use crate::properties;
use crate::types;

macro_rules! register {
    ($($module:ident),+) => {
        paste::paste! {
            $(
                pub mod $module;
            )+

            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
            pub enum Type {
                $(
                    [<$module:camel>],
                )+
            }

            impl std::fmt::Display for Type {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        $(
                            Self::[<$module:camel>] => write!(formatter, stringify!($module)),
                        )+
                    }
                }
            }

            impl Type {
                pub fn name(self) -> &'static str  {
                    match self {
                        $(
                            Type::[<$module:camel>] => $module::PROPERTIES.name,
                        )+
                    }
                }

                pub fn default_configuration(self) -> Configuration {
                    match self {
                        $(
                            Type::[<$module:camel>] => Configuration::[<$module:camel>]($module::DEFAULT_CONFIGURATION),
                        )+
                    }
                }
            }

            #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
            #[serde(tag = "type", content = "configuration")]
            pub enum Configuration {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>]($module::Configuration),
                )+
            }

            impl Configuration {
                pub fn serialize_bincode(&self) -> bincode::Result<Vec<u8>> {
                    match self {
                        $(
                            Configuration::[<$module:camel>](configuration) => bincode::serialize(configuration),
                        )+
                    }
                }

                pub fn deserialize_bincode(
                    device_type: Type,
                    data: &[u8]
                ) -> bincode::Result<Configuration> {
                    match device_type {
                        $(
                            Type::[<$module:camel>] => Ok(
                                Configuration::[<$module:camel>](bincode::deserialize(data)?)
                            ),
                        )+
                    }
                }

                pub fn device_type(&self) -> Type {
                    match self {
                        $(
                            Configuration::[<$module:camel>](_) => Type::[<$module:camel>],
                        )+
                    }
                }

                pub fn type_name(&self) -> &'static str {
                    self.device_type().name()
                }
            }

            pub enum Device<B: bus::Bus, P: power::Power> {
                $(
                    [<$module:camel>]($module::Device<B, P>),
                )+
            }

            /// Opens a sensor of the given type, with its default configuration if none is given.
            pub fn open<B: bus::Bus, P: power::Power>(
                device_type: Type,
                configuration: Option<Configuration>,
                bus: B,
                power: P,
            ) -> Result<Device<B, P>, Error> {
                let configuration = match configuration {
                    Some(configuration) => {
                        if configuration.device_type() != device_type {
                            return Err(Error::ConfigurationType {
                                device: device_type.name().to_owned(),
                                configuration: configuration.type_name().to_owned(),
                            });
                        }
                        configuration
                    }
                    None => device_type.default_configuration(),
                };
                match configuration {
                    $(
                        Configuration::[<$module:camel>](configuration) => Ok(
                            Device::[<$module:camel>]($module::open(bus, power, configuration)?)
                        ),
                    )+
                }
            }

            #[derive(Debug, serde::Serialize)]
            pub enum Properties {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>](properties::Sensor<$module::Configuration>),
                )+
            }

            impl<B: bus::Bus, P: power::Power> Device<B, P> {
                pub fn device_type(&self) -> Type {
                    match self {
                        $(
                            Self::[<$module:camel>](_) => Type::[<$module:camel>],
                        )+
                    }
                }

                pub fn name(&self) -> &'static str {
                    self.device_type().name()
                }

                pub fn properties(&self) -> Properties {
                    match self {
                        $(
                            Self::[<$module:camel>](_) => Properties::[<$module:camel>]($module::PROPERTIES),
                        )+
                    }
                }

                pub fn current_configuration(&self) -> Configuration {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Configuration::[<$module:camel>](device.current_configuration()),
                        )+
                    }
                }

                pub fn get_format(&self) -> types::FrameFormat {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.get_format(),
                        )+
                    }
                }

                pub fn set_format(&mut self, request: types::FormatRequest) -> Result<types::FrameFormat, Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.set_format(request)?),
                        )+
                    }
                }

                pub fn control(&self, id: controls::Id) -> controls::Control {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.control(id),
                        )+
                    }
                }

                pub fn set_control(&mut self, id: controls::Id, value: i64) -> Result<(), Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.set_control(id, value)?),
                        )+
                    }
                }

                pub fn set_stream(&mut self, enable: bool) -> Result<(), Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => Ok(device.set_stream(enable)?),
                        )+
                    }
                }

                pub fn is_streaming(&self) -> bool {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.is_streaming(),
                        )+
                    }
                }
            }

            #[derive(Debug, PartialEq, Eq)]
            pub struct ParseTypeError {
                on: String
            }

            impl std::fmt::Display for ParseTypeError {
                fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(formatter, "unknown device type \"{}\"", self.on)
                }
            }

            impl std::error::Error for ParseTypeError {}

            impl std::str::FromStr for Type {
                type Err = ParseTypeError;

                fn from_str(string: &str) -> Result<Self, Self::Err> {
                    match string {
                        $(
                            stringify!($module) => Ok(Self::[<$module:camel>]),
                        )+
                        _ => Err(Self::Err {on: string.to_owned()}),
                    }
                }
            }

            #[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
            pub enum Error {
                $(
                    #[error(transparent)]
                    [<$module:camel>](#[from] $module::Error),
                )+

                #[error("unexpected configuration type (the device is a \"{device}\", got a \"{configuration}\" configuration)")]
                ConfigurationType { device: String, configuration: String },
            }
        }
    }
}

register! { sony_imx363 }

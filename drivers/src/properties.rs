#[derive(Debug, Clone, serde::Serialize)]
pub struct Sensor<Configuration> {
    pub name: &'static str,
    pub chip_id: u16,
    pub width: u32,
    pub height: u32,
    pub default_configuration: Configuration,
}

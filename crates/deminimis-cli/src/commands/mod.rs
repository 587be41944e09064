pub mod aggregate;
pub mod amount;
pub mod extract;
pub mod sme;
pub mod store;

use deminimis_core::settings::RegistrySettings;

use crate::input;

/// Registry settings from `--config`, or the defaults.
pub fn load_settings(config: Option<&str>) -> Result<RegistrySettings, Box<dyn std::error::Error>> {
    match config {
        Some(path) => Ok(RegistrySettings::from_json_str(&input::file::read_text(path)?)?),
        None => Ok(RegistrySettings::default()),
    }
}

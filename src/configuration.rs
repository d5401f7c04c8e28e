//! Loads engine parameters from `configuration/base.yaml` and the environment.
use std::path::Path;

use crate::parameters::MRParameters;

/// Reads `configuration/base.yaml` below the current directory (if present) and applies
/// `PRINCE_*` environment overrides on top.
pub fn get_configuration() -> Result<MRParameters, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    get_configuration_from(&base_path.join("configuration"))
}

pub fn get_configuration_from(config_dir: &Path) -> Result<MRParameters, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(config_dir.join("base.yaml")).required(false))
        .add_source(
            config::Environment::with_prefix("PRINCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let params = settings.try_deserialize::<MRParameters>()?;
    // Same lower bounds as the setters.
    let (mappers, reducers) = (params.mappers, params.reducers);
    let (partition, spill) = (params.map_partition_size, params.spill_buffer_size);
    Ok(params
        .set_concurrency(mappers, reducers)
        .set_partition_size(partition)
        .set_spill_size(spill))
}

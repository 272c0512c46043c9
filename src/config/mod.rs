mod settings;

pub use settings::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, ForwarderConfig, Settings,
    load_settings, load_settings_from_path, settings_from_lookup,
};

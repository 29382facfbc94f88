// Tab suspender services
// Stateless policy (status, URLs, whitelist) plus the settings file and tab info cache.

pub mod settings_engine;
pub mod status_calculator;
pub mod suspended_url;
pub mod tab_info_store;
pub mod whitelist;

//! LSP request/notification handlers.

mod documents;
mod files;
mod initialize;

pub use documents::{
    handle_did_change, handle_did_close, handle_did_open, handle_did_save, handle_will_save,
};
pub use files::{
    REGISTER_CONFIG_FILE_METHOD, RegisterConfigFileParams, handle_did_change_configuration,
    handle_did_change_watched_files, handle_did_change_workspace_folders,
    handle_register_config_file,
};
pub use initialize::{handle_initialize, handle_initialized, handle_shutdown};

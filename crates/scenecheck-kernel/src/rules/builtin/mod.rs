//! Built-in rules for scenecheck.
//!
//! Which of these are active is controlled by [`RulesConfig`].

mod null_reference;
mod prefab_usage;
mod scene_folder;

pub use null_reference::NullReference;
pub use prefab_usage::PrefabUsage;
pub use scene_folder::SceneFolder;

use super::RuleRegistry;
use crate::config::RulesConfig;
use crate::error::ValidationError;

/// Register the enabled built-in rules with the registry.
pub fn register_builtins(
    registry: &mut RuleRegistry,
    config: &RulesConfig,
    scene_extension: &str,
) -> Result<(), ValidationError> {
    if config.null_reference {
        registry.register_field(NullReference::new(config.ignored_types()?));
    }
    if config.prefab_usage {
        registry.register_object(PrefabUsage);
    }
    if let Some(root) = &config.scene_folder_root {
        registry.register_path(SceneFolder::new(root, scene_extension));
    }
    Ok(())
}

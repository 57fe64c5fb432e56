//! Scene-specific asset folders.

use crate::rules::DependencyPathValidator;
use crate::validator::{Check, ValidationContext};

/// A scene may only use assets under the scene folder root if they live in
/// its own folder.
///
/// With root `Assets/Scenes`, `Assets/Scenes/Forest/Forest.unity` may use
/// `Assets/Scenes/Forest/Trees.mat` but not `Assets/Scenes/Desert/Sand.mat`.
pub struct SceneFolder {
    root: String,
    scene_extension: String,
}

impl SceneFolder {
    pub fn new(root: &str, scene_extension: impl Into<String>) -> Self {
        Self {
            root: format!("{}/", root.trim_end_matches('/')),
            scene_extension: scene_extension.into(),
        }
    }
}

fn folder(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

impl DependencyPathValidator for SceneFolder {
    fn name(&self) -> &str {
        "scene-folder"
    }

    fn validate_path(&self, parent: &str, child: &str, ctx: &mut ValidationContext) -> anyhow::Result<()> {
        if !parent.ends_with(&self.scene_extension) {
            return Ok(());
        }
        let scene_folder = folder(parent);
        if !scene_folder.is_empty() && child.starts_with(&format!("{scene_folder}/")) {
            return Ok(());
        }
        ctx.assert_false(
            child.starts_with(&self.root),
            Check::new().message(|| format!("Scene {parent} is using scene-specific asset {child}, this is not allowed")),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::host::MemoryScene;
    use crate::validator::ContextOptions;

    #[rstest]
    #[case::own_folder("Assets/Scenes/Forest/Forest.unity", "Assets/Scenes/Forest/Trees.mat", 0)]
    #[case::other_scene_folder("Assets/Scenes/Forest/Forest.unity", "Assets/Scenes/Desert/Sand.mat", 1)]
    #[case::shared_asset("Assets/Scenes/Forest/Forest.unity", "Assets/Shared/Rock.mat", 0)]
    #[case::not_a_scene("Assets/Prefabs/Tree.prefab", "Assets/Scenes/Desert/Sand.mat", 0)]
    #[case::prefix_is_not_folder("Assets/Scenes/Forest/Forest.unity", "Assets/ScenesOld/Sand.mat", 0)]
    fn scene_folder_rule(#[case] parent: &str, #[case] child: &str, #[case] expected: usize) {
        let host = MemoryScene::new();
        let mut ctx = ValidationContext::new(&host, ContextOptions::default()).expect("not simulating");
        SceneFolder::new("Assets/Scenes/", ".unity")
            .validate_path(parent, child, &mut ctx)
            .expect("rule runs");
        assert_eq!(ctx.issues().len(), expected);
    }

    #[test]
    fn message_names_both_paths() {
        let host = MemoryScene::new();
        let mut ctx = ValidationContext::new(&host, ContextOptions::default()).expect("not simulating");
        SceneFolder::new("Assets/Scenes", ".unity")
            .validate_path("Assets/Scenes/A/A.unity", "Assets/Scenes/B/x.mat", &mut ctx)
            .expect("rule runs");
        assert_eq!(
            ctx.issues()[0].info_text(),
            "Scene Assets/Scenes/A/A.unity is using scene-specific asset Assets/Scenes/B/x.mat, this is not allowed"
        );
    }
}

//! Host collaborators: everything the engine needs from the editor it runs in.
//!
//! The engine never owns the scene graph. It asks a [`SceneHost`] for roots,
//! children, components, fields, dependency edges, and prefab correspondence,
//! and tells it when an auto-fix dirtied something.
//!
//! - **traits**: the collaborator interfaces
//! - **MemoryScene**: a complete in-memory host (tests, CLI)
//! - **SceneDocument**: JSON description that loads into a `MemoryScene`

mod document;
mod memory;
mod traits;

pub use document::{AssetDoc, ComponentDoc, FieldDoc, NodeDoc, PrefabDoc, SceneDoc, SceneDocument};
pub use memory::{MemoryScene, Parent};
pub use traits::{
    AssetPersistence, CallSiteResolver, Capabilities, DependencyProvider, FieldReflection,
    HostState, ObjectGraph, SceneHost, SelfValidating,
};

//! Scene Task Catalog
//!
//! The fixed, ordered list of derivative scenes generated from the master
//! design. Position `n` (1-based) in this catalog is the identity
//! `ArtifactId::Scene(n)` of the artifact it produces; index 0 of a run's
//! result sequence is always the master.

use crate::types::{ArtifactId, SceneKind};

/// One derivative-generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTask {
    pub kind: SceneKind,
    pub label: &'static str,
    pub instruction: &'static str,
}

pub const SCENE_COUNT: usize = 8;

/// Context sent with the master pass.
pub const MASTER_INSTRUCTION: &str =
    "Create the definitive master architectural concept for this product.";

pub const MASTER_LABEL: &str = "Master design (architectural reference)";

pub static SCENE_CATALOG: [SceneTask; SCENE_COUNT] = [
    SceneTask {
        kind: SceneKind::Wide,
        label: "Alternate overall view",
        instruction: "Another overall view of this master design.",
    },
    SceneTask {
        kind: SceneKind::Lifestyle,
        label: "People using the product",
        instruction: "Real people using the wooden product, shot from several close angles.",
    },
    SceneTask {
        kind: SceneKind::Lifestyle,
        label: "People in the space",
        instruction: "Lifestyle scene with people interacting inside the wooden space.",
    },
    SceneTask {
        kind: SceneKind::Lifestyle,
        label: "Texture and touch",
        instruction: "Close-up of the wood grain texture with a hand touching the surface.",
    },
    SceneTask {
        kind: SceneKind::Construction,
        label: "Joinery detail",
        instruction: "Detail of the wood joints and the frame being assembled.",
    },
    SceneTask {
        kind: SceneKind::Construction,
        label: "On-site installation",
        instruction: "Workers installing this design on site.",
    },
    SceneTask {
        kind: SceneKind::Construction,
        label: "Internal framing",
        instruction: "Internal technical framing structure inside the woodwork.",
    },
    SceneTask {
        kind: SceneKind::Construction,
        label: "Surface finishing",
        instruction: "Surface finishing of the wood in its real setting.",
    },
];

/// Iterate the catalog with each task's artifact identity.
pub fn scene_tasks() -> impl Iterator<Item = (ArtifactId, &'static SceneTask)> {
    SCENE_CATALOG
        .iter()
        .enumerate()
        .map(|(index, task)| (ArtifactId::Scene(index + 1), task))
}

/// Look up the task that produced a scene artifact.
pub fn task_for(id: ArtifactId) -> Option<&'static SceneTask> {
    match id {
        ArtifactId::Master => None,
        ArtifactId::Scene(position) => position
            .checked_sub(1)
            .and_then(|index| SCENE_CATALOG.get(index)),
    }
}

//! Instruction composition for the generation capability.
//!
//! Scene instructions are assembled from the lighting environment, the pass
//! (master redesign or derivative staging), the task context and an optional
//! refinement note appended verbatim.

use crate::types::{Environment, SceneKind};
use serde_json::{json, Value};

pub const ANALYSIS_INSTRUCTION: &str = "Analyze this wooden product carefully. Identify wood \
species, grain, and construction style. Focus on technical materials and structural essence.";

/// Which generation pass a scene belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePass {
    /// Redesign of the source image keeping a bounded share of its structure
    Master,
    /// Restaging of the master design; architecture is kept intact
    Derivative,
}

/// Inputs for one scene instruction.
#[derive(Debug, Clone, Copy)]
pub struct ScenePrompt<'a> {
    pub description: &'a str,
    pub kind: SceneKind,
    pub context: &'a str,
    pub environment: Environment,
    pub pass: ScenePass,
    pub refinement_note: Option<&'a str>,
}

pub fn lighting(environment: Environment) -> &'static str {
    match environment {
        Environment::Outdoor => {
            "Realistic natural outdoor sunlight, authentic daylight shadows, crisp textures, \
             high-end photography"
        }
        Environment::Indoor => {
            "Soft realistic indoor ambient light, natural room atmosphere, elegant shadows"
        }
    }
}

fn task_instruction(prompt: &ScenePrompt<'_>, soul_percent: u8) -> String {
    let light = lighting(prompt.environment);
    match (prompt.pass, prompt.kind) {
        (ScenePass::Master, _) => format!(
            "TASK: REDESIGN this wooden product. Keep only {}% of the original structural \
             essence (the soul), but create a COMPLETELY NEW, DISTINCT and SUPERIOR \
             architecture. It MUST look noticeably different from the original image while \
             maintaining high quality. SCENE: Cinematic architectural shot, {}.",
            soul_percent, light
        ),
        (ScenePass::Derivative, SceneKind::Wide) => format!(
            "TASK: Alternative perspective of THIS EXACT architecture from the reference image. \
             DO NOT change any structural detail. SCENE: Professional photography, {}.",
            light
        ),
        (ScenePass::Derivative, SceneKind::Lifestyle) => format!(
            "TASK: Lifestyle photo showing real people interacting with THIS EXACT wooden \
             structure. Scale must be accurate. SCENE: Human-centric high realism, {}.",
            light
        ),
        (ScenePass::Derivative, SceneKind::Construction) => format!(
            "TASK: Technical/Construction view of THIS EXACT wooden design. SCENE: Authentic \
             onsite assembly, showing professional joints, internal frames, and builders \
             working on this specific architecture. {}.",
            light
        ),
    }
}

/// Compose the full scene instruction.
pub fn compose_scene_instruction(prompt: &ScenePrompt<'_>, soul_percent: u8) -> String {
    let mut instruction = task_instruction(prompt, soul_percent);

    let description = prompt.description.trim();
    if !description.is_empty() {
        instruction.push_str(" PRODUCT: ");
        instruction.push_str(description);
        if !description.ends_with('.') {
            instruction.push('.');
        }
    }

    instruction.push_str(" Context: ");
    instruction.push_str(prompt.context.trim());
    instruction.push('.');

    if let Some(note) = prompt.refinement_note.filter(|n| !n.trim().is_empty()) {
        instruction.push_str(" IMPORTANT ADJUSTMENT: ");
        instruction.push_str(note);
    }
    instruction
}

pub fn metadata_instruction(description: &str) -> String {
    format!(
        "Based on: \"{}\", create professional Etsy SEO content.\n\
         1. Title: High-converting SEO title.\n\
         2. Description: MUST be in a SINGLE VERTICAL COLUMN format from top to bottom.\n\
         \x20  Use these sections with professional icons:\n\
         \x20  🌲 MATERIAL DETAILS: (Specific wood types, texture, grain)\n\
         \x20  📏 PRODUCT DIMENSIONS: (Estimated size specs)\n\
         \x20  🔨 QUALITY & CRAFTSMANSHIP: (Construction methods, durability)\n\
         \x20  ✨ UNIQUE DESIGN: (Why this design stands out)\n\
         \x20  ✅ ASSEMBLY & CARE: (Setup info and maintenance)\n\
         \x20  📦 SHIPPING INFO: (Packaging quality)\n\
         \x20  Use emojis and make it visually professional for buyers.\n\
         3. Tags: 13 comma-separated tags.\n\
         4. Materials: Specific wood names.\n\
         Return JSON with keys: title, description, tags, materials.",
        description.trim()
    )
}

/// Response schema for listing metadata; every key is a required string.
pub fn metadata_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "tags": { "type": "STRING" },
            "materials": { "type": "STRING" }
        },
        "required": ["title", "description", "tags", "materials"]
    })
}

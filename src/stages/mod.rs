use anyhow::{Result, bail};
use serde_json::{Map, Value, json};

use crate::pipeline::{ArtifactWriter, Stage, StageContext, StageParameters, StageRegistry};

mod assemble;

pub use assemble::{MANIFEST_FILE, collect_artifacts};

/// A transparent 1x1 RGBA PNG.
pub const PLACEHOLDER_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

const DEFAULT_MODEL: &str = "<placeholder>";

pub fn register_defaults(registry: &mut StageRegistry) {
    registry.register("script_dev", |params| {
        Ok(Box::new(ScriptDevStage::from_params(params)?))
    });
    registry.register("previs", |_| Ok(Box::new(PrevisStage)));
    registry.register("visuals", |_| {
        Ok(Box::new(PlaceholderStage {
            name: "visuals",
            relative_path: "renders/scene_01/shot_01.mp4",
            content: "Placeholder render\n",
        }))
    });
    registry.register("audio", |_| {
        Ok(Box::new(PlaceholderStage {
            name: "audio",
            relative_path: "audio/voice/villager_elder.wav",
            content: "Placeholder wav content\n",
        }))
    });
    registry.register("assemble", |_| Ok(Box::new(assemble::AssembleStage)));
}

pub fn default_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    register_defaults(&mut registry);
    registry
}

struct ScriptDevStage {
    model: String,
    seed: Option<i64>,
}

impl ScriptDevStage {
    fn from_params(mut params: StageParameters) -> Result<Self> {
        let model = match params.remove("model") {
            None | Some(Value::Null) => DEFAULT_MODEL.to_string(),
            Some(Value::String(model)) => model,
            Some(other) => bail!("script_dev 'model' must be a string, found {other}"),
        };
        let seed = match params.remove("deterministic_seed") {
            None | Some(Value::Null) => None,
            Some(Value::Number(num)) if num.is_i64() => num.as_i64(),
            Some(other) => {
                bail!("script_dev 'deterministic_seed' must be an integer, found {other}")
            }
        };
        Ok(Self { model, seed })
    }
}

impl Stage for ScriptDevStage {
    fn name(&self) -> &'static str {
        "script_dev"
    }

    fn run(&self, ctx: &StageContext<'_>, writer: &mut ArtifactWriter) -> Result<()> {
        let out = ctx.project_dir.join("script.fountain");
        let title = ctx.project.title.as_deref().unwrap_or("Untitled");
        let content = format!(
            "// Script for {title}\n// Generated (placeholder)\n\nINT. VILLAGE - NIGHT\nA low fog hangs over the fields.\n"
        );
        writer.write_text(&out, &content)?;

        let mut meta = base_metadata(&out, self.name());
        meta.insert("model".to_string(), Value::String(self.model.clone()));
        meta.insert("seed".to_string(), json!(self.seed));
        writer.write_sidecar(&out, &meta)?;
        Ok(())
    }
}

struct PrevisStage;

impl Stage for PrevisStage {
    fn name(&self) -> &'static str {
        "previs"
    }

    fn run(&self, ctx: &StageContext<'_>, writer: &mut ArtifactWriter) -> Result<()> {
        let shotlist = ctx.project_dir.join("shotlist.csv");
        let storyboard_dir = ctx.project_dir.join("storyboard").join("scene_01");
        let animatic = ctx.project_dir.join("animatic").join("scene_01.mp4");

        writer.create_dir_all(&storyboard_dir)?;
        writer.write_text(
            &shotlist,
            "scene,shot,description\n1,1,Establishing wide of village\n",
        )?;
        writer.write_bytes(&storyboard_dir.join("shot_01.png"), &PLACEHOLDER_PNG)?;
        writer.write_text(&animatic, "Placeholder animatic\n")?;
        writer.write_sidecar(&shotlist, &base_metadata(&shotlist, self.name()))?;
        Ok(())
    }
}

/// Stage that emits one fixed text stub plus its sidecar.
struct PlaceholderStage {
    name: &'static str,
    relative_path: &'static str,
    content: &'static str,
}

impl Stage for PlaceholderStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, ctx: &StageContext<'_>, writer: &mut ArtifactWriter) -> Result<()> {
        let out = ctx.project_dir.join(self.relative_path);
        writer.write_text(&out, self.content)?;
        writer.write_sidecar(&out, &base_metadata(&out, self.name))?;
        Ok(())
    }
}

fn base_metadata(artifact: &std::path::Path, stage: &str) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert(
        "artifact".to_string(),
        Value::String(artifact.to_string_lossy().to_string()),
    );
    meta.insert("stage".to_string(), Value::String(stage.to_string()));
    meta
}

//! txt2img workflow in ComfyUI's API (node graph) format.

use serde_json::{json, Value};

/// Node id of the `SaveImage` node.
pub const SAVE_NODE_ID: &str = "9";

pub const DEFAULT_CHECKPOINT: &str = "v1-5-pruned-emaonly.safetensors";

/// Model and sampler parameters shared by every request.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub checkpoint: String,
    pub width: u32,
    pub height: u32,
    pub cfg: f64,
    pub sampler: String,
    pub scheduler: String,
    pub negative_prompt: String,
    pub filename_prefix: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            checkpoint: DEFAULT_CHECKPOINT.to_string(),
            width: 512,
            height: 512,
            cfg: 7.0,
            sampler: "euler".to_string(),
            scheduler: "normal".to_string(),
            negative_prompt: String::new(),
            filename_prefix: "sdbot".to_string(),
        }
    }
}

/// Build the graph: checkpoint, positive and negative CLIP encodes, an
/// empty latent batch of `batch_size`, KSampler, VAE decode, save.
pub fn txt2img(settings: &WorkflowSettings, prompt: &str, steps: u32, batch_size: u32, seed: u64) -> Value {
    json!({
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": {"ckpt_name": settings.checkpoint},
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": {"text": prompt, "clip": ["4", 1]},
        },
        "7": {
            "class_type": "CLIPTextEncode",
            "inputs": {"text": settings.negative_prompt, "clip": ["4", 1]},
        },
        "5": {
            "class_type": "EmptyLatentImage",
            "inputs": {
                "width": settings.width,
                "height": settings.height,
                "batch_size": batch_size,
            },
        },
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "seed": seed,
                "steps": steps,
                "cfg": settings.cfg,
                "sampler_name": settings.sampler,
                "scheduler": settings.scheduler,
                "denoise": 1.0,
                "model": ["4", 0],
                "positive": ["6", 0],
                "negative": ["7", 0],
                "latent_image": ["5", 0],
            },
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": {"samples": ["3", 0], "vae": ["4", 2]},
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": {"filename_prefix": settings.filename_prefix, "images": ["8", 0]},
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_land_in_the_right_nodes() {
        let settings = WorkflowSettings {
            width: 768,
            ..Default::default()
        };
        let graph = txt2img(&settings, "a red fox", 30, 4, 1234);

        assert_eq!(graph["6"]["inputs"]["text"], "a red fox");
        assert_eq!(graph["5"]["inputs"]["batch_size"], 4);
        assert_eq!(graph["5"]["inputs"]["width"], 768);
        assert_eq!(graph["3"]["inputs"]["steps"], 30);
        assert_eq!(graph["3"]["inputs"]["seed"], 1234);
        assert_eq!(graph["3"]["inputs"]["cfg"], 7.0);
        assert_eq!(graph["3"]["inputs"]["sampler_name"], "euler");
        assert_eq!(graph[SAVE_NODE_ID]["class_type"], "SaveImage");
        assert_eq!(graph["4"]["inputs"]["ckpt_name"], DEFAULT_CHECKPOINT);
    }
}

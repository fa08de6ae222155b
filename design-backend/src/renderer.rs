//! Renderer agent: emits Three.js scene code for a model, with a template
//! generator as the offline fallback.

use anyhow::Context;
use tracing::{info, warn};

use azure_ai::TextGenerator;

use crate::model::Model;

const RENDERER_SYSTEM_PROMPT: &str = "You are a Code Renderer Agent specializing in Three.js. \
Your role is to generate clean, working Three.js code that visualizes 3D architectural models. \
Output only valid JavaScript code with no explanations or markdown.";

/// Lowest temperature in the pipeline; code generation wants determinism.
const RENDERER_TEMPERATURE: f32 = 0.1;

pub struct RendererAgent<G> {
    chat: G,
}

impl<G: TextGenerator> RendererAgent<G> {
    pub fn new(chat: G) -> Self {
        Self { chat }
    }

    /// Generate visualization code for the model. Empty output from the
    /// backend falls back to the deterministic template; a failed call is
    /// an error for the caller to handle.
    pub async fn emit(&self, model: &Model, original_prompt: &str) -> anyhow::Result<String> {
        info!("Renderer agent generating code for {} rooms", model.rooms.len());

        let prompt = prepare_prompt(model, original_prompt);
        let response = self
            .chat
            .complete(RENDERER_SYSTEM_PROMPT, &prompt, RENDERER_TEMPERATURE)
            .await
            .context("Renderer agent failed")?;

        let code = strip_code_fences(&response);
        if code.trim().is_empty() {
            warn!("Renderer returned empty code, using template code");
            return Ok(mock_threejs_code(model, original_prompt));
        }
        Ok(code)
    }
}

fn prepare_prompt(model: &Model, original_prompt: &str) -> String {
    format!(
        "Generate Three.js code to visualize this architectural model:\n{}\n\n\
         The user originally asked for: \"{}\"\n\n\
         Requirements:\n\
         - Create a scene, perspective camera, WebGL renderer, and orbit controls.\n\
         - Add ambient and directional lighting.\n\
         - Render each room as a box mesh at its position, using its dimensions.\n\
         - Label or color rooms distinctly.\n\
         - Include an animation loop.\n\
         Output only the JavaScript code.",
        serde_json::to_string_pretty(model).unwrap_or_default(),
        original_prompt
    )
}

fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .skip(1)
        .take_while(|line| !line.starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic Three.js scene for a model. Used whenever live code
/// generation is unavailable or unusable; renders every room as a box.
pub fn mock_threejs_code(model: &Model, original_prompt: &str) -> String {
    let mut code = format!(
        "// Three.js visualization\n\
         // Generated for: {}\n\
         const scene = new THREE.Scene();\n\
         scene.background = new THREE.Color(0xf0f0f0);\n\n\
         const camera = new THREE.PerspectiveCamera(75, window.innerWidth / window.innerHeight, 0.1, 1000);\n\
         camera.position.set(15, 15, 15);\n\n\
         const renderer = new THREE.WebGLRenderer({{ antialias: true }});\n\
         renderer.setSize(window.innerWidth, window.innerHeight);\n\
         document.body.appendChild(renderer.domElement);\n\n\
         const controls = new THREE.OrbitControls(camera, renderer.domElement);\n\n\
         const ambientLight = new THREE.AmbientLight(0xffffff, 0.5);\n\
         scene.add(ambientLight);\n\
         const directionalLight = new THREE.DirectionalLight(0xffffff, 0.8);\n\
         directionalLight.position.set(10, 20, 10);\n\
         scene.add(directionalLight);\n\n\
         function createRoom(name, width, height, length, x, y, z) {{\n\
         \x20 const geometry = new THREE.BoxGeometry(width, height, length);\n\
         \x20 const material = new THREE.MeshStandardMaterial({{\n\
         \x20   color: 0xcccccc,\n\
         \x20   transparent: true,\n\
         \x20   opacity: 0.7,\n\
         \x20 }});\n\
         \x20 const room = new THREE.Mesh(geometry, material);\n\
         \x20 room.position.set(x + width / 2, y + height / 2, z + length / 2);\n\
         \x20 room.name = name;\n\
         \x20 scene.add(room);\n\
         \x20 const edges = new THREE.EdgesGeometry(geometry);\n\
         \x20 const line = new THREE.LineSegments(edges, new THREE.LineBasicMaterial({{ color: 0x333333 }}));\n\
         \x20 line.position.copy(room.position);\n\
         \x20 scene.add(line);\n\
         \x20 return room;\n\
         }}\n\n",
        original_prompt.replace('\n', " ")
    );

    for room in &model.rooms {
        let identifier = room.name.replace(char::is_whitespace, "_");
        code.push_str(&format!(
            "const room_{} = createRoom('{}', {}, {}, {}, {}, {}, {});\n",
            identifier, room.name, room.width, room.height, room.length, room.x, room.y, room.z
        ));
    }

    code.push_str(
        "\nfunction animate() {\n\
         \x20 requestAnimationFrame(animate);\n\
         \x20 controls.update();\n\
         \x20 renderer.render(scene, camera);\n\
         }\n\
         animate();\n",
    );

    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Room;
    use crate::testing::ScriptedChat;

    fn sample_model() -> Model {
        Model {
            rooms: vec![Room {
                name: "master bedroom".to_string(),
                width: 4.0,
                length: 5.0,
                height: 3.0,
                x: 0.0,
                y: 0.0,
                z: 0.0,
                connected_to: Vec::new(),
            }],
            windows: Vec::new(),
            doors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_emit_strips_code_fences() {
        let chat = ScriptedChat::new(vec!["```javascript\nconst scene = new THREE.Scene();\n```"]);
        let agent = RendererAgent::new(chat);

        let code = agent.emit(&sample_model(), "a bedroom").await.unwrap();
        assert_eq!(code, "const scene = new THREE.Scene();");
    }

    #[tokio::test]
    async fn test_empty_response_uses_template() {
        let chat = ScriptedChat::new(vec![""]);
        let agent = RendererAgent::new(chat);

        let code = agent.emit(&sample_model(), "a bedroom").await.unwrap();
        assert!(code.contains("createRoom('master bedroom', 4, 3, 5, 0, 0, 0)"));
    }

    #[tokio::test]
    async fn test_chat_failure_is_error() {
        let agent = RendererAgent::new(ScriptedChat::failing("timeout"));
        let err = agent.emit(&sample_model(), "a bedroom").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Renderer agent failed"));
    }

    #[test]
    fn test_mock_code_sanitizes_room_names() {
        let code = mock_threejs_code(&sample_model(), "a bedroom");
        assert!(code.contains("const room_master_bedroom ="));
        assert!(code.contains("new THREE.Scene()"));
        assert!(code.contains("OrbitControls"));
        assert!(code.contains("animate();"));
    }
}

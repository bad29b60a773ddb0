//! Scene types for the krishi-web hero viewer
//!
//! Camera, orbit controls, lights and glTF handling. Nothing in here touches
//! the DOM or the GPU, so the same code runs in the browser build and in the
//! host test suite.

pub mod bounds;
pub mod camera;
pub mod controls;
pub mod graph;
pub mod light;
pub mod model;
pub mod texture;

pub use bounds::Aabb;
pub use camera::{CameraSettings, PerspectiveCamera};
pub use controls::{ControlSettings, OrbitControls, Spherical};
pub use graph::{surface_color, FrameUniforms, MaterialUniforms, Scene};
pub use light::{AmbientLight, DirectionalLight, LightSettings};
pub use model::{AlphaMode, Mesh, Model, ModelError, Vertex};
pub use texture::{BaseColorTexture, TextureImage, WrapMode};

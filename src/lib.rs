#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod extensions;
pub mod gfx;
pub mod graph;
pub mod pool;
pub mod renderer;
pub mod scene;
pub mod textures;
pub mod view;

pub use errors::{EmberError, Result};
pub use extensions::{ExtensionStage, RendererExtension};
pub use gfx::{HeadlessDevice, RenderDevice, WgpuDevice};
pub use graph::{FrameTiming, NodeId, NodeRegistry, RenderCompositor};
pub use pool::GpuResourcePool;
pub use renderer::Renderer;
pub use scene::SceneInfo;
pub use textures::RendererTextures;
pub use view::{RenderSettings, RendererView, RendererViewGroup, ViewDesc};

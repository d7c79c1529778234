//! Renderer extension callbacks.
//!
//! External systems (editor gizmos, debug overlays, custom effects) inject
//! draws at fixed points in the frame without modifying the compositor. An
//! extension declares which stage it hooks and records commands into the same
//! encoder the compositor nodes use, so its work lands at a well-defined
//! position in the submission order.

use crate::gfx::CommandEncoder;
use crate::view::RendererView;

/// The pipeline points at which extensions are invoked.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ExtensionStage {
    /// Before any node of a view executes (resource preparation).
    Prepare,
    /// Before the G-buffer base pass draws scene geometry.
    PreBasePass,
    /// After the base pass, before lighting.
    PostBasePass,
    /// After all lighting, before post-processing.
    PostLighting,
    /// After the final resolve, on top of the view's output target.
    Overlay,
}

/// External hook invoked at a fixed pipeline stage.
pub trait RendererExtension {
    /// The stage this extension renders at.
    fn stage(&self) -> ExtensionStage;

    /// Extensions within one stage run in ascending priority order.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether the extension applies to the given view. Extensions that only
    /// target specific cameras filter here.
    fn check(&self, _view: &RendererView) -> bool {
        true
    }

    /// Records the extension's GPU work.
    fn render(&mut self, view: &RendererView, encoder: &mut CommandEncoder);
}

/// Ordered collection of registered extensions.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn RendererExtension>>,
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension, keeping per-stage priority order.
    pub fn add(&mut self, extension: Box<dyn RendererExtension>) {
        self.extensions.push(extension);
        self.extensions
            .sort_by_key(|ext| (ext.stage(), ext.priority()));
    }

    /// Invokes every matching extension registered for a stage.
    pub fn invoke(
        &mut self,
        stage: ExtensionStage,
        view: &RendererView,
        encoder: &mut CommandEncoder,
    ) {
        for extension in &mut self.extensions {
            if extension.stage() == stage && extension.check(view) {
                extension.render(view, encoder);
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

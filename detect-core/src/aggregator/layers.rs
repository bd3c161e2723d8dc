//! Static framework-layer catalogue (spec.md §4.4).

use crate::constants::frameworks;
use crate::types::FrameworkLayer;

/// Static catalogue resolving a framework name to its layer. Exposed as a
/// struct in case a future version wants this sourced from storage rather
/// than compiled in; today it is a thin wrapper over
/// [`crate::constants::frameworks::WRAPPER_SET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LayerCatalogue;

impl LayerCatalogue {
    /// Resolve a framework's layer.
    #[must_use]
    pub fn layer_for(&self, framework: &str) -> FrameworkLayer {
        layer_for(framework)
    }
}

/// Resolve a framework name to its layer: `wrapper` if it's in the known
/// wrapper set, `runtime` for inference servers, else `base`.
#[must_use]
pub fn layer_for(framework: &str) -> FrameworkLayer {
    if frameworks::WRAPPER_SET.contains(&framework) {
        FrameworkLayer::Wrapper
    } else if frameworks::INFERENCE_KEYWORDS.iter().any(|k| k.starts_with(framework) || *k == framework) {
        FrameworkLayer::Runtime
    } else {
        FrameworkLayer::Base
    }
}

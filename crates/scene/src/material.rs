//! Material instances as seen by the draw list.
//!
//! A [`MaterialInstance`] only carries handles. The pipelines it points at
//! are owned by whoever built the instance and must outlive it.

use frame_rhi::vk;

/// Which geometry pass a material is drawn in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialPass {
    #[default]
    MainColor,
    Transparent,
    Other,
}

/// Stable identity used as the primary draw sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

/// Pipeline and layout handles a material draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialInstance {
    pub id: MaterialId,
    pub pass: MaterialPass,
    pub pipeline: MaterialPipeline,
    /// Bound as set 1.
    pub material_set: vk::DescriptorSet,
}

impl MaterialInstance {
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.pass == MaterialPass::Transparent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(pass: MaterialPass) -> MaterialInstance {
        MaterialInstance {
            id: MaterialId(7),
            pass,
            pipeline: MaterialPipeline {
                pipeline: vk::Pipeline::null(),
                layout: vk::PipelineLayout::null(),
            },
            material_set: vk::DescriptorSet::null(),
        }
    }

    #[test]
    fn test_only_transparent_pass_is_transparent() {
        assert!(instance(MaterialPass::Transparent).is_transparent());
        assert!(!instance(MaterialPass::MainColor).is_transparent());
        assert!(!instance(MaterialPass::Other).is_transparent());
    }

    #[test]
    fn test_material_ids_order_numerically() {
        assert!(MaterialId(1) < MaterialId(2));
    }
}

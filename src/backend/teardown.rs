// Teardown stack
//
// Vulkan has no lifetime tracking, so every handle is registered here right
// after it is created. Dropping the stack destroys everything in exact reverse
// creation order, whether startup finished or bailed out halfway.

use std::fmt;

/// Everything the renderer creates, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceKind {
    Context,
    Surface,
    DebugMessenger,
    Device,
    Swapchain,
    ImageViews,
    RenderPass,
    PipelineLayout,
    Pipeline,
    Framebuffers,
    CommandPool,
    SyncObjects,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Context => "instance",
            ResourceKind::Surface => "surface",
            ResourceKind::DebugMessenger => "debug messenger",
            ResourceKind::Device => "logical device",
            ResourceKind::Swapchain => "swapchain",
            ResourceKind::ImageViews => "swapchain image views",
            ResourceKind::RenderPass => "render pass",
            ResourceKind::PipelineLayout => "pipeline layout",
            ResourceKind::Pipeline => "graphics pipeline",
            ResourceKind::Framebuffers => "framebuffers",
            ResourceKind::CommandPool => "command pool",
            ResourceKind::SyncObjects => "sync objects",
        };
        f.write_str(name)
    }
}

type Destructor = Box<dyn FnOnce()>;

/// LIFO of destructors, run on drop.
#[derive(Default)]
pub struct Teardown {
    entries: Vec<(ResourceKind, Destructor)>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the destructor for a resource that was just created.
    ///
    /// Kinds must arrive in creation order; anything else means the reverse
    /// walk would destroy a parent before its children.
    pub fn defer(&mut self, kind: ResourceKind, destroy: impl FnOnce() + 'static) {
        debug_assert!(
            self.entries.last().map_or(true, |(last, _)| *last < kind),
            "{:?} registered out of creation order",
            kind
        );
        self.entries.push((kind, Box::new(destroy)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        while let Some((kind, destroy)) = self.entries.pop() {
            log::debug!("Destroying {}", kind);
            destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const CREATION_ORDER: [ResourceKind; 12] = [
        ResourceKind::Context,
        ResourceKind::Surface,
        ResourceKind::DebugMessenger,
        ResourceKind::Device,
        ResourceKind::Swapchain,
        ResourceKind::ImageViews,
        ResourceKind::RenderPass,
        ResourceKind::PipelineLayout,
        ResourceKind::Pipeline,
        ResourceKind::Framebuffers,
        ResourceKind::CommandPool,
        ResourceKind::SyncObjects,
    ];

    fn register(kinds: &[ResourceKind], log: &Rc<RefCell<Vec<ResourceKind>>>) -> Teardown {
        let mut teardown = Teardown::new();
        for &kind in kinds {
            let log = Rc::clone(log);
            teardown.defer(kind, move || log.borrow_mut().push(kind));
        }
        teardown
    }

    #[test]
    fn full_run_destroys_in_reverse_creation_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let teardown = register(&CREATION_ORDER, &log);
        assert_eq!(teardown.len(), CREATION_ORDER.len());
        assert!(log.borrow().is_empty());

        drop(teardown);

        assert_eq!(
            *log.borrow(),
            vec![
                ResourceKind::SyncObjects,
                ResourceKind::CommandPool,
                ResourceKind::Framebuffers,
                ResourceKind::Pipeline,
                ResourceKind::PipelineLayout,
                ResourceKind::RenderPass,
                ResourceKind::ImageViews,
                ResourceKind::Swapchain,
                ResourceKind::Device,
                ResourceKind::DebugMessenger,
                ResourceKind::Surface,
                ResourceKind::Context,
            ]
        );
    }

    #[test]
    fn failed_startup_only_destroys_what_exists() {
        let log = Rc::new(RefCell::new(Vec::new()));
        // Startup died while building the render pass.
        drop(register(&CREATION_ORDER[..6], &log));

        assert_eq!(
            *log.borrow(),
            vec![
                ResourceKind::ImageViews,
                ResourceKind::Swapchain,
                ResourceKind::Device,
                ResourceKind::DebugMessenger,
                ResourceKind::Surface,
                ResourceKind::Context,
            ]
        );
    }

    #[test]
    fn diagnostics_disabled_skips_the_messenger() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let kinds = [
            ResourceKind::Context,
            ResourceKind::Surface,
            ResourceKind::Device,
        ];
        drop(register(&kinds, &log));

        assert_eq!(
            *log.borrow(),
            vec![
                ResourceKind::Device,
                ResourceKind::Surface,
                ResourceKind::Context
            ]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of creation order")]
    fn out_of_order_registration_is_caught() {
        let mut teardown = Teardown::new();
        teardown.defer(ResourceKind::Device, || {});
        teardown.defer(ResourceKind::Context, || {});
    }
}

//! Viewer toolbar: button enablement and the outcome of queue/image
//! mutations.
//!
//! The backend is reached through [`ProcessorApi`]; every request is a plain
//! success/failure. Outcomes come back as [`Toast`]s carrying translation
//! keys, never display text.

use crate::error::ApiError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStatus {
    pub is_started: bool,
    pub is_processing: bool,
    pub is_stop_pending: bool,
}

/// Remote queue and image endpoints used by the toolbar.
pub trait ProcessorApi {
    fn processor_status(&self) -> Result<ProcessorStatus, ApiError>;
    fn pause_processor(&mut self) -> Result<(), ApiError>;
    fn upscale(&mut self, image_name: &str) -> Result<(), ApiError>;
    fn delete_image(&mut self, image_name: &str) -> Result<(), ApiError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastStatus {
    Info,
    Success,
    Error,
}

/// Transient notification; `title_key` is looked up by the translation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub title_key: &'static str,
    pub status: ToastStatus,
}

impl Toast {
    fn new(title_key: &'static str, status: ToastStatus) -> Self {
        Self { title_key, status }
    }
}

/// Read-only view of the app state the toolbar depends on.
#[derive(Clone, Debug, Default)]
pub struct ViewerContext {
    pub last_selected_image: Option<String>,
    pub has_progress_image: bool,
    pub is_connected: bool,
    pub is_upscaling_enabled: bool,
    pub is_queue_mutation_in_progress: bool,
}

pub struct ViewerToolbar<A: ProcessorApi> {
    api: A,
}

impl<A: ProcessorApi> ViewerToolbar<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn should_disable_toolbar_buttons(ctx: &ViewerContext) -> bool {
        ctx.has_progress_image || ctx.last_selected_image.is_none()
    }

    pub fn is_upscale_enabled(ctx: &ViewerContext) -> bool {
        ctx.is_upscaling_enabled && ctx.is_connected && !Self::should_disable_toolbar_buttons(ctx)
    }

    /// Pause stays disabled until the processor reports it has started, and
    /// while any queue mutation is in flight. An unreachable status counts as
    /// not started.
    pub fn is_pause_disabled(&self, ctx: &ViewerContext) -> bool {
        let started = self
            .api
            .processor_status()
            .map(|s| s.is_started)
            .unwrap_or(false);
        !started || ctx.is_queue_mutation_in_progress
    }

    pub fn is_pause_loading(&self) -> bool {
        self.api
            .processor_status()
            .map(|s| s.is_stop_pending)
            .unwrap_or(false)
    }

    pub fn pause(&mut self) -> Toast {
        match self.api.pause_processor() {
            Ok(()) => Toast::new("queue.pauseRequested", ToastStatus::Info),
            Err(e) => {
                log::warn!("pause processor failed: {}", e);
                Toast::new("queue.pauseFailed", ToastStatus::Error)
            }
        }
    }

    /// `None` when the upscale button would be disabled.
    pub fn upscale(&mut self, ctx: &ViewerContext) -> Option<Toast> {
        if !Self::is_upscale_enabled(ctx) {
            return None;
        }
        let image_name = ctx.last_selected_image.as_deref()?;
        Some(match self.api.upscale(image_name) {
            Ok(()) => Toast::new("toast.upscaleRequested", ToastStatus::Info),
            Err(e) => {
                log::warn!("upscale of '{}' failed: {}", image_name, e);
                Toast::new("toast.upscaleFailed", ToastStatus::Error)
            }
        })
    }

    /// `None` when no image is selected. Delete stays available while a
    /// progress image is showing.
    pub fn delete(&mut self, ctx: &ViewerContext) -> Option<Toast> {
        let image_name = ctx.last_selected_image.as_deref()?;
        Some(match self.api.delete_image(image_name) {
            Ok(()) => Toast::new("toast.imageDeleted", ToastStatus::Success),
            Err(e) => {
                log::warn!("delete of '{}' failed: {}", image_name, e);
                Toast::new("toast.imageDeleteFailed", ToastStatus::Error)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockApi {
        status: ProcessorStatus,
        fail: bool,
        calls: Vec<String>,
    }

    impl MockApi {
        fn outcome(&self) -> Result<(), ApiError> {
            if self.fail {
                Err(ApiError("503".into()))
            } else {
                Ok(())
            }
        }
    }

    impl ProcessorApi for MockApi {
        fn processor_status(&self) -> Result<ProcessorStatus, ApiError> {
            Ok(self.status)
        }
        fn pause_processor(&mut self) -> Result<(), ApiError> {
            self.calls.push("pause".into());
            self.outcome()
        }
        fn upscale(&mut self, image_name: &str) -> Result<(), ApiError> {
            self.calls.push(format!("upscale {}", image_name));
            self.outcome()
        }
        fn delete_image(&mut self, image_name: &str) -> Result<(), ApiError> {
            self.calls.push(format!("delete {}", image_name));
            self.outcome()
        }
    }

    fn ctx_with_image() -> ViewerContext {
        ViewerContext {
            last_selected_image: Some("abc.png".into()),
            is_connected: true,
            is_upscaling_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn toolbar_disabled_without_image_or_during_progress() {
        let mut ctx = ctx_with_image();
        assert!(!ViewerToolbar::<MockApi>::should_disable_toolbar_buttons(&ctx));
        ctx.has_progress_image = true;
        assert!(ViewerToolbar::<MockApi>::should_disable_toolbar_buttons(&ctx));
        assert!(ViewerToolbar::<MockApi>::should_disable_toolbar_buttons(&ViewerContext::default()));
    }

    #[test]
    fn pause_enablement_follows_processor_status() {
        let mut toolbar = ViewerToolbar::new(MockApi::default());
        let mut ctx = ctx_with_image();
        assert!(toolbar.is_pause_disabled(&ctx));

        toolbar.api.status.is_started = true;
        assert!(!toolbar.is_pause_disabled(&ctx));
        ctx.is_queue_mutation_in_progress = true;
        assert!(toolbar.is_pause_disabled(&ctx));

        toolbar.api.status.is_stop_pending = true;
        assert!(toolbar.is_pause_loading());
    }

    #[test]
    fn pause_outcomes_become_toasts() {
        let mut toolbar = ViewerToolbar::new(MockApi::default());
        assert_eq!(toolbar.pause(), Toast::new("queue.pauseRequested", ToastStatus::Info));
        toolbar.api.fail = true;
        assert_eq!(toolbar.pause(), Toast::new("queue.pauseFailed", ToastStatus::Error));
        assert_eq!(toolbar.api().calls.len(), 2);
    }

    #[test]
    fn upscale_requires_connection_and_image() {
        let mut toolbar = ViewerToolbar::new(MockApi::default());
        let mut ctx = ctx_with_image();
        assert_eq!(
            toolbar.upscale(&ctx),
            Some(Toast::new("toast.upscaleRequested", ToastStatus::Info))
        );
        ctx.is_connected = false;
        assert_eq!(toolbar.upscale(&ctx), None);
        assert_eq!(toolbar.api().calls, vec!["upscale abc.png".to_string()]);
    }

    #[test]
    fn failed_delete_leaves_selection_alone() {
        let mut toolbar = ViewerToolbar::new(MockApi {
            fail: true,
            ..Default::default()
        });
        let ctx = ctx_with_image();
        assert_eq!(
            toolbar.delete(&ctx),
            Some(Toast::new("toast.imageDeleteFailed", ToastStatus::Error))
        );
        assert_eq!(ctx.last_selected_image.as_deref(), Some("abc.png"));
        assert_eq!(toolbar.delete(&ViewerContext::default()), None);
    }

    #[test]
    fn delete_ignores_progress_image() {
        let mut toolbar = ViewerToolbar::new(MockApi::default());
        let mut ctx = ctx_with_image();
        ctx.has_progress_image = true;
        assert!(ViewerToolbar::<MockApi>::should_disable_toolbar_buttons(&ctx));
        assert_eq!(
            toolbar.delete(&ctx),
            Some(Toast::new("toast.imageDeleted", ToastStatus::Success))
        );
        assert_eq!(toolbar.api().calls, vec!["delete abc.png".to_string()]);
    }
}

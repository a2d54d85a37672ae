//! Progress indicator and scroll snapshot collaborators.

use wp_visit::Page;

pub trait ProgressIndicator {
    /// `show_immediately` skips the reveal delay (the request is already in flight).
    fn reveal(&mut self, show_immediately: bool);
    fn hide(&mut self);
}

pub trait ScrollKeeper {
    fn save(&mut self, page: &Page);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressIndicator for NoProgress {
    fn reveal(&mut self, _show_immediately: bool) {}

    fn hide(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoScroll;

impl ScrollKeeper for NoScroll {
    fn save(&mut self, _page: &Page) {}
}

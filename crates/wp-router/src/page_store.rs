//! Page/view collaborator: holds the current page of every frame and applies swaps.

use std::collections::BTreeMap;
use wp_core::WaypointError;
use wp_core::WaypointResult;
use wp_visit::Page;
use wp_visit::TOP_FRAME;

/// Page handed to the view layer after a successful navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSwap {
    pub frame: String,
    pub page: Page,
    pub replace: bool,
    pub preserve_state: bool,
    pub preserve_scroll: bool,
}

pub trait PageStore {
    /// Page of the top frame.
    fn get(&self) -> Option<&Page>;
    fn frame(&self, id: &str) -> Option<&Page>;
    /// `true` until a page has been installed in the top frame.
    fn is_cleared(&self) -> bool;
    fn swap(&mut self, swap: PageSwap) -> WaypointResult<()>;
}

/// Frame-keyed page store that records every swap it applied.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPageStore {
    frames: BTreeMap<String, Page>,
    swaps: Vec<PageSwap>,
}

impl InMemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(page: Page) -> Self {
        let mut store = Self::new();
        store.init(TOP_FRAME, page);
        store
    }

    /// Installs the initial page of `frame` without recording a swap.
    pub fn init(&mut self, frame: &str, page: Page) {
        self.frames.insert(frame.to_owned(), page);
    }

    pub fn swaps(&self) -> &[PageSwap] {
        &self.swaps
    }
}

impl PageStore for InMemoryPageStore {
    fn get(&self) -> Option<&Page> {
        self.frames.get(TOP_FRAME)
    }

    fn frame(&self, id: &str) -> Option<&Page> {
        self.frames.get(id)
    }

    fn is_cleared(&self) -> bool {
        !self.frames.contains_key(TOP_FRAME)
    }

    fn swap(&mut self, swap: PageSwap) -> WaypointResult<()> {
        if swap.page.component.trim().is_empty() {
            return Err(WaypointError::new(
                "page.component_missing",
                format!("response for `{}` names no component", swap.page.url),
            ));
        }

        self.frames.insert(swap.frame.clone(), swap.page.clone());
        self.swaps.push(swap);
        Ok(())
    }
}

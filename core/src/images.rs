//! Selection and drag-resize of embedded images.
//!
//! The controller is a small state machine (`Idle`, `Selected`, `Resizing`)
//! fed by pointer, keyboard and focus events plus the editing surface's
//! mutation stream. On-screen bounds come from an [`ImageGeometry`]
//! supplied by the front-end.

use crate::richtext::{EditorSurface, ImageId};

/// Narrowest width an image can be dragged to, in px
pub const MIN_IMAGE_WIDTH: u32 = 50;

/// Gap kept between a resized image and the right edge of the content
pub const DEFAULT_MAX_MARGIN: u32 = 20;

/// Distance of the handle's origin from the image's bottom-right corner
pub const HANDLE_INSET: i32 = 10;

/// On-screen rectangle, in px
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }
}

/// Layout information the controller needs from the rendering side
pub trait ImageGeometry {
    /// Current on-screen bounds of an image in the surface's present
    /// content, if it is laid out
    fn image_bounds(&self, surface: &EditorSurface, id: ImageId) -> Option<Bounds>;

    /// Width available to content inside the editing surface
    fn content_width(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlePosition {
    pub left: i32,
    pub top: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageState {
    #[default]
    Idle,
    Selected {
        image: ImageId,
    },
    Resizing {
        image: ImageId,
        start_x: i32,
        start_width: u32,
        max_width: u32,
    },
}

/// What a click inside the editing surface landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Image(ImageId),
    Other,
}

/// Where keyboard focus moved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Search,
    List,
    Title,
    Body,
}

/// Document-wide pointer presentation while a resize drag is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerStyle {
    pub resize_cursor: bool,
    pub text_selection_suspended: bool,
}

/// Width for a drag of `delta` px starting at `start`: `start + delta`
/// clamped to `[MIN_IMAGE_WIDTH, max]` (the floor wins when `max` is smaller)
pub fn clamp_width(start: u32, delta: i32, max: u32) -> u32 {
    let wanted = start as i64 + delta as i64;
    wanted.min(max as i64).max(MIN_IMAGE_WIDTH as i64) as u32
}

#[derive(Debug, Clone)]
pub struct ImageController {
    state: ImageState,
    handle: Option<HandlePosition>,
    max_margin: u32,
}

impl Default for ImageController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MARGIN)
    }
}

impl ImageController {
    pub fn new(max_margin: u32) -> Self {
        Self {
            state: ImageState::Idle,
            handle: None,
            max_margin,
        }
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    /// The selected image, also while resizing
    pub fn selected(&self) -> Option<ImageId> {
        match self.state {
            ImageState::Idle => None,
            ImageState::Selected { image } | ImageState::Resizing { image, .. } => Some(image),
        }
    }

    /// Where the resize handle is drawn; `None` means hidden
    pub fn handle(&self) -> Option<HandlePosition> {
        self.handle
    }

    pub fn is_resizing(&self) -> bool {
        matches!(self.state, ImageState::Resizing { .. })
    }

    pub fn pointer_style(&self) -> PointerStyle {
        let resizing = self.is_resizing();
        PointerStyle {
            resize_cursor: resizing,
            text_selection_suspended: resizing,
        }
    }

    /// Back to `Idle`, hiding the handle
    pub fn deselect(&mut self) {
        if self.state != ImageState::Idle {
            log::debug!("Image deselected");
        }
        self.state = ImageState::Idle;
        self.handle = None;
    }

    /// A click inside the editing surface
    pub fn click(&mut self, target: ClickTarget, surface: &EditorSurface, geometry: &dyn ImageGeometry) {
        match target {
            ClickTarget::Image(image) if surface.contains_image(image) => {
                self.deselect();
                self.state = ImageState::Selected { image };
                log::debug!("Image {:?} selected", image);
                self.reposition(surface, geometry);
            }
            _ => self.deselect(),
        }
    }

    /// Focus moved; entering the title or search field drops the selection
    pub fn focus_changed(&mut self, target: FocusTarget) {
        if matches!(target, FocusTarget::Title | FocusTarget::Search) {
            self.deselect();
        }
    }

    /// Re-derive the handle from the image's current bounds (scroll,
    /// viewport resize, layout shift). A vanished image deselects.
    pub fn reposition(&mut self, surface: &EditorSurface, geometry: &dyn ImageGeometry) {
        let Some(image) = self.selected() else {
            self.handle = None;
            return;
        };
        if !surface.contains_image(image) {
            self.deselect();
            return;
        }
        self.handle = geometry.image_bounds(surface, image).map(|b| HandlePosition {
            left: b.right - HANDLE_INSET,
            top: b.bottom - HANDLE_INSET,
        });
    }

    /// The surface content changed in some way
    pub fn on_mutations(&mut self, surface: &EditorSurface, geometry: &dyn ImageGeometry) {
        if self.selected().is_some() {
            self.reposition(surface, geometry);
        }
    }

    /// Pointer pressed on the resize handle at `x`. Captures the drag origin,
    /// the rendered width and the width cap.
    pub fn press_handle(&mut self, x: i32, surface: &EditorSurface, geometry: &dyn ImageGeometry) -> bool {
        let ImageState::Selected { image } = self.state else {
            return false;
        };
        if !surface.contains_image(image) {
            self.deselect();
            return false;
        }
        let start_width = geometry
            .image_bounds(surface, image)
            .map(|b| b.width())
            .or_else(|| surface.image(image).and_then(|i| i.width))
            .unwrap_or(MIN_IMAGE_WIDTH);
        let max_width = geometry.content_width().saturating_sub(self.max_margin);
        self.state = ImageState::Resizing {
            image,
            start_x: x,
            start_width,
            max_width,
        };
        log::debug!("Resizing image {:?} from {}px (max {}px)", image, start_width, max_width);
        true
    }

    /// Pointer moved to `x`; while resizing, sets and returns the new width
    pub fn pointer_move(&mut self, x: i32, surface: &mut EditorSurface, geometry: &dyn ImageGeometry) -> Option<u32> {
        let ImageState::Resizing {
            image,
            start_x,
            start_width,
            max_width,
        } = self.state
        else {
            return None;
        };
        let width = clamp_width(start_width, x - start_x, max_width);
        if !surface.set_image_width(image, width) {
            self.deselect();
            return None;
        }
        self.reposition(surface, geometry);
        Some(width)
    }

    /// Pointer released. Returns true when a resize ended and the new width
    /// should be persisted.
    pub fn release(&mut self) -> bool {
        match self.state {
            ImageState::Resizing { image, .. } => {
                self.state = ImageState::Selected { image };
                true
            }
            _ => false,
        }
    }

    /// Delete/Backspace pressed. Removes the selected image unless the key
    /// went to a text input. Returns true when the image was removed.
    pub fn delete_selected(&mut self, surface: &mut EditorSurface, in_text_input: bool) -> bool {
        if in_text_input {
            return false;
        }
        let Some(image) = self.selected() else {
            return false;
        };
        let removed = surface.remove_image(image);
        self.deselect();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::{Inline, Position};

    /// Lays every image out on its own row: left at 0, rows 100px tall,
    /// shifted down by the number of blocks before it
    struct FakeGeometry {
        surface_width: u32,
        scroll: i32,
    }

    impl FakeGeometry {
        fn new(surface_width: u32, scroll: i32) -> Self {
            Self { surface_width, scroll }
        }
    }

    impl ImageGeometry for FakeGeometry {
        fn image_bounds(&self, surface: &EditorSurface, id: ImageId) -> Option<Bounds> {
            for (index, block) in surface.document().blocks().iter().enumerate() {
                for inline in &block.inlines {
                    if let Inline::Image(image) = inline {
                        if image.id == id {
                            let top = index as i32 * 100 - self.scroll;
                            let width = image.width.unwrap_or(200) as i32;
                            return Some(Bounds { left: 0, top, right: width, bottom: top + 80 });
                        }
                    }
                }
            }
            None
        }

        fn content_width(&self) -> u32 {
            self.surface_width
        }
    }

    fn setup() -> (EditorSurface, ImageId) {
        let mut surface = EditorSurface::new();
        surface.load_markup("<p>intro</p><p><img src=\"data:image/png;base64,AA==\"></p>");
        let id = surface.document().images().next().unwrap().id;
        (surface, id)
    }

    #[test]
    fn test_clamp_width() {
        for delta in [-1000, -151, -150, -1, 0, 1, 99, 100, 101, 5000] {
            let expected = (200i32 + delta).min(300).max(50) as u32;
            assert_eq!(clamp_width(200, delta, 300), expected, "delta {}", delta);
        }
        assert_eq!(clamp_width(200, 0, 30), MIN_IMAGE_WIDTH);
    }

    #[test]
    fn test_click_selects_and_positions_handle() {
        let (surface, id) = setup();
        let geometry = FakeGeometry::new(600, 0);
        let mut controller = ImageController::default();

        controller.click(ClickTarget::Image(id), &surface, &geometry);
        assert_eq!(controller.state(), ImageState::Selected { image: id });
        assert_eq!(controller.handle(), Some(HandlePosition { left: 190, top: 170 }));

        controller.click(ClickTarget::Other, &surface, &geometry);
        assert_eq!(controller.state(), ImageState::Idle);
        assert_eq!(controller.handle(), None);
    }

    #[test]
    fn test_scroll_repositions_without_deselecting() {
        let (surface, id) = setup();
        let mut controller = ImageController::default();
        controller.click(ClickTarget::Image(id), &surface, &FakeGeometry::new(600, 0));

        let scrolled = FakeGeometry::new(600, 40);
        controller.reposition(&surface, &scrolled);
        assert_eq!(controller.selected(), Some(id));
        assert_eq!(controller.handle(), Some(HandlePosition { left: 190, top: 130 }));
    }

    #[test]
    fn test_layout_shift_moves_handle() {
        let (mut surface, id) = setup();
        let rx = surface.subscribe();
        let mut controller = ImageController::default();
        controller.click(ClickTarget::Image(id), &surface, &FakeGeometry::new(600, 0));

        surface.set_caret(Position::new(0, 0));
        surface.insert_paragraph();
        assert!(rx.try_iter().count() > 0);
        controller.on_mutations(&surface, &FakeGeometry::new(600, 0));
        assert_eq!(controller.handle(), Some(HandlePosition { left: 190, top: 270 }));
    }

    #[test]
    fn test_external_removal_returns_to_idle() {
        let (mut surface, id) = setup();
        let mut controller = ImageController::default();
        controller.click(ClickTarget::Image(id), &surface, &FakeGeometry::new(600, 0));

        surface.select_all();
        surface.delete_backward();
        controller.on_mutations(&surface, &FakeGeometry::new(600, 0));
        assert_eq!(controller.state(), ImageState::Idle);
        assert_eq!(controller.handle(), None);
    }

    #[test]
    fn test_resize_drag() {
        let (mut surface, id) = setup();
        let geometry = FakeGeometry::new(400, 0);
        let mut controller = ImageController::default();
        controller.click(ClickTarget::Image(id), &surface, &geometry);

        assert!(controller.press_handle(195, &surface, &geometry));
        assert_eq!(
            controller.state(),
            ImageState::Resizing { image: id, start_x: 195, start_width: 200, max_width: 380 }
        );
        assert_eq!(controller.pointer_style(), PointerStyle { resize_cursor: true, text_selection_suspended: true });

        let narrowed = controller.pointer_move(45, &mut surface, &geometry);
        assert_eq!(narrowed, Some(50));
        let widened = controller.pointer_move(1000, &mut surface, &FakeGeometry::new(400, 0));
        assert_eq!(widened, Some(380));
        assert_eq!(surface.image(id).unwrap().width, Some(380));
        assert_eq!(controller.handle(), Some(HandlePosition { left: 370, top: 170 }));

        assert!(controller.release());
        assert_eq!(controller.state(), ImageState::Selected { image: id });
        assert_eq!(controller.pointer_style(), PointerStyle::default());
        assert!(!controller.release());
    }

    #[test]
    fn test_press_handle_requires_selection() {
        let (mut surface, _) = setup();
        let geometry = FakeGeometry::new(400, 0);
        let mut controller = ImageController::default();
        assert!(!controller.press_handle(10, &surface, &geometry));
        assert_eq!(controller.pointer_move(20, &mut surface, &geometry), None);
    }

    #[test]
    fn test_focus_on_title_or_search_deselects() {
        let (surface, id) = setup();
        let geometry = FakeGeometry::new(600, 0);
        let mut controller = ImageController::default();

        controller.click(ClickTarget::Image(id), &surface, &geometry);
        controller.focus_changed(FocusTarget::Body);
        assert_eq!(controller.selected(), Some(id));
        controller.focus_changed(FocusTarget::Title);
        assert_eq!(controller.selected(), None);

        controller.click(ClickTarget::Image(id), &surface, &geometry);
        controller.focus_changed(FocusTarget::Search);
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn test_delete_key_removes_selected_image() {
        let (mut surface, id) = setup();
        let geometry = FakeGeometry::new(600, 0);
        let mut controller = ImageController::default();
        controller.click(ClickTarget::Image(id), &surface, &geometry);

        assert!(!controller.delete_selected(&mut surface, true));
        assert!(surface.contains_image(id));

        assert!(controller.delete_selected(&mut surface, false));
        assert!(!surface.contains_image(id));
        assert_eq!(controller.state(), ImageState::Idle);
        assert!(!controller.delete_selected(&mut surface, false));
    }

    #[test]
    fn test_click_on_missing_image_is_idle() {
        let (surface, _) = setup();
        let geometry = FakeGeometry::new(600, 0);
        let mut controller = ImageController::default();
        controller.click(ClickTarget::Image(ImageId(999)), &surface, &geometry);
        assert_eq!(controller.state(), ImageState::Idle);
    }
}

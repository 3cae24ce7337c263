use std::collections::VecDeque;

/// One positioned, sized instance of an image within the scrolling strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Left edge in logical pixels. Decreases every tick until recycled.
    pub pos: f32,
    /// Rendered width in logical pixels.
    pub width: f32,
    /// Index into the renderer's image rotation.
    pub image: usize,
}

impl Segment {
    pub fn right(&self) -> f32 {
        self.pos + self.width
    }
}

/// Scrolling track state for the marquee.
///
/// The track is a queue of segments cycling through a fixed list of display
/// widths. Total coverage is kept at two viewport widths or more at all
/// times, so the visible window never shows a gap. `tick` is a pure state
/// transition; the caller drives it from whatever frame scheduler it has.
#[derive(Debug, Clone)]
pub struct Track {
    segments: VecDeque<Segment>,
    widths: Vec<f32>,
    /// Next image index in the rotation, fed to appended segments.
    next_image: usize,
    viewport: f32,
}

impl Track {
    /// Build a track from per-image display widths, covering at least twice
    /// the viewport. Returns `None` when there is nothing to scroll.
    pub fn new(widths: Vec<f32>, viewport: f32) -> Option<Self> {
        if widths.is_empty() || widths.iter().all(|w| *w <= 0.0) || viewport <= 0.0 {
            return None;
        }
        let mut track = Self {
            segments: VecDeque::new(),
            widths,
            next_image: 0,
            viewport,
        };
        track.top_up();
        Some(track)
    }

    pub fn viewport(&self) -> f32 {
        self.viewport
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Segments intersecting the visible window `[0, viewport)`.
    pub fn visible(&self) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .filter(|s| s.pos < self.viewport && s.right() > 0.0)
    }

    /// Sum of all segment widths currently on the track.
    pub fn coverage(&self) -> f32 {
        self.segments.iter().map(|s| s.width).sum()
    }

    /// Advance the strip left by `delta` logical pixels.
    ///
    /// Segments whose right edge has passed the left viewport edge are
    /// recycled: removed from the front and re-appended at the tail with the
    /// next image in rotation (and that image's width). Coverage is topped
    /// back up if the rotation swap shrank it below two viewports.
    pub fn tick(&mut self, delta: f32) {
        if delta < 0.0 {
            return;
        }
        for segment in self.segments.iter_mut() {
            segment.pos -= delta;
        }
        while self
            .segments
            .front()
            .is_some_and(|front| front.right() < 0.0)
        {
            self.segments.pop_front();
            self.append_next();
        }
        self.top_up();
    }

    /// Update the viewport width after a resize. Existing segment positions
    /// are preserved; coverage is extended if the viewport grew.
    pub fn set_viewport(&mut self, viewport: f32) {
        if viewport <= 0.0 {
            return;
        }
        self.viewport = viewport;
        self.top_up();
    }

    /// Remove an image from the rotation after its decode turned out bad.
    ///
    /// Segments showing it are dropped in place and rotation indices above it
    /// shift down; coverage is rebuilt to the invariant. If nothing with a
    /// positive width survives, the track empties instead.
    pub fn remove_image(&mut self, image: usize) -> bool {
        if image >= self.widths.len() {
            return false;
        }
        self.widths.remove(image);
        if !self.widths.iter().any(|w| *w > 0.0) {
            self.segments.clear();
            self.next_image = 0;
            return true;
        }
        self.segments.retain(|s| s.image != image);
        for segment in self.segments.iter_mut() {
            if segment.image > image {
                segment.image -= 1;
            }
        }
        if self.next_image > image {
            self.next_image -= 1;
        }
        self.next_image %= self.widths.len();
        self.top_up();
        true
    }

    /// Append one segment at the tail, advancing the rotation.
    ///
    /// Entries with a non-positive width (an extreme aspect ratio can round a
    /// display width down to zero) are skipped so they never enter the strip;
    /// indices stay aligned with the caller's image list.
    fn append_next(&mut self) {
        for _ in 0..self.widths.len() {
            let image = self.next_image % self.widths.len();
            self.next_image = (self.next_image + 1) % self.widths.len();
            let width = self.widths[image];
            if width <= 0.0 {
                continue;
            }
            let pos = self.segments.back().map_or(0.0, Segment::right);
            self.segments.push_back(Segment { pos, width, image });
            return;
        }
    }

    /// Restore the >= 2x viewport coverage invariant.
    fn top_up(&mut self) {
        if !self.widths.iter().any(|w| *w > 0.0) {
            return;
        }
        while self.coverage() < self.viewport * 2.0 {
            self.append_next();
        }
    }
}

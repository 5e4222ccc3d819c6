use crate::mercator::BBox;

/// Size of a rendered pixel in metres (0.28mm), as used for scale denominators.
pub const PIXEL_SIZE_METRES: f64 = 0.00028;

pub const DEFAULT_CANVAS_SIZE: u32 = 256;

/// Render state shared by every layer of a tile.
///
/// The extent is mutated once per tile by [`MapContext::zoom_to_box`] and read
/// by each layer query afterwards; callers hold it by `&mut` while switching
/// tiles and by `&` while profiling, so there is never a query in flight while
/// the extent changes.
#[derive(Debug, Clone)]
pub struct MapContext {
    width: u32,
    height: u32,
    buffer_size: u32,
    extent: BBox,
}

impl MapContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            buffer_size: 0,
            extent: BBox::new(-1.0, -1.0, 0.0, 0.0),
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn extent(&self) -> BBox {
        self.extent
    }

    /// Sets the active extent, growing the box so it matches the canvas aspect ratio.
    pub fn zoom_to_box(&mut self, bbox: BBox) {
        let canvas_ratio = self.width as f64 / self.height as f64;
        let box_ratio = bbox.width() / bbox.height();
        let (cx, cy) = bbox.center();
        self.extent = if !box_ratio.is_finite() || box_ratio == canvas_ratio {
            bbox
        } else if box_ratio > canvas_ratio {
            let half_height = bbox.width() / canvas_ratio / 2.0;
            BBox::new(bbox.min_x, cy - half_height, bbox.max_x, cy + half_height)
        } else {
            let half_width = bbox.height() * canvas_ratio / 2.0;
            BBox::new(cx - half_width, bbox.min_y, cx + half_width, bbox.max_y)
        };
    }

    /// Map units per pixel.
    pub fn scale(&self) -> f64 {
        self.extent.width() / self.width as f64
    }

    pub fn scale_denominator(&self) -> f64 {
        self.scale() / PIXEL_SIZE_METRES
    }

    pub fn buffered_extent(&self) -> BBox {
        if self.buffer_size == 0 {
            return self.extent;
        }
        self.extent.expand(self.buffer_size as f64 * self.scale())
    }
}

impl Default for MapContext {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE)
    }
}

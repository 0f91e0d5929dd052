use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};

/// Pixels per canvas cell when rasterizing a drawing
pub const CELL_PX: u32 = 8;
/// Size of the blank image submitted when no drawing surface exists
pub const FALLBACK_WIDTH: u32 = 640;
pub const FALLBACK_HEIGHT: u32 = 480;

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("drawing surface has no area")]
    Empty,
    #[error("png encode failed: {0}")]
    Encode(String),
}

/// Encoded image of a drawing, ready to hand to a classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl Snapshot {
    pub fn from_image(img: &GrayImage) -> Result<Self, SnapshotError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(SnapshotError::Empty);
        }
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(img.as_raw(), width, height, ExtendedColorType::L8)
            .map_err(|err| SnapshotError::Encode(err.to_string()))?;
        Ok(Self { png, width, height })
    }

    /// White image of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        let img = GrayImage::from_pixel(width.max(1), height.max(1), PAPER);
        // a non-empty grayscale buffer always encodes
        Self::from_image(&img).unwrap_or_else(|_| Self {
            png: Vec::new(),
            width,
            height,
        })
    }

    pub fn fallback() -> Self {
        Self::blank(FALLBACK_WIDTH, FALLBACK_HEIGHT)
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// Anything the engine can take a picture of when a round ends
pub trait DrawingSurface {
    fn snapshot(&self) -> Result<Snapshot, SnapshotError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
}

impl Tool {
    /// Cells painted on each side of the cursor
    fn radius(&self) -> u16 {
        match self {
            Tool::Pen => 0,
            Tool::Eraser => 1,
        }
    }
}

/// Character-cell drawing grid
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<bool>,
    pub tool: Tool,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
            tool: Tool::default(),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn is_inked(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height && self.cells[self.index(x, y)]
    }

    pub fn is_blank(&self) -> bool {
        !self.cells.iter().any(|c| *c)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = false);
    }

    /// Apply the current tool centered on a cell. Out of range cells are ignored.
    pub fn paint(&mut self, x: u16, y: u16) {
        let r = self.tool.radius();
        let ink = self.tool == Tool::Pen;
        for cy in y.saturating_sub(r)..=y.saturating_add(r) {
            for cx in x.saturating_sub(r)..=x.saturating_add(r) {
                if cx < self.width && cy < self.height {
                    let idx = self.index(cx, cy);
                    self.cells[idx] = ink;
                }
            }
        }
    }

    /// Paint every cell on the line between two points (Bresenham), so fast
    /// drags leave a continuous stroke
    pub fn stroke(&mut self, from: (u16, u16), to: (u16, u16)) {
        let (mut x0, mut y0) = (from.0 as i32, from.1 as i32);
        let (x1, y1) = (to.0 as i32, to.1 as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.paint(x0 as u16, y0 as u16);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Change the grid size, keeping the ink that still fits
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == self.width && height == self.height {
            return;
        }
        let mut resized = Canvas::new(width, height);
        resized.tool = self.tool;
        for y in 0..height.min(self.height) {
            for x in 0..width.min(self.width) {
                if self.is_inked(x, y) {
                    let idx = resized.index(x, y);
                    resized.cells[idx] = true;
                }
            }
        }
        *self = resized;
    }

    pub fn to_image(&self) -> GrayImage {
        let mut img = GrayImage::from_pixel(
            self.width as u32 * CELL_PX,
            self.height as u32 * CELL_PX,
            PAPER,
        );
        for (x, y, px) in img.enumerate_pixels_mut() {
            if self.is_inked((x / CELL_PX) as u16, (y / CELL_PX) as u16) {
                *px = INK;
            }
        }
        img
    }

    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl DrawingSurface for Canvas {
    fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Snapshot::from_image(&self.to_image())
    }
}

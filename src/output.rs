/// One shaded character cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub code_point: u32,
    pub rgb: [u8; 3],
    pub brightness: f32,
}

impl Cell {
    pub fn new(character: char, rgb: [u8; 3], brightness: f32) -> Self {
        Cell {
            code_point: character as u32,
            rgb,
            brightness,
        }
    }

    pub fn blank(background: [u8; 3]) -> Self {
        Cell::new(' ', background, 0.0)
    }

    pub fn character(&self) -> char {
        char::from_u32(self.code_point).unwrap_or(' ')
    }
}

/// Structure-of-arrays frame handed to the presenter. A cell's dirty flag is
/// raised only by a write that changes one of its values.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputBuffer {
    width: u32,
    height: u32,
    pub code_points: Vec<u32>,
    pub rgb: Vec<[u8; 3]>,
    pub brightness: Vec<f32>,
    pub dirty: Vec<bool>,
    /// Cells written at least once since the last reallocation.
    written: Vec<bool>,
}

impl OutputBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width * height) as usize;
        OutputBuffer {
            width,
            height,
            code_points: vec![' ' as u32; size],
            rgb: vec![[0, 0, 0]; size],
            brightness: vec![0.0; size],
            dirty: vec![false; size],
            written: vec![false; size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.code_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_points.is_empty()
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Reallocates blank on a size change. Returns whether it did.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        *self = OutputBuffer::new(width, height);
        true
    }

    pub fn is_written(&self, index: usize) -> bool {
        self.written[index]
    }

    pub fn cell(&self, index: usize) -> Cell {
        Cell {
            code_point: self.code_points[index],
            rgb: self.rgb[index],
            brightness: self.brightness[index],
        }
    }

    /// Stores `cell`, returning whether anything changed.
    pub fn write(&mut self, index: usize, cell: &Cell) -> bool {
        self.written[index] = true;
        let mut changed = false;
        if self.code_points[index] != cell.code_point {
            self.code_points[index] = cell.code_point;
            changed = true;
        }
        if self.rgb[index] != cell.rgb {
            self.rgb[index] = cell.rgb;
            changed = true;
        }
        if self.brightness[index].to_bits() != cell.brightness.to_bits() {
            self.brightness[index] = cell.brightness;
            changed = true;
        }
        if changed {
            self.dirty[index] = true;
        }
        changed
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = false);
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.iter().filter(|d| **d).count()
    }

    /// Nearest-neighbour upscale of a smaller render into this buffer.
    /// Source cells never written since their buffer was allocated are
    /// skipped, so the cells they cover keep their previous contents.
    pub fn upsample_from(&mut self, source: &OutputBuffer) {
        if source.is_empty() {
            return;
        }
        for y in 0..self.height {
            let sy = (y as u64 * source.height as u64 / self.height as u64) as u32;
            for x in 0..self.width {
                let sx = (x as u64 * source.width as u64 / self.width as u64) as u32;
                let source_index = source.index(sx, sy);
                if !source.written[source_index] {
                    continue;
                }
                let cell = source.cell(source_index);
                let index = self.index(x, y);
                self.write(index, &cell);
            }
        }
    }

    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.len() + self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                text.push(self.cell(self.index(x, y)).character());
            }
            text.push('\n');
        }
        text
    }
}

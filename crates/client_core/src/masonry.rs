use shared::protocol::{AlbumListItem, MediaItem};

/// Pixel size of an item, when the server reported one.
pub trait MasonryItem {
    fn dimensions(&self) -> Option<(u32, u32)>;
}

impl MasonryItem for MediaItem {
    fn dimensions(&self) -> Option<(u32, u32)> {
        MediaItem::dimensions(self)
    }
}

impl MasonryItem for AlbumListItem {
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

impl<T: MasonryItem> MasonryItem for &T {
    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasonryColumn<'a, T> {
    pub items: Vec<&'a T>,
    /// Sum of estimated item heights plus one `spacing` per item.
    pub height: f32,
}

impl<T> MasonryColumn<'_, T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            height: 0.0,
        }
    }
}

/// Rendered height of `item` in a column `column_width` pixels wide.
///
/// Items without usable dimensions are laid out as squares.
pub fn estimated_height<T: MasonryItem>(item: &T, column_width: f32) -> f32 {
    match item.dimensions() {
        Some((w, h)) if w > 0 && h > 0 => column_width * (h as f32 / w as f32),
        _ => column_width,
    }
}

/// Greedy column packing.
///
/// Each item, in input order, goes to the column with the smallest
/// accumulated height (lowest index on ties). This is a single-pass
/// approximation, not an optimal bin packing. A `column_count` of 0 is
/// treated as 1, and empty input yields `column_count` empty columns.
pub fn pack<'a, T: MasonryItem>(
    items: &'a [T],
    column_count: usize,
    column_width: f32,
    spacing: f32,
) -> Vec<MasonryColumn<'a, T>> {
    let count = column_count.max(1);
    let mut columns: Vec<MasonryColumn<'a, T>> =
        (0..count).map(|_| MasonryColumn::empty()).collect();

    for item in items {
        let target = shortest_column(&columns);
        let column = &mut columns[target];
        column.items.push(item);
        column.height += estimated_height(item, column_width) + spacing;
    }

    columns
}

fn shortest_column<T>(columns: &[MasonryColumn<'_, T>]) -> usize {
    let mut shortest = 0;
    for (index, column) in columns.iter().enumerate().skip(1) {
        if column.height < columns[shortest].height {
            shortest = index;
        }
    }
    shortest
}

/// Number of columns for a viewport width in points.
pub fn column_count_for_width(width: f32) -> usize {
    if width >= 900.0 {
        4
    } else if width >= 600.0 {
        3
    } else {
        2
    }
}

/// Width of one column once inter-column spacing is taken out.
pub fn column_width(total_width: f32, column_count: usize, spacing: f32) -> f32 {
    let count = column_count.max(1) as f32;
    ((total_width - spacing * (count - 1.0)) / count).max(0.0)
}

/// Grid configuration for a masonry view of a given width.
#[derive(Debug, Clone)]
pub struct MasonryGrid {
    /// Total width available to the grid in points.
    pub width: f32,
    /// Gap between columns and between items in a column (default: 8)
    pub spacing: f32,
    /// Fixed column count; derived from `width` when unset.
    pub column_count: Option<usize>,
}

impl Default for MasonryGrid {
    fn default() -> Self {
        Self {
            width: 390.0,
            spacing: 8.0,
            column_count: None,
        }
    }
}

impl MasonryGrid {
    pub fn new(width: f32, spacing: f32) -> Self {
        Self {
            width,
            spacing,
            column_count: None,
        }
    }

    pub fn with_column_count(mut self, column_count: usize) -> Self {
        self.column_count = Some(column_count);
        self
    }

    pub fn columns_for_width(&self) -> usize {
        self.column_count
            .unwrap_or_else(|| column_count_for_width(self.width))
            .max(1)
    }

    pub fn column_width(&self) -> f32 {
        column_width(self.width, self.columns_for_width(), self.spacing)
    }

    pub fn layout<'a, T: MasonryItem>(&self, items: &'a [T]) -> Vec<MasonryColumn<'a, T>> {
        pack(
            items,
            self.columns_for_width(),
            self.column_width(),
            self.spacing,
        )
    }

    /// A lone item spans the whole width instead of sitting in a narrow column.
    pub fn layout_section<'a, T: MasonryItem>(
        &self,
        items: &'a [T],
    ) -> Vec<MasonryColumn<'a, T>> {
        if items.len() == 1 {
            let single = self.clone().with_column_count(1);
            return single.layout(items);
        }
        self.layout(items)
    }
}

#[cfg(test)]
#[path = "tests/masonry_tests.rs"]
mod tests;

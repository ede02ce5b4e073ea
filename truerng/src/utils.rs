use unicode_width::UnicodeWidthStr;

/// A one-slot holder for a value that is still in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeCell<T> {
    value: T,
}

impl<T> ExchangeCell<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    pub fn get_mut(cell: &mut Self) -> &mut T {
        &mut cell.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Copy> ExchangeCell<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for ExchangeCell<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Pads an emoji to a fixed number of terminal cells so that log lines align.
pub fn format_emoji(emoji: &str, field_cells: usize) -> String {
    let e = emoji_presentation(emoji);
    pad_cells(&e, field_cells)
}

fn emoji_presentation(s: &str) -> String {
    if s.chars().any(|c| c == '\u{FE0F}' || c == '\u{200D}') {
        s.to_string()
    } else {
        format!("{s}\u{FE0F}")
    }
}

fn pad_cells(s: &str, field_cells: usize) -> String {
    let w = s.width();
    let pad = field_cells.saturating_sub(w);
    format!("{s}{}", " ".repeat(pad))
}

//! Non-destructive edit buffer.
//!
//! Records splices keyed to byte offsets of the ORIGINAL text and applies
//! them in a single pure rendering pass. The syntax tree being walked never
//! sees earlier edits, so every offset recorded here is an offset into the
//! unmodified source. Distinct range splices must not overlap; rendering a
//! buffer with no edits reproduces the source byte-for-byte.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit {new_start}..{new_end} overlaps existing edit {start}..{end}")]
    Overlap {
        start: usize,
        end: usize,
        new_start: usize,
        new_end: usize,
    },
    #[error("edit range {start}..{end} is outside the source ({len} bytes)")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// Insertions at a shared anchor keep their submission order within a bias;
/// a `Before` insertion renders ahead of a splice starting at the anchor, an
/// `After` insertion renders behind one ending there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bias {
    Before,
    Splice,
    After,
}

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    bias: Bias,
    text: String,
}

#[derive(Debug)]
pub struct EditBuffer<'a> {
    source: &'a str,
    edits: Vec<Edit>,
}

impl<'a> EditBuffer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Replace `start..end` of the original text.
    pub fn replace(
        &mut self,
        start: usize,
        end: usize,
        text: impl Into<String>,
    ) -> Result<(), EditError> {
        self.push(Edit {
            start,
            end,
            bias: Bias::Splice,
            text: text.into(),
        })
    }

    /// Delete `start..end` of the original text.
    pub fn remove(&mut self, start: usize, end: usize) -> Result<(), EditError> {
        self.replace(start, end, "")
    }

    /// Insert ahead of everything anchored at `offset`.
    pub fn insert_before(&mut self, offset: usize, text: impl Into<String>) -> Result<(), EditError> {
        self.push(Edit {
            start: offset,
            end: offset,
            bias: Bias::Before,
            text: text.into(),
        })
    }

    /// Insert behind everything anchored at `offset`.
    pub fn insert_after(&mut self, offset: usize, text: impl Into<String>) -> Result<(), EditError> {
        self.push(Edit {
            start: offset,
            end: offset,
            bias: Bias::After,
            text: text.into(),
        })
    }

    fn push(&mut self, edit: Edit) -> Result<(), EditError> {
        let len = self.source.len();
        if edit.start > edit.end || edit.end > len {
            return Err(EditError::OutOfBounds {
                start: edit.start,
                end: edit.end,
                len,
            });
        }
        if let Some(existing) = self.edits.iter().find(|existing| conflicts(existing, &edit)) {
            return Err(EditError::Overlap {
                start: existing.start,
                end: existing.end,
                new_start: edit.start,
                new_end: edit.end,
            });
        }
        self.edits.push(edit);
        Ok(())
    }

    /// Apply all edits in offset order. Pure: rendering the same buffer
    /// twice produces identical output.
    pub fn render(&self) -> String {
        let mut order: Vec<usize> = (0..self.edits.len()).collect();
        order.sort_by_key(|&i| (self.edits[i].start, self.edits[i].bias, i));

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for index in order {
            let edit = &self.edits[index];
            if edit.start > cursor {
                out.push_str(&self.source[cursor..edit.start]);
                cursor = edit.start;
            }
            out.push_str(&edit.text);
            cursor = cursor.max(edit.end);
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

/// Two range splices conflict when their ranges intersect; a zero-width
/// insertion conflicts only when it lands strictly inside a spliced range.
fn conflicts(a: &Edit, b: &Edit) -> bool {
    let a_is_range = a.start < a.end;
    let b_is_range = b.start < b.end;
    if a_is_range && b_is_range {
        a.start < b.end && b.start < a.end
    } else if a_is_range {
        a.start < b.start && b.start < a.end
    } else if b_is_range {
        b.start < a.start && a.start < b.end
    } else {
        false
    }
}

//! # Paginator Module
//!
//! Bidirectional cursor over a sequence of catalog items split into
//! fixed-size pages. Moving past either end holds the cursor in place and
//! reports the boundary instead of failing.

/// Outcome of a cursor move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
    /// The cursor moved to a neighbouring page
    Moved,
    /// Already on the last page, cursor unchanged
    AtEnd,
    /// Already on the first page, cursor unchanged
    AtStart,
}

/// Fixed-partition page cursor, owned by a single session
#[derive(Debug, Clone, PartialEq)]
pub struct Paginator<T> {
    pages: Vec<Vec<T>>,
    index: usize,
}

impl<T> Paginator<T> {
    /// Partition `items` into pages of `page_size` items.
    ///
    /// A page size of zero is treated as one. An empty sequence produces a
    /// single empty page so `current()` is always valid.
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let mut pages: Vec<Vec<T>> = Vec::new();
        let mut page = Vec::with_capacity(page_size);

        for item in items {
            page.push(item);
            if page.len() == page_size {
                pages.push(std::mem::replace(&mut page, Vec::with_capacity(page_size)));
            }
        }
        if !page.is_empty() || pages.is_empty() {
            pages.push(page);
        }

        Self { pages, index: 0 }
    }

    /// Items on the active page
    pub fn current(&self) -> &[T] {
        &self.pages[self.index]
    }

    pub fn advance(&mut self) -> PageMove {
        if self.index + 1 < self.pages.len() {
            self.index += 1;
            PageMove::Moved
        } else {
            PageMove::AtEnd
        }
    }

    pub fn retreat(&mut self) -> PageMove {
        if self.index > 0 {
            self.index -= 1;
            PageMove::Moved
        } else {
            PageMove::AtStart
        }
    }

    /// 0-based index of the active page
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_with_short_last_page() {
        let pager = Paginator::new((1..=7).collect(), 3);
        assert_eq!(pager.page_count(), 3);
        assert_eq!(pager.current(), &[1, 2, 3]);
    }

    #[test]
    fn test_advance_holds_at_last_page() {
        let mut pager = Paginator::new((1..=7).collect(), 3);
        assert_eq!(pager.advance(), PageMove::Moved);
        assert_eq!(pager.advance(), PageMove::Moved);
        assert_eq!(pager.current(), &[7]);

        // Repeated attempts past the end never move or corrupt the cursor
        for _ in 0..3 {
            assert_eq!(pager.advance(), PageMove::AtEnd);
            assert_eq!(pager.index(), 2);
            assert_eq!(pager.current(), &[7]);
        }

        // and the cursor still retreats normally afterwards
        assert_eq!(pager.retreat(), PageMove::Moved);
        assert_eq!(pager.current(), &[4, 5, 6]);
    }

    #[test]
    fn test_retreat_clamps_at_first_page() {
        let mut pager = Paginator::new((1..=4).collect(), 2);
        assert_eq!(pager.retreat(), PageMove::AtStart);
        assert_eq!(pager.index(), 0);

        pager.advance();
        assert_eq!(pager.retreat(), PageMove::Moved);
        assert_eq!(pager.retreat(), PageMove::AtStart);
        assert_eq!(pager.current(), &[1, 2]);
    }

    #[test]
    fn test_empty_sequence_has_one_empty_page() {
        let mut pager: Paginator<u8> = Paginator::new(Vec::new(), 3);
        assert!(pager.is_empty());
        assert!(pager.current().is_empty());
        assert_eq!(pager.advance(), PageMove::AtEnd);
        assert_eq!(pager.retreat(), PageMove::AtStart);
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let pager = Paginator::new(vec!['a', 'b'], 0);
        assert_eq!(pager.page_count(), 2);
    }

    #[test]
    fn test_index_stays_in_bounds_for_any_walk() {
        let mut pager = Paginator::new((0..10).collect::<Vec<_>>(), 3);
        let walk = [true, true, false, true, true, true, true, false, false, false, false, false];
        for forward in walk {
            if forward {
                pager.advance();
            } else {
                pager.retreat();
            }
            assert!(pager.index() < pager.page_count());
        }
        assert_eq!(pager.index(), 0);
    }
}

use thiserror::Error;

/// Project codes assigned to one page, in display order.
pub type PageEntries<'a> = &'a [String];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("A page of {0} buttons leaves no room next to the status button")]
    CapacityTooSmall(usize),
}

/// Splits codes into pages of `capacity - 1` consecutive entries. The last button of a page is
/// reserved for the status button and never receives a project. The final page may be shorter.
pub fn paginate(codes: &[String], capacity: usize) -> Result<Vec<PageEntries<'_>>, PaginationError> {
    if capacity < 2 {
        return Err(PaginationError::CapacityTooSmall(capacity));
    }
    Ok(codes.chunks(capacity - 1).collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_paginate_basic() {
        let codes = codes(&["A", "B", "C", "D", "E"]);

        let pages = paginate(&codes, 4).unwrap();

        assert_eq!(pages, vec![&codes[0..3], &codes[3..5]]);
    }

    #[test]
    fn test_paginate_exact_fit() {
        let codes = codes(&["A", "B", "C"]);
        assert_eq!(paginate(&codes, 4).unwrap().len(), 1);
    }

    #[test]
    fn test_paginate_empty() {
        assert!(paginate(&[], 15).unwrap().is_empty());
    }

    #[test]
    fn test_paginate_rejects_tiny_capacity() {
        assert_eq!(
            paginate(&codes(&["A"]), 1),
            Err(PaginationError::CapacityTooSmall(1))
        );
        assert_eq!(
            paginate(&codes(&["A"]), 0),
            Err(PaginationError::CapacityTooSmall(0))
        );
    }

    proptest! {
        #[test]
        fn pages_partition_input(len in 0usize..60, capacity in 2usize..33) {
            let codes: Vec<String> = (0..len).map(|i| format!("P{i}")).collect();

            let pages = paginate(&codes, capacity).unwrap();

            prop_assert_eq!(pages.len(), len.div_ceil(capacity - 1));
            prop_assert!(pages.iter().all(|page| !page.is_empty() && page.len() < capacity));
            prop_assert_eq!(pages.concat(), codes.clone());
            prop_assert_eq!(paginate(&codes, capacity).unwrap(), pages);
        }
    }
}

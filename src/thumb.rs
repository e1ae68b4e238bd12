//! Short preview strings shown next to a headword in result lists.

const MAX_THUMB_CHARS: usize = 32;
const MAX_THUMB_ITEMS: usize = 3;
const SMALL_ITEM: usize = 8;
const MEDIUM_ITEM: usize = 16;
const ELLIPSIS: &str = "...";

/// Builds a preview from an ordered list of candidates.
///
/// Items of up to 8 characters are taken first, then items of up to 16, then
/// a single longer item if at least 16 characters of the 32 character budget
/// remain, cut short with `...` when it would overflow. At most three items
/// are kept and joined with `", "`. Lengths are counted in characters.
pub fn build_thumb<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<S> = items.into_iter().collect();
    let mut small = Vec::new();
    let mut medium = Vec::new();
    let mut large = Vec::new();
    for item in &items {
        let text = item.as_ref();
        let len = text.chars().count();
        if len <= SMALL_ITEM {
            small.push((text, len));
        } else if len <= MEDIUM_ITEM {
            medium.push((text, len));
        } else {
            large.push((text, len));
        }
    }

    let mut chosen: Vec<String> = Vec::with_capacity(MAX_THUMB_ITEMS);
    let mut total = 0usize;
    for &(text, len) in small.iter().chain(medium.iter()) {
        if total < MAX_THUMB_CHARS && chosen.len() < MAX_THUMB_ITEMS {
            chosen.push(text.to_string());
            total += len;
        }
    }
    for &(text, len) in &large {
        if total + MEDIUM_ITEM < MAX_THUMB_CHARS && chosen.len() < MAX_THUMB_ITEMS {
            if len < MAX_THUMB_CHARS - total {
                chosen.push(text.to_string());
                total += len;
            } else {
                let keep = MAX_THUMB_CHARS - total - ELLIPSIS.len();
                let mut cut: String = text.chars().take(keep).collect();
                cut.push_str(ELLIPSIS);
                total += keep + ELLIPSIS.len();
                chosen.push(cut);
            }
        }
    }
    chosen.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_items_come_before_medium_ones() {
        let thumb = build_thumb(["to have lunch", "to eat", "food"]);
        assert_eq!(thumb, "to eat, food, to have lunch");
    }

    #[test]
    fn caps_at_three_items() {
        let thumb = build_thumb(["a", "b", "c", "d"]);
        assert_eq!(thumb, "a, b, c");
    }

    #[test]
    fn long_item_is_truncated_with_ellipsis() {
        let thumb = build_thumb([
            "to eat",
            "a very long description of something edible",
        ]);
        // 6 chars used, 32 - 6 - 3 = 23 characters kept
        assert_eq!(thumb, "to eat, a very long description...");
    }

    #[test]
    fn long_item_fits_whole_when_budget_allows() {
        let thumb = build_thumb(["Pudong Airport (Shanghai)"]);
        assert_eq!(thumb, "Pudong Airport (Shanghai)");
    }

    #[test]
    fn long_item_skipped_without_room() {
        let thumb = build_thumb([
            "first medium one",
            "a long item that does not fit",
        ]);
        assert_eq!(thumb, "first medium one");
    }

    #[test]
    fn empty_input_gives_empty_thumb() {
        assert_eq!(build_thumb(Vec::<String>::new()), "");
    }
}

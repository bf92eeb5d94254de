// ── Natural ordering ──
//
// Names split into maximal digit / non-digit runs. Digit runs compare by
// numeric value, everything else lexicographically. A name whose runs are
// a strict prefix of another's sorts first; a plain comparison of the whole
// names breaks remaining ties (e.g. "a01" vs "a1").

use std::cmp::Ordering;

use crate::model::DirectoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Digits(&'a str),
    Text(&'a str),
}

impl<'a> Token<'a> {
    fn as_str(self) -> &'a str {
        match self {
            Self::Digits(s) | Self::Text(s) => s,
        }
    }
}

fn tokens(name: &str) -> impl Iterator<Item = Token<'_>> {
    let mut rest = name;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(if digits {
            Token::Digits(run)
        } else {
            Token::Text(run)
        })
    })
}

/// Compare two digit runs by value without parsing, so arbitrarily long
/// runs cannot overflow.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural-order comparison of two names.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = tokens(a);
    let mut right = tokens(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Token::Digits(x), Token::Digits(y)) => compare_digits(x, y),
                    _ => x.as_str().cmp(y.as_str()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Listing order: folders first, then natural order by name.
pub fn entry_cmp(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_folder()
        .cmp(&a.is_folder())
        .then_with(|| natural_cmp(&a.name, &b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryKind;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = names.iter().map(ToString::to_string).collect();
        v.sort_by(|a, b| natural_cmp(a, b));
        v
    }

    fn entry(name: &str, kind: EntryKind) -> DirectoryEntry {
        DirectoryEntry {
            name: name.into(),
            path: name.into(),
            kind,
        }
    }

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(sorted(&["img2", "img10", "img1"]), ["img1", "img2", "img10"]);
    }

    #[test]
    fn text_prefix_ties_then_numbers_decide() {
        assert_eq!(sorted(&["b", "a10", "a2"]), ["a2", "a10", "b"]);
    }

    #[test]
    fn shorter_token_sequence_sorts_first() {
        assert_eq!(sorted(&["img1.jpg", "img1"]), ["img1", "img1.jpg"]);
    }

    #[test]
    fn leading_zeros_tie_break_lexicographically() {
        assert_eq!(natural_cmp("a01", "a1"), "a01".cmp("a1"));
        assert_ne!(natural_cmp("a01", "a1"), Ordering::Equal);
    }

    #[test]
    fn very_long_digit_runs_do_not_overflow() {
        let big = "9".repeat(40);
        let bigger = format!("1{}", "0".repeat(40));
        assert_eq!(natural_cmp(&big, &bigger), Ordering::Less);
    }

    #[test]
    fn mixed_tokens_compare_lexicographically() {
        // "1" < "a" as strings.
        assert_eq!(natural_cmp("1a", "a1"), Ordering::Less);
    }

    #[test]
    fn folders_sort_before_files() {
        let mut entries = vec![entry("a.jpg", EntryKind::File), entry("sub", EntryKind::Folder)];
        entries.sort_by(entry_cmp);
        assert_eq!(entries[0].name, "sub");

        let mut entries = vec![entry("zzz", EntryKind::Folder), entry("aaa", EntryKind::File)];
        entries.sort_by(entry_cmp);
        assert_eq!(entries[0].name, "zzz");
    }

    #[test]
    fn timestamped_capture_names() {
        assert_eq!(
            sorted(&["cap_2024-05-01_10.png", "cap_2024-05-01_9.png", "cap_2024-04-30_23.png"]),
            ["cap_2024-04-30_23.png", "cap_2024-05-01_9.png", "cap_2024-05-01_10.png"]
        );
    }
}

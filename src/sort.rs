use std::cmp::Ordering;
use std::path::Path;

// ---------------------------------------------------------------------------
// Alphanumeric ("natural") ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn tokens(s: &str) -> impl Iterator<Item = Token<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != is_digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(if is_digit { Token::Digits(run) } else { Token::Text(run) })
    })
}

/// Compare two digit runs by numeric value without parsing, so runs longer
/// than any integer type still order correctly.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn cmp_token(a: Token<'_>, b: Token<'_>) -> Ordering {
    match (a, b) {
        (Token::Digits(x), Token::Digits(y)) => cmp_digits(x, y),
        (Token::Text(x), Token::Text(y)) => cmp_text(x, y),
        (Token::Digits(_), Token::Text(_)) => Ordering::Less,
        (Token::Text(_), Token::Digits(_)) => Ordering::Greater,
    }
}

/// Natural ordering: "1.jpg" < "2.jpg" < "10.jpg", letters case-insensitive.
pub fn alphanumeric_cmp(a: &str, b: &str) -> Ordering {
    let mut ta = tokens(a);
    let mut tb = tokens(b);
    loop {
        match (ta.next(), tb.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match cmp_token(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Stable in-place natural sort of member names.
pub fn alphanumeric_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| alphanumeric_cmp(a.as_ref(), b.as_ref()));
}

/// Natural sort of paths, compared on their full lossy string form.
pub fn alphanumeric_sort_paths<P: AsRef<Path>>(paths: &mut [P]) {
    paths.sort_by(|a, b| {
        alphanumeric_cmp(
            &a.as_ref().to_string_lossy(),
            &b.as_ref().to_string_lossy(),
        )
    });
}

use regex::Regex;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\s|/\\_,.:;~\-]+").expect("valid separator pattern")
});

static ROLL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-zА-Яа-я][0-9]{5}").expect("valid roll number pattern")
});

const ROLL_DIGITS: usize = 5;

/// Repairs and validates a roll number of the shape `B12345`.
///
/// Returns an empty string when no letter followed by five digits can be
/// recovered from `raw`.
pub fn normalize_roll_number(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let latin: String = trimmed
        .chars()
        .map(|ch| match ch {
            'В' | 'в' | 'Ь' | 'ь' => 'B',
            other => other,
        })
        .collect();
    let repaired = repair_digit_lookalikes(&latin);
    let lead_fixed = replace_leading_eight(&repaired);
    let compact = SEPARATORS.replace_all(&lead_fixed, "");

    let Some(found) = ROLL_TOKEN.find(&compact) else {
        return String::new();
    };
    let token = found.as_str().to_uppercase();
    match token.chars().next() {
        Some(lead) if lead.is_ascii_uppercase() => token,
        Some(lead) => format!("B{}", &token[lead.len_utf8()..]),
        None => String::new(),
    }
}

/// Concatenates every digit of `raw` and keeps the value only when it lies in
/// `lo..=hi`.
pub fn digits_in_range(raw: &str, lo: u64, hi: u64) -> String {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    match digits.parse::<u64>() {
        Ok(value) if (lo..=hi).contains(&value) => value.to_string(),
        _ => String::new(),
    }
}

fn digit_lookalike(ch: char) -> Option<char> {
    match ch {
        'I' | 'l' => Some('1'),
        'O' | 'o' | 'О' | 'о' => Some('0'),
        _ => None,
    }
}

// A look-alike only counts as a digit when both neighbours already are digits.
fn repair_digit_lookalikes(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(idx, ch)| {
            let Some(digit) = digit_lookalike(*ch) else {
                return *ch;
            };
            let before = idx
                .checked_sub(1)
                .and_then(|prev| chars.get(prev))
                .is_some_and(|prev| prev.is_ascii_digit());
            let after = chars.get(idx + 1).is_some_and(|next| next.is_ascii_digit());
            if before && after { digit } else { *ch }
        })
        .collect()
}

fn replace_leading_eight(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(idx, ch)| {
            if *ch == '8' && followed_by_digit_run(&chars[idx + 1..]) {
                'B'
            } else {
                *ch
            }
        })
        .collect()
}

fn followed_by_digit_run(rest: &[char]) -> bool {
    let digits = rest.iter().skip_while(|ch| ch.is_whitespace());
    digits.take(ROLL_DIGITS).filter(|ch| ch.is_ascii_digit()).count() == ROLL_DIGITS
}

use arrow::datatypes::DataType;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// `true`/`false` in any casing.
pub fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Infer the narrowest Arrow dtype that holds every non-empty cell of a column.
///
/// Int64 ⊂ Float64; Boolean only when every cell is a boolean literal.
/// A column of nothing but empty cells stays Utf8.
pub fn infer_arrow_dtype<'a, I>(cells: I) -> DataType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        seen = true;
        all_int &= cell.parse::<i64>().is_ok();
        all_float &= cell.parse::<f64>().is_ok();
        all_bool &= parse_bool(cell).is_some();
        if !(all_int || all_float || all_bool) {
            break;
        }
    }

    match (seen, all_int, all_float, all_bool) {
        (false, ..) => DataType::Utf8,
        (true, true, _, _) => DataType::Int64,
        (true, _, true, _) => DataType::Float64,
        (true, _, _, true) => DataType::Boolean,
        _ => DataType::Utf8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_str_strips_quotes_and_whitespace() {
        assert_eq!(clean_str("  \"abc\" "), "abc");
        assert_eq!(clean_str(" x "), "x");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn infers_widest_required_type() {
        assert_eq!(infer_arrow_dtype(["1", "2", ""]), DataType::Int64);
        assert_eq!(infer_arrow_dtype(["1", "2.5"]), DataType::Float64);
        assert_eq!(infer_arrow_dtype(["True", "false"]), DataType::Boolean);
        assert_eq!(infer_arrow_dtype(["1", "yes"]), DataType::Utf8);
        assert_eq!(infer_arrow_dtype(["", ""]), DataType::Utf8);
    }
}

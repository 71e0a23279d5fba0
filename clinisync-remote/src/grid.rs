//! Row-major search over a fetched value grid and A1 addressing.

use clinisync_core::types::TableCoordinate;

/// First cell equal to `value`, scanning rows top to bottom and cells left to
/// right, optionally restricted to one 1-based column.
pub fn find_first(grid: &[Vec<String>], value: &str, column: Option<u32>) -> Option<TableCoordinate> {
    matches(grid, value, column).next()
}

pub fn find_last(grid: &[Vec<String>], value: &str) -> Option<TableCoordinate> {
    matches(grid, value, None).last()
}

fn matches<'a>(
    grid: &'a [Vec<String>],
    value: &'a str,
    column: Option<u32>,
) -> impl Iterator<Item = TableCoordinate> + 'a {
    grid.iter().enumerate().flat_map(move |(r, row)| {
        row.iter().enumerate().filter_map(move |(c, cell)| {
            let at = TableCoordinate::new(r as u32 + 1, c as u32 + 1);
            let in_column = column.map_or(true, |col| col == at.column);
            (in_column && cell == value).then_some(at)
        })
    })
}

/// `1 -> "A"`, `26 -> "Z"`, `27 -> "AA"`.
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quoted sheet reference, e.g. `'Отчёт 2024'`.
pub fn sheet_ref(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

/// Single-cell A1 range, e.g. `'Sheet1'!C8`.
pub fn a1(worksheet: &str, at: TableCoordinate) -> String {
    format!("{}!{}{}", sheet_ref(worksheet), column_letters(at.column), at.row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn first_and_last_are_row_major() {
        let g = grid(&[&["", "a"], &["a", "b", "a"]]);
        assert_eq!(find_first(&g, "a", None), Some(TableCoordinate::new(1, 2)));
        assert_eq!(find_first(&g, "a", Some(1)), Some(TableCoordinate::new(2, 1)));
        assert_eq!(find_last(&g, "a"), Some(TableCoordinate::new(2, 3)));
        assert_eq!(find_first(&g, "z", None), None);
    }

    #[test]
    fn letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(79), "CA");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn a1_quotes_sheet_name() {
        assert_eq!(a1("Bob's", TableCoordinate::new(8, 3)), "'Bob''s'!C8");
    }
}

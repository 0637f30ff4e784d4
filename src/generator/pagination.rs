use crate::types::Dialect;

const MYSQL_MAX_ROWS: &str = "18446744073709551615";

/// LIMIT/OFFSET request, rendered natively or through ROWNUM numbering.
///
/// An offset of zero is the same as no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pagination {
    #[must_use]
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            limit,
            offset: offset.filter(|o| *o > 0),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    /// Apply the pagination to a complete statement.
    ///
    /// Native dialects get a trailing clause; Oracle wraps the statement and
    /// filters on the row number, keeping the statement's own order.
    #[must_use]
    pub fn apply(&self, dialect: Dialect, sql: &str) -> String {
        if self.is_empty() {
            return sql.to_string();
        }
        if dialect.supports().native_limit {
            return format!("{sql}{}", self.native_clause(dialect));
        }
        let filter = match (self.limit, self.offset) {
            (Some(limit), None) => format!("<={limit}"),
            (None, Some(offset)) => format!(">{offset}"),
            (Some(limit), Some(offset)) => {
                format!("BETWEEN {} AND {}", offset.saturating_add(1), offset.saturating_add(limit))
            }
            (None, None) => return sql.to_string(),
        };
        format!(
            "SELECT * FROM (  SELECT t.*, ROWNUM ROWNUM_1 FROM ({sql})t )t2 WHERE t2.ROWNUM_1 {filter}"
        )
    }

    fn native_clause(&self, dialect: Dialect) -> String {
        match (dialect, self.limit, self.offset) {
            (Dialect::Mysql, Some(limit), Some(offset)) => format!(" LIMIT {offset}, {limit}"),
            (Dialect::Mysql, None, Some(offset)) => format!(" LIMIT {offset}, {MYSQL_MAX_ROWS}"),
            (Dialect::Sqlite, None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
            (_, None, Some(offset)) => format!(" OFFSET {offset}"),
            (_, Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (_, Some(limit), None) => format!(" LIMIT {limit}"),
            (_, None, None) => String::new(),
        }
    }

    /// Whether the 1-based row number `rownum` survives the ROWNUM filter.
    #[must_use]
    pub fn admits(&self, rownum: u64) -> bool {
        let after_offset = self.offset.is_none_or(|offset| rownum > offset);
        let within_limit = self
            .limit
            .is_none_or(|limit| rownum <= self.offset.unwrap_or(0).saturating_add(limit));
        after_offset && within_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rownum_wrapper_forms() {
        let inner = "SELECT \"id\" FROM \"users\" ORDER BY \"id\"";
        assert_eq!(
            Pagination::new(Some(10), None).apply(Dialect::Oracle, inner),
            format!("SELECT * FROM (  SELECT t.*, ROWNUM ROWNUM_1 FROM ({inner})t )t2 WHERE t2.ROWNUM_1 <=10")
        );
        assert_eq!(
            Pagination::new(None, Some(5)).apply(Dialect::Oracle, inner),
            format!("SELECT * FROM (  SELECT t.*, ROWNUM ROWNUM_1 FROM ({inner})t )t2 WHERE t2.ROWNUM_1 >5")
        );
        assert_eq!(
            Pagination::new(Some(10), Some(5)).apply(Dialect::Oracle, inner),
            format!("SELECT * FROM (  SELECT t.*, ROWNUM ROWNUM_1 FROM ({inner})t )t2 WHERE t2.ROWNUM_1 BETWEEN 6 AND 15")
        );
    }

    #[test]
    fn largest_offset_saturates() {
        let p = Pagination::new(Some(10), Some(u64::MAX));
        assert_eq!(
            p.apply(Dialect::Oracle, "S"),
            format!("SELECT * FROM (  SELECT t.*, ROWNUM ROWNUM_1 FROM (S)t )t2 WHERE t2.ROWNUM_1 BETWEEN {0} AND {0}", u64::MAX)
        );
        assert!(!p.admits(1));
    }

    #[test]
    fn zero_offset_is_no_offset() {
        let p = Pagination::new(Some(3), Some(0));
        assert_eq!(p.apply(Dialect::Postgres, "SELECT 1"), "SELECT 1 LIMIT 3");
        assert_eq!(Pagination::new(None, Some(0)).apply(Dialect::Oracle, "SELECT 1"), "SELECT 1");
    }

    #[test]
    fn native_forms() {
        let both = Pagination::new(Some(10), Some(20));
        let offset_only = Pagination::new(None, Some(20));
        assert_eq!(both.apply(Dialect::Mysql, "S"), "S LIMIT 20, 10");
        assert_eq!(offset_only.apply(Dialect::Mysql, "S"), "S LIMIT 20, 18446744073709551615");
        assert_eq!(offset_only.apply(Dialect::Sqlite, "S"), "S LIMIT -1 OFFSET 20");
        assert_eq!(offset_only.apply(Dialect::Postgres, "S"), "S OFFSET 20");
        assert_eq!(both.apply(Dialect::Postgres, "S"), "S LIMIT 10 OFFSET 20");
    }

    /// Numbering the rows and filtering must keep exactly `[O, O+L)`.
    #[test]
    fn row_number_filter_matches_native_slice() {
        let rows: Vec<u64> = (0..23).collect();
        for offset in 0..30u64 {
            for limit in 1..30u64 {
                let p = Pagination::new(Some(limit), Some(offset));
                let kept: Vec<u64> = rows
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| p.admits(*i as u64 + 1))
                    .map(|(_, row)| *row)
                    .collect();
                let start = (offset as usize).min(rows.len());
                let end = ((offset + limit) as usize).min(rows.len());
                assert_eq!(kept, rows[start..end].to_vec(), "limit={limit} offset={offset}");
            }
        }
    }

    #[test]
    fn limit_only_and_offset_only_admit_expected_rows() {
        let limit = Pagination::new(Some(2), None);
        assert!(limit.admits(2) && !limit.admits(3));
        let offset = Pagination::new(None, Some(2));
        assert!(!offset.admits(2) && offset.admits(3));
    }
}

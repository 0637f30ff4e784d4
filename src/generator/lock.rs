use super::QueryGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockLevel {
    #[default]
    Update,
    Share,
    KeyShare,
    NoKeyUpdate,
}

/// Row lock requested on a SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lock {
    pub level: LockLevel,
    /// Restrict the lock to one table (model name), where supported.
    pub of: Option<String>,
}

impl Lock {
    #[must_use]
    pub fn update() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn level(level: LockLevel) -> Self {
        Self { level, of: None }
    }

    #[must_use]
    pub fn of(mut self, table: impl Into<String>) -> Self {
        self.of = Some(table.into());
        self
    }
}

impl QueryGenerator {
    /// Locking suffix (with leading space), or empty when unsupported.
    pub(crate) fn lock_clause(&self, lock: &Lock) -> String {
        let supports = self.dialect.supports();
        if !supports.lock {
            return String::new();
        }
        let mut clause = match lock.level {
            LockLevel::KeyShare if supports.lock_key => " FOR KEY SHARE".to_string(),
            LockLevel::NoKeyUpdate if supports.lock_key => " FOR NO KEY UPDATE".to_string(),
            LockLevel::Share => format!(" {}", supports.for_share),
            _ => " FOR UPDATE".to_string(),
        };
        if let Some(of) = &lock.of
            && supports.lock_of
        {
            clause.push_str(" OF ");
            clause.push_str(&self.quote(of));
        }
        clause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dialect;

    #[test]
    fn lock_strengths_by_dialect() {
        let pg = QueryGenerator::new(Dialect::Postgres);
        assert_eq!(pg.lock_clause(&Lock::level(LockLevel::KeyShare)), " FOR KEY SHARE");
        assert_eq!(pg.lock_clause(&Lock::level(LockLevel::Share).of("users")), " FOR SHARE OF \"users\"");

        let mysql = QueryGenerator::new(Dialect::Mysql);
        assert_eq!(mysql.lock_clause(&Lock::level(LockLevel::Share)), " LOCK IN SHARE MODE");
        assert_eq!(mysql.lock_clause(&Lock::level(LockLevel::NoKeyUpdate)), " FOR UPDATE");

        let oracle = QueryGenerator::new(Dialect::Oracle);
        assert_eq!(oracle.lock_clause(&Lock::update().of("users")), " FOR UPDATE OF \"users\"");

        assert_eq!(QueryGenerator::new(Dialect::Sqlite).lock_clause(&Lock::update()), "");
    }
}

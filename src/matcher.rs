use regex::Regex;
use tracing::debug;

use crate::error::{GridError, Result};
use crate::schema::ObjectType;

/// A pattern as supplied by a caller: either source text or an already
/// compiled expression. Always compiled before it is stored in a [`Matcher`].
#[derive(Debug, Clone)]
pub enum PatternSource {
    Expr(String),
    Compiled(Regex),
}

impl PatternSource {
    pub fn compile(self) -> Result<Regex> {
        match self {
            PatternSource::Expr(expr) => {
                Regex::new(&expr).map_err(|source| GridError::InvalidPattern {
                    pattern: expr,
                    source,
                })
            }
            PatternSource::Compiled(regex) => Ok(regex),
        }
    }
}

impl From<&str> for PatternSource {
    fn from(value: &str) -> Self {
        PatternSource::Expr(value.to_string())
    }
}

impl From<String> for PatternSource {
    fn from(value: String) -> Self {
        PatternSource::Expr(value)
    }
}

impl From<Regex> for PatternSource {
    fn from(value: Regex) -> Self {
        PatternSource::Compiled(value)
    }
}

/// One tracked column: where to look, what to look for, and how often it
/// has matched so far in this session.
#[derive(Debug, Clone)]
pub struct Matcher {
    object_type: ObjectType,
    column_name: String,
    column_index: usize,
    pattern: Regex,
    group_by: bool,
    match_count: usize,
}

impl Matcher {
    pub fn new(
        object_type: ObjectType,
        column_name: &str,
        pattern: impl Into<PatternSource>,
        group_by: bool,
    ) -> Result<Self> {
        let column_name = column_name.to_lowercase();
        let column_index = object_type.column_index(&column_name)?;
        let pattern = pattern.into().compile()?;
        Ok(Self {
            object_type,
            column_name,
            column_index,
            pattern,
            group_by,
            match_count: 0,
        })
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn is_group_by(&self) -> bool {
        self.group_by
    }

    /// Rows matched across every poll of the session.
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    pub fn is_match(&self, cell: &str) -> bool {
        self.pattern.is_match(cell)
    }

    pub(crate) fn record_match(&mut self) {
        self.match_count += 1;
    }
}

/// Ordered matchers applied to every row by the tally engine.
#[derive(Debug, Clone, Default)]
pub struct MatcherRegistry {
    matchers: Vec<Matcher>,
}

impl MatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for status tracking: identifier matcher first, then the
    /// group-by status matcher.
    pub fn for_status(
        object_type: ObjectType,
        id_column: &str,
        status_column: &str,
        id_pattern: impl Into<PatternSource>,
        status_pattern: impl Into<PatternSource>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        registry.add(object_type, id_column, id_pattern, false)?;
        registry.add(object_type, status_column, status_pattern, true)?;
        Ok(registry)
    }

    pub fn add(
        &mut self,
        object_type: ObjectType,
        column_name: &str,
        pattern: impl Into<PatternSource>,
        group_by: bool,
    ) -> Result<&mut Self> {
        let matcher = Matcher::new(object_type, column_name, pattern, group_by)?;
        debug!(
            object_type = %matcher.object_type,
            column = %matcher.column_name,
            index = matcher.column_index,
            pattern = %matcher.pattern,
            group_by = matcher.group_by,
            "matcher added"
        );
        self.matchers.push(matcher);
        Ok(self)
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    pub(crate) fn matchers_mut(&mut self) -> &mut [Matcher] {
        &mut self.matchers
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn identifier(&self) -> Option<&Matcher> {
        self.matchers.first()
    }

    pub fn status(&self) -> Option<&Matcher> {
        self.matchers.get(1)
    }
}

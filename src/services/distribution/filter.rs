//! Dialect-independent filter expression model.
//!
//! A rule carries four filter categories that are ANDed together. String and
//! form categories are a disjunction of expressions, each expression a
//! conjunction of parts. Negated parts act as category-wide exclusions.

use crate::services::game_data::FormRef;
use serde::Serialize;

/// Lowest and highest actor-value index a skill clause may target.
pub const SKILL_INDEX_MIN: u32 = 6;
pub const SKILL_INDEX_MAX: u32 = 23;

/// String literal with its case-folded form cached for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLiteral {
    text: String,
    #[serde(skip)]
    folded: String,
}

impl TextLiteral {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let folded = text.to_lowercase();
        Self { text, folded }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPart<T> {
    pub value: T,
    pub negated: bool,
    pub wildcard: bool,
}

impl<T> FilterPart<T> {
    pub fn include(value: T) -> Self {
        Self {
            value,
            negated: false,
            wildcard: false,
        }
    }

    pub fn exclude(value: T) -> Self {
        Self {
            value,
            negated: true,
            wildcard: false,
        }
    }

    pub fn wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }
}

/// Conjunction of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterExpression<T> {
    pub parts: Vec<FilterPart<T>>,
}

impl<T> FilterExpression<T> {
    pub fn new(parts: Vec<FilterPart<T>>) -> Self {
        Self { parts }
    }
}

/// Disjunction of expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSet<T> {
    pub expressions: Vec<FilterExpression<T>>,
}

impl<T> Default for FilterSet<T> {
    fn default() -> Self {
        Self {
            expressions: Vec::new(),
        }
    }
}

impl<T: Clone> FilterSet<T> {
    pub fn new(expressions: Vec<FilterExpression<T>>) -> Self {
        let expressions = expressions
            .into_iter()
            .filter(|expression| !expression.parts.is_empty())
            .collect();
        Self { expressions }
    }

    /// All values must be present.
    pub fn all_of(parts: Vec<FilterPart<T>>) -> Self {
        Self::new(vec![FilterExpression::new(parts)])
    }

    /// Any one value suffices.
    pub fn any_of(parts: Vec<FilterPart<T>>) -> Self {
        Self::new(
            parts
                .into_iter()
                .map(|part| FilterExpression::new(vec![part]))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    pub fn parts(&self) -> impl Iterator<Item = &FilterPart<T>> {
        self.expressions.iter().flat_map(|e| e.parts.iter())
    }

    pub fn included(&self) -> impl Iterator<Item = &FilterPart<T>> {
        self.parts().filter(|part| !part.negated)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &FilterPart<T>> {
        self.parts().filter(|part| part.negated)
    }

    /// Conjoin two sets, distributing so the result stays OR-of-ANDs.
    pub fn and(self, other: FilterSet<T>) -> FilterSet<T> {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let mut expressions = Vec::with_capacity(self.expressions.len() * other.expressions.len());
        for left in &self.expressions {
            for right in &other.expressions {
                let mut parts = left.parts.clone();
                parts.extend(right.parts.iter().cloned());
                expressions.push(FilterExpression::new(parts));
            }
        }
        FilterSet { expressions }
    }

    /// Evaluate with `matches` deciding whether one part's value is present.
    ///
    /// Empty set: true. Any present exclusion: false. Otherwise true when there
    /// are no inclusions, or when one expression has all inclusions present.
    pub fn evaluate(&self, mut matches: impl FnMut(&FilterPart<T>) -> bool) -> bool {
        if self.is_empty() {
            return true;
        }
        if self.excluded().any(&mut matches) {
            return false;
        }
        let mut has_inclusion = false;
        for expression in &self.expressions {
            let mut included = expression.parts.iter().filter(|p| !p.negated).peekable();
            if included.peek().is_none() {
                continue;
            }
            has_inclusion = true;
            if included.all(&mut matches) {
                return true;
            }
        }
        !has_inclusion
    }
}

pub type StringFilter = FilterSet<TextLiteral>;
pub type FormFilter = FilterSet<FormRef>;

/// One numeric range; `attribute` scopes it to an actor value instead of level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelClause {
    pub attribute: Option<u32>,
    pub min: u16,
    pub max: Option<u16>,
}

impl LevelClause {
    pub fn level(min: u16, max: Option<u16>) -> Self {
        Self {
            attribute: None,
            min,
            max,
        }
    }

    pub fn skill(index: u32, min: u16, max: Option<u16>) -> Self {
        Self {
            attribute: Some(index),
            min,
            max,
        }
    }

    pub fn contains(&self, value: u16) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }

    /// Skill clauses outside the valid actor-value range never constrain.
    pub fn is_checked_attribute(index: u32) -> bool {
        (SKILL_INDEX_MIN..=SKILL_INDEX_MAX).contains(&index)
    }

    pub fn render(&self) -> String {
        let range = match self.max {
            Some(max) => format!("{}/{}", self.min, max),
            None => self.min.to_string(),
        };
        match self.attribute {
            Some(index) => format!("{index}({range})"),
            None => range,
        }
    }
}

/// All clauses must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelFilter {
    pub clauses: Vec<LevelClause>,
}

impl LevelFilter {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Tri-state trait requirements; `None` means "don't care".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitFilter {
    pub female: Option<bool>,
    pub unique: Option<bool>,
    pub summonable: Option<bool>,
    pub child: Option<bool>,
    pub leveled: Option<bool>,
}

impl TraitFilter {
    pub fn is_empty(&self) -> bool {
        self.female.is_none()
            && self.unique.is_none()
            && self.summonable.is_none()
            && self.child.is_none()
            && self.leveled.is_none()
    }
}

/// Which categories a rule actually uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUsage {
    pub strings: bool,
    pub forms: bool,
    pub levels: bool,
    pub traits: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFilters {
    pub strings: StringFilter,
    pub forms: FormFilter,
    pub levels: LevelFilter,
    pub traits: TraitFilter,
}

impl RuleFilters {
    /// True when no category constrains anything ("applies to all").
    pub fn is_unfiltered(&self) -> bool {
        self.strings.is_empty()
            && self.forms.is_empty()
            && self.levels.is_empty()
            && self.traits.is_empty()
    }

    pub fn usage(&self) -> FilterUsage {
        FilterUsage {
            strings: !self.strings.is_empty(),
            forms: !self.forms.is_empty(),
            levels: !self.levels.is_empty(),
            traits: !self.traits.is_empty(),
        }
    }

    /// Non-wildcard string literals, case-folded. Used for tag dependencies.
    pub fn named_tags(&self) -> impl Iterator<Item = &str> {
        self.strings
            .parts()
            .filter(|part| !part.wildcard)
            .map(|part| part.value.folded())
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;

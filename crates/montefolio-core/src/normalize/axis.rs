//! Ticker-axis resolution for wide (two-level) column keys.
//!
//! Providers disagree on whether the outer key level holds tickers or field
//! names, and some hand back both orders depending on the request. The
//! resolver is a pure function over the keys so every ambiguous layout can be
//! tested on its own.

/// Placeholder ticker used when no axis can be identified.
pub const PLACEHOLDER_TICKER: &str = "UNKNOWN";

/// Tickers are at most this many characters in rule 2.
pub const MAX_TICKER_LEN: usize = 10;

const FIELD_NAMES: [&str; 10] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "adj close",
    "adjclose",
    "adj_close",
    "adj",
    "date",
];

/// Which level of a two-level key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Outer,
    Inner,
}

impl Axis {
    pub fn pick<'a>(self, outer: &'a str, inner: &'a str) -> &'a str {
        match self {
            Self::Outer => outer,
            Self::Inner => inner,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            Self::Outer => Self::Inner,
            Self::Inner => Self::Outer,
        }
    }
}

/// Rule that produced an [`AxisResolution`], in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionRule {
    /// Exactly one axis holds values that are not field names.
    NonFieldAxis,
    /// Both axes hold non-field values; the one with short, symbol-like values wins.
    ShortValues,
    /// The first column's key has exactly one non-field component.
    FirstColumn,
    /// Nothing resolved; every column belongs to [`PLACEHOLDER_TICKER`].
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisResolution {
    pub rule: ResolutionRule,
    /// Axis holding tickers; `None` for the placeholder rule.
    pub axis: Option<Axis>,
    /// Tickers in first-appearance order.
    pub tickers: Vec<String>,
}

impl AxisResolution {
    fn on_axis(rule: ResolutionRule, axis: Axis, tickers: Vec<String>) -> Self {
        Self {
            rule,
            axis: Some(axis),
            tickers,
        }
    }

    fn placeholder() -> Self {
        Self {
            rule: ResolutionRule::Placeholder,
            axis: None,
            tickers: vec![String::from(PLACEHOLDER_TICKER)],
        }
    }

    /// True when a fallback rule (3 or 4) was needed.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self.rule,
            ResolutionRule::FirstColumn | ResolutionRule::Placeholder
        )
    }

    /// Field-name component of `key` under this resolution.
    pub fn field_component<'a>(&self, outer: &'a str, inner: &'a str) -> &'a str {
        match self.axis {
            Some(axis) => axis.other().pick(outer, inner),
            None if is_field_name(outer) && !is_field_name(inner) => outer,
            None => inner,
        }
    }

    /// Ticker component of `key`, or `None` when the key belongs to no resolved ticker.
    pub fn ticker_component<'a>(&self, outer: &'a str, inner: &'a str) -> Option<&'a str> {
        match self.axis {
            Some(axis) => Some(axis.pick(outer, inner)),
            None => None,
        }
    }
}

pub fn is_field_name(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    FIELD_NAMES.contains(&normalized.as_str())
}

/// Decides which key level enumerates tickers.
pub fn resolve_ticker_axis(keys: &[(String, String)]) -> AxisResolution {
    let outer = non_field_values(keys, Axis::Outer);
    let inner = non_field_values(keys, Axis::Inner);

    match (outer.is_empty(), inner.is_empty()) {
        (false, true) => {
            return AxisResolution::on_axis(ResolutionRule::NonFieldAxis, Axis::Outer, outer)
        }
        (true, false) => {
            return AxisResolution::on_axis(ResolutionRule::NonFieldAxis, Axis::Inner, inner)
        }
        (false, false) => match (all_short(&outer), all_short(&inner)) {
            (true, _) => {
                return AxisResolution::on_axis(ResolutionRule::ShortValues, Axis::Outer, outer)
            }
            (false, true) => {
                return AxisResolution::on_axis(ResolutionRule::ShortValues, Axis::Inner, inner)
            }
            (false, false) => {}
        },
        (true, true) => {}
    }

    if let Some((first_outer, first_inner)) = keys.first() {
        match (is_field_name(first_outer), is_field_name(first_inner)) {
            (false, true) => {
                return AxisResolution::on_axis(
                    ResolutionRule::FirstColumn,
                    Axis::Outer,
                    vec![first_outer.clone()],
                )
            }
            (true, false) => {
                return AxisResolution::on_axis(
                    ResolutionRule::FirstColumn,
                    Axis::Inner,
                    vec![first_inner.clone()],
                )
            }
            _ => {}
        }
    }

    AxisResolution::placeholder()
}

fn non_field_values(keys: &[(String, String)], axis: Axis) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for (outer, inner) in keys {
        let value = axis.pick(outer, inner);
        if !is_field_name(value) && !values.iter().any(|seen| seen == value) {
            values.push(value.to_owned());
        }
    }
    values
}

fn all_short(values: &[String]) -> bool {
    values
        .iter()
        .all(|value| value.trim().chars().count() <= MAX_TICKER_LEN)
}

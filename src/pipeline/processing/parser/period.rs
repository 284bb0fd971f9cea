use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::YearRoundPolicy;
use crate::domain::Quarter;

// "1/4분기", "1/4" (when a later marker carries 분기), "2분기", "Q3".
// Hangul counts as a word character, so `\b` cannot separate "년1/4분기";
// the preceding character is checked in `markers` instead.
static QUARTER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*/\s*4(?:\s*분기)?|(\d+)\s*분기|[Qq]\s*(\d+)")
        .expect("quarter marker pattern compiles")
});

// "1~3월", "'24.1~3월", "'23.7월 ~'23.9월", "2024년 5월", "12월"
static MONTH_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:['‘’](\d{2})|(\d{4})\s*년?)?\s*\.?\s*(\d{1,2})\s*월?\s*(?:[~∼〜～\-–—]\s*(?:['‘’](\d{2})|(\d{4})\s*년?)?\s*\.?\s*(\d{1,2})\s*)?월",
    )
    .expect("month span pattern compiles")
});

static YEAR_ROUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"연중|(?i:year[\s-]?round)").expect("year-round pattern compiles"));

const RANGE_CONNECTORS: &[&str] = &["~", "∼", "〜", "～", "-", "–", "—"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    SingleQuarter,
    QuarterRange,
    QuarterList,
    SingleMonth,
    MonthRange,
    /// Several month spans in one expression
    MonthList,
    YearRound,
    Unparsed,
}

/// One quarter-sized unit of an expression, with calendar bounds when the
/// quarter is known.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicPeriod {
    pub quarter: Option<Quarter>,
    pub month_start: Option<u32>,
    pub month_end: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AtomicPeriod {
    fn for_quarter(quarter: Quarter, year: i32) -> Self {
        let bounds = quarter.date_bounds(year);
        Self {
            quarter: Some(quarter),
            month_start: Some(quarter.month_start()),
            month_end: Some(quarter.month_end()),
            start_date: bounds.map(|(start, _)| start),
            end_date: bounds.map(|(_, end)| end),
        }
    }

    /// A month span. The quarter is set only when the span sits inside one
    /// quarter of one year.
    fn for_months(span: MonthSpan) -> Option<Self> {
        let start_date = NaiveDate::from_ymd_opt(span.start_year, span.start_month, 1)?;
        let end_date = last_day_of_month(span.end_year, span.end_month)?;
        let quarter_of = |month: u32| (month - 1) / 3 + 1;
        let quarter = (span.start_year == span.end_year
            && quarter_of(span.start_month) == quarter_of(span.end_month))
        .then(|| u8::try_from(quarter_of(span.start_month)).ok().and_then(Quarter::new))
        .flatten();

        Some(Self {
            quarter,
            month_start: Some(span.start_month),
            month_end: Some(span.end_month),
            start_date: Some(start_date),
            end_date: Some(end_date),
        })
    }

    fn unparsed() -> Self {
        Self {
            quarter: None,
            month_start: None,
            month_end: None,
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSplit {
    pub original: String,
    pub kind: PeriodKind,
    pub periods: Vec<AtomicPeriod>,
}

impl PeriodSplit {
    pub fn is_parsed(&self) -> bool {
        self.kind != PeriodKind::Unparsed
    }

    pub fn quarters(&self) -> Vec<Option<u8>> {
        self.periods
            .iter()
            .map(|p| p.quarter.map(|q| q.value()))
            .collect()
    }
}

/// Splits compound period expressions into atomic quarter tokens
pub struct PeriodSplitter;

impl PeriodSplitter {
    /// True when the text carries any quarter, month or year-round marker
    pub fn has_period_marker(text: &str) -> bool {
        !Self::markers(text).is_empty() || MONTH_SPAN.is_match(text) || YEAR_ROUND.is_match(text)
    }

    pub fn split(expression: &str, year: i32, policy: YearRoundPolicy) -> PeriodSplit {
        let original = expression.trim().to_string();
        let markers = Self::markers(&original);

        if markers.is_empty() {
            if MONTH_SPAN.is_match(&original) {
                return Self::split_months(original, year);
            }
            if YEAR_ROUND.is_match(&original) {
                let periods = Self::year_round_quarters(policy)
                    .into_iter()
                    .map(|q| AtomicPeriod::for_quarter(q, year))
                    .collect();
                return PeriodSplit {
                    original,
                    kind: PeriodKind::YearRound,
                    periods,
                };
            }
            return Self::unparsed(original);
        }

        let mut quarters = Vec::with_capacity(markers.len());
        for marker in &markers {
            match u8::try_from(marker.value).ok().and_then(Quarter::new) {
                Some(q) => quarters.push(q),
                None => return Self::unparsed(original),
            }
        }

        let mut set = BTreeSet::new();
        let mut ranges = 0;
        let mut index = 0;
        while index < markers.len() {
            let joined = index + 1 < markers.len()
                && Self::is_range_gap(&original[markers[index].end..markers[index + 1].start]);
            if joined {
                let (lo, hi) = if quarters[index] <= quarters[index + 1] {
                    (quarters[index].value(), quarters[index + 1].value())
                } else {
                    (quarters[index + 1].value(), quarters[index].value())
                };
                set.extend((lo..=hi).filter_map(Quarter::new));
                ranges += 1;
                index += 2;
            } else {
                set.insert(quarters[index]);
                index += 1;
            }
        }

        let kind = match (markers.len(), ranges) {
            (1, _) => PeriodKind::SingleQuarter,
            (2, 1) => PeriodKind::QuarterRange,
            _ => PeriodKind::QuarterList,
        };

        PeriodSplit {
            original,
            kind,
            periods: set
                .into_iter()
                .map(|q| AtomicPeriod::for_quarter(q, year))
                .collect(),
        }
    }

    fn year_round_quarters(policy: YearRoundPolicy) -> Vec<Quarter> {
        let quarters = (1..=4).filter_map(Quarter::new);
        match policy {
            YearRoundPolicy::Sentinel => vec![Quarter::YEAR_ROUND],
            YearRoundPolicy::ExpandQuarters => quarters.collect(),
            YearRoundPolicy::ExpandQuartersWithSentinel => {
                quarters.chain(std::iter::once(Quarter::YEAR_ROUND)).collect()
            }
        }
    }

    /// Month spans become one token each, deduplicated and in date order
    fn split_months(original: String, year: i32) -> PeriodSplit {
        let mut spans = BTreeSet::new();
        let mut malformed = false;
        for caps in MONTH_SPAN.captures_iter(&original) {
            let Some(whole) = caps.get(0) else { continue };
            if preceded_by(&original, whole.start(), |c| c.is_ascii_digit()) {
                continue;
            }
            let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
            let start_year = number(1).map(|yy| 2000 + yy).or(number(2)).unwrap_or(year);
            let end_year = number(4).map(|yy| 2000 + yy).or(number(5)).unwrap_or(start_year);
            let Some(start_month) = number(3).and_then(|m| u32::try_from(m).ok()) else {
                continue;
            };
            let end_month = number(6)
                .and_then(|m| u32::try_from(m).ok())
                .unwrap_or(start_month);
            if !(1..=12).contains(&start_month) || !(1..=12).contains(&end_month) {
                malformed = true;
                break;
            }

            let mut span = MonthSpan {
                start_year,
                start_month,
                end_year,
                end_month,
            };
            if (span.end_year, span.end_month) < (span.start_year, span.start_month) {
                span = MonthSpan {
                    start_year: end_year,
                    start_month: end_month,
                    end_year: start_year,
                    end_month: start_month,
                };
            }
            spans.insert(span);
        }
        if malformed {
            return Self::unparsed(original);
        }

        let Some(periods) = spans
            .iter()
            .map(|span| AtomicPeriod::for_months(*span))
            .collect::<Option<Vec<_>>>()
        else {
            return Self::unparsed(original);
        };
        let kind = match spans.iter().next() {
            None => return Self::unparsed(original),
            Some(_) if spans.len() > 1 => PeriodKind::MonthList,
            Some(span) if span.start_year == span.end_year && span.start_month == span.end_month => {
                PeriodKind::SingleMonth
            }
            Some(_) => PeriodKind::MonthRange,
        };

        PeriodSplit {
            original,
            kind,
            periods,
        }
    }

    fn markers(text: &str) -> Vec<Marker> {
        QUARTER_MARKER
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let glued = if caps.get(3).is_some() {
                    preceded_by(text, whole.start(), |c| c.is_ascii_alphanumeric())
                } else {
                    preceded_by(text, whole.start(), |c| c.is_ascii_digit())
                };
                if glued {
                    return None;
                }
                let digits = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
                Some(Marker {
                    start: whole.start(),
                    end: whole.end(),
                    // Oversized digit runs are malformed, not a panic
                    value: digits.as_str().parse().unwrap_or(u32::MAX),
                })
            })
            .collect()
    }

    fn is_range_gap(gap: &str) -> bool {
        RANGE_CONNECTORS.contains(&gap.trim())
    }

    fn unparsed(original: String) -> PeriodSplit {
        PeriodSplit {
            original,
            kind: PeriodKind::Unparsed,
            periods: vec![AtomicPeriod::unparsed()],
        }
    }
}

struct Marker {
    start: usize,
    end: usize,
    value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MonthSpan {
    start_year: i32,
    start_month: u32,
    end_year: i32,
    end_month: u32,
}

fn preceded_by(text: &str, index: usize, test: impl Fn(char) -> bool) -> bool {
    text[..index].chars().next_back().is_some_and(test)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> PeriodSplit {
        PeriodSplitter::split(text, 2024, YearRoundPolicy::Sentinel)
    }

    #[test]
    fn quarter_range_yields_one_token_per_quarter() {
        let result = split("1/4분기~2/4분기");
        assert_eq!(result.kind, PeriodKind::QuarterRange);
        assert_eq!(result.quarters(), vec![Some(1), Some(2)]);
        assert_eq!(result.original, "1/4분기~2/4분기");

        let q2 = &result.periods[1];
        assert_eq!(q2.start_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(q2.end_date, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn accepts_q_notation_and_alternate_connectors() {
        assert_eq!(split("Q1~Q3").quarters(), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(split("2/4분기 – 4/4분기").quarters(), vec![Some(2), Some(3), Some(4)]);
        assert_eq!(split("1/4 ∼ 2/4분기").quarters(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn reversed_range_is_ascending() {
        let result = split("3/4분기~1/4분기");
        assert_eq!(result.quarters(), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn single_quarter_yields_one_token() {
        let result = split("3/4분기");
        assert_eq!(result.kind, PeriodKind::SingleQuarter);
        assert_eq!(result.quarters(), vec![Some(3)]);
        assert_eq!(result.periods[0].month_start, Some(7));
        assert_eq!(result.periods[0].month_end, Some(9));
    }

    #[test]
    fn separate_markers_are_deduplicated_and_sorted() {
        let result = split("4/4분기, 1/4분기, 4/4분기");
        assert_eq!(result.kind, PeriodKind::QuarterList);
        assert_eq!(result.quarters(), vec![Some(1), Some(4)]);
    }

    #[test]
    fn year_round_follows_policy() {
        let sentinel = PeriodSplitter::split("연중", 2024, YearRoundPolicy::Sentinel);
        assert_eq!(sentinel.kind, PeriodKind::YearRound);
        assert_eq!(sentinel.quarters(), vec![Some(0)]);
        assert_eq!(sentinel.periods[0].start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(sentinel.periods[0].end_date, NaiveDate::from_ymd_opt(2024, 12, 31));

        let expanded = PeriodSplitter::split("연중", 2024, YearRoundPolicy::ExpandQuarters);
        assert_eq!(expanded.quarters(), vec![Some(1), Some(2), Some(3), Some(4)]);

        let both =
            PeriodSplitter::split("Year-round", 2024, YearRoundPolicy::ExpandQuartersWithSentinel);
        assert_eq!(
            both.quarters(),
            vec![Some(1), Some(2), Some(3), Some(4), Some(0)]
        );
    }

    #[test]
    fn malformed_expressions_fall_back_to_one_unparsed_token() {
        for text in ["상반기", "5/4분기", "", "Q9~Q2"] {
            let result = split(text);
            assert_eq!(result.kind, PeriodKind::Unparsed, "{}", text);
            assert_eq!(result.quarters(), vec![None]);
            assert_eq!(result.original, text.trim());
        }
    }

    #[test]
    fn detects_period_markers() {
        assert!(PeriodSplitter::has_period_marker("1/4분기"));
        assert!(PeriodSplitter::has_period_marker("연중"));
        assert!(PeriodSplitter::has_period_marker("'24.1~3월"));
        assert!(!PeriodSplitter::has_period_marker("추진일정"));
        assert!(!PeriodSplitter::has_period_marker("3개월 이내"));
    }

    #[test]
    fn marker_glued_to_hangul_keeps_its_quarter() {
        let result = split("2024년1/4분기");
        assert_eq!(result.kind, PeriodKind::SingleQuarter);
        assert_eq!(result.quarters(), vec![Some(1)]);

        assert_eq!(split("24년2/4분기~3/4분기").quarters(), vec![Some(2), Some(3)]);
        assert_eq!(split("사업Q3").quarters(), vec![Some(3)]);
        assert_eq!(split("FAQ3").kind, PeriodKind::Unparsed);
    }

    #[test]
    fn month_range_with_short_year() {
        let result = split("'24.1~3월");
        assert_eq!(result.kind, PeriodKind::MonthRange);
        assert_eq!(result.periods.len(), 1);
        let span = &result.periods[0];
        assert_eq!((span.month_start, span.month_end), (Some(1), Some(3)));
        assert_eq!(span.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(span.end_date, NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(result.quarters(), vec![Some(1)]);
        assert!(result.is_parsed());
    }

    #[test]
    fn month_markers_joined_across_a_connector() {
        let result = split("'23.7월 ~'23.9월");
        assert_eq!(result.kind, PeriodKind::MonthRange);
        let span = &result.periods[0];
        assert_eq!((span.month_start, span.month_end), (Some(7), Some(9)));
        assert_eq!(span.start_date, NaiveDate::from_ymd_opt(2023, 7, 1));
        assert_eq!(span.end_date, NaiveDate::from_ymd_opt(2023, 9, 30));
        assert_eq!(result.quarters(), vec![Some(3)]);

        // Spans wider than one quarter keep the months but no quarter
        let wide = split("'23.1월 ~'23.5월");
        assert_eq!(wide.quarters(), vec![None]);
        assert_eq!(wide.periods[0].month_end, Some(5));
        assert!(wide.is_parsed());
    }

    #[test]
    fn single_month_uses_the_given_year() {
        let result = split("12월");
        assert_eq!(result.kind, PeriodKind::SingleMonth);
        assert_eq!(result.periods[0].start_date, NaiveDate::from_ymd_opt(2024, 12, 1));
        assert_eq!(result.periods[0].end_date, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(result.quarters(), vec![Some(4)]);

        let feb = split("'24.2월");
        assert_eq!(feb.periods[0].end_date, NaiveDate::from_ymd_opt(2024, 2, 29));
    }

    #[test]
    fn several_month_spans_yield_one_token_each() {
        let result = split("'24.1~12월 '24.11월 '24.12월 '24.1~12월");
        assert_eq!(result.kind, PeriodKind::MonthList);
        let spans: Vec<_> = result
            .periods
            .iter()
            .map(|p| (p.month_start, p.month_end))
            .collect();
        assert_eq!(
            spans,
            vec![(Some(1), Some(12)), (Some(11), Some(11)), (Some(12), Some(12))]
        );
        assert_eq!(result.quarters(), vec![None, Some(4), Some(4)]);
    }

    #[test]
    fn month_span_across_years_and_bad_months() {
        let result = split("'23.11월~'24.2월");
        assert_eq!(result.kind, PeriodKind::MonthRange);
        assert_eq!(result.periods[0].start_date, NaiveDate::from_ymd_opt(2023, 11, 1));
        assert_eq!(result.periods[0].end_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(result.quarters(), vec![None]);

        assert_eq!(split("13월").kind, PeriodKind::Unparsed);
        assert_eq!(split("3~1월").periods[0].month_start, Some(1));
    }
}

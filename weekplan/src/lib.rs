//! Week planner domain library.
//!
//! Syllabus documents ("studiewijzers") arrive as loosely shaped rows with week
//! numbers that follow whatever convention their author used. This crate maps
//! them onto one canonical ISO-week timeline and aggregates per-subject content
//! into the grid consumed by the week, matrix and deadline views.
//!
//! Layout mirrors the data flow: `core` (model) → `isoweek` → `resolver` →
//! `text`/`splitter` → `aggregate` → `state`, with `projectors` and `storage`
//! on the edges.

pub mod core {
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use serde_with::{DefaultOnNull, serde_as};
    use std::{collections::BTreeMap, fmt};

    /* ------------------------------- IDs ------------------------------- */

    /// Identifier assigned by the upload backend.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DocumentId(pub String);

    impl From<&str> for DocumentId {
        fn from(s: &str) -> Self {
            Self(s.to_string())
        }
    }

    impl fmt::Display for DocumentId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// A canonical (ISO week-year, week) pair. Field order gives chronological `Ord`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct IsoWeekRef {
        pub iso_year: i32,
        pub week: u32,
    }

    impl IsoWeekRef {
        /// Stable timeline identifier, e.g. `2024-W05`.
        pub fn id(&self) -> String {
            format!("{}-W{:02}", self.iso_year, self.week)
        }
    }

    impl fmt::Display for IsoWeekRef {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}-W{:02}", self.iso_year, self.week)
        }
    }

    /* ------------------------------ Inputs ------------------------------ */

    /// One uploaded syllabus.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SourceDocument {
        pub id: DocumentId,
        #[serde(alias = "vak")]
        pub subject: String,
        #[serde(default, alias = "niveau", deserialize_with = "lenient_label::deserialize")]
        pub level: Option<String>,
        #[serde(default, alias = "leerjaar", deserialize_with = "lenient_label::deserialize")]
        pub grade: Option<String>,
        #[serde(default, alias = "periode", deserialize_with = "lenient_label::deserialize")]
        pub period: Option<String>,
        /// Raw first week as written in the document; validity is checked at use.
        #[serde(default, deserialize_with = "lenient_week::deserialize")]
        pub begin_week: Option<i64>,
        #[serde(
            default,
            rename = "eindWeek",
            alias = "endWeek",
            deserialize_with = "lenient_week::deserialize"
        )]
        pub end_week: Option<i64>,
        /// School year such as `2024/2025`.
        #[serde(default, alias = "schooljaar")]
        pub school_year: Option<String>,
        #[serde(default = "SourceDocument::default_enabled")]
        pub enabled: bool,
    }

    impl SourceDocument {
        pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
            Self {
                id: DocumentId(id.into()),
                subject: subject.into(),
                level: None,
                grade: None,
                period: None,
                begin_week: None,
                end_week: None,
                school_year: None,
                enabled: true,
            }
        }

        fn default_enabled() -> bool {
            true
        }
    }

    /// One lesson entry extracted from a document. Never mutated by aggregation.
    #[serde_as]
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SourceRow {
        #[serde(default, deserialize_with = "lenient_week::deserialize")]
        pub week: Option<i64>,
        /// Lesson date; non `YYYY-MM-DD` strings deserialize to `None`.
        #[serde(default, alias = "datum", with = "lenient_date")]
        pub date: Option<NaiveDate>,
        #[serde(default, alias = "inleverdatum", with = "lenient_date")]
        pub due_date: Option<NaiveDate>,
        #[serde(default, alias = "onderwerp")]
        pub topic: Option<String>,
        #[serde(default, alias = "les")]
        pub lesson: Option<String>,
        #[serde_as(as = "DefaultOnNull")]
        #[serde(default, alias = "leerdoelen")]
        pub learning_goals: Vec<String>,
        #[serde(default, alias = "huiswerk")]
        pub homework: Option<String>,
        #[serde(default, alias = "opdracht")]
        pub assignment: Option<String>,
        #[serde(default, alias = "toets")]
        pub test: Option<TestInfo>,
        #[serde(default, alias = "notities", alias = "opmerkingen")]
        pub notes: Option<String>,
        #[serde(default, alias = "multiWeek")]
        pub span: Option<SpanSource>,
    }

    impl SourceRow {
        pub fn in_week(week: i64) -> Self {
            Self {
                week: Some(week),
                ..Self::default()
            }
        }
    }

    /// Test descriptor, e.g. `{ "type": "Proefwerk", "weight": 2 }`.
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TestInfo {
        #[serde(default, rename = "type", alias = "kind")]
        pub kind: Option<String>,
        #[serde(default, alias = "weging", deserialize_with = "lenient_label::deserialize")]
        pub weight: Option<String>,
    }

    /// Explicit multi-week declaration attached to a row.
    #[serde_as]
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SpanSource {
        /// Raw covered week numbers, first entry being the row's own week.
        #[serde_as(as = "DefaultOnNull")]
        #[serde(default)]
        pub weeks: Vec<i64>,
        #[serde(default, deserialize_with = "lenient_week::deserialize")]
        pub span_start: Option<i64>,
        #[serde(default, deserialize_with = "lenient_week::deserialize")]
        pub span_end: Option<i64>,
        #[serde(default)]
        pub label: Option<String>,
        #[serde(default, with = "lenient_date")]
        pub date_start: Option<NaiveDate>,
        #[serde(default, with = "lenient_date")]
        pub date_end: Option<NaiveDate>,
        #[serde(default)]
        pub source_row_id: Option<String>,
    }

    /* ------------------------------ Outputs ------------------------------ */

    /// A canonical timeline entry.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WeekInfo {
        pub id: String,
        pub week: u32,
        pub iso_year: i32,
        pub start: NaiveDate,
        pub end: NaiveDate,
    }

    impl WeekInfo {
        pub fn week_ref(&self) -> IsoWeekRef {
            IsoWeekRef {
                iso_year: self.iso_year,
                week: self.week,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SpanRole {
        Start,
        Continue,
    }

    /// Marks a bucket as the start of, or a continuation within, a multi-week span.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SpanMarker {
        pub role: SpanRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub from_week: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub to_week: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub source_row_id: Option<String>,
    }

    /// Aggregated content of one subject in one week.
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WeekData {
        #[serde(rename = "lesstof")]
        pub lesson: Option<String>,
        #[serde(rename = "huiswerk")]
        pub homework: Option<String>,
        /// Discrete homework items in first-seen order.
        #[serde(rename = "huiswerkItems", default)]
        pub homework_items: Vec<String>,
        /// Deadline labels joined with `; `.
        pub deadlines: Option<String>,
        #[serde(default)]
        pub deadline_items: Vec<String>,
        #[serde(rename = "opmerkingen")]
        pub notes: Option<String>,
        /// Earliest date among contributing rows.
        pub date: Option<NaiveDate>,
        #[serde(rename = "multiWeekSpans", default)]
        pub spans: Vec<SpanMarker>,
    }

    /// Why a contribution was left out of the grid.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "camelCase")]
    pub enum DiagnosticReason {
        MissingWeek,
        WeekOutOfRange { week: i64 },
        Unresolvable { week: u32 },
        InvalidRange {
            begin: Option<i64>,
            end: Option<i64>,
        },
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Diagnostic {
        pub document_id: DocumentId,
        /// Row position inside the document; `None` for document-level problems.
        pub row_index: Option<usize>,
        pub reason: DiagnosticReason,
    }

    /// Result of one aggregation run.
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Aggregation {
        pub weeks: Vec<WeekInfo>,
        pub by_week: BTreeMap<String, BTreeMap<String, WeekData>>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub diagnostics: Vec<Diagnostic>,
    }

    impl Aggregation {
        pub fn subject(&self, week_id: &str, subject: &str) -> Option<&WeekData> {
            self.by_week.get(week_id).and_then(|m| m.get(subject))
        }

        /// Subjects seen anywhere in the grid, sorted.
        pub fn subjects(&self) -> Vec<String> {
            let mut out: Vec<String> = self
                .by_week
                .values()
                .flat_map(|m| m.keys().cloned())
                .collect();
            out.sort();
            out.dedup();
            out
        }
    }

    /// Rows grouped by owning document, in upload order.
    pub type RowsByDocument = IndexMap<DocumentId, Vec<SourceRow>>;

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum DomainError {
        #[error("unknown document {0}")]
        UnknownDocument(DocumentId),
        #[error("unknown custom homework entry {0}")]
        UnknownCustomHomework(uuid::Uuid),
        #[error("invalid week id {0:?} (expected YYYY-Www)")]
        InvalidWeekId(String),
        #[error("homework text has no content")]
        EmptyHomework,
        #[error("invalid splitter pattern")]
        InvalidPattern(#[from] regex::Error),
    }

    /* ------------------------- Lenient deserializers ------------------------- */

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScalar {
        Int(i64),
        Float(f64),
        Text(String),
    }

    mod lenient_week {
        use super::RawScalar;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<RawScalar>::deserialize(deserializer)?;
            Ok(raw.and_then(|r| match r {
                RawScalar::Int(i) => Some(i),
                RawScalar::Float(f) if f.fract() == 0.0 => Some(f as i64),
                RawScalar::Float(_) => None,
                RawScalar::Text(t) => crate::isoweek::parse_week_label(&t),
            }))
        }
    }

    mod lenient_label {
        use super::RawScalar;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<RawScalar>::deserialize(deserializer)?;
            Ok(raw.map(|r| match r {
                RawScalar::Int(i) => i.to_string(),
                RawScalar::Float(f) => f.to_string(),
                RawScalar::Text(t) => t,
            }))
        }
    }

    mod lenient_date {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(date) => serializer.serialize_some(&crate::isoweek::format_iso_date(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt = Option::<String>::deserialize(deserializer)?;
            Ok(opt.as_deref().and_then(crate::isoweek::parse_iso_date))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rows_tolerate_malformed_fields() {
            let json = r#"{
                "week": "wk 12",
                "datum": "12-03-2024",
                "dueDate": "2024-03-22",
                "onderwerp": "Hoofdstuk 2",
                "leerdoelen": null,
                "toets": { "type": "SO", "weging": 2 }
            }"#;
            let row: SourceRow = serde_json::from_str(json).expect("row");
            assert_eq!(row.week, Some(12));
            assert_eq!(row.date, None);
            assert_eq!(row.due_date, NaiveDate::from_ymd_opt(2024, 3, 22));
            assert!(row.learning_goals.is_empty());
            assert_eq!(row.test.and_then(|t| t.weight).as_deref(), Some("2"));
        }

        #[test]
        fn documents_accept_backend_field_names() {
            let json = r#"{
                "id": "doc-1",
                "subject": "Biologie",
                "leerjaar": 4,
                "beginWeek": 46,
                "eindWeek": 5,
                "schoolYear": "2024/2025"
            }"#;
            let doc: SourceDocument = serde_json::from_str(json).expect("doc");
            assert!(doc.enabled);
            assert_eq!(doc.grade.as_deref(), Some("4"));
            assert_eq!((doc.begin_week, doc.end_week), (Some(46), Some(5)));
        }

        #[test]
        fn week_ref_orders_by_year_then_week() {
            let a = IsoWeekRef { iso_year: 2023, week: 52 };
            let b = IsoWeekRef { iso_year: 2024, week: 1 };
            assert!(a < b);
            assert_eq!(b.id(), "2024-W01");
        }
    }
}

pub mod isoweek {
    //! ISO-8601 week arithmetic on local dates.
    //!
    //! Week starts are derived from the "4 January is in week 1" rule instead of
    //! chrono's checked `from_isoywd_opt`, so a week number that does not exist
    //! in a year (week 53 of a 52-week year) lands on the following Monday and
    //! can then be folded by [`canonicalize`].

    use crate::core::{IsoWeekRef, WeekInfo};
    use chrono::{Datelike, Duration, NaiveDate};
    use nom::{
        IResult,
        branch::alt,
        bytes::complete::{tag_no_case, take_till, take_while_m_n},
        character::complete::{char, digit1, space0},
        combinator::{all_consuming, map, map_opt, map_res, opt},
        sequence::{preceded, terminated, tuple},
    };

    pub const MAX_WEEK: u32 = 53;

    /// Accept a raw week number only inside 1..=53.
    pub fn valid_week(raw: i64) -> Option<u32> {
        (1..=MAX_WEEK as i64).contains(&raw).then_some(raw as u32)
    }

    pub fn iso_week_of(date: NaiveDate) -> u32 {
        date.iso_week().week()
    }

    pub fn iso_week_year_of(date: NaiveDate) -> i32 {
        date.iso_week().year()
    }

    pub fn week_ref_of(date: NaiveDate) -> IsoWeekRef {
        let iw = date.iso_week();
        IsoWeekRef {
            iso_year: iw.year(),
            week: iw.week(),
        }
    }

    /// Monday of `(iso_year, week)`.
    pub fn iso_week_start(iso_year: i32, week: u32) -> Option<NaiveDate> {
        if !(1..=MAX_WEEK).contains(&week) {
            return None;
        }
        let jan4 = NaiveDate::from_ymd_opt(iso_year, 1, 4)?;
        let week1 = jan4.checked_sub_signed(Duration::days(
            jan4.weekday().num_days_from_monday() as i64,
        ))?;
        week1.checked_add_signed(Duration::weeks(week as i64 - 1))
    }

    /// Sunday of `(iso_year, week)`.
    pub fn iso_week_end(iso_year: i32, week: u32) -> Option<NaiveDate> {
        iso_week_start(iso_year, week)?.checked_add_signed(Duration::days(6))
    }

    /// Re-derive the pair from its Monday. Week 53 of a 52-week year becomes week 1
    /// of the next ISO year.
    pub fn canonicalize(week: u32, iso_year: i32) -> Option<IsoWeekRef> {
        iso_week_start(iso_year, week).map(week_ref_of)
    }

    pub fn week_info(at: IsoWeekRef) -> Option<WeekInfo> {
        let start = iso_week_start(at.iso_year, at.week)?;
        let end = iso_week_end(at.iso_year, at.week)?;
        Some(WeekInfo {
            id: at.id(),
            week: at.week,
            iso_year: at.iso_year,
            start,
            end,
        })
    }

    /// Whole weeks from the Monday of `from` to the Monday of `to`.
    pub fn weeks_between(from: IsoWeekRef, to: IsoWeekRef) -> Option<i64> {
        let a = iso_week_start(from.iso_year, from.week)?;
        let b = iso_week_start(to.iso_year, to.week)?;
        Some((b - a).num_weeks())
    }

    /// Number of ISO weeks in `iso_year` (52 or 53).
    pub fn weeks_in_year(iso_year: i32) -> Option<u32> {
        NaiveDate::from_ymd_opt(iso_year, 12, 28).map(iso_week_of)
    }

    /* ------------------------------- Parsing ------------------------------- */

    fn digits<'a>(min: usize, max: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
        map_res(
            take_while_m_n(min, max, |c: char| c.is_ascii_digit()),
            |s: &str| s.parse::<u32>(),
        )
    }

    fn iso_date(i: &str) -> IResult<&str, NaiveDate> {
        map_opt(
            tuple((digits(4, 4), char('-'), digits(2, 2), char('-'), digits(2, 2))),
            |(y, _, m, _, d)| NaiveDate::from_ymd_opt(y as i32, m, d),
        )(i)
    }

    /// Strict `YYYY-MM-DD`. Anything else is "no date".
    pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
        all_consuming(iso_date)(s.trim()).ok().map(|(_, d)| d)
    }

    pub fn format_iso_date(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse `2024-W05`; rejects pairs that do not exist (e.g. `2024-W53`).
    pub fn parse_week_id(s: &str) -> Option<IsoWeekRef> {
        let mut parser = all_consuming(map(
            tuple((digits(4, 4), tag_no_case("-W"), digits(1, 2))),
            |(year, _, week)| (year as i32, week),
        ));
        let (_, (iso_year, week)) = parser(s.trim()).ok()?;
        let last = weeks_in_year(iso_year)?;
        (1..=last).contains(&week).then_some(IsoWeekRef { iso_year, week })
    }

    fn week_label(i: &str) -> IResult<&str, i64> {
        let prefix = alt((tag_no_case("week"), tag_no_case("wk"), tag_no_case("w")));
        let number = map_res(digit1, |d: &str| d.parse::<i64>());
        preceded(
            tuple((space0, opt(prefix), space0)),
            terminated(number, space0),
        )(i)
    }

    /// Parse a free-form week cell: `12`, `wk 12`, `Week 12`.
    pub fn parse_week_label(s: &str) -> Option<i64> {
        all_consuming(week_label)(s).ok().map(|(_, n)| n)
    }

    /// First year of a school-year string such as `2023/2024` or `2023-24`.
    pub fn parse_school_year_start(s: &str) -> Option<i32> {
        let res: IResult<&str, u32> =
            preceded(take_till(|c: char| c.is_ascii_digit()), digits(4, 4))(s);
        res.ok().map(|(_, y)| y as i32)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn d(y: i32, m: u32, day: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, day).unwrap()
        }

        #[test]
        fn week_year_differs_from_calendar_year_at_boundaries() {
            assert_eq!(iso_week_of(d(2024, 12, 30)), 1);
            assert_eq!(iso_week_year_of(d(2024, 12, 30)), 2025);
            assert_eq!(iso_week_of(d(2021, 1, 3)), 53);
            assert_eq!(iso_week_year_of(d(2021, 1, 3)), 2020);
        }

        #[test]
        fn week_bounds_follow_january_fourth_rule() {
            assert_eq!(iso_week_start(2024, 1), Some(d(2024, 1, 1)));
            assert_eq!(iso_week_end(2024, 1), Some(d(2024, 1, 7)));
            assert_eq!(iso_week_start(2026, 53), Some(d(2026, 12, 28)));
            assert_eq!(iso_week_start(2024, 0), None);
            assert_eq!(iso_week_start(2024, 54), None);
        }

        #[test]
        fn canonicalize_folds_nonexistent_week_53() {
            assert_eq!(weeks_in_year(2023), Some(52));
            assert_eq!(
                canonicalize(53, 2023),
                Some(IsoWeekRef { iso_year: 2024, week: 1 })
            );
            assert_eq!(
                canonicalize(53, 2026),
                Some(IsoWeekRef { iso_year: 2026, week: 53 })
            );
        }

        #[test]
        fn strict_date_parsing() {
            assert_eq!(parse_iso_date("2024-01-03"), Some(d(2024, 1, 3)));
            assert_eq!(parse_iso_date(" 2024-01-03 "), Some(d(2024, 1, 3)));
            assert_eq!(parse_iso_date("2024-1-3"), None);
            assert_eq!(parse_iso_date("03-01-2024"), None);
            assert_eq!(parse_iso_date("2024-02-30"), None);
            assert_eq!(parse_iso_date("2024-01-03T10:00"), None);
        }

        #[test]
        fn week_ids_round_trip_only_when_they_exist() {
            let at = parse_week_id("2024-W05").expect("valid id");
            assert_eq!(at.id(), "2024-W05");
            assert_eq!(parse_week_id("2026-W53").map(|w| w.week), Some(53));
            assert_eq!(parse_week_id("2023-W53"), None);
            assert_eq!(parse_week_id("2023-53"), None);
            assert_eq!(parse_week_id("2024-W00"), None);
        }

        #[test]
        fn week_labels_and_school_years() {
            assert_eq!(parse_week_label("12"), Some(12));
            assert_eq!(parse_week_label("Week 7 "), Some(7));
            assert_eq!(parse_week_label("wk12"), Some(12));
            assert_eq!(parse_week_label("vakantie"), None);
            assert_eq!(parse_school_year_start("2023/2024"), Some(2023));
            assert_eq!(parse_school_year_start("Schooljaar 2024-25"), Some(2024));
            assert_eq!(parse_school_year_start("n.v.t."), None);
        }
    }
}

pub mod resolver {
    //! Maps a raw week number onto a canonical ISO (week, year) pair.
    //!
    //! Resolution order: candidate dates, then the school-year heuristic, then
    //! proximity to a reference day. Every branch canonicalizes its answer.

    use crate::core::IsoWeekRef;
    use crate::isoweek::{
        MAX_WEEK, canonicalize, iso_week_of, iso_week_start, iso_week_year_of,
        parse_school_year_start, valid_week, week_ref_of,
    };
    use chrono::{Local, NaiveDate};
    use tracing::trace;

    /// Weeks numbered at or above this belong to the autumn term.
    pub const AUTUMN_TERM_FIRST_WEEK: u32 = 30;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct ResolveContext<'a> {
        pub school_year: Option<&'a str>,
        pub candidate_dates: &'a [NaiveDate],
        /// Reference day for the proximity fallback; `None` reads the local clock.
        pub today: Option<NaiveDate>,
    }

    /// Resolve a possibly missing/invalid raw week; those default to week 1.
    pub fn resolve(raw_week: Option<i64>, ctx: &ResolveContext<'_>) -> Option<IsoWeekRef> {
        let week = raw_week.and_then(valid_week).unwrap_or(1);
        resolve_week(week, ctx)
    }

    pub fn resolve_week(week: u32, ctx: &ResolveContext<'_>) -> Option<IsoWeekRef> {
        if let Some(hit) = match_candidates(week, ctx.candidate_dates) {
            trace!(week, resolved = %hit, "resolved from candidate dates");
            return Some(hit);
        }
        if let Some(hit) = ctx
            .school_year
            .and_then(|sy| school_year_iso_year(week, sy))
            .and_then(|year| canonicalize(week, year))
        {
            trace!(week, resolved = %hit, "resolved from school year");
            return Some(hit);
        }
        let today = ctx.today.unwrap_or_else(|| Local::now().date_naive());
        let hit = nearest_to(week, today);
        trace!(week, %today, resolved = ?hit, "resolved by proximity");
        hit
    }

    /// ISO year the school-year heuristic assigns before canonicalization.
    pub fn school_year_iso_year(week: u32, school_year: &str) -> Option<i32> {
        let start = parse_school_year_start(school_year)?;
        Some(if week >= AUTUMN_TERM_FIRST_WEEK {
            start
        } else {
            start + 1
        })
    }

    /// Distance on the 53-week ring: week 53 and week 1 are one apart, 52 and 1 two.
    pub fn circular_distance(a: u32, b: u32) -> u32 {
        let d = a.abs_diff(b);
        d.min(MAX_WEEK - d.min(MAX_WEEK))
    }

    fn match_candidates(week: u32, dates: &[NaiveDate]) -> Option<IsoWeekRef> {
        if let Some(exact) = dates
            .iter()
            .copied()
            .filter(|d| iso_week_of(*d) == week)
            .min()
        {
            return canonicalize(week, iso_week_year_of(exact));
        }
        dates
            .iter()
            .copied()
            .min_by_key(|d| (circular_distance(iso_week_of(*d), week), *d))
            .map(week_ref_of)
    }

    fn nearest_to(week: u32, today: NaiveDate) -> Option<IsoWeekRef> {
        let current = iso_week_year_of(today);
        (current - 1..=current + 1)
            .filter_map(|year| iso_week_start(year, week).map(|monday| (year, monday)))
            .min_by_key(|(_, monday)| (*monday - today).num_days().abs())
            .and_then(|(year, _)| canonicalize(week, year))
    }

    /// First canonical occurrence of `raw_week` at or after `anchor`. Lays out the
    /// member weeks of a multi-week span across year boundaries.
    pub fn first_occurrence_from(anchor: IsoWeekRef, raw_week: u32) -> Option<IsoWeekRef> {
        let anchor_start = iso_week_start(anchor.iso_year, anchor.week)?;
        (anchor.iso_year..=anchor.iso_year + 1)
            .filter_map(|year| canonicalize(raw_week, year))
            .filter(|at| iso_week_start(at.iso_year, at.week).is_some_and(|s| s >= anchor_start))
            .min()
    }

}

pub mod text {
    //! Free-text cleanup shared by aggregation and views.

    /// Cells that extraction emits for "nothing here". Compared case-insensitively.
    pub const EMPTY_SENTINELS: [&str; 5] = ["—", "–", "-", "geen", "n.v.t."];

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct NormalizeOptions {
        /// Keep paragraph structure: trim line by line instead of joining lines.
        pub preserve_line_breaks: bool,
    }

    impl NormalizeOptions {
        pub fn multiline() -> Self {
            Self {
                preserve_line_breaks: true,
            }
        }
    }

    /// Cleaned text, or `None` when nothing meaningful remains.
    pub fn normalize(text: &str, opts: NormalizeOptions) -> Option<String> {
        let out = if opts.preserve_line_breaks {
            normalize_lines(text)
        } else {
            collapse_whitespace(text)
        };
        if out.is_empty() || is_empty_sentinel(&out) {
            None
        } else {
            Some(out)
        }
    }

    pub fn normalize_opt(text: Option<&str>, opts: NormalizeOptions) -> Option<String> {
        text.and_then(|t| normalize(t, opts))
    }

    pub fn has_meaningful_content(text: Option<&str>) -> bool {
        normalize_opt(text, NormalizeOptions::default()).is_some()
    }

    pub fn collapse_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn contains_ci(haystack: &str, needle: &str) -> bool {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }

    fn is_empty_sentinel(s: &str) -> bool {
        let flat = collapse_whitespace(s).to_lowercase();
        EMPTY_SENTINELS.contains(&flat.as_str())
    }

    fn normalize_lines(text: &str) -> String {
        let unified = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut lines: Vec<String> = Vec::new();
        for line in unified.split('\n') {
            let line = collapse_whitespace(line);
            // at most one blank line between paragraphs
            if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
                continue;
            }
            lines.push(line);
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn collapses_whitespace_by_default() {
            assert_eq!(
                normalize("  Lees\t blz. 4 \n en 5 ", NormalizeOptions::default()).as_deref(),
                Some("Lees blz. 4 en 5")
            );
        }

        #[test]
        fn keeps_paragraphs_when_asked() {
            let out = normalize(
                "  Maak opgave 1  \r\n\r\n\r\n  Leer   woordjes \n\n",
                NormalizeOptions::multiline(),
            );
            assert_eq!(out.as_deref(), Some("Maak opgave 1\n\nLeer woordjes"));
        }

        #[test]
        fn sentinels_mean_no_content() {
            for s in ["—", " – ", "-", "GEEN", "n.v.t.", "N.V.T.", "", "   "] {
                assert!(!has_meaningful_content(Some(s)), "{s:?} should be empty");
            }
            assert!(!has_meaningful_content(None));
            assert!(has_meaningful_content(Some("geen huiswerk")));
        }
    }
}

pub mod splitter {
    //! Splits compound homework descriptions into actionable items.
    //!
    //! This is a heuristic over Dutch syllabus phrasing, not a parser: a verb
    //! stem used as a noun can over-split. The word lists are data, so a tuned
    //! list (or a different [`HomeworkSplitter`]) can be swapped in without
    //! touching aggregation.

    use crate::core::DomainError;
    use crate::text::{collapse_whitespace, has_meaningful_content};
    use regex::{Regex, RegexBuilder};
    use std::sync::LazyLock;

    pub trait HomeworkSplitter {
        fn split(&self, raw: &str) -> Vec<String>;
    }

    /// Homework verbs (imperative and infinitive) as regex fragments.
    pub const DEFAULT_VERBS: &[&str] = &[
        r"lever\s+in",
        "inleveren",
        "bestudeer",
        "bestuderen",
        "studeer",
        "studeren",
        "maak",
        "maken",
        "afmaken",
        "leer",
        "leren",
        "lees",
        "lezen",
        "herhaal",
        "herhalen",
        "oefen",
        "oefenen",
        "schrijf",
        "schrijven",
        "werk",
        "werken",
        "bekijk",
        "bekijken",
        "kijk",
        "kijken",
        "beantwoord",
        "beantwoorden",
        "vul",
        "invullen",
        "vertaal",
        "vertalen",
        "zoek",
        "zoeken",
        "bereid",
        "voorbereiden",
        "neem",
        "doe",
        "doen",
    ];

    /// Structural references; two or more hits of one pattern mean separate items.
    pub const DEFAULT_KEYWORDS: &[&str] = &[
        r"\bpar(?:agraaf|\.)?\s*\d",
        r"\bhoofdstuk\s*\d",
        r"\bopgaven?\s*\d",
        r"\bopdrachten?\s*\d",
        r"\b(?:blz|bladzijde|pagina)\.?\s*\d",
        r"§\s*\d",
    ];

    const BULLETS: &[char] = &['•', '◦', '▪', '▫', '●', '○', '‣', '⁃', '∙', '·'];
    const SYMBOL_SEPARATORS: &[&str] = &[",", "&", "+", "/", "-"];
    const WORD_SEPARATORS: &[&str] = &["en", "of"];

    #[derive(Debug, Clone)]
    pub struct HeuristicSplitter {
        /// `None` disables verb splitting.
        verbs: Option<Regex>,
        keywords: Vec<Regex>,
    }

    impl HeuristicSplitter {
        pub fn new(verbs: &[&str], keywords: &[&str]) -> Result<Self, DomainError> {
            // an empty alternative would match at every word boundary
            let mut alternatives: Vec<&str> = verbs
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            // longest first so `lever in` wins over `lever`
            alternatives.sort_by_key(|v| std::cmp::Reverse(v.len()));
            let verbs = if alternatives.is_empty() {
                None
            } else {
                let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
                Some(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
            };
            let keywords = keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(|k| RegexBuilder::new(k).case_insensitive(true).build())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Self { verbs, keywords })
        }

        fn split_on_repeated_keywords<'a>(&self, segment: &'a str) -> Vec<&'a str> {
            let mut cuts: Vec<usize> = Vec::new();
            for re in &self.keywords {
                let starts: Vec<usize> = re
                    .find_iter(segment)
                    .filter(|m| !m.as_str().is_empty())
                    .map(|m| m.start())
                    .collect();
                if starts.len() >= 2 {
                    cuts.extend_from_slice(&starts[1..]);
                }
            }
            cut_at(segment, cuts)
        }

        fn split_on_verbs<'a>(&self, segment: &'a str) -> Vec<&'a str> {
            let Some(verbs) = &self.verbs else {
                return vec![segment];
            };
            let cuts: Vec<usize> = verbs
                .find_iter(segment)
                .skip(1)
                // zero-width matches never cut
                .filter(|m| !m.as_str().is_empty())
                .map(|m| m.start())
                .collect();
            cut_at(segment, cuts)
        }
    }

    impl Default for HeuristicSplitter {
        fn default() -> Self {
            Self::new(DEFAULT_VERBS, DEFAULT_KEYWORDS).expect("built-in splitter patterns compile")
        }
    }

    impl HomeworkSplitter for HeuristicSplitter {
        fn split(&self, raw: &str) -> Vec<String> {
            let text = raw.replace("\r\n", "\n").replace(BULLETS, "\n");
            let mut out: Vec<String> = Vec::new();
            for hard in text.split(['\n', '\r', ';']) {
                let hard = strip_list_marker(hard);
                for segment in self.split_on_repeated_keywords(hard) {
                    for piece in self.split_on_verbs(segment) {
                        let item = collapse_whitespace(piece);
                        if !has_meaningful_content(Some(&item)) {
                            continue;
                        }
                        if !out.contains(&item) {
                            out.push(item);
                        }
                    }
                }
            }
            out
        }
    }

    static DEFAULT_SPLITTER: LazyLock<HeuristicSplitter> = LazyLock::new(HeuristicSplitter::default);

    pub fn default_splitter() -> &'static HeuristicSplitter {
        &DEFAULT_SPLITTER
    }

    /// Split with the built-in Dutch word lists.
    pub fn split_items(raw: &str) -> Vec<String> {
        DEFAULT_SPLITTER.split(raw)
    }

    /// Cut `s` before each offset; every piece but the last loses trailing separators.
    fn cut_at(s: &str, mut cuts: Vec<usize>) -> Vec<&str> {
        cuts.sort_unstable();
        cuts.dedup();
        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut from = 0;
        for cut in cuts {
            if cut <= from {
                continue;
            }
            pieces.push(strip_trailing_separators(&s[from..cut]));
            from = cut;
        }
        pieces.push(&s[from..]);
        pieces
    }

    fn strip_trailing_separators(piece: &str) -> &str {
        let mut s = piece.trim_end();
        loop {
            let before = s.len();
            for sep in SYMBOL_SEPARATORS {
                if let Some(rest) = s.strip_suffix(sep) {
                    s = rest.trim_end();
                }
            }
            for word in WORD_SEPARATORS {
                if let Some(rest) = strip_word_suffix(s, word) {
                    s = rest.trim_end();
                }
            }
            if s.len() == before {
                return s;
            }
        }
    }

    /// Strip a trailing conjunction only when it is a whole word.
    fn strip_word_suffix<'a>(s: &'a str, word: &str) -> Option<&'a str> {
        let at = s.len().checked_sub(word.len())?;
        if !s.is_char_boundary(at) || !s[at..].eq_ignore_ascii_case(word) {
            return None;
        }
        let rest = &s[..at];
        (rest.is_empty() || rest.ends_with(char::is_whitespace)).then_some(rest)
    }

    fn strip_list_marker(line: &str) -> &str {
        let t = line.trim_start();
        for marker in ["- ", "* ", "– "] {
            if let Some(rest) = t.strip_prefix(marker) {
                return rest;
            }
        }
        t
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn newline_is_a_hard_boundary() {
            assert_eq!(
                split_items("Bestudeer paragraaf 3\r\nMaak opdrachten 1-3"),
                vec!["Bestudeer paragraaf 3", "Maak opdrachten 1-3"]
            );
        }

        #[test]
        fn comma_without_following_verb_is_kept() {
            assert_eq!(
                split_items("Lees paragraaf 4, pagina 12-13"),
                vec!["Lees paragraaf 4, pagina 12-13"]
            );
        }

        #[test]
        fn splits_at_each_verb_boundary() {
            assert_eq!(
                split_items("Bestuderen Intro hoofdstuk 3, maken opdrachten 3.1, leren woordjes"),
                vec![
                    "Bestuderen Intro hoofdstuk 3",
                    "maken opdrachten 3.1",
                    "leren woordjes"
                ]
            );
        }

        #[test]
        fn strips_conjunctions_before_boundary() {
            assert_eq!(
                split_items("Maak opgave 1 en leer de woordjes & herhaal blz. 4"),
                vec!["Maak opgave 1", "leer de woordjes", "herhaal blz. 4"]
            );
            // "boeken" ends in "en" but is not a conjunction
            assert_eq!(
                split_items("Lees boeken maak samenvatting"),
                vec!["Lees boeken", "maak samenvatting"]
            );
        }

        #[test]
        fn repeated_structural_keywords_split_run_on_text() {
            assert_eq!(
                split_items("Hoofdstuk 2 samenvatting Hoofdstuk 3 begrippen"),
                vec!["Hoofdstuk 2 samenvatting", "Hoofdstuk 3 begrippen"]
            );
            // only repeats cut; the first occurrence stays with what precedes it
            assert_eq!(
                split_items("Par. 3.1 opgave 4 Par. 3.2 opgave 7"),
                vec!["Par. 3.1 opgave 4", "Par. 3.2", "opgave 7"]
            );
            assert_eq!(split_items("§2.1, §2.2"), vec!["§2.1", "§2.2"]);
        }

        #[test]
        fn bullets_semicolons_and_duplicates() {
            assert_eq!(
                split_items("• Leer woordjes\n• Leer woordjes; - Maak toets"),
                vec!["Leer woordjes", "Maak toets"]
            );
            assert!(split_items("—").is_empty());
            assert!(split_items("").is_empty());
        }

        #[test]
        fn custom_word_lists_are_pluggable() {
            let splitter = HeuristicSplitter::new(&["read", "write"], &[]).expect("patterns");
            assert_eq!(
                splitter.split("Read chapter 2, write summary"),
                vec!["Read chapter 2", "write summary"]
            );
            assert!(HeuristicSplitter::new(&["("], &[]).is_err());
        }

        #[test]
        fn keyword_only_splitter_keeps_sentences_whole() {
            let splitter = HeuristicSplitter::new(&[], DEFAULT_KEYWORDS).expect("patterns");
            assert_eq!(
                splitter.split("Lees het boek over de oorlog"),
                vec!["Lees het boek over de oorlog"]
            );
            assert_eq!(
                splitter.split("Hoofdstuk 2 lezen Hoofdstuk 3 maken"),
                vec!["Hoofdstuk 2 lezen", "Hoofdstuk 3 maken"]
            );

            let blank = HeuristicSplitter::new(&["", "  "], &[""]).expect("patterns");
            assert_eq!(blank.split("Maak opgave 1 leer woordjes"), vec!["Maak opgave 1 leer woordjes"]);
        }
    }
}

pub mod aggregate {
    //! Builds the week × subject grid from every enabled document.
    //!
    //! The grid is rebuilt from scratch on each call and depends only on the
    //! inputs plus the reference day used by the resolver's proximity fallback.
    //! Bad rows never abort a run: they are dropped, logged at debug level and
    //! listed in [`Aggregation::diagnostics`].

    use crate::core::*;
    use crate::isoweek::{MAX_WEEK, format_iso_date, valid_week, week_info, weeks_between};
    use crate::resolver::{ResolveContext, first_occurrence_from, resolve_week};
    use crate::splitter::{HomeworkSplitter, default_splitter};
    use crate::text::{NormalizeOptions, collapse_whitespace, contains_ci, normalize, normalize_opt};
    use chrono::{Local, NaiveDate};
    use indexmap::IndexMap;
    use std::collections::{BTreeMap, BTreeSet};
    use tracing::debug;

    const HOLIDAY: &str = "vakantie";
    /// Declared span weeks further apart than this are not treated as a continuation.
    const MAX_SPAN_STEP_WEEKS: i64 = 26;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AggregateOptions {
        /// Reference day for rows without dates or school year; `None` reads the local clock.
        pub today: Option<NaiveDate>,
    }

    /// Aggregate with the built-in homework splitter.
    pub fn aggregate(
        documents: &[SourceDocument],
        rows: &RowsByDocument,
        opts: AggregateOptions,
    ) -> Aggregation {
        aggregate_with_splitter(documents, rows, opts, default_splitter())
    }

    pub fn aggregate_with_splitter(
        documents: &[SourceDocument],
        rows: &RowsByDocument,
        opts: AggregateOptions,
        splitter: &dyn HomeworkSplitter,
    ) -> Aggregation {
        let today = opts.today.unwrap_or_else(|| Local::now().date_naive());
        let mut grid = Grid::new(today, splitter);
        for doc in documents.iter().filter(|d| d.enabled) {
            grid.add_document_range(doc);
            if let Some(doc_rows) = rows.get(&doc.id) {
                for (index, row) in doc_rows.iter().enumerate() {
                    grid.add_row(doc, index, row);
                }
            }
        }
        grid.finish()
    }

    /// Expand a declared range, wrapping through week 53 back to week 1 when `end < begin`.
    pub fn expand_week_range(begin: u32, end: u32) -> Vec<u32> {
        if end >= begin {
            (begin..=end).collect()
        } else {
            (begin..=MAX_WEEK).chain(1..=end).collect()
        }
    }

    /* ------------------------------ Internals ------------------------------ */

    #[derive(Debug, Default)]
    struct Bucket {
        lesson: Vec<String>,
        homework: Vec<String>,
        items: Vec<String>,
        deadlines: Vec<String>,
        notes: Vec<String>,
        dates: BTreeSet<NaiveDate>,
        spans: Vec<SpanMarker>,
    }

    impl Bucket {
        fn add_homework(&mut self, text: &str, lesson: Option<&str>, splitter: &dyn HomeworkSplitter) {
            // a holiday row already says so in its topic
            if lesson.is_some_and(|l| contains_ci(l, HOLIDAY)) && contains_ci(text, HOLIDAY) {
                return;
            }
            push_unique(&mut self.homework, text.to_string());
            for item in splitter.split(text) {
                push_unique(&mut self.items, item);
            }
        }

        fn into_week_data(self) -> WeekData {
            WeekData {
                lesson: join(&self.lesson, "\n"),
                homework: join(&self.homework, "\n"),
                homework_items: self.items,
                deadlines: join(&self.deadlines, "; "),
                deadline_items: self.deadlines,
                notes: join(&self.notes, "\n"),
                date: self.dates.first().copied(),
                spans: self.spans,
            }
        }
    }

    struct Grid<'s> {
        today: NaiveDate,
        splitter: &'s dyn HomeworkSplitter,
        weeks: BTreeMap<IsoWeekRef, WeekInfo>,
        buckets: BTreeMap<IsoWeekRef, IndexMap<String, Bucket>>,
        diagnostics: Vec<Diagnostic>,
    }

    impl<'s> Grid<'s> {
        fn new(today: NaiveDate, splitter: &'s dyn HomeworkSplitter) -> Self {
            Self {
                today,
                splitter,
                weeks: BTreeMap::new(),
                buckets: BTreeMap::new(),
                diagnostics: Vec::new(),
            }
        }

        fn ensure_week(&mut self, at: IsoWeekRef) {
            if self.weeks.contains_key(&at) {
                return;
            }
            if let Some(info) = week_info(at) {
                self.weeks.insert(at, info);
            }
        }

        fn bucket(&mut self, at: IsoWeekRef, subject: &str) -> &mut Bucket {
            self.ensure_week(at);
            self.buckets
                .entry(at)
                .or_default()
                .entry(subject.to_string())
                .or_default()
        }

        fn report(&mut self, doc: &SourceDocument, row_index: Option<usize>, reason: DiagnosticReason) {
            debug!(document = %doc.id, row = ?row_index, ?reason, "dropping contribution");
            self.diagnostics.push(Diagnostic {
                document_id: doc.id.clone(),
                row_index,
                reason,
            });
        }

        fn add_document_range(&mut self, doc: &SourceDocument) {
            let begin = doc.begin_week.and_then(valid_week);
            let end = doc.end_week.and_then(valid_week);
            let (Some(begin), Some(end)) = (begin, end) else {
                if doc.begin_week.is_some() || doc.end_week.is_some() {
                    self.report(
                        doc,
                        None,
                        DiagnosticReason::InvalidRange {
                            begin: doc.begin_week,
                            end: doc.end_week,
                        },
                    );
                }
                return;
            };
            let ctx = ResolveContext {
                school_year: doc.school_year.as_deref(),
                candidate_dates: &[],
                today: Some(self.today),
            };
            // only the first week is resolved; the rest follow it contiguously
            let mut previous: Option<IsoWeekRef> = None;
            for raw in expand_week_range(begin, end) {
                let at = match previous {
                    Some(prev) => first_occurrence_from(prev, raw),
                    None => resolve_week(raw, &ctx),
                };
                if let Some(at) = at {
                    self.ensure_week(at);
                    previous = Some(at);
                }
            }
        }

        fn add_row(&mut self, doc: &SourceDocument, index: usize, row: &SourceRow) {
            let Some(raw) = row.week else {
                self.report(doc, Some(index), DiagnosticReason::MissingWeek);
                return;
            };
            let Some(week) = valid_week(raw) else {
                self.report(doc, Some(index), DiagnosticReason::WeekOutOfRange { week: raw });
                return;
            };
            let candidates: Vec<NaiveDate> = [row.date, row.due_date].into_iter().flatten().collect();
            let ctx = ResolveContext {
                school_year: doc.school_year.as_deref(),
                candidate_dates: &candidates,
                today: Some(self.today),
            };
            let Some(at) = resolve_week(week, &ctx) else {
                self.report(doc, Some(index), DiagnosticReason::Unresolvable { week });
                return;
            };

            let subject = subject_key(doc);
            let lesson = lesson_text(row);
            let homework = homework_texts(row);
            let splitter = self.splitter;

            let bucket = self.bucket(at, &subject);
            if let Some(text) = &lesson {
                push_unique(&mut bucket.lesson, text.clone());
            }
            for text in &homework {
                bucket.add_homework(text, lesson.as_deref(), splitter);
            }
            if let Some(label) = row.test.as_ref().and_then(test_label) {
                push_unique(&mut bucket.deadlines, label);
            }
            if let Some(due) = row.due_date {
                push_unique(
                    &mut bucket.deadlines,
                    format!("Inleveren {}", format_iso_date(due)),
                );
            }
            if let Some(note) = normalize_opt(row.notes.as_deref(), NormalizeOptions::default()) {
                push_unique(&mut bucket.notes, note);
            }
            bucket.dates.extend(row.date);
            bucket.dates.extend(row.due_date);

            if let Some(span) = &row.span {
                self.add_span(at, week, &subject, span, &homework, lesson.as_deref());
            }
        }

        fn add_span(
            &mut self,
            start: IsoWeekRef,
            own_week: u32,
            subject: &str,
            span: &SpanSource,
            homework: &[String],
            lesson: Option<&str>,
        ) {
            let members = span_members(start, own_week, span);
            let Some(last) = members.last().copied() else {
                return;
            };
            let label = normalize_opt(span.label.as_deref(), NormalizeOptions::default());
            let source_row_id = span.source_row_id.clone();

            let opening = SpanMarker {
                role: SpanRole::Start,
                from_week: None,
                to_week: Some(last.week),
                label: label.clone(),
                source_row_id: source_row_id.clone(),
            };
            push_unique(&mut self.bucket(start, subject).spans, opening);

            let splitter = self.splitter;
            for member in members {
                let bucket = self.bucket(member, subject);
                push_unique(
                    &mut bucket.spans,
                    SpanMarker {
                        role: SpanRole::Continue,
                        from_week: Some(start.week),
                        to_week: None,
                        label: label.clone(),
                        source_row_id: source_row_id.clone(),
                    },
                );
                for text in homework {
                    bucket.add_homework(text, lesson, splitter);
                }
            }
        }

        fn finish(self) -> Aggregation {
            let mut weeks: Vec<WeekInfo> = self.weeks.into_values().collect();
            weeks.sort_by(|a, b| (a.iso_year, a.week, &a.id).cmp(&(b.iso_year, b.week, &b.id)));

            let mut by_week: BTreeMap<String, BTreeMap<String, WeekData>> = weeks
                .iter()
                .map(|w| (w.id.clone(), BTreeMap::new()))
                .collect();
            for (at, subjects) in self.buckets {
                let cell = by_week.entry(at.id()).or_default();
                for (subject, bucket) in subjects {
                    cell.insert(subject, bucket.into_week_data());
                }
            }

            Aggregation {
                weeks,
                by_week,
                diagnostics: self.diagnostics,
            }
        }
    }

    /// Canonical weeks a span continues into, excluding its starting week.
    fn span_members(start: IsoWeekRef, own_week: u32, span: &SpanSource) -> Vec<IsoWeekRef> {
        let declared: Vec<u32> = if span.weeks.is_empty() {
            match (
                span.span_start.and_then(valid_week),
                span.span_end.and_then(valid_week),
            ) {
                (Some(begin), Some(end)) => expand_week_range(begin, end),
                _ => Vec::new(),
            }
        } else {
            span.weeks.iter().filter_map(|w| valid_week(*w)).collect()
        };

        let mut seen = BTreeSet::new();
        let mut members = Vec::new();
        let mut anchor = start;
        for raw in declared {
            if raw == own_week || !seen.insert(raw) {
                continue;
            }
            let Some(next) = first_occurrence_from(anchor, raw) else {
                continue;
            };
            // week 53 folded onto a week that is already covered
            if next == start || members.contains(&next) {
                continue;
            }
            if weeks_between(anchor, next).is_none_or(|gap| gap > MAX_SPAN_STEP_WEEKS) {
                break;
            }
            members.push(next);
            anchor = next;
        }
        members
    }

    fn subject_key(doc: &SourceDocument) -> String {
        let subject = collapse_whitespace(&doc.subject);
        if subject.is_empty() {
            doc.id.0.clone()
        } else {
            subject
        }
    }

    /// Topic, else lesson label, else the learning goals.
    fn lesson_text(row: &SourceRow) -> Option<String> {
        let single = NormalizeOptions::default();
        normalize_opt(row.topic.as_deref(), single)
            .or_else(|| normalize_opt(row.lesson.as_deref(), single))
            .or_else(|| {
                let goals: Vec<String> = row
                    .learning_goals
                    .iter()
                    .filter_map(|g| normalize(g, single))
                    .collect();
                join(&goals, "; ")
            })
    }

    fn homework_texts(row: &SourceRow) -> Vec<String> {
        let mut out = Vec::new();
        for raw in [row.homework.as_deref(), row.assignment.as_deref()] {
            if let Some(text) = normalize_opt(raw, NormalizeOptions::multiline()) {
                push_unique(&mut out, text);
            }
        }
        out
    }

    fn test_label(test: &TestInfo) -> Option<String> {
        let single = NormalizeOptions::default();
        let kind = normalize_opt(test.kind.as_deref(), single)?;
        Some(match normalize_opt(test.weight.as_deref(), single) {
            Some(weight) => format!("{kind} (weging {weight})"),
            None => kind,
        })
    }

    fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
        if !list.contains(&value) {
            list.push(value);
        }
    }

    fn join(parts: &[String], sep: &str) -> Option<String> {
        (!parts.is_empty()).then(|| parts.join(sep))
    }

}

pub mod state {
    //! Application state: the inputs plus the grid derived from them.
    //!
    //! Every input mutation re-runs aggregation and swaps in a fresh `Arc`
    //! snapshot; a reader holding an older snapshot keeps a complete grid.
    //! Per-item done/hidden/override flags and custom homework live next to the
    //! grid and never trigger a recompute.

    use crate::aggregate::{AggregateOptions, aggregate};
    use crate::core::*;
    use crate::isoweek::parse_week_id;
    use crate::storage::PlannerInput;
    use crate::text::{NormalizeOptions, collapse_whitespace, normalize, normalize_opt};
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use std::{collections::BTreeMap, sync::Arc};
    use tracing::debug;
    use uuid::Uuid;

    /* ------------------------------- IDs ------------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CustomHomeworkId(pub Uuid);

    impl CustomHomeworkId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    /* ---------------------------- Value Objects ---------------------------- */

    /// Homework the student added by hand.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CustomHomework {
        pub id: CustomHomeworkId,
        pub week_id: String,
        pub subject: String,
        pub text: String,
    }

    /// Addresses one homework item in one (week, subject) cell.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ItemKey {
        pub week_id: String,
        pub subject: String,
        pub item: String,
    }

    impl ItemKey {
        pub fn new(
            week_id: impl Into<String>,
            subject: impl Into<String>,
            item: impl Into<String>,
        ) -> Self {
            Self {
                week_id: week_id.into(),
                subject: subject.into(),
                item: item.into(),
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ItemState {
        pub done: bool,
        pub hidden: bool,
        /// Replacement text shown instead of the extracted item.
        pub override_text: Option<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", content = "id", rename_all = "camelCase")]
    pub enum ItemOrigin {
        Aggregated,
        Custom(CustomHomeworkId),
    }

    /// A homework item as a view shows it, with per-item state applied.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HomeworkItemView {
        pub key: ItemKey,
        pub text: String,
        pub original: String,
        pub done: bool,
        pub hidden: bool,
        pub origin: ItemOrigin,
    }

    /// Metadata edit; `None` leaves the field as it is.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DocumentPatch {
        pub subject: Option<String>,
        pub level: Option<String>,
        pub grade: Option<String>,
        pub period: Option<String>,
        pub begin_week: Option<i64>,
        pub end_week: Option<i64>,
        pub school_year: Option<String>,
    }

    /* ------------------------------ Container ------------------------------ */

    #[derive(Debug, Clone)]
    pub struct PlannerState {
        documents: Vec<SourceDocument>,
        rows: RowsByDocument,
        options: AggregateOptions,
        snapshot: Arc<Aggregation>,
        revision: u64,
        custom: IndexMap<CustomHomeworkId, CustomHomework>,
        items: BTreeMap<ItemKey, ItemState>,
    }

    impl Default for PlannerState {
        fn default() -> Self {
            Self::new(AggregateOptions::default())
        }
    }

    impl PlannerState {
        pub fn new(options: AggregateOptions) -> Self {
            Self {
                documents: Vec::new(),
                rows: RowsByDocument::new(),
                options,
                snapshot: Arc::new(Aggregation::default()),
                revision: 0,
                custom: IndexMap::new(),
                items: BTreeMap::new(),
            }
        }

        pub fn from_input(input: PlannerInput, options: AggregateOptions) -> Self {
            let mut state = Self::new(options);
            state.documents = input.documents;
            state.rows = input.rows;
            state.recompute();
            state
        }

        pub fn to_input(&self) -> PlannerInput {
            PlannerInput {
                documents: self.documents.clone(),
                rows: self.rows.clone(),
            }
        }

        /// Current grid. Cheap to clone and never mutated afterwards.
        pub fn snapshot(&self) -> Arc<Aggregation> {
            Arc::clone(&self.snapshot)
        }

        /// Bumped once per recompute.
        pub fn revision(&self) -> u64 {
            self.revision
        }

        pub fn documents(&self) -> &[SourceDocument] {
            &self.documents
        }

        pub fn document(&self, id: &DocumentId) -> Option<&SourceDocument> {
            self.documents.iter().find(|d| &d.id == id)
        }

        pub fn rows(&self, id: &DocumentId) -> &[SourceRow] {
            self.rows.get(id).map(Vec::as_slice).unwrap_or(&[])
        }

        /* -------------------------- Input mutations -------------------------- */

        pub fn set_options(&mut self, options: AggregateOptions) {
            self.options = options;
            self.recompute();
        }

        pub fn set_documents(&mut self, documents: Vec<SourceDocument>) {
            self.documents = documents;
            self.recompute();
        }

        /// Insert a new document or replace the one with the same id.
        pub fn upsert_document(&mut self, doc: SourceDocument) {
            match self.documents.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc,
                None => self.documents.push(doc),
            }
            self.recompute();
        }

        /// Remove a document together with its rows.
        pub fn remove_document(&mut self, id: &DocumentId) -> Result<SourceDocument, DomainError> {
            let pos = self
                .documents
                .iter()
                .position(|d| &d.id == id)
                .ok_or_else(|| DomainError::UnknownDocument(id.clone()))?;
            let removed = self.documents.remove(pos);
            self.rows.shift_remove(id);
            self.recompute();
            Ok(removed)
        }

        pub fn set_rows(&mut self, id: &DocumentId, rows: Vec<SourceRow>) -> Result<(), DomainError> {
            self.document_mut(id)?;
            self.rows.insert(id.clone(), rows);
            self.recompute();
            Ok(())
        }

        pub fn set_document_enabled(&mut self, id: &DocumentId, enabled: bool) -> Result<(), DomainError> {
            let doc = self.document_mut(id)?;
            if doc.enabled == enabled {
                return Ok(());
            }
            doc.enabled = enabled;
            self.recompute();
            Ok(())
        }

        pub fn update_document_metadata(
            &mut self,
            id: &DocumentId,
            patch: DocumentPatch,
        ) -> Result<(), DomainError> {
            let doc = self.document_mut(id)?;
            if let Some(subject) = patch.subject {
                doc.subject = subject;
            }
            if patch.level.is_some() {
                doc.level = patch.level;
            }
            if patch.grade.is_some() {
                doc.grade = patch.grade;
            }
            if patch.period.is_some() {
                doc.period = patch.period;
            }
            if patch.begin_week.is_some() {
                doc.begin_week = patch.begin_week;
            }
            if patch.end_week.is_some() {
                doc.end_week = patch.end_week;
            }
            if patch.school_year.is_some() {
                doc.school_year = patch.school_year;
            }
            self.recompute();
            Ok(())
        }

        fn document_mut(&mut self, id: &DocumentId) -> Result<&mut SourceDocument, DomainError> {
            self.documents
                .iter_mut()
                .find(|d| &d.id == id)
                .ok_or_else(|| DomainError::UnknownDocument(id.clone()))
        }

        fn recompute(&mut self) {
            let next = aggregate(&self.documents, &self.rows, self.options);
            self.revision += 1;
            debug!(
                revision = self.revision,
                weeks = next.weeks.len(),
                dropped = next.diagnostics.len(),
                "recomputed week grid"
            );
            self.snapshot = Arc::new(next);
        }

        /* --------------------------- Custom homework --------------------------- */

        pub fn add_custom_homework(
            &mut self,
            week_id: &str,
            subject: &str,
            text: &str,
        ) -> Result<CustomHomeworkId, DomainError> {
            let at = parse_week_id(week_id)
                .ok_or_else(|| DomainError::InvalidWeekId(week_id.to_string()))?;
            let text = normalize(text, NormalizeOptions::multiline()).ok_or(DomainError::EmptyHomework)?;
            let id = CustomHomeworkId::new();
            self.custom.insert(
                id,
                CustomHomework {
                    id,
                    week_id: at.id(),
                    subject: collapse_whitespace(subject),
                    text,
                },
            );
            Ok(id)
        }

        pub fn update_custom_homework(&mut self, id: CustomHomeworkId, text: &str) -> Result<(), DomainError> {
            let text = normalize(text, NormalizeOptions::multiline()).ok_or(DomainError::EmptyHomework)?;
            let entry = self
                .custom
                .get_mut(&id)
                .ok_or(DomainError::UnknownCustomHomework(id.0))?;
            entry.text = text;
            Ok(())
        }

        pub fn remove_custom_homework(&mut self, id: CustomHomeworkId) -> Result<CustomHomework, DomainError> {
            self.custom
                .shift_remove(&id)
                .ok_or(DomainError::UnknownCustomHomework(id.0))
        }

        pub fn custom_homework(&self) -> impl Iterator<Item = &CustomHomework> {
            self.custom.values()
        }

        /* --------------------------- Per-item state --------------------------- */

        pub fn set_done(&mut self, key: ItemKey, done: bool) {
            self.update_item(key, |s| s.done = done);
        }

        pub fn set_hidden(&mut self, key: ItemKey, hidden: bool) {
            self.update_item(key, |s| s.hidden = hidden);
        }

        /// Replace the displayed text; `None` (or blank text) restores the original.
        pub fn set_override(&mut self, key: ItemKey, text: Option<&str>) {
            let text = normalize_opt(text, NormalizeOptions::default());
            self.update_item(key, |s| s.override_text = text);
        }

        pub fn item_state(&self, key: &ItemKey) -> ItemState {
            self.items.get(key).cloned().unwrap_or_default()
        }

        fn update_item(&mut self, key: ItemKey, apply: impl FnOnce(&mut ItemState)) {
            let state = self.items.entry(key.clone()).or_default();
            apply(state);
            if *state == ItemState::default() {
                self.items.remove(&key);
            }
        }

        /// Aggregated items followed by custom entries for one cell.
        pub fn homework_items(
            &self,
            week_id: &str,
            subject: &str,
            include_hidden: bool,
        ) -> Vec<HomeworkItemView> {
            let aggregated = self
                .snapshot
                .subject(week_id, subject)
                .map(|w| w.homework_items.as_slice())
                .unwrap_or(&[])
                .iter()
                .map(|item| (item.as_str(), ItemOrigin::Aggregated));
            let custom = self
                .custom
                .values()
                .filter(|c| c.week_id == week_id && c.subject == subject)
                .map(|c| (c.text.as_str(), ItemOrigin::Custom(c.id)));

            let mut out: Vec<HomeworkItemView> = Vec::new();
            for (item, origin) in aggregated.chain(custom) {
                let key = ItemKey::new(week_id, subject, item);
                if out.iter().any(|v| v.key == key) {
                    continue;
                }
                let state = self.item_state(&key);
                if state.hidden && !include_hidden {
                    continue;
                }
                out.push(HomeworkItemView {
                    text: state.override_text.unwrap_or_else(|| item.to_string()),
                    original: item.to_string(),
                    done: state.done,
                    hidden: state.hidden,
                    origin,
                    key,
                });
            }
            out
        }
    }

}

pub mod storage {
    //! Input contract shared with the upload backend.

    use crate::core::{RowsByDocument, SourceDocument};
    use anyhow::{Context, Result};
    use serde::{Deserialize, Serialize};
    use std::{fs, path::Path};

    /// Documents plus their rows, keyed by document id.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct PlannerInput {
        #[serde(default)]
        pub documents: Vec<SourceDocument>,
        #[serde(default)]
        pub rows: RowsByDocument,
    }

    pub trait PlannerSource {
        fn load(&self, path: &Path) -> Result<PlannerInput>;
    }

    /// Reads a `PlannerInput` JSON document from disk.
    pub struct JsonPlannerSource;

    impl PlannerSource for JsonPlannerSource {
        fn load(&self, path: &Path) -> Result<PlannerInput> {
            let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            parse_planner_input(&text).with_context(|| format!("decoding {:?}", path))
        }
    }

    pub fn parse_planner_input(text: &str) -> Result<PlannerInput> {
        serde_json::from_str(text).context("planner input is not valid JSON for the expected shape")
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::DocumentId;

        const SAMPLE: &str = r#"{
            "documents": [
                { "id": "d1", "subject": "Wiskunde", "niveau": 4, "beginWeek": 36, "eindWeek": 40,
                  "schoolYear": "2024/2025", "enabled": true }
            ],
            "rows": {
                "d1": [
                    { "week": 36, "datum": "2024-09-03", "huiswerk": "Maak opgave 1-5" },
                    { "week": null, "huiswerk": "—" }
                ]
            }
        }"#;

        #[test]
        fn parses_backend_json() {
            let input = parse_planner_input(SAMPLE).expect("parse");
            assert_eq!(input.documents.len(), 1);
            // numeric labels are read as text instead of failing the whole file
            assert_eq!(input.documents[0].level.as_deref(), Some("4"));
            let rows = &input.rows[&DocumentId::from("d1")];
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].week, None);
        }

        #[test]
        fn loads_from_disk_with_context_on_failure() {
            let dir = tempfile::tempdir().expect("tempdir");
            let good = dir.path().join("planner.json");
            fs::write(&good, SAMPLE).expect("write");
            let input = JsonPlannerSource.load(&good).expect("load");
            assert_eq!(input.documents[0].subject, "Wiskunde");

            let bad = dir.path().join("broken.json");
            fs::write(&bad, "{ not json").expect("write");
            let err = JsonPlannerSource.load(&bad).unwrap_err();
            assert!(format!("{err:#}").contains("broken.json"));
        }
    }
}

pub mod projectors {
    pub mod deadline_projector {
        //! Flat deadline list across all subjects.

        use crate::core::{Aggregation, IsoWeekRef};
        use crate::isoweek::parse_iso_date;
        use chrono::NaiveDate;
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct DeadlineOptions {
            /// Inclusive window; `None` leaves that side open.
            pub from: Option<IsoWeekRef>,
            pub to: Option<IsoWeekRef>,
        }

        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct DeadlineItem {
            pub week_id: String,
            pub week: u32,
            pub iso_year: i32,
            pub subject: String,
            pub label: String,
            /// Hand-in date for `Inleveren` labels, else the cell's earliest date.
            pub date: Option<NaiveDate>,
        }

        pub fn project(agg: &Aggregation, opts: DeadlineOptions) -> Vec<DeadlineItem> {
            let mut out = Vec::new();
            for info in &agg.weeks {
                let at = info.week_ref();
                if opts.from.is_some_and(|from| at < from) || opts.to.is_some_and(|to| at > to) {
                    continue;
                }
                let Some(subjects) = agg.by_week.get(&info.id) else {
                    continue;
                };
                for (subject, data) in subjects {
                    for label in &data.deadline_items {
                        let due = label
                            .strip_prefix("Inleveren ")
                            .and_then(parse_iso_date)
                            .or(data.date);
                        out.push(DeadlineItem {
                            week_id: info.id.clone(),
                            week: info.week,
                            iso_year: info.iso_year,
                            subject: subject.clone(),
                            label: label.clone(),
                            date: due,
                        });
                    }
                }
            }
            out
        }
    }

    pub mod matrix_projector {
        //! Subjects × consecutive weeks grid.

        use crate::core::{Aggregation, IsoWeekRef, WeekData, WeekInfo};
        use crate::isoweek::{iso_week_start, week_info, week_ref_of};
        use chrono::Duration;
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct MatrixRow {
            pub subject: String,
            /// One cell per matrix week; `None` where the subject has nothing.
            pub cells: Vec<Option<WeekData>>,
        }

        #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct WeekMatrix {
            pub weeks: Vec<WeekInfo>,
            pub rows: Vec<MatrixRow>,
        }

        /// `count` consecutive weeks from `start`, including weeks the grid never saw.
        pub fn project(agg: &Aggregation, start: IsoWeekRef, count: usize) -> WeekMatrix {
            let weeks = consecutive_weeks(start, count);
            let rows = agg
                .subjects()
                .into_iter()
                .filter_map(|subject| {
                    let cells: Vec<Option<WeekData>> = weeks
                        .iter()
                        .map(|w| agg.subject(&w.id, &subject).cloned())
                        .collect();
                    // subjects with nothing inside the window get no row
                    cells
                        .iter()
                        .any(Option::is_some)
                        .then_some(MatrixRow { subject, cells })
                })
                .collect();
            WeekMatrix { weeks, rows }
        }

        fn consecutive_weeks(start: IsoWeekRef, count: usize) -> Vec<WeekInfo> {
            let Some(monday) = iso_week_start(start.iso_year, start.week) else {
                return Vec::new();
            };
            (0..count as i64)
                .filter_map(|i| monday.checked_add_signed(Duration::weeks(i)))
                .filter_map(|day| week_info(week_ref_of(day)))
                .collect()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::deadline_projector::{self, DeadlineOptions};
        use super::matrix_projector;
        use crate::aggregate::{AggregateOptions, aggregate};
        use crate::core::*;
        use crate::isoweek::parse_week_id;
        use chrono::NaiveDate;

        fn sample() -> Aggregation {
            let mut wi = SourceDocument::new("wi", "Wiskunde");
            wi.school_year = Some("2024/2025".into());
            let mut en = SourceDocument::new("en", "Engels");
            en.school_year = Some("2024/2025".into());
            let rows: RowsByDocument = [
                (
                    DocumentId::from("wi"),
                    vec![
                        SourceRow {
                            test: Some(TestInfo {
                                kind: Some("Toets H1".into()),
                                weight: Some("3".into()),
                            }),
                            date: NaiveDate::from_ymd_opt(2024, 10, 2),
                            ..SourceRow::in_week(40)
                        },
                        SourceRow {
                            due_date: NaiveDate::from_ymd_opt(2024, 12, 20),
                            ..SourceRow::in_week(51)
                        },
                    ],
                ),
                (
                    DocumentId::from("en"),
                    vec![SourceRow {
                        homework: Some("Learn words".into()),
                        ..SourceRow::in_week(41)
                    }],
                ),
            ]
            .into_iter()
            .collect();
            aggregate(
                &[wi, en],
                &rows,
                AggregateOptions {
                    today: NaiveDate::from_ymd_opt(2024, 10, 15),
                },
            )
        }

        #[test]
        fn deadlines_are_listed_in_week_order_and_windowed() {
            let agg = sample();
            let all = deadline_projector::project(&agg, DeadlineOptions::default());
            let labels: Vec<_> = all.iter().map(|d| d.label.as_str()).collect();
            assert_eq!(labels, vec!["Toets H1 (weging 3)", "Inleveren 2024-12-20"]);
            assert_eq!(all[0].date, NaiveDate::from_ymd_opt(2024, 10, 2));
            assert_eq!(all[1].date, NaiveDate::from_ymd_opt(2024, 12, 20));

            let later = deadline_projector::project(
                &agg,
                DeadlineOptions {
                    from: parse_week_id("2024-W41"),
                    to: None,
                },
            );
            assert_eq!(later.len(), 1);
            assert_eq!(later[0].week_id, "2024-W51");
        }

        #[test]
        fn matrix_covers_consecutive_weeks() {
            let agg = sample();
            let start = parse_week_id("2024-W40").unwrap();
            let m = matrix_projector::project(&agg, start, 3);
            let ids: Vec<_> = m.weeks.iter().map(|w| w.id.as_str()).collect();
            assert_eq!(ids, vec!["2024-W40", "2024-W41", "2024-W42"]);
            let subjects: Vec<_> = m.rows.iter().map(|r| r.subject.as_str()).collect();
            assert_eq!(subjects, vec!["Engels", "Wiskunde"]);
            let english = &m.rows[0];
            assert!(english.cells[0].is_none());
            assert_eq!(
                english.cells[1].as_ref().and_then(|c| c.homework.as_deref()),
                Some("Learn words")
            );
            assert!(english.cells[2].is_none());
        }

        #[test]
        fn matrix_crosses_year_end() {
            let agg = sample();
            let m = matrix_projector::project(&agg, parse_week_id("2024-W51").unwrap(), 3);
            let ids: Vec<_> = m.weeks.iter().map(|w| w.id.as_str()).collect();
            assert_eq!(ids, vec!["2024-W51", "2024-W52", "2025-W01"]);
            // Engels only has week 41, outside this window
            let subjects: Vec<_> = m.rows.iter().map(|r| r.subject.as_str()).collect();
            assert_eq!(subjects, vec!["Wiskunde"]);
        }
    }
}

pub use aggregate::{AggregateOptions, aggregate};
pub use splitter::{HeuristicSplitter, HomeworkSplitter, split_items};
pub use state::PlannerState;
pub use storage::{JsonPlannerSource, PlannerInput, PlannerSource};

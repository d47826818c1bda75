//! Once-per-invocation decision between a full scoring run and a cheap refresh.
//!
//! A full run is needed when the target month has not been archived yet,
//! during the first days of the month (late corrections to last month's
//! data still arrive), or when a privileged user asks for one.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days at the start of a month during which every run is a full run.
pub const DEFAULT_GRACE_DAYS: u32 = 5;

/// A calendar month of clearance data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    /// 1-based.
    pub month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month before the one containing `today`.
    pub fn preceding(today: NaiveDate) -> Self {
        if today.month() == 1 {
            Self {
                year: today.year() - 1,
                month: 12,
            }
        } else {
            Self {
                year: today.year(),
                month: today.month() - 1,
            }
        }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(s: &str) -> Option<Self> {
        let (year, month) = s.trim().split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Answers whether a period has already been archived.
pub trait ArchiveCheck {
    fn archive_exists(&self, period: ReportPeriod) -> bool;
}

impl<F> ArchiveCheck for F
where
    F: Fn(ReportPeriod) -> bool,
{
    fn archive_exists(&self, period: ReportPeriod) -> bool {
        self(period)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunMode {
    Skipped,
    FullRun,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::FullRun => "full-run",
        }
    }
}

/// Frozen for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunGuardDecision {
    pub must_archive: bool,
    pub within_grace_window: bool,
    pub is_privileged_user: bool,
    pub proceed_full: bool,
}

impl RunGuardDecision {
    pub fn mode(&self) -> RunMode {
        if self.proceed_full {
            RunMode::FullRun
        } else {
            RunMode::Skipped
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunGuard {
    grace_days: u32,
}

impl Default for RunGuard {
    fn default() -> Self {
        Self {
            grace_days: DEFAULT_GRACE_DAYS,
        }
    }
}

impl RunGuard {
    pub fn with_grace_days(grace_days: u32) -> Self {
        Self { grace_days }
    }

    pub fn grace_days(&self) -> u32 {
        self.grace_days
    }

    pub fn decide(
        &self,
        period: ReportPeriod,
        archive: &dyn ArchiveCheck,
        today: NaiveDate,
        is_privileged_user: bool,
    ) -> RunGuardDecision {
        self.evaluate(archive.archive_exists(period), today, is_privileged_user)
    }

    /// The boolean combinator behind [`decide`](Self::decide), without the lookup.
    pub fn evaluate(
        &self,
        archive_exists: bool,
        today: NaiveDate,
        is_privileged_user: bool,
    ) -> RunGuardDecision {
        let must_archive = !archive_exists;
        let within_grace_window = today.day() <= self.grace_days;
        RunGuardDecision {
            must_archive,
            within_grace_window,
            is_privileged_user,
            proceed_full: must_archive || within_grace_window || is_privileged_user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn missing_archive_always_runs() {
        let guard = RunGuard::default();
        for day in [1, 5, 6, 15, 28] {
            for privileged in [false, true] {
                let d = guard.evaluate(false, date(2026, 2, day), privileged);
                assert!(d.must_archive);
                assert!(d.proceed_full, "day {day}, privileged {privileged}");
                assert_eq!(d.mode(), RunMode::FullRun);
            }
        }
    }

    #[test]
    fn archived_mid_month_skips() {
        let d = RunGuard::default().evaluate(true, date(2026, 3, 17), false);
        assert!(!d.must_archive);
        assert!(!d.within_grace_window);
        assert!(!d.proceed_full);
        assert_eq!(d.mode(), RunMode::Skipped);
    }

    #[test]
    fn grace_window_boundary() {
        let guard = RunGuard::default();
        assert!(guard.evaluate(true, date(2026, 3, 5), false).proceed_full);
        assert!(!guard.evaluate(true, date(2026, 3, 6), false).proceed_full);
    }

    #[test]
    fn privileged_user_forces_full_run() {
        let d = RunGuard::default().evaluate(true, date(2026, 3, 20), true);
        assert!(d.is_privileged_user);
        assert!(d.proceed_full);
        assert!(!d.must_archive);
    }

    #[test]
    fn custom_grace_days() {
        assert_eq!(RunGuard::default().grace_days(), DEFAULT_GRACE_DAYS);
        let guard = RunGuard::with_grace_days(0);
        assert_eq!(guard.grace_days(), 0);
        assert!(!guard.evaluate(true, date(2026, 3, 1), false).proceed_full);
    }

    #[test]
    fn decide_consults_archive_check() {
        let archived = ReportPeriod::new(2026, 1).unwrap();
        let check = move |p: ReportPeriod| p == archived;
        let guard = RunGuard::default();

        let d = guard.decide(archived, &check, date(2026, 2, 20), false);
        assert!(!d.proceed_full);

        let other = ReportPeriod::new(2025, 12).unwrap();
        let d = guard.decide(other, &check, date(2026, 2, 20), false);
        assert!(d.must_archive);
        assert!(d.proceed_full);
    }

    #[test]
    fn preceding_period_wraps_year() {
        assert_eq!(
            ReportPeriod::preceding(date(2026, 1, 3)),
            ReportPeriod { year: 2025, month: 12 }
        );
        assert_eq!(
            ReportPeriod::preceding(date(2026, 7, 31)),
            ReportPeriod { year: 2026, month: 6 }
        );
    }

    #[test]
    fn period_display_and_parse() {
        let p = ReportPeriod::new(2026, 3).unwrap();
        assert_eq!(p.to_string(), "2026-03");
        assert_eq!(ReportPeriod::parse("2026-03"), Some(p));
        assert_eq!(ReportPeriod::parse("2026-13"), None);
        assert_eq!(ReportPeriod::parse("March"), None);
    }
}

//! Statistics derived from cached session history.

use chrono::{Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::types::{FocusSession, SessionStatus};

/// Days covered by [`daily_stats`] and [`weekly_stats`].
pub const WINDOW_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub sessions: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub sessions: u32,
    pub minutes: u32,
    pub points_earned: u32,
    pub average_minutes: f64,
    /// Consecutive days up to `today` with at least one completed session.
    pub streak_days: u32,
}

/// Completed focus per local day for the seven days ending at `today`,
/// oldest first. Days without sessions are present with zeros.
pub fn daily_stats<Tz: TimeZone>(
    sessions: &[FocusSession],
    today: NaiveDate,
    tz: &Tz,
) -> Vec<DailyStat> {
    let first = today
        .checked_sub_days(Days::new(WINDOW_DAYS - 1))
        .unwrap_or(today);
    let mut days: Vec<DailyStat> = first
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|date| DailyStat {
            date,
            sessions: 0,
            minutes: 0,
        })
        .collect();

    for session in completed(sessions) {
        let date = session.start_time.with_timezone(tz).date_naive();
        if let Some(day) = days.iter_mut().find(|d| d.date == date) {
            day.sessions += 1;
            day.minutes += session.minutes();
        }
    }
    days
}

/// Totals over the seven days ending at `today`.
pub fn weekly_stats<Tz: TimeZone>(
    sessions: &[FocusSession],
    today: NaiveDate,
    tz: &Tz,
) -> WeeklyStats {
    let days = daily_stats(sessions, today, tz);
    let first = days.first().map(|d| d.date).unwrap_or(today);

    let points_earned = completed(sessions)
        .filter(|s| {
            let date = s.start_time.with_timezone(tz).date_naive();
            date >= first && date <= today
        })
        .filter_map(|s| s.points_earned)
        .sum();

    let session_count: u32 = days.iter().map(|d| d.sessions).sum();
    let minutes: u32 = days.iter().map(|d| d.minutes).sum();
    let average_minutes = if session_count == 0 {
        0.0
    } else {
        f64::from(minutes) / f64::from(session_count)
    };
    let streak_days = days.iter().rev().take_while(|d| d.sessions > 0).count() as u32;

    WeeklyStats {
        sessions: session_count,
        minutes,
        points_earned,
        average_minutes,
        streak_days,
    }
}

fn completed(sessions: &[FocusSession]) -> impl Iterator<Item = &FocusSession> {
    sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, Utc};

    fn session(start: &str, minutes: u32, status: SessionStatus) -> FocusSession {
        FocusSession {
            id: start.to_string(),
            task_id: None,
            goal_id: None,
            start_time: start.parse::<DateTime<Utc>>().unwrap(),
            planned_duration: 25,
            ambient_mode: None,
            status,
            completed_duration: Some(minutes),
            points_earned: Some(minutes / 5),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn seven_days_oldest_first_with_gaps() {
        let history = vec![
            session("2026-10-19T09:00:00Z", 25, SessionStatus::Completed),
            session("2026-10-19T10:00:00Z", 25, SessionStatus::Completed),
            session("2026-10-15T09:00:00Z", 50, SessionStatus::Completed),
            session("2026-10-19T11:00:00Z", 25, SessionStatus::Abandoned),
            session("2026-10-01T09:00:00Z", 25, SessionStatus::Completed),
        ];
        let days = daily_stats(&history, today(), &Utc);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 10, 13).unwrap());
        assert_eq!(days[6].sessions, 2);
        assert_eq!(days[6].minutes, 50);
        assert_eq!(days[2].minutes, 50);
        assert_eq!(days[5].sessions, 0);
    }

    #[test]
    fn days_follow_the_given_timezone() {
        // 23:30 UTC on the 18th is already the 19th at UTC+2.
        let history = vec![session("2026-10-18T23:30:00Z", 25, SessionStatus::Completed)];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let days = daily_stats(&history, today(), &plus_two);
        assert_eq!(days[6].sessions, 1);
        let days = daily_stats(&history, today(), &Utc);
        assert_eq!(days[5].sessions, 1);
    }

    #[test]
    fn weekly_totals_and_streak() {
        let history = vec![
            session("2026-10-19T09:00:00Z", 25, SessionStatus::Completed),
            session("2026-10-18T09:00:00Z", 50, SessionStatus::Completed),
            session("2026-10-16T09:00:00Z", 15, SessionStatus::Completed),
        ];
        let week = weekly_stats(&history, today(), &Utc);
        assert_eq!(week.sessions, 3);
        assert_eq!(week.minutes, 90);
        assert_eq!(week.points_earned, 5 + 10 + 3);
        assert!((week.average_minutes - 30.0).abs() < f64::EPSILON);
        assert_eq!(week.streak_days, 2);
    }

    #[test]
    fn empty_history_has_zero_average() {
        let week = weekly_stats(&[], today(), &Utc);
        assert_eq!(week.sessions, 0);
        assert_eq!(week.average_minutes, 0.0);
        assert_eq!(week.streak_days, 0);
    }
}

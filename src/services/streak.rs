use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinKind {
    Normal,
    Makeup,
}

impl CheckinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinKind::Normal => "normal",
            CheckinKind::Makeup => "makeup",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(CheckinKind::Normal),
            "makeup" => Some(CheckinKind::Makeup),
            _ => None,
        }
    }
}

/// The most recent checkin a user already has on record.
#[derive(Debug, Clone, Copy)]
pub struct PriorCheckin {
    pub date: NaiveDate,
    pub streak_days: i64,
}

/// Streak length for a new checkin on `date`.
///
/// A one-day gap continues the streak. A larger gap breaks it, unless the
/// checkin is a makeup, which is treated as having filled the gap. Same-day
/// duplicates are rejected before this is called.
pub fn next_streak(prior: Option<PriorCheckin>, date: NaiveDate, kind: CheckinKind) -> i64 {
    let Some(prior) = prior else {
        return 1;
    };

    let gap_days = (date - prior.date).num_days();
    if gap_days == 1 {
        return prior.streak_days + 1;
    }
    if gap_days > 1 && kind == CheckinKind::Makeup {
        return prior.streak_days + 1;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_checkin_starts_at_one() {
        assert_eq!(next_streak(None, date(2024, 3, 1), CheckinKind::Normal), 1);
        assert_eq!(next_streak(None, date(2024, 3, 1), CheckinKind::Makeup), 1);
    }

    #[test]
    fn consecutive_day_extends_streak() {
        let prior = PriorCheckin {
            date: date(2024, 3, 1),
            streak_days: 4,
        };
        assert_eq!(
            next_streak(Some(prior), date(2024, 3, 2), CheckinKind::Normal),
            5
        );
    }

    #[test]
    fn gap_with_normal_checkin_resets() {
        let prior = PriorCheckin {
            date: date(2024, 3, 1),
            streak_days: 4,
        };
        assert_eq!(
            next_streak(Some(prior), date(2024, 3, 4), CheckinKind::Normal),
            1
        );
    }

    #[test]
    fn gap_with_makeup_checkin_continues() {
        let prior = PriorCheckin {
            date: date(2024, 3, 1),
            streak_days: 4,
        };
        assert_eq!(
            next_streak(Some(prior), date(2024, 3, 4), CheckinKind::Makeup),
            5
        );
    }

    #[test]
    fn month_boundary_counts_as_consecutive() {
        let prior = PriorCheckin {
            date: date(2024, 2, 29),
            streak_days: 10,
        };
        assert_eq!(
            next_streak(Some(prior), date(2024, 3, 1), CheckinKind::Normal),
            11
        );
    }

    #[test]
    fn backdated_checkin_does_not_extend() {
        let prior = PriorCheckin {
            date: date(2024, 3, 10),
            streak_days: 4,
        };
        assert_eq!(
            next_streak(Some(prior), date(2024, 3, 5), CheckinKind::Makeup),
            1
        );
    }

    #[test]
    fn kind_parsing_round_trips() {
        assert_eq!(CheckinKind::parse("normal"), Some(CheckinKind::Normal));
        assert_eq!(CheckinKind::parse("makeup"), Some(CheckinKind::Makeup));
        assert_eq!(CheckinKind::parse("bogus"), None);
    }
}

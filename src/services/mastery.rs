use serde::Serialize;

/// Coarse bucket of a word's historical correct-answer count. Reporting only,
/// never drives scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryTier {
    Unmastered,
    Emerging,
    Proficient,
    Mastered,
}

impl MasteryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryTier::Unmastered => "unmastered",
            MasteryTier::Emerging => "emerging",
            MasteryTier::Proficient => "proficient",
            MasteryTier::Mastered => "mastered",
        }
    }
}

pub fn classify(correct_times: i64) -> MasteryTier {
    match correct_times {
        i64::MIN..=0 => MasteryTier::Unmastered,
        1..=2 => MasteryTier::Emerging,
        3..=5 => MasteryTier::Proficient,
        _ => MasteryTier::Mastered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(classify(0), MasteryTier::Unmastered);
        assert_eq!(classify(1), MasteryTier::Emerging);
        assert_eq!(classify(2), MasteryTier::Emerging);
        assert_eq!(classify(3), MasteryTier::Proficient);
        assert_eq!(classify(5), MasteryTier::Proficient);
        assert_eq!(classify(6), MasteryTier::Mastered);
        assert_eq!(classify(1000), MasteryTier::Mastered);
    }

    #[test]
    fn negative_counts_fall_back_to_unmastered() {
        assert_eq!(classify(-3), MasteryTier::Unmastered);
    }
}

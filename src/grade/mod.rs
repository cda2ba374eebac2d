use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const UNMAPPED_GRADE_RANK: u8 = 99;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    Kindergarten,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Eighth,
    Ninth,
    Tenth,
    Eleventh,
    Twelfth,
}

impl Grade {
    pub const ALL: [Grade; 13] = [
        Grade::Kindergarten,
        Grade::First,
        Grade::Second,
        Grade::Third,
        Grade::Fourth,
        Grade::Fifth,
        Grade::Sixth,
        Grade::Seventh,
        Grade::Eighth,
        Grade::Ninth,
        Grade::Tenth,
        Grade::Eleventh,
        Grade::Twelfth,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Grade::Kindergarten => "Kindergarten",
            Grade::First => "1st Grade",
            Grade::Second => "2nd Grade",
            Grade::Third => "3rd Grade",
            Grade::Fourth => "4th Grade",
            Grade::Fifth => "5th Grade",
            Grade::Sixth => "6th Grade",
            Grade::Seventh => "7th Grade",
            Grade::Eighth => "8th Grade",
            Grade::Ninth => "9th Grade",
            Grade::Tenth => "10th Grade",
            Grade::Eleventh => "11th Grade",
            Grade::Twelfth => "12th Grade",
        }
    }

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Grade::Kindergarten => "Kindergarten",
            Grade::First => "1",
            Grade::Second => "2",
            Grade::Third => "3",
            Grade::Fourth => "4",
            Grade::Fifth => "5",
            Grade::Sixth => "6",
            Grade::Seventh => "7",
            Grade::Eighth => "8",
            Grade::Ninth => "9",
            Grade::Tenth => "10",
            Grade::Eleventh => "11",
            Grade::Twelfth => "12",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.key() == value)
    }

    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if let Some(g) = Self::from_key(trimmed) {
            return Some(g);
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower == "k" || lower == "kindergarten" {
            return Some(Grade::Kindergarten);
        }
        let lower = lower.strip_suffix(" grade").unwrap_or(&lower);
        let digits = lower
            .strip_suffix("st")
            .or_else(|| lower.strip_suffix("nd"))
            .or_else(|| lower.strip_suffix("rd"))
            .or_else(|| lower.strip_suffix("th"))
            .unwrap_or(lower);
        let n: usize = digits.parse().ok()?;
        if (1..=12).contains(&n) {
            Some(Self::ALL[n])
        } else {
            None
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::parse(s).ok_or_else(|| format!("unknown grade '{s}', expected K or 1-12"))
    }
}

pub fn grade_rank(value: &str) -> u8 {
    Grade::from_key(value)
        .map(Grade::rank)
        .unwrap_or(UNMAPPED_GRADE_RANK)
}

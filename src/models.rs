use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionRecord {
    pub entity_id: i64,
    pub ingested_at: DateTime<Utc>,
    pub display_name: String,
    pub team: String,
    pub position_id: i64,
    pub goals: i64,
    pub assists: i64,
    pub minutes: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
    pub saves: i64,
    pub clean_sheets: i64,
    pub form: f64,
    pub influence: f64,
    pub creativity: f64,
    pub threat: f64,
    pub ict_index: f64,
    pub injury_news: Option<String>,
    pub chance_of_playing: Option<i64>,
}

impl IngestionRecord {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Goals => self.goals as f64,
            Metric::Assists => self.assists as f64,
            Metric::Minutes => self.minutes as f64,
            Metric::YellowCards => self.yellow_cards as f64,
            Metric::RedCards => self.red_cards as f64,
            Metric::Saves => self.saves as f64,
            Metric::CleanSheets => self.clean_sheets as f64,
            Metric::Form => self.form,
            Metric::Influence => self.influence,
            Metric::Creativity => self.creativity,
            Metric::Threat => self.threat,
            Metric::IctIndex => self.ict_index,
        }
    }

    pub fn has_injury(&self) -> bool {
        self.injury_news
            .as_deref()
            .is_some_and(|news| !news.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Count,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Goals,
    Assists,
    Minutes,
    YellowCards,
    RedCards,
    Saves,
    CleanSheets,
    Form,
    Influence,
    Creativity,
    Threat,
    IctIndex,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Goals,
        Metric::Assists,
        Metric::Minutes,
        Metric::YellowCards,
        Metric::RedCards,
        Metric::Saves,
        Metric::CleanSheets,
        Metric::Form,
        Metric::Influence,
        Metric::Creativity,
        Metric::Threat,
        Metric::IctIndex,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::Goals => "goals",
            Metric::Assists => "assists",
            Metric::Minutes => "minutes",
            Metric::YellowCards => "yellow_cards",
            Metric::RedCards => "red_cards",
            Metric::Saves => "saves",
            Metric::CleanSheets => "clean_sheets",
            Metric::Form => "form",
            Metric::Influence => "influence",
            Metric::Creativity => "creativity",
            Metric::Threat => "threat",
            Metric::IctIndex => "ict_index",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Metric::Form
            | Metric::Influence
            | Metric::Creativity
            | Metric::Threat
            | Metric::IctIndex => MetricKind::Float,
            _ => MetricKind::Count,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Goals => "Goals",
            Metric::Assists => "Assists",
            Metric::Minutes => "Minutes",
            Metric::YellowCards => "Yellow Cards",
            Metric::RedCards => "Red Cards",
            Metric::Saves => "Saves",
            Metric::CleanSheets => "Clean Sheets",
            Metric::Form => "Form",
            Metric::Influence => "Influence",
            Metric::Creativity => "Creativity",
            Metric::Threat => "Threat",
            Metric::IctIndex => "ICT Index",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Metric::ALL
            .into_iter()
            .find(|metric| metric.column() == wanted)
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Entity,
    Team,
}

impl GroupBy {
    pub fn column(self) -> &'static str {
        match self {
            GroupBy::Entity => "id",
            GroupBy::Team => "team",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Reduction {
    #[default]
    Sum,
    Max,
    Mean,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Sum => write!(f, "sum"),
            Reduction::Max => write!(f, "max"),
            Reduction::Mean => write!(f, "mean"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub group: String,
    pub label: String,
    pub date: NaiveDate,
    pub metric: Metric,
    pub value: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub group: String,
    pub date: NaiveDate,
    pub value: f64,
    pub rolling_mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total_players: usize,
    pub total_goals: i64,
    pub total_assists: i64,
    pub active_injuries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Availability {
    Out,
    Doubtful,
    Questionable,
    Available,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Out => write!(f, "out"),
            Availability::Doubtful => write!(f, "doubtful"),
            Availability::Questionable => write!(f, "questionable"),
            Availability::Available => write!(f, "available"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InjuryEntry {
    pub display_name: String,
    pub team: String,
    pub injury_news: String,
    pub chance_of_playing: i64,
    pub availability: Availability,
}

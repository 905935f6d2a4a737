use serde::{Deserialize, Serialize};

/// Kind of a key price level. A level collection holds at most one entry per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    PrevDayHigh,
    PrevDayLow,
    PrevDayClose,
    PremarketHigh,
    PremarketLow,
    OrbHigh,
    OrbLow,
    Vwap,
    EmaShort,
    EmaLong,
    SmaLong,
    WeekHigh,
    WeekLow,
    MonthHigh,
    MonthLow,
    RoundAbove,
    RoundBelow,
    Support,
    Resistance,
}

impl LevelType {
    /// Default chart label.
    pub fn label(&self) -> &'static str {
        match self {
            LevelType::PrevDayHigh => "PDH",
            LevelType::PrevDayLow => "PDL",
            LevelType::PrevDayClose => "PDC",
            LevelType::PremarketHigh => "PMH",
            LevelType::PremarketLow => "PML",
            LevelType::OrbHigh => "ORB High",
            LevelType::OrbLow => "ORB Low",
            LevelType::Vwap => "VWAP",
            LevelType::EmaShort => "EMA Short",
            LevelType::EmaLong => "EMA Long",
            LevelType::SmaLong => "SMA Long",
            LevelType::WeekHigh => "Week High",
            LevelType::WeekLow => "Week Low",
            LevelType::MonthHigh => "Month High",
            LevelType::MonthLow => "Month Low",
            LevelType::RoundAbove => "Round",
            LevelType::RoundBelow => "Round",
            LevelType::Support => "Support",
            LevelType::Resistance => "Resistance",
        }
    }

    pub fn line_style(&self) -> LineStyle {
        match self {
            LevelType::Vwap | LevelType::EmaShort | LevelType::EmaLong | LevelType::SmaLong => {
                LineStyle::Solid
            }
            LevelType::RoundAbove | LevelType::RoundBelow => LineStyle::Dotted,
            _ => LineStyle::Dashed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// A labelled price level for scoring and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLevel {
    pub price: f64,
    pub label: String,
    #[serde(rename = "type")]
    pub level_type: LevelType,
    pub line_style: LineStyle,
    /// Touch count, for swing-derived levels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<u32>,
}

impl KeyLevel {
    pub fn new(level_type: LevelType, price: f64) -> Self {
        Self {
            price,
            label: level_type.label().to_string(),
            level_type,
            line_style: level_type.line_style(),
            strength: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_strength(mut self, strength: u32) -> Self {
        self.strength = Some(strength);
        self
    }
}

/// Nearest level to `price`, by absolute distance.
pub fn nearest_level(levels: &[KeyLevel], price: f64) -> Option<&KeyLevel> {
    levels.iter().min_by(|a, b| {
        (a.price - price)
            .abs()
            .total_cmp(&(b.price - price).abs())
    })
}

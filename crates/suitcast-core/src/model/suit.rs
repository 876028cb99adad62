use core::fmt;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Suit {
    Clubs = 0,
    Diamonds = 1,
    Spades = 2,
    Hearts = 3,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Spades, Suit::Hearts];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Suit::Clubs),
            1 => Some(Suit::Diamonds),
            2 => Some(Suit::Spades),
            3 => Some(Suit::Hearts),
            _ => None,
        }
    }

    pub const fn symbol(self) -> char {
        match self {
            Suit::Clubs => '♣',
            Suit::Diamonds => '♦',
            Suit::Spades => '♠',
            Suit::Hearts => '♥',
        }
    }

    /// Emoji presentation used in channel messages.
    pub const fn emoji(self) -> &'static str {
        match self {
            Suit::Clubs => "♣️",
            Suit::Diamonds => "♦️",
            Suit::Spades => "♠️",
            Suit::Hearts => "❤️",
        }
    }

    /// Accepts the text and emoji forms seen in source channels, plus the
    /// single-letter ASCII forms.
    pub fn from_symbol(value: &str) -> Option<Self> {
        match value.trim().trim_end_matches('\u{fe0f}') {
            "♣" | "C" | "c" => Some(Suit::Clubs),
            "♦" | "D" | "d" => Some(Suit::Diamonds),
            "♠" | "S" | "s" => Some(Suit::Spades),
            "♥" | "❤" | "H" | "h" => Some(Suit::Hearts),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl Serialize for Suit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Suit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Suit::from_symbol(&text)
            .ok_or_else(|| de::Error::custom(format!("unknown suit '{text}'")))
    }
}

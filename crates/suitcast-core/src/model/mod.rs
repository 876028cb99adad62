pub mod card;
pub mod deck;
pub mod event;
pub mod rank;
pub mod suit;

pub use card::{Card, ParseCardError};
pub use deck::Deck;
pub use event::{Delivery, GameEvent};
pub use rank::Rank;
pub use suit::Suit;

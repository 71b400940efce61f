pub mod ids;

pub use ids::{GameId, PlayerId};

use serde::Serialize;
use worldbuilder_common::TileCoord;

/// Which tile, if any, the player is looking at.
///
/// `NoSelection → TileSelected` on select; a purchase or build keeps the
/// tile selected whatever its outcome. Only an explicit clear goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Selection {
    #[default]
    NoSelection,
    TileSelected(TileCoord),
}

impl Selection {
    pub fn coord(self) -> Option<TileCoord> {
        match self {
            Selection::NoSelection => None,
            Selection::TileSelected(c) => Some(c),
        }
    }
}

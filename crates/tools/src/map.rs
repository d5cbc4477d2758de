use worldbuilder_common::{Address, TileCoord};
use worldbuilder_kernel::{Tile, WORLD_SIZE, World};

/// Render the grid as text, one row per `y`, `x` increasing to the right.
///
/// `.` unowned, `o` owned by someone else, `@` owned by `viewer`. Built
/// tiles show the building glyph instead, upper-case when the viewer owns it.
pub fn render_map(world: &World, viewer: Option<&Address>) -> String {
    let mut out = String::with_capacity(((WORLD_SIZE + 1) * WORLD_SIZE) as usize);
    for y in 0..WORLD_SIZE {
        for x in 0..WORLD_SIZE {
            let glyph = world
                .tile(TileCoord::new(x, y))
                .map_or('?', |t| tile_glyph(t, viewer));
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

fn tile_glyph(tile: &Tile, viewer: Option<&Address>) -> char {
    let mine = viewer.is_some_and(|v| tile.is_owned_by(v));
    match (&tile.owner, tile.building.is_empty()) {
        (None, _) => '.',
        (Some(_), true) if mine => '@',
        (Some(_), true) => 'o',
        (Some(_), false) if mine => tile.building.glyph().to_ascii_uppercase(),
        (Some(_), false) => tile.building.glyph(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldbuilder_kernel::{Building, BuildingCatalog};

    #[test]
    fn map_has_one_line_per_row() {
        let world = World::generate(BuildingCatalog::default(), 0);
        let map = render_map(&world, None);
        let rows: Vec<&str> = map.lines().collect();
        assert_eq!(rows.len(), WORLD_SIZE as usize);
        assert!(rows.iter().all(|r| r.chars().count() == WORLD_SIZE as usize));
    }

    #[test]
    fn seeded_tiles_render() {
        let world = World::generate(BuildingCatalog::default(), 0);
        let map = render_map(&world, None);
        let first: Vec<char> = map.lines().next().unwrap().chars().collect();
        // Row y=0: (0,0) seed 0 is a house, (1,0) seed 20 is a house.
        assert_eq!(first[0], 'h');
        assert_eq!(first[1], 'h');
        // (0,10) seed 10 is owned but empty.
        let row10: Vec<char> = map.lines().nth(10).unwrap().chars().collect();
        assert_eq!(row10[0], 'o');
        assert_eq!(map.chars().filter(|c| *c == 'h').count(), 20);
    }

    #[test]
    fn viewer_tiles_are_highlighted() {
        let mut world = World::generate(BuildingCatalog::default(), 0);
        let me = Address::from_low_u64(77_777);
        world.purchase_land(TileCoord::new(3, 1), &me).unwrap();
        world.purchase_land(TileCoord::new(4, 1), &me).unwrap();
        world
            .place_building(TileCoord::new(4, 1), &me, Building::Factory, 0)
            .unwrap();

        let map = render_map(&world, Some(&me));
        let row: Vec<char> = map.lines().nth(1).unwrap().chars().collect();
        assert_eq!(row[3], '@');
        assert_eq!(row[4], 'F');
        assert_eq!(row[5], '.');

        let anon = render_map(&world, None);
        let row: Vec<char> = anon.lines().nth(1).unwrap().chars().collect();
        assert_eq!(row[3], 'o');
        assert_eq!(row[4], 'f');
    }
}

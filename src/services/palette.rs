//! Cursor color palette.
//!
//! Colors are drawn uniformly at random per connection. Two members of the
//! same document may end up with the same color; nothing disambiguates them.

use rand::Rng;

/// Tailwind 500 shades: sky, neutral, teal, green, blue, red, yellow.
pub const PALETTE: [&str; 7] = ["#0ea5e9", "#737373", "#14b8a6", "#22c55e", "#3b82f6", "#ef4444", "#eab308"];

/// Pick a color for a newly bound connection.
#[must_use]
pub fn pick_color() -> &'static str {
    pick_color_with(&mut rand::rng())
}

/// Pick a color using the supplied RNG.
pub fn pick_color_with(rng: &mut impl Rng) -> &'static str {
    PALETTE[rng.random_range(0..PALETTE.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn pick_color_is_from_palette() {
        for _ in 0..64 {
            assert!(PALETTE.contains(&pick_color()));
        }
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(7);
            (0..16).map(|_| pick_color_with(&mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(7);
            (0..16).map(|_| pick_color_with(&mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn palette_entries_are_hex() {
        for color in PALETTE {
            assert_eq!(color.len(), 7);
            assert!(color.starts_with('#'));
            assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}

//! Frame timing and draw counters.

use std::time::Duration;

use crate::draw_list::DrawStats;

/// Timings are in milliseconds and cover the most recent frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineStats {
    /// Wall time between the last two frames.
    pub frame_time: f32,
    pub triangle_count: u32,
    pub draw_call_count: u32,
    /// Camera update and scene traversal.
    pub scene_update_time: f32,
    /// Culling, sorting and recording the geometry pass.
    pub mesh_draw_time: f32,
}

impl EngineStats {
    pub fn record_draws(&mut self, draws: DrawStats) {
        self.draw_call_count = draws.draw_calls;
        self.triangle_count = draws.triangles;
    }
}

pub(crate) fn millis(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_draws_replaces_counts() {
        let mut stats = EngineStats::default();
        stats.record_draws(DrawStats {
            draw_calls: 3,
            triangles: 12,
        });
        stats.record_draws(DrawStats {
            draw_calls: 2,
            triangles: 4,
        });
        assert_eq!((stats.draw_call_count, stats.triangle_count), (2, 4));
    }

    #[test]
    fn test_millis() {
        assert!((millis(Duration::from_micros(2500)) - 2.5).abs() < 1e-4);
    }
}

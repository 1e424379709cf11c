use std::time::{Duration, Instant};

/// Frame cadence and fps, shown in the window title every half second.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: Instant::now(),
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Returns the new window title when it is due for a refresh.
    pub fn update(&mut self, now: Instant) -> Option<String> {
        let dt_duration = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() < 0.5 {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        let ms = (self.frame_dt * 1000.0).max(0.0);
        self.frame_count = 0;
        self.last_fps_time = now;
        Some(format!(
            "{} - {:.1} fps (cadence {:.2} ms, render {:.2} ms)",
            self.base_title, fps, ms, self.render_ms
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_refreshes_every_half_second() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("archviz".to_string());
        timing.last_fps_time = start;
        assert!(timing.update(start + Duration::from_millis(100)).is_none());
        timing.set_render_ms(3.0);
        let title = timing.update(start + Duration::from_millis(600)).unwrap();
        assert!(title.starts_with("archviz - "));
        assert!(title.contains("render 3.00 ms"));
        assert!((timing.frame_dt - 0.5).abs() < 1e-3);
    }
}

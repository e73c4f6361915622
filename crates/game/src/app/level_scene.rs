use std::path::PathBuf;
use std::time::Duration;

use lemsim_engine::sim::{PaintMode, ToolId, WorldInitError};
use lemsim_engine::{
    BrushCursor, Camera2D, InputAction, InputSnapshot, LevelData, MetricsHandle, RenderView,
    Scene, SceneCommand, SimulationWorld, Vec2, WorldEvent,
};
use tracing::{debug, info, warn};

use super::save;

const NUKE_CONFIRM_WINDOW_MS: f64 = 500.0;
const CAMERA_SCROLL_PX_PER_TICK: f32 = 6.0;
const WHEEL_SCROLL_PX_PER_STEP: f32 = 24.0;
const BRUSH_RADIUS_DEFAULT: f32 = 8.0;
const BRUSH_RADIUS_MIN: f32 = 2.0;
const BRUSH_RADIUS_MAX: f32 = 40.0;
const BRUSH_RADIUS_STEP: f32 = 2.0;

/// One attempt at one level: routes input to the world and ticks it.
pub(crate) struct LevelScene {
    level: LevelData,
    world: SimulationWorld,
    cache_dir: PathBuf,
    metrics: MetricsHandle,
    camera: Camera2D,
    selected_tool: ToolId,
    paint_mode: bool,
    brush_radius: f32,
    brush_stroke: Option<PaintMode>,
    show_regions: bool,
    cursor_level: Option<Vec2>,
    hovered_agent: Option<usize>,
    scene_time_ms: f64,
    nuke_armed_at_ms: Option<f64>,
}

impl LevelScene {
    pub(crate) fn new(
        level: LevelData,
        cache_dir: PathBuf,
        metrics: MetricsHandle,
    ) -> Result<Self, WorldInitError> {
        let world = SimulationWorld::from_level(level.clone())?;
        Ok(Self {
            level,
            world,
            cache_dir,
            metrics,
            camera: Camera2D::default(),
            selected_tool: ToolId::Climber,
            paint_mode: false,
            brush_radius: BRUSH_RADIUS_DEFAULT,
            brush_stroke: None,
            show_regions: false,
            cursor_level: None,
            hovered_agent: None,
            scene_time_ms: 0.0,
            nuke_armed_at_ms: None,
        })
    }

    fn reset_view_state(&mut self) {
        self.camera = Camera2D::default();
        self.selected_tool = ToolId::Climber;
        self.paint_mode = false;
        self.brush_radius = BRUSH_RADIUS_DEFAULT;
        self.brush_stroke = None;
        self.cursor_level = None;
        self.hovered_agent = None;
        self.nuke_armed_at_ms = None;
    }

    fn handle_toggles(&mut self, input: &InputSnapshot) {
        for slot in 0..lemsim_engine::app::TOOL_SLOT_COUNT {
            if input.was_pressed(InputAction::SelectTool(slot)) {
                self.selected_tool = ToolId::ALL[slot as usize];
                info!(
                    tool = self.selected_tool.def_key(),
                    remaining = self.world.inventory().remaining(self.selected_tool),
                    "tool_selected"
                );
            }
        }
        if input.was_pressed(InputAction::TogglePaintMode) {
            self.paint_mode = !self.paint_mode;
            info!(paint_mode = self.paint_mode, "paint_mode_toggled");
        }
        if input.was_pressed(InputAction::BrushGrow) {
            self.brush_radius = (self.brush_radius + BRUSH_RADIUS_STEP).min(BRUSH_RADIUS_MAX);
        }
        if input.was_pressed(InputAction::BrushShrink) {
            self.brush_radius = (self.brush_radius - BRUSH_RADIUS_STEP).max(BRUSH_RADIUS_MIN);
        }
        if input.was_pressed(InputAction::Pause) {
            let paused = !self.world.clock().is_paused();
            self.world.set_paused(paused);
            info!(paused, "pause_toggled");
        }
        if input.was_pressed(InputAction::FastForward) {
            let enabled = !self.world.clock().is_fast_forward();
            self.world.set_fast_forward(enabled);
            info!(fast_forward = enabled, "fast_forward_toggled");
        }
        if input.was_pressed(InputAction::ReleaseFaster) {
            self.world.adjust_release_rate(1);
        }
        if input.was_pressed(InputAction::ReleaseSlower) {
            self.world.adjust_release_rate(-1);
        }
        if input.was_pressed(InputAction::ToggleRegions) {
            self.show_regions = !self.show_regions;
        }
        if input.was_pressed(InputAction::Nuke) {
            self.handle_nuke_press();
        }
    }

    /// Nuke needs a second press inside the confirm window.
    fn handle_nuke_press(&mut self) {
        match self.nuke_armed_at_ms {
            Some(armed_at) if self.scene_time_ms - armed_at <= NUKE_CONFIRM_WINDOW_MS => {
                self.nuke_armed_at_ms = None;
                if !self.world.is_nuked() {
                    self.world.nuke();
                }
            }
            _ => {
                self.nuke_armed_at_ms = Some(self.scene_time_ms);
                info!("nuke_confirm_pending");
            }
        }
    }

    fn handle_camera(&mut self, input: &InputSnapshot) {
        let zoom = self.camera.effective_zoom() as f32;
        let step = CAMERA_SCROLL_PX_PER_TICK / zoom;
        let mut dx = 0.0;
        let mut dy = 0.0;
        if input.is_down(InputAction::ScrollLeft) {
            dx -= step;
        }
        if input.is_down(InputAction::ScrollRight) {
            dx += step;
        }
        if input.is_down(InputAction::ScrollUp) {
            dy -= step;
        }
        if input.is_down(InputAction::ScrollDown) {
            dy += step;
        }
        dx -= input.scroll_steps() as f32 * WHEEL_SCROLL_PX_PER_STEP / zoom;
        self.camera.pan(dx, dy);
        let terrain = self.world.terrain();
        self.camera
            .clamp_to_level((terrain.width(), terrain.height()), input.window_size());
    }

    fn handle_pointer(&mut self, input: &InputSnapshot) {
        self.cursor_level = input
            .cursor_position_px()
            .map(|screen| self.camera.screen_to_level(screen));
        let Some(cursor) = self.cursor_level else {
            self.hovered_agent = None;
            return;
        };
        self.hovered_agent = self.world.pick_agent_at(cursor.x, cursor.y);

        if self.paint_mode {
            self.brush_stroke = if input.left_mouse_down() {
                Some(PaintMode::Add)
            } else if input.right_mouse_down() {
                Some(PaintMode::Remove)
            } else {
                None
            };
            if let Some(mode) = self.brush_stroke {
                self.world.paint(cursor.x, cursor.y, self.brush_radius, mode);
            }
            return;
        }

        if !input.left_click_pressed() {
            return;
        }
        let Some(index) = self.hovered_agent else {
            debug!(x = cursor.x, y = cursor.y, "click_missed");
            return;
        };
        if let Err(rejected) = self.world.assign_tool(index, self.selected_tool) {
            info!(
                index,
                tool = self.selected_tool.def_key(),
                reason = %rejected,
                "tool_rejected"
            );
        }
    }

    fn handle_persistence(&mut self, input: &InputSnapshot) {
        let path = save::save_file_path(&self.cache_dir, self.world.level_name());
        if input.was_pressed(InputAction::QuickSave) {
            let save = save::build_save_game(&self.world);
            match save::write_save(&path, &save) {
                Ok(()) => info!(
                    path = %path.display(),
                    tick = save.tick,
                    digest = %save.digest,
                    "save_written"
                ),
                Err(error) => warn!(error = %error, "save_failed"),
            }
        }
        if input.was_pressed(InputAction::QuickLoad) {
            let restored = save::load_and_validate_save(&path, self.world.level_name())
                .and_then(|save| {
                    let digest = save.digest.clone();
                    self.world
                        .restore(save.world)
                        .map(|()| digest)
                        .map_err(|error| error.to_string())
                });
            match restored {
                Ok(digest) => info!(path = %path.display(), digest = %digest, "save_loaded"),
                Err(error) => warn!(error = %error, "load_failed"),
            }
        }
    }

    fn log_events(&mut self) {
        for event in self.world.drain_events() {
            match event {
                WorldEvent::Explosion { x, y, radius } => {
                    debug!(x, y, radius, "explosion");
                }
                WorldEvent::LevelComplete { rescued, total } => {
                    info!(
                        level = %self.world.level_name(),
                        rescued,
                        total,
                        digest = %self.world.state_digest(),
                        "attempt_finished"
                    );
                }
                WorldEvent::Released { .. } | WorldEvent::Removed { .. } => {}
            }
        }
    }

    #[cfg(test)]
    fn world(&self) -> &SimulationWorld {
        &self.world
    }
}

impl Scene for LevelScene {
    fn load(&mut self) {
        match SimulationWorld::from_level(self.level.clone()) {
            Ok(world) => self.world = world,
            Err(error) => warn!(error = %error, "world_rebuild_failed"),
        }
        self.reset_view_state();
        info!(level = %self.level.name, label = %self.level.label, "scene_loaded");
    }

    fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand {
        let dt_ms = fixed_dt.as_secs_f64() * 1000.0;
        self.scene_time_ms += dt_ms;

        if input.was_pressed(InputAction::Quit) {
            return SceneCommand::Quit;
        }
        if input.was_pressed(InputAction::Restart) {
            return SceneCommand::Restart;
        }

        self.handle_toggles(input);
        self.handle_camera(input);
        self.handle_pointer(input);
        self.handle_persistence(input);

        self.world.tick(dt_ms as f32);
        self.log_events();
        SceneCommand::None
    }

    fn render_view(&self) -> RenderView<'_> {
        let brush = self
            .cursor_level
            .filter(|_| self.paint_mode)
            .map(|center| BrushCursor {
                center,
                radius: self.brush_radius,
                erasing: self.brush_stroke == Some(PaintMode::Remove),
            });
        RenderView {
            world: &self.world,
            camera: self.camera,
            show_regions: self.show_regions,
            brush,
            hovered_agent: self.hovered_agent,
        }
    }

    fn unload(&mut self) {
        let tally = self.world.fate_tally();
        info!(
            level = %self.world.level_name(),
            released = self.world.released(),
            rescued = tally.rescued,
            lost = tally.total() - tally.rescued,
            "scene_unloaded"
        );
    }

    fn tick_interval(&self, base: Duration) -> Duration {
        self.world.clock().tick_interval(base)
    }

    fn debug_title(&self) -> Option<String> {
        let clock = self.world.clock();
        let mut status = String::new();
        if clock.is_paused() {
            status.push_str(" [paused]");
        }
        if clock.is_fast_forward() {
            status.push_str(" [ff]");
        }
        if self.world.is_nuked() {
            status.push_str(" [nuke]");
        }
        if self.paint_mode {
            status.push_str(&format!(" [paint r{}]", self.brush_radius));
        }
        Some(format!(
            "lemsim - {} | out {} in {}/{} | rate {} | {} x{} | tps {:.0}{}",
            self.world.label(),
            self.world.active_count(),
            self.world.rescued(),
            self.world.agents().len(),
            clock.release_rate(),
            self.selected_tool.def_key(),
            self.world.inventory().remaining(self.selected_tool),
            self.metrics.snapshot().tps,
            status
        ))
    }
}

#[cfg(test)]
mod tests {
    use lemsim_engine::sim::{BehaviorState, Facing, Raster, Rgba, ToolInventory};
    use tempfile::TempDir;

    use super::*;

    const TICK: Duration = Duration::from_millis(33);

    /// 300x150 level, ground from row 120, spawn near the left edge and no exit.
    fn level() -> LevelData {
        let mut collision = Raster::filled(300, 150, Rgba::TRANSPARENT);
        for y in 120..150 {
            for x in 0..300 {
                collision.set(x, y, Rgba::rgb(110, 80, 50));
            }
        }
        for y in 20..22 {
            for x in 40..44 {
                collision.set(x, y, Rgba::SPAWN_MARKER);
            }
        }
        LevelData {
            name: "meadow".into(),
            label: "Meadow".into(),
            agent_count: 3,
            release_rate: 10,
            facing: Facing::Right,
            tools: ToolInventory::from_counts([(ToolId::Blocker, 1), (ToolId::Digger, 2)]),
            collision,
            visual: None,
        }
    }

    fn new_scene(cache_dir: PathBuf) -> LevelScene {
        let mut scene =
            LevelScene::new(level(), cache_dir, MetricsHandle::default()).expect("scene");
        scene.load();
        scene
    }

    fn idle() -> InputSnapshot {
        InputSnapshot::empty().with_window_size((600, 300))
    }

    fn run_until_walking(scene: &mut LevelScene, index: usize) {
        for _ in 0..400 {
            scene.update(TICK, &idle());
            let agent = &scene.world().agents()[index];
            if agent.active && agent.state == BehaviorState::Walking {
                return;
            }
        }
        panic!("agent {index} never started walking");
    }

    fn click_on_agent(scene: &LevelScene, index: usize) -> InputSnapshot {
        let agent = &scene.world().agents()[index];
        let (cx, cy) = agent.center();
        let zoom = scene.camera.effective_zoom() as f32;
        let screen = Vec2 {
            x: (cx - scene.camera.position.x) * zoom,
            y: (cy - scene.camera.position.y) * zoom,
        };
        idle()
            .with_cursor_position_px(Some(screen))
            .with_left_click_pressed(true)
    }

    #[test]
    fn number_key_then_click_assigns_the_tool() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        run_until_walking(&mut scene, 0);

        scene.update(TICK, &idle().with_pressed(InputAction::SelectTool(2)));
        assert_eq!(scene.selected_tool, ToolId::Blocker);

        let click = click_on_agent(&scene, 0);
        scene.update(TICK, &click);

        assert_eq!(scene.world().agents()[0].state, BehaviorState::Blocking);
        assert_eq!(scene.world().inventory().remaining(ToolId::Blocker), 0);
    }

    #[test]
    fn click_with_empty_inventory_changes_nothing() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        run_until_walking(&mut scene, 0);
        scene.update(TICK, &idle().with_pressed(InputAction::SelectTool(0)));

        let click = click_on_agent(&scene, 0);
        scene.update(TICK, &click);

        assert_eq!(scene.world().inventory().remaining(ToolId::Climber), 0);
        assert_eq!(scene.world().agents()[0].state, BehaviorState::Walking);
    }

    #[test]
    fn nuke_needs_two_presses_inside_the_window() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        let nuke = idle().with_pressed(InputAction::Nuke);

        scene.update(TICK, &nuke);
        assert!(!scene.world().is_nuked());
        for _ in 0..20 {
            scene.update(TICK, &idle());
        }
        scene.update(TICK, &nuke);
        assert!(!scene.world().is_nuked(), "second press came too late");

        scene.update(TICK, &idle());
        scene.update(TICK, &nuke);
        assert!(scene.world().is_nuked());
    }

    #[test]
    fn pause_freezes_the_world() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        run_until_walking(&mut scene, 0);

        scene.update(TICK, &idle().with_pressed(InputAction::Pause));
        let frozen = scene.world().state_digest();
        for _ in 0..10 {
            scene.update(TICK, &idle());
        }
        assert_eq!(scene.world().state_digest(), frozen);

        scene.update(TICK, &idle().with_pressed(InputAction::Pause));
        scene.update(TICK, &idle());
        assert_ne!(scene.world().state_digest(), frozen);
    }

    #[test]
    fn fast_forward_shortens_the_tick_interval() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        let base = Duration::from_millis(32);
        assert_eq!(scene.tick_interval(base), base);
        scene.update(TICK, &idle().with_pressed(InputAction::FastForward));
        let fast = scene.tick_interval(base).as_secs_f64();
        assert!((fast - 0.008).abs() < 1e-6, "{fast}");
    }

    #[test]
    fn release_rate_keys_step_by_ten() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        scene.update(TICK, &idle().with_pressed(InputAction::ReleaseFaster));
        assert_eq!(scene.world().clock().release_rate(), 20);
        scene.update(TICK, &idle().with_pressed(InputAction::ReleaseSlower));
        scene.update(TICK, &idle().with_pressed(InputAction::ReleaseSlower));
        assert_eq!(scene.world().clock().release_rate(), 10);
    }

    #[test]
    fn paint_mode_adds_and_removes_terrain_under_the_cursor() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        scene.update(TICK, &idle().with_pressed(InputAction::TogglePaintMode));
        assert!(scene.paint_mode);

        let cursor = Some(Vec2 { x: 400.0, y: 100.0 });
        let level_point = scene.camera.screen_to_level(Vec2 { x: 400.0, y: 100.0 });
        let (px, py) = (level_point.x as i32, level_point.y as i32);
        assert!(!scene.world().terrain().is_solid_at(px, py));

        scene.update(
            TICK,
            &idle()
                .with_cursor_position_px(cursor)
                .with_mouse_down(true, false),
        );
        assert!(scene.world().terrain().is_solid_at(px, py));

        scene.update(
            TICK,
            &idle()
                .with_cursor_position_px(cursor)
                .with_mouse_down(false, true),
        );
        assert!(!scene.world().terrain().is_solid_at(px, py));
    }

    #[test]
    fn brush_radius_is_clamped() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        for _ in 0..40 {
            scene.update(TICK, &idle().with_pressed(InputAction::BrushGrow));
        }
        assert_eq!(scene.brush_radius, BRUSH_RADIUS_MAX);
        for _ in 0..40 {
            scene.update(TICK, &idle().with_pressed(InputAction::BrushShrink));
        }
        assert_eq!(scene.brush_radius, BRUSH_RADIUS_MIN);
    }

    #[test]
    fn quick_save_then_load_rewinds_the_attempt() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        for _ in 0..30 {
            scene.update(TICK, &idle());
        }
        scene.update(TICK, &idle().with_pressed(InputAction::QuickSave));
        let after_save = scene.world().state_digest();
        assert!(save::save_file_path(temp.path(), "meadow").is_file());

        for _ in 0..30 {
            scene.update(TICK, &idle());
        }
        assert_ne!(scene.world().state_digest(), after_save);

        // The load applies before this update's tick, so compare against a
        // one-tick replay from the saved state.
        let mut replay = new_scene(temp.path().to_path_buf());
        let loaded = save::load_and_validate_save(
            &save::save_file_path(temp.path(), "meadow"),
            "meadow",
        )
        .expect("load");
        replay.world.restore(loaded.world).expect("restore");
        replay.world.tick((TICK.as_secs_f64() * 1000.0) as f32);

        scene.update(TICK, &idle().with_pressed(InputAction::QuickLoad));
        assert_eq!(scene.world().state_digest(), replay.world().state_digest());
    }

    #[test]
    fn restart_and_quit_are_forwarded_to_the_loop() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        assert_eq!(
            scene.update(TICK, &idle().with_pressed(InputAction::Restart)),
            SceneCommand::Restart
        );
        assert_eq!(
            scene.update(TICK, &idle().with_pressed(InputAction::Quit)),
            SceneCommand::Quit
        );
    }

    #[test]
    fn reload_rebuilds_a_fresh_attempt() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        let fresh = scene.world().state_digest();
        for _ in 0..30 {
            scene.update(TICK, &idle());
        }
        scene.unload();
        scene.load();
        assert_eq!(scene.world().state_digest(), fresh);
        assert_eq!(scene.world().released(), 0);
    }

    #[test]
    fn title_shows_counters_and_selected_tool() {
        let temp = TempDir::new().expect("temp");
        let mut scene = new_scene(temp.path().to_path_buf());
        scene.update(TICK, &idle().with_pressed(InputAction::SelectTool(6)));
        let title = scene.debug_title().expect("title");
        assert!(title.contains("Meadow"));
        assert!(title.contains("digger x2"));
        assert!(title.contains("in 0/3"));
    }
}
